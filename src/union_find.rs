/// Disjoint sets over row indices, used to replay dendrogram merges into flat labels.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n_samples: usize) -> Self {
        UnionFind { parent: (0..n_samples).collect() }
    }

    /// Joins the sets containing `m` and `n`. The root with the lower index survives, so the
    /// root of every set is its smallest member.
    pub(crate) fn union(&mut self, m: usize, n: usize) -> usize {
        let root_m = self.find(m);
        let root_n = self.find(n);
        if root_m == root_n {
            return root_m;
        }
        let (root, child) = if root_m < root_n { (root_m, root_n) } else { (root_n, root_m) };
        self.parent[child] = root;
        root
    }

    pub(crate) fn find(&mut self, mut n: usize) -> usize {
        let mut root = n;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[n] != root {
            let next = self.parent[n];
            self.parent[n] = root;
            n = next;
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smallest_member_is_root() {
        let mut union_find = UnionFind::new(5);
        union_find.union(3, 4);
        union_find.union(4, 1);
        assert_eq!(1, union_find.find(3));
        assert_eq!(1, union_find.find(4));
        assert_eq!(0, union_find.find(0));
        assert_eq!(2, union_find.find(2));
    }
}
