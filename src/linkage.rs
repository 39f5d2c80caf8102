//! Agglomerative merging over a precomputed distance matrix.
//!
//! Clusters are always identified by their smallest member row index: merging clusters `a` and
//! `b` (`a < b`) keeps the result in slot `a`. When several candidate merges share the minimum
//! distance, the pair `(a, b)` that is lexicographically smallest is merged first. This makes
//! the merge order, and so every cut of the tree, a pure function of the distance matrix.

use crate::partition::canonical_labels;
use crate::union_find::UnionFind;
use crate::EnsembleError;
use serde::{Deserialize, Serialize};

/// Rule for measuring the distance between two clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Minimum distance between members.
    Single,
    /// Maximum distance between members.
    Complete,
    /// Mean distance over all cross-cluster pairs.
    Average,
    /// Minimum increase in within-cluster variance. Expects Euclidean distances.
    Ward,
}

impl Linkage {
    /// Lance–Williams update: distance from cluster `k` to the union of `i` and `j`.
    fn update(&self, d_ki: f64, d_kj: f64, d_ij: f64, n_i: usize, n_j: usize, n_k: usize) -> f64 {
        let (n_i, n_j, n_k) = (n_i as f64, n_j as f64, n_k as f64);
        match self {
            Linkage::Single => d_ki.min(d_kj),
            Linkage::Complete => d_ki.max(d_kj),
            Linkage::Average => (n_i * d_ki + n_j * d_kj) / (n_i + n_j),
            Linkage::Ward => {
                let squared = ((n_k + n_i) * d_ki * d_ki + (n_k + n_j) * d_kj * d_kj
                    - n_k * d_ij * d_ij)
                    / (n_i + n_j + n_k);
                squared.max(0.0).sqrt()
            }
        }
    }
}

/// One merge step. `left < right` are the smallest member row indices of the merged clusters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Size of the merged cluster.
    pub size: usize,
}

/// The full merge history of an agglomerative run, from `n` singletons down to one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dendrogram {
    n_samples: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Flat labels with exactly `n_clusters` clusters, numbered in order of first appearance.
    pub fn cut_clusters(&self, n_clusters: usize) -> Result<Vec<i32>, EnsembleError> {
        if n_clusters == 0 || n_clusters > self.n_samples {
            return Err(EnsembleError::Configuration(format!(
                "Cannot cut a tree over {} points into {n_clusters} clusters",
                self.n_samples
            )));
        }
        Ok(self.replay(self.n_samples - n_clusters))
    }

    /// Flat labels after applying, in order, every merge at or below `height`.
    pub fn cut_height(&self, height: f64) -> Result<Vec<i32>, EnsembleError> {
        if !height.is_finite() {
            return Err(EnsembleError::Configuration(format!(
                "Cut height must be finite, got {height}"
            )));
        }
        let n_merges = self.merges.iter().take_while(|merge| merge.distance <= height).count();
        Ok(self.replay(n_merges))
    }

    /// The cluster count just before the largest jump in merge distance, considering counts
    /// between `min_clusters` and `max_clusters`. The data equivalent of reading a dendrogram.
    pub fn largest_gap_clusters(&self, min_clusters: usize, max_clusters: usize) -> Option<usize> {
        let n_merges = self.merges.len();
        (min_clusters.max(1)..=max_clusters.min(self.n_samples.saturating_sub(1)))
            .filter_map(|n_clusters| {
                // Going from n_clusters to n_clusters - 1 performs merge index n - n_clusters.
                let next = self.n_samples - n_clusters;
                if next == 0 || next >= n_merges {
                    return None;
                }
                let gap = self.merges[next].distance - self.merges[next - 1].distance;
                Some((n_clusters, gap))
            })
            .fold(None, |best: Option<(usize, f64)>, (n_clusters, gap)| match best {
                Some((_, best_gap)) if best_gap >= gap => best,
                _ => Some((n_clusters, gap)),
            })
            .map(|(n_clusters, _)| n_clusters)
    }

    fn replay(&self, n_merges: usize) -> Vec<i32> {
        let mut union_find = UnionFind::new(self.n_samples);
        for merge in self.merges.iter().take(n_merges) {
            union_find.union(merge.left, merge.right);
        }
        let roots: Vec<i32> =
            (0..self.n_samples).map(|n| union_find.find(n) as i32).collect();
        canonical_labels(&roots)
    }
}

/// Builds the dendrogram for a symmetric `n_samples` x `n_samples` distance matrix, stored
/// row-major. The matrix is consumed and updated in place while merging.
pub(crate) fn agglomerate(
    n_samples: usize,
    distances: Vec<f64>,
    linkage: Linkage,
) -> Result<Dendrogram, EnsembleError> {
    if n_samples == 0 {
        return Err(EnsembleError::Input(String::from("Cannot cluster an empty distance matrix")));
    }
    if distances.len() != n_samples * n_samples {
        return Err(EnsembleError::Input(format!(
            "Distance matrix has {} entries, expected {n_samples}x{n_samples}",
            distances.len()
        )));
    }
    if distances.iter().any(|d| !d.is_finite()) {
        return Err(EnsembleError::Input(String::from(
            "Distance matrix contains non-finite entries",
        )));
    }
    Ok(Agglomerator::new(n_samples, distances, linkage).run())
}

struct Agglomerator {
    n_samples: usize,
    distances: Vec<f64>,
    linkage: Linkage,
    active: Vec<bool>,
    sizes: Vec<usize>,
    // Nearest active neighbour of each slot among higher slots, smallest index on ties.
    nearest: Vec<usize>,
    nearest_dist: Vec<f64>,
}

impl Agglomerator {
    fn new(n_samples: usize, distances: Vec<f64>, linkage: Linkage) -> Self {
        let mut agglomerator = Agglomerator {
            n_samples,
            distances,
            linkage,
            active: vec![true; n_samples],
            sizes: vec![1; n_samples],
            nearest: vec![usize::MAX; n_samples],
            nearest_dist: vec![f64::INFINITY; n_samples],
        };
        for i in 0..n_samples {
            agglomerator.refresh_nearest(i);
        }
        agglomerator
    }

    fn dist(&self, i: usize, j: usize) -> f64 {
        self.distances[i * self.n_samples + j]
    }

    fn set_dist(&mut self, i: usize, j: usize, distance: f64) {
        self.distances[i * self.n_samples + j] = distance;
        self.distances[j * self.n_samples + i] = distance;
    }

    fn run(mut self) -> Dendrogram {
        let n_samples = self.n_samples;
        let mut merges = Vec::with_capacity(n_samples.saturating_sub(1));
        while merges.len() + 1 < n_samples {
            let Some((a, b, distance)) = self.closest_pair() else {
                break;
            };
            self.merge(a, b);
            merges.push(Merge { left: a, right: b, distance, size: self.sizes[a] });
        }
        Dendrogram { n_samples, merges }
    }

    fn closest_pair(&self) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..self.n_samples {
            if !self.active[i] || self.nearest[i] == usize::MAX {
                continue;
            }
            // Strict comparison keeps the lowest i on ties, and nearest[i] is already the
            // lowest j for that i.
            if best.map_or(true, |(_, _, d)| self.nearest_dist[i] < d) {
                best = Some((i, self.nearest[i], self.nearest_dist[i]));
            }
        }
        best
    }

    fn merge(&mut self, a: usize, b: usize) {
        let d_ab = self.dist(a, b);
        let (n_a, n_b) = (self.sizes[a], self.sizes[b]);
        for k in 0..self.n_samples {
            if !self.active[k] || k == a || k == b {
                continue;
            }
            let updated =
                self.linkage.update(self.dist(k, a), self.dist(k, b), d_ab, n_a, n_b, self.sizes[k]);
            self.set_dist(k, a, updated);
        }
        self.active[b] = false;
        self.sizes[a] = n_a + n_b;
        self.nearest[b] = usize::MAX;
        self.nearest_dist[b] = f64::INFINITY;

        for k in 0..b {
            if !self.active[k] || k == a {
                continue;
            }
            if self.nearest[k] == a || self.nearest[k] == b {
                self.refresh_nearest(k);
            } else if k < a {
                let d = self.dist(k, a);
                if d < self.nearest_dist[k] || (d == self.nearest_dist[k] && a < self.nearest[k])
                {
                    self.nearest[k] = a;
                    self.nearest_dist[k] = d;
                }
            }
        }
        self.refresh_nearest(a);
    }

    fn refresh_nearest(&mut self, i: usize) {
        let mut nearest = usize::MAX;
        let mut nearest_dist = f64::INFINITY;
        for j in (i + 1)..self.n_samples {
            if self.active[j] && self.dist(i, j) < nearest_dist {
                nearest = j;
                nearest_dist = self.dist(i, j);
            }
        }
        self.nearest[i] = nearest;
        self.nearest_dist[i] = nearest_dist;
    }
}
