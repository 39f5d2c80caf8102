use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};

/// Label reserved for points that a density-based method leaves unassigned.
pub const NOISE: i32 = -1;

/// The algorithms that can produce a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    KMeans,
    Dbscan,
    Hierarchical,
    Consensus,
    /// A caller-supplied partitioner.
    Custom(&'static str),
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::KMeans => "kmeans",
            Method::Dbscan => "dbscan",
            Method::Hierarchical => "hierarchical",
            Method::Consensus => "consensus",
            Method::Custom(name) => name,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The output of one base partitioner run. Label values carry no meaning across partitions,
/// only co-membership does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    pub method: Method,
    pub params: BTreeMap<String, f64>,
    pub labels: Vec<i32>,
}

impl Partition {
    pub fn new(method: Method, labels: Vec<i32>) -> Self {
        Partition { method, params: BTreeMap::new(), labels }
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Number of distinct non-noise labels.
    pub fn n_clusters(&self) -> usize {
        let mut labels = self.labels.iter().filter(|&&label| label != NOISE).collect::<Vec<_>>();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }

    pub fn n_noise(&self) -> usize {
        self.labels.iter().filter(|&&label| label == NOISE).count()
    }
}

/// Renumbers non-noise labels `0..` in order of first appearance by row index. Noise stays
/// noise. Two label vectors describing the same co-membership map to the same output.
pub fn canonical_labels(labels: &[i32]) -> Vec<i32> {
    let mut mapping: HashMap<i32, i32> = HashMap::new();
    labels
        .iter()
        .map(|&label| {
            if label == NOISE {
                return NOISE;
            }
            let next = mapping.len() as i32;
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_relabelling() {
        assert_eq!(vec![0, 0, 1, -1, 2, 1], canonical_labels(&[7, 7, 3, -1, 9, 3]));
        assert_eq!(canonical_labels(&[1, 0, 0]), canonical_labels(&[5, 2, 2]));
    }

    #[test]
    fn counts() {
        let partition = Partition::new(Method::Dbscan, vec![0, -1, 1, 1, -1]);
        assert_eq!(2, partition.n_clusters());
        assert_eq!(2, partition.n_noise());
        assert_eq!(5, partition.n_samples());
    }
}
