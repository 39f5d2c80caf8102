use crate::co_association::CoAssociationMatrix;
use crate::linkage::{agglomerate, Dendrogram, Linkage};
use crate::{EnsembleError, Method, Partition};
use log::debug;
use serde::{Deserialize, Serialize};

/// How the consensus merge tree is turned into flat clusters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusCut {
    /// Cut into exactly this many clusters.
    Clusters(usize),
    /// Apply every merge whose co-association distance is at most this height, in [0, 1].
    Height(f64),
}

impl ConsensusCut {
    pub(crate) fn validate(&self) -> Result<(), EnsembleError> {
        match *self {
            ConsensusCut::Clusters(0) => Err(EnsembleError::Configuration(String::from(
                "The consensus must have at least one cluster",
            ))),
            ConsensusCut::Height(height) if !(0.0..=1.0).contains(&height) => {
                Err(EnsembleError::Configuration(format!(
                    "Consensus cut height must lie in [0, 1], got {height}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// The final agreed partition. Labels are `0..k`, numbered in order of first appearance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusPartition {
    pub labels: Vec<i32>,
    pub n_clusters: usize,
    #[serde(skip)]
    pub dendrogram: Dendrogram,
}

impl ConsensusPartition {
    /// The consensus as a plain partition, for scoring it next to the base partitions.
    pub fn to_partition(&self) -> Partition {
        Partition::new(Method::Consensus, self.labels.clone())
            .with_param("n_clusters", self.n_clusters as f64)
    }
}

/// Consolidates a co-association matrix into one partition by average-linkage merging of
/// `1 - agreement` distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusClusterer {
    cut: ConsensusCut,
}

impl ConsensusClusterer {
    pub fn new(cut: ConsensusCut) -> Self {
        ConsensusClusterer { cut }
    }

    /// Performs the consolidation.
    ///
    /// Deterministic for a given matrix: equal merge distances are resolved by the smallest
    /// member row indices of the clusters involved.
    ///
    /// # Returns
    /// * The consensus partition, or a `Configuration` error if the cut asks for zero or
    ///   more clusters than rows, or a height outside [0, 1].
    pub fn consolidate(
        &self,
        coassoc: &CoAssociationMatrix,
    ) -> Result<ConsensusPartition, EnsembleError> {
        self.validate(coassoc.n_samples())?;
        self.cut_tree(coassoc.n_samples(), coassoc.to_distances())
    }

    /// Same as `consolidate`, but merges inside the matrix's own storage instead of a copy.
    pub fn consolidate_owned(
        &self,
        coassoc: CoAssociationMatrix,
    ) -> Result<ConsensusPartition, EnsembleError> {
        let n_samples = coassoc.n_samples();
        self.validate(n_samples)?;
        self.cut_tree(n_samples, coassoc.into_distances())
    }

    fn validate(&self, n_samples: usize) -> Result<(), EnsembleError> {
        self.cut.validate()?;
        if let ConsensusCut::Clusters(n_clusters) = self.cut {
            if n_clusters > n_samples {
                return Err(EnsembleError::Configuration(format!(
                    "Cannot form {n_clusters} consensus clusters from {n_samples} rows"
                )));
            }
        }
        Ok(())
    }

    fn cut_tree(
        &self,
        n_samples: usize,
        distances: Vec<f64>,
    ) -> Result<ConsensusPartition, EnsembleError> {
        let dendrogram = agglomerate(n_samples, distances, Linkage::Average)?;
        let labels = match self.cut {
            ConsensusCut::Clusters(n_clusters) => dendrogram.cut_clusters(n_clusters)?,
            ConsensusCut::Height(height) => dendrogram.cut_height(height)?,
        };
        let n_clusters = labels.iter().max().map_or(0, |&max| max as usize + 1);
        debug!("Consolidated {n_samples} rows into {n_clusters} consensus clusters");
        Ok(ConsensusPartition { labels, n_clusters, dendrogram })
    }
}

/// Shorthand for consolidating into exactly `n_clusters` clusters.
pub fn consolidate_k(
    coassoc: &CoAssociationMatrix,
    n_clusters: usize,
) -> Result<ConsensusPartition, EnsembleError> {
    ConsensusClusterer::new(ConsensusCut::Clusters(n_clusters)).consolidate(coassoc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoAssociationBuilder;

    fn partitions(label_sets: &[&[i32]]) -> Vec<Partition> {
        label_sets
            .iter()
            .map(|labels| Partition::new(Method::Custom("test"), labels.to_vec()))
            .collect()
    }

    #[test]
    fn three_units_agreement() {
        let partitions = partitions(&[&[0, 0, 1], &[0, 1, 1], &[0, 0, 1]]);
        let coassoc = CoAssociationBuilder.build(&partitions).unwrap();
        assert!((coassoc.get(0, 1) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(0.0, coassoc.get(0, 2));
        assert!((coassoc.get(1, 2) - 1.0 / 3.0).abs() < 1e-12);
        let consensus = consolidate_k(&coassoc, 2).unwrap();
        assert_eq!(vec![0, 0, 1], consensus.labels);
    }

    #[test]
    fn relabelled_inputs_give_same_consensus() {
        let original = partitions(&[&[0, 0, 1, 1, 2, 2], &[1, 1, 0, 0, 0, 2]]);
        let relabelled = partitions(&[&[2, 2, 0, 0, 1, 1], &[5, 5, 3, 3, 3, 9]]);
        let a = consolidate_k(&CoAssociationBuilder.build(&original).unwrap(), 3).unwrap();
        let b = consolidate_k(&CoAssociationBuilder.build(&relabelled).unwrap(), 3).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn full_disagreement_uses_tie_rule() {
        // Every row alone in every partition: all distances equal 1.
        let partitions = partitions(&[&[0, 1, 2, 3]]);
        let coassoc = CoAssociationBuilder.build(&partitions).unwrap();
        let consensus = consolidate_k(&coassoc, 2).unwrap();
        assert_eq!(vec![0, 0, 0, 1], consensus.labels);
    }

    #[test]
    fn height_cut() {
        let partitions = partitions(&[&[0, 0, 1, 1], &[0, 0, 1, 2]]);
        let coassoc = CoAssociationBuilder.build(&partitions).unwrap();
        let consensus = ConsensusClusterer::new(ConsensusCut::Height(0.0))
            .consolidate(&coassoc)
            .unwrap();
        assert_eq!(vec![0, 0, 1, 2], consensus.labels);
        assert_eq!(3, consensus.n_clusters);
    }

    #[test]
    fn owned_matrix_gives_same_consensus() {
        let partitions = partitions(&[&[0, 0, 1, 1, 2], &[0, 0, 0, 1, 1], &[1, 1, 0, 0, 2]]);
        let coassoc = CoAssociationBuilder.build(&partitions).unwrap();
        let borrowed = consolidate_k(&coassoc, 3).unwrap();
        let owned = ConsensusClusterer::new(ConsensusCut::Clusters(3))
            .consolidate_owned(coassoc)
            .unwrap();
        assert_eq!(borrowed, owned);
    }

    #[test]
    fn invalid_cuts() {
        let partitions = partitions(&[&[0, 1]]);
        let coassoc = CoAssociationBuilder.build(&partitions).unwrap();
        assert!(matches!(consolidate_k(&coassoc, 0), Err(EnsembleError::Configuration(..))));
        assert!(matches!(consolidate_k(&coassoc, 3), Err(EnsembleError::Configuration(..))));
        let height = ConsensusClusterer::new(ConsensusCut::Height(-0.1)).consolidate(&coassoc);
        assert!(matches!(height, Err(EnsembleError::Configuration(..))));
    }
}
