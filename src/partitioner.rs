use crate::{EnsembleError, FeatureMatrix, Method, Partition};

/// A base clustering algorithm that independently partitions a feature matrix.
///
/// Implementations only read the shared matrix and return a fresh [`Partition`], so any number
/// of them can run concurrently against the same data. Label `-1` may only be emitted by
/// implementations whose `emits_noise` returns true.
pub trait Partitioner: Send + Sync {
    /// Identifies the algorithm in partitions, evaluation summaries and failure reports.
    fn method(&self) -> Method;

    /// Whether this algorithm may leave rows unassigned, labelled `-1`. Only density-based
    /// algorithms do.
    fn emits_noise(&self) -> bool {
        false
    }

    /// Partitions the rows of `matrix`.
    fn partition(&self, matrix: &FeatureMatrix) -> Result<Partition, EnsembleError>;
}
