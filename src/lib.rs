//! Consensus (ensemble) clustering of supplier performance data, with tiered cluster profiles.
//!
//! Several independent base clustering algorithms (k-means, DBSCAN and agglomerative
//! clustering) partition the same standardised feature matrix. Their partitions are aggregated
//! into a co-association matrix, the fraction of partitions in which each pair of suppliers
//! shares a cluster, and that matrix is consolidated into one final partition by average
//! linkage. The consensus is then scored with internal validity metrics and every cluster is
//! described by its size, mean metrics, strengths, improvement areas and a relative
//! performance tier.
//!
//! Because co-association only records whether two rows were grouped together, the consensus
//! is unaffected by how each base algorithm happens to number its clusters. Numeric algorithms
//! are generic over floating point types and work on row-major `&[Vec<T>]` data.
//!
//! # Examples
//! ```
//!use consensus_tiers::{EnsembleConfig, Pipeline, SupplierRecord};
//!
//!let record = |id: &str, level: f64| SupplierRecord {
//!    unit_id: id.to_string(),
//!    quality_score: Some(level),
//!    delivery_reliability: Some(level + 0.1),
//!    cost_efficiency: Some(level * 0.9),
//!    customer_satisfaction: Some(level),
//!    defect_rate: Some(10.0 - level),
//!    on_time_delivery_rate: Some(level),
//!    response_time_hours: Some(20.0 - level),
//!    overall_score: None,
//!};
//!let mut records = Vec::new();
//!for (n, level) in [1.0, 1.1, 1.2, 5.0, 5.1, 5.2, 9.0, 9.1, 9.2].iter().enumerate() {
//!    records.push(record(&format!("S{n}"), *level));
//!}
//!
//!let config = EnsembleConfig::builder()
//!    .n_clusters(3)
//!    .min_successful(2)
//!    .build()
//!    .unwrap();
//!let report = Pipeline::new(config).run(&records).unwrap();
//!assert_eq!(3, report.consensus.n_clusters);
//! ```
//!
//! # Features
//! * `serial` - sequential execution of the base partitioners, `Pipeline::run`.
//! * `parallel` - concurrent execution of the base partitioners, one worker thread each,
//!   `Pipeline::run_par`; also `Agglomerative::cluster_par` with rayon distance matrices.

pub use crate::agglomerative::{
    Agglomerative, AgglomerativeHyperParamBuilder, AgglomerativeHyperParams,
};
pub use crate::co_association::{CoAssociationBuilder, CoAssociationMatrix};
pub use crate::consensus::{consolidate_k, ConsensusClusterer, ConsensusCut, ConsensusPartition};
pub use crate::dbscan::{Dbscan, DbscanHyperParamBuilder, DbscanHyperParams, NnAlgorithm};
pub use crate::distance::DistanceMetric;
pub use crate::ensemble::{Ensemble, EnsembleOutcome};
pub use crate::error::{EnsembleError, Stage};
pub use crate::evaluation::{adjusted_rand_index, evaluate, ClusterScores};
pub use crate::features::{FeatureMatrix, FeatureMatrixBuilder, SupplierRecord};
pub use crate::hyper_parameters::{EnsembleConfig, EnsembleConfigBuilder};
pub use crate::kmeans::{KMeans, KMeansFit, KMeansHyperParamBuilder, KMeansHyperParams};
pub use crate::linkage::{Dendrogram, Linkage, Merge};
pub use crate::metric::Metric;
pub use crate::partition::{canonical_labels, Method, Partition, NOISE};
pub use crate::partitioner::Partitioner;
pub use crate::pipeline::{EvaluationReport, Pipeline, UnitAssignment};
pub use crate::profile::{ClusterProfile, ClusterProfiler, Tier};
pub use crate::search::{
    search_eps, search_n_clusters, SearchCandidate, SearchMethod, SearchReport,
};

mod agglomerative;
mod centers;
mod co_association;
mod consensus;
mod dbscan;
mod distance;
mod ensemble;
mod error;
mod evaluation;
mod features;
mod hyper_parameters;
mod kmeans;
mod linkage;
mod metric;
mod partition;
mod partitioner;
mod pipeline;
mod profile;
mod search;
mod union_find;
mod validation;
