#[cfg(feature = "parallel")]
use crate::distance::pairwise_distances_par;
use crate::distance::{pairwise_distances, DistanceMetric};
use crate::hyper_parameters::validate_input_left_bound;
use crate::linkage::{agglomerate, Dendrogram, Linkage};
use crate::validation::DataValidator;
use crate::{EnsembleError, FeatureMatrix, Method, Partition, Partitioner};
use num_traits::Float;

// Defaults for parameters
const N_CLUSTERS_DEFAULT: usize = 3;
const LINKAGE_DEFAULT: Linkage = Linkage::Ward;
const DISTANCE_METRIC_DEFAULT: DistanceMetric = DistanceMetric::Euclidean;

// Valid minimums/left bounds of parameters
const N_CLUSTERS_MINIMUM: usize = 1;

/// Hyper parameters of the hierarchical-agglomerative partitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct AgglomerativeHyperParams {
    pub(crate) n_clusters: usize,
    pub(crate) linkage: Linkage,
    pub(crate) dist_metric: DistanceMetric,
}

/// Builder object to set custom agglomerative hyper parameters.
#[derive(Debug, Clone, Default)]
pub struct AgglomerativeHyperParamBuilder {
    n_clusters: Option<usize>,
    linkage: Option<Linkage>,
    dist_metric: Option<DistanceMetric>,
}

impl Default for AgglomerativeHyperParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AgglomerativeHyperParams {
    pub fn builder() -> AgglomerativeHyperParamBuilder {
        AgglomerativeHyperParamBuilder::default()
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}

impl AgglomerativeHyperParamBuilder {
    /// Sets the number of clusters the merge tree is cut into. Defaults to 3.
    pub fn n_clusters(mut self, n_clusters: usize) -> AgglomerativeHyperParamBuilder {
        self.n_clusters =
            Some(validate_input_left_bound(n_clusters, N_CLUSTERS_MINIMUM, "n_clusters"));
        self
    }

    /// Sets the linkage rule. Defaults to Ward (minimum variance).
    pub fn linkage(mut self, linkage: Linkage) -> AgglomerativeHyperParamBuilder {
        self.linkage = Some(linkage);
        self
    }

    /// Sets the distance metric between rows. Ward linkage is only meaningful with Euclidean
    /// distances. Defaults to Euclidean.
    pub fn dist_metric(mut self, dist_metric: DistanceMetric) -> AgglomerativeHyperParamBuilder {
        self.dist_metric = Some(dist_metric);
        self
    }

    pub fn build(self) -> AgglomerativeHyperParams {
        AgglomerativeHyperParams {
            n_clusters: self.n_clusters.unwrap_or(N_CLUSTERS_DEFAULT),
            linkage: self.linkage.unwrap_or(LINKAGE_DEFAULT),
            dist_metric: self.dist_metric.unwrap_or(DISTANCE_METRIC_DEFAULT),
        }
    }
}

/// Hierarchical agglomerative clustering of feature rows. Generic over floating point numeric
/// types.
#[derive(Debug, Clone, PartialEq)]
pub struct Agglomerative<'a, T> {
    data: &'a [Vec<T>],
    hp: AgglomerativeHyperParams,
}

impl<'a, T: Float> Agglomerative<'a, T> {
    pub fn new(data: &'a [Vec<T>], hyper_params: AgglomerativeHyperParams) -> Self {
        Agglomerative { data, hp: hyper_params }
    }

    /// Builds the full merge tree of the data.
    pub fn dendrogram(&self) -> Result<Dendrogram, EnsembleError> {
        self.validate()?;
        let distances = pairwise_distances(self.data, self.hp.dist_metric);
        agglomerate(self.data.len(), flatten_to_f64(distances), self.hp.linkage)
    }

    /// Performs clustering, cutting the merge tree into exactly `n_clusters` clusters.
    pub fn cluster(&self) -> Result<Vec<i32>, EnsembleError> {
        DataValidator::new(self.data).validate_n_clusters(self.hp.n_clusters)?;
        self.dendrogram()?.cut_clusters(self.hp.n_clusters)
    }

    fn validate(&self) -> Result<(), EnsembleError> {
        DataValidator::new(self.data).validate_input_data()?;
        if self.hp.linkage == Linkage::Ward && self.hp.dist_metric != DistanceMetric::Euclidean {
            return Err(EnsembleError::Configuration(String::from(
                "Ward linkage requires Euclidean distances",
            )));
        }
        Ok(())
    }
}

#[cfg(feature = "parallel")]
impl<'a, T: Float + Send + Sync> Agglomerative<'a, T> {
    /// Builds the full merge tree, computing the distance matrix in parallel.
    pub fn dendrogram_par(&self) -> Result<Dendrogram, EnsembleError> {
        self.validate()?;
        let distances = pairwise_distances_par(self.data, self.hp.dist_metric);
        agglomerate(self.data.len(), flatten_to_f64(distances), self.hp.linkage)
    }

    /// Performs clustering, computing the distance matrix in parallel. Gives the same labels
    /// as `cluster`.
    pub fn cluster_par(&self) -> Result<Vec<i32>, EnsembleError> {
        DataValidator::new(self.data).validate_n_clusters(self.hp.n_clusters)?;
        self.dendrogram_par()?.cut_clusters(self.hp.n_clusters)
    }
}

fn flatten_to_f64<T: Float>(distances: Vec<Vec<T>>) -> Vec<f64> {
    distances
        .into_iter()
        .flatten()
        .map(|d| d.to_f64().unwrap_or(f64::NAN))
        .collect()
}

impl Partitioner for AgglomerativeHyperParams {
    fn method(&self) -> Method {
        Method::Hierarchical
    }

    fn partition(&self, matrix: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        let labels = Agglomerative::new(matrix.rows(), self.clone()).cluster()?;
        Ok(Partition::new(Method::Hierarchical, labels)
            .with_param("n_clusters", self.n_clusters as f64))
    }
}
