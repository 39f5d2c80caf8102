use crate::agglomerative::AgglomerativeHyperParams;
use crate::consensus::ConsensusCut;
use crate::dbscan::DbscanHyperParams;
use crate::kmeans::KMeansHyperParams;
use crate::{EnsembleError, Partitioner};
use log::warn;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

// Defaults for parameters
const SEED_DEFAULT: u64 = 42;
const N_CLUSTERS_DEFAULT: usize = 3;
const MIN_SUCCESSFUL_DEFAULT: usize = 2;
const EXCLUDE_NOISE_DEFAULT: bool = true;
const N_TAGS_DEFAULT: usize = 2;

// Valid bounds of parameters
const N_CLUSTERS_MINIMUM: usize = 2;
const N_TAGS_RANGE: std::ops::RangeInclusive<usize> = 2..=3;

/// Number of partitioners in the default ensemble: centroid, density and hierarchical.
const DEFAULT_PARTITIONER_COUNT: usize = 3;

/// Configuration of one consensus run. Only use the builder if you want to tune the run.
/// Otherwise `EnsembleConfig::default()` reproduces the standard three-method ensemble with
/// three consensus clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleConfig {
    pub(crate) seed: u64,
    pub(crate) n_clusters: usize,
    pub(crate) kmeans: KMeansHyperParams,
    pub(crate) dbscan: DbscanHyperParams,
    pub(crate) agglomerative: AgglomerativeHyperParams,
    pub(crate) min_successful: usize,
    pub(crate) timeout: Option<Duration>,
    pub(crate) consensus_cut: ConsensusCut,
    pub(crate) exclude_noise: bool,
    pub(crate) n_tags: usize,
}

/// Builder object to set a custom ensemble configuration.
#[derive(Debug, Clone, Default)]
pub struct EnsembleConfigBuilder {
    seed: Option<u64>,
    n_clusters: Option<usize>,
    kmeans: Option<KMeansHyperParams>,
    dbscan: Option<DbscanHyperParams>,
    agglomerative: Option<AgglomerativeHyperParams>,
    min_successful: Option<usize>,
    timeout: Option<Duration>,
    consensus_cut: Option<ConsensusCut>,
    exclude_noise: Option<bool>,
    n_tags: Option<usize>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        EnsembleConfig::from_parts(EnsembleConfigBuilder::default())
    }
}

impl EnsembleConfig {
    /// Enters the builder pattern, allowing a custom configuration to be set using the
    /// various setter methods.
    ///
    /// # Returns
    /// * the configuration builder
    pub fn builder() -> EnsembleConfigBuilder {
        EnsembleConfigBuilder::default()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn min_successful(&self) -> usize {
        self.min_successful
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn consensus_cut(&self) -> ConsensusCut {
        self.consensus_cut
    }

    pub fn exclude_noise(&self) -> bool {
        self.exclude_noise
    }

    pub fn n_tags(&self) -> usize {
        self.n_tags
    }

    /// The default ensemble: k-means, DBSCAN and agglomerative clustering.
    pub fn partitioners(&self) -> Vec<Arc<dyn Partitioner>> {
        vec![
            Arc::new(self.kmeans.clone()),
            Arc::new(self.dbscan.clone()),
            Arc::new(self.agglomerative.clone()),
        ]
    }

    fn from_parts(builder: EnsembleConfigBuilder) -> Self {
        let seed = builder.seed.unwrap_or(SEED_DEFAULT);
        let n_clusters = builder.n_clusters.unwrap_or(N_CLUSTERS_DEFAULT);
        EnsembleConfig {
            seed,
            n_clusters,
            kmeans: builder.kmeans.unwrap_or_else(|| {
                KMeansHyperParams::builder().n_clusters(n_clusters).seed(seed).build()
            }),
            dbscan: builder.dbscan.unwrap_or_default(),
            agglomerative: builder.agglomerative.unwrap_or_else(|| {
                AgglomerativeHyperParams::builder().n_clusters(n_clusters).build()
            }),
            min_successful: builder.min_successful.unwrap_or(MIN_SUCCESSFUL_DEFAULT),
            timeout: builder.timeout,
            consensus_cut: builder.consensus_cut.unwrap_or(ConsensusCut::Clusters(n_clusters)),
            exclude_noise: builder.exclude_noise.unwrap_or(EXCLUDE_NOISE_DEFAULT),
            n_tags: builder.n_tags.unwrap_or(N_TAGS_DEFAULT),
        }
    }
}

impl EnsembleConfigBuilder {
    /// Sets the seed of every stochastic step. Identical seeds and inputs give identical
    /// results. Defaults to 42.
    pub fn seed(mut self, seed: u64) -> EnsembleConfigBuilder {
        self.seed = Some(seed);
        self
    }

    /// Sets k, the number of consensus clusters. Also used by the centroid and hierarchical
    /// partitioners unless their hyper parameters are set explicitly. Defaults to 3.
    pub fn n_clusters(mut self, n_clusters: usize) -> EnsembleConfigBuilder {
        self.n_clusters = Some(n_clusters);
        self
    }

    /// Overrides the k-means hyper parameters.
    pub fn kmeans(mut self, hyper_params: KMeansHyperParams) -> EnsembleConfigBuilder {
        self.kmeans = Some(hyper_params);
        self
    }

    /// Overrides the DBSCAN hyper parameters.
    pub fn dbscan(mut self, hyper_params: DbscanHyperParams) -> EnsembleConfigBuilder {
        self.dbscan = Some(hyper_params);
        self
    }

    /// Overrides the agglomerative hyper parameters.
    pub fn agglomerative(mut self, hyper_params: AgglomerativeHyperParams) -> EnsembleConfigBuilder {
        self.agglomerative = Some(hyper_params);
        self
    }

    /// Sets how many base partitioners must succeed for the run to continue. Defaults to 2.
    pub fn min_successful(mut self, min_successful: usize) -> EnsembleConfigBuilder {
        self.min_successful = Some(min_successful);
        self
    }

    /// Sets a wall clock budget for the base partitioning stage. A partitioner still running
    /// when it expires counts as failed. Unlimited by default.
    pub fn timeout(mut self, timeout: Duration) -> EnsembleConfigBuilder {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how the consensus tree is cut. Defaults to `ConsensusCut::Clusters(n_clusters)`.
    pub fn consensus_cut(mut self, cut: ConsensusCut) -> EnsembleConfigBuilder {
        self.consensus_cut = Some(cut);
        self
    }

    /// Sets whether noise rows are dropped before scoring a partition. When false, noise is
    /// scored as one more cluster. Defaults to true.
    pub fn exclude_noise(mut self, exclude_noise: bool) -> EnsembleConfigBuilder {
        self.exclude_noise = Some(exclude_noise);
        self
    }

    /// Sets how many strengths and improvement areas each profile lists. Must be 2 or 3.
    /// Defaults to 2.
    pub fn n_tags(mut self, n_tags: usize) -> EnsembleConfigBuilder {
        self.n_tags = Some(n_tags);
        self
    }

    /// Finishes the building of the configuration.
    ///
    /// # Returns
    /// * The completed configuration, or a `Configuration` error if k is below 2, the
    ///   success threshold is zero or above the size of the default ensemble, the tag count
    ///   is outside 2..=3, or a height cut lies outside [0, 1].
    pub fn build(self) -> Result<EnsembleConfig, EnsembleError> {
        let config = EnsembleConfig::from_parts(self);
        if config.n_clusters < N_CLUSTERS_MINIMUM {
            return Err(EnsembleError::Configuration(format!(
                "n_clusters must be at least {N_CLUSTERS_MINIMUM}, got {}",
                config.n_clusters
            )));
        }
        validate_min_successful(config.min_successful, DEFAULT_PARTITIONER_COUNT)?;
        if !N_TAGS_RANGE.contains(&config.n_tags) {
            return Err(EnsembleError::Configuration(format!(
                "n_tags must be between {} and {}, got {}",
                N_TAGS_RANGE.start(),
                N_TAGS_RANGE.end(),
                config.n_tags
            )));
        }
        config.consensus_cut.validate()?;
        Ok(config)
    }
}

pub(crate) fn validate_min_successful(
    min_successful: usize,
    n_partitioners: usize,
) -> Result<(), EnsembleError> {
    if min_successful == 0 || min_successful > n_partitioners {
        return Err(EnsembleError::Configuration(format!(
            "min_successful must be between 1 and the number of partitioners \
            ({n_partitioners}), got {min_successful}"
        )));
    }
    Ok(())
}

/// Clamps a hyper parameter to its lowest valid value, warning when it had to.
pub(crate) fn validate_input_left_bound<T: PartialOrd + Display + Copy>(
    input_param: T,
    left_bound: T,
    param: &str,
) -> T {
    if input_param < left_bound {
        warn!("{param} ({input_param}) cannot be lower than {left_bound}. Set to {left_bound}.");
        left_bound
    } else {
        input_param
    }
}
