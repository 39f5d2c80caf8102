use crate::distance::{get_dist_func, DistanceMetric};
use crate::hyper_parameters::validate_input_left_bound;
use crate::partition::NOISE;
use crate::validation::DataValidator;
use crate::{EnsembleError, FeatureMatrix, Method, Partition, Partitioner};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// Defaults for parameters
const EPS_DEFAULT: f64 = 0.5;
const MIN_SAMPLES_DEFAULT: usize = 5;
const DISTANCE_METRIC_DEFAULT: DistanceMetric = DistanceMetric::Euclidean;
const NN_ALGORITHM_DEFAULT: NnAlgorithm = NnAlgorithm::Auto;

// Valid minimums/left bounds of parameters
const MIN_SAMPLES_MINIMUM: usize = 1;

/// Above this many samples `NnAlgorithm::Auto` switches from brute force to a k-d tree.
const BRUTE_FORCE_N_SAMPLES_LIMIT: usize = 2000;

/// The nearest neighbour algorithm options used for radius queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NnAlgorithm {
    /// Chosen internally based on the size of the input data
    Auto,
    /// Compares each point with all others
    BruteForce,
    /// K-dimensional tree algorithm.
    KdTree,
}

/// Hyper parameters of the density-based (DBSCAN) partitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct DbscanHyperParams {
    pub(crate) eps: f64,
    pub(crate) min_samples: usize,
    pub(crate) dist_metric: DistanceMetric,
    pub(crate) nn_algo: NnAlgorithm,
}

/// Builder object to set custom DBSCAN hyper parameters.
#[derive(Debug, Clone, Default)]
pub struct DbscanHyperParamBuilder {
    eps: Option<f64>,
    min_samples: Option<usize>,
    dist_metric: Option<DistanceMetric>,
    nn_algo: Option<NnAlgorithm>,
}

impl Default for DbscanHyperParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DbscanHyperParams {
    pub fn builder() -> DbscanHyperParamBuilder {
        DbscanHyperParamBuilder::default()
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }
}

impl DbscanHyperParamBuilder {
    /// Sets the neighbourhood radius. Points within `eps` of each other are neighbours.
    /// Must be positive; non-positive values are rejected when clustering. Defaults to 0.5.
    pub fn eps(mut self, eps: f64) -> DbscanHyperParamBuilder {
        self.eps = Some(eps);
        self
    }

    /// Sets the number of neighbours (the point itself included) a point needs to be a core
    /// point of a dense region. Defaults to 5.
    pub fn min_samples(mut self, min_samples: usize) -> DbscanHyperParamBuilder {
        self.min_samples =
            Some(validate_input_left_bound(min_samples, MIN_SAMPLES_MINIMUM, "min_samples"));
        self
    }

    /// Sets the distance metric. Defaults to Euclidean.
    pub fn dist_metric(mut self, dist_metric: DistanceMetric) -> DbscanHyperParamBuilder {
        self.dist_metric = Some(dist_metric);
        self
    }

    /// Sets the nearest neighbour algorithm used for radius queries. Changing this only
    /// affects performance. Defaults to Auto.
    pub fn nn_algorithm(mut self, nn_algorithm: NnAlgorithm) -> DbscanHyperParamBuilder {
        self.nn_algo = Some(nn_algorithm);
        self
    }

    pub fn build(self) -> DbscanHyperParams {
        DbscanHyperParams {
            eps: self.eps.unwrap_or(EPS_DEFAULT),
            min_samples: self.min_samples.unwrap_or(MIN_SAMPLES_DEFAULT),
            dist_metric: self.dist_metric.unwrap_or(DISTANCE_METRIC_DEFAULT),
            nn_algo: self.nn_algo.unwrap_or(NN_ALGORITHM_DEFAULT),
        }
    }
}

/// Density-based clustering (DBSCAN). Generic over floating point numeric types.
#[derive(Debug, Clone, PartialEq)]
pub struct Dbscan<'a, T> {
    data: &'a [Vec<T>],
    hp: DbscanHyperParams,
}

impl<'a, T: Float> Dbscan<'a, T> {
    pub fn new(data: &'a [Vec<T>], hyper_params: DbscanHyperParams) -> Self {
        Dbscan { data, hp: hyper_params }
    }

    /// Performs clustering on the data passed to the constructor.
    ///
    /// # Returns
    /// * A label per data point. Non-negative labels are clusters, numbered in order of
    ///   discovery by row index; -1 marks noise. A `DegenerateCluster` error is returned if
    ///   every point is noise, and a `Configuration` error if `eps` is not positive.
    pub fn cluster(&self) -> Result<Vec<i32>, EnsembleError> {
        DataValidator::new(self.data).validate_input_data()?;
        if !(self.hp.eps > 0.0) || !self.hp.eps.is_finite() {
            return Err(EnsembleError::Configuration(format!(
                "DBSCAN eps must be a positive finite radius, got {}",
                self.hp.eps
            )));
        }

        let neighbourhoods = self.calc_neighbourhoods()?;
        let is_core: Vec<bool> = neighbourhoods
            .iter()
            .map(|neighbours| neighbours.len() >= self.hp.min_samples)
            .collect();

        let mut labels = vec![NOISE; self.data.len()];
        let mut current_cluster_id = 0;
        for seed in 0..self.data.len() {
            if labels[seed] != NOISE || !is_core[seed] {
                continue;
            }
            labels[seed] = current_cluster_id;
            let mut process_queue = VecDeque::from([seed]);
            while let Some(point) = process_queue.pop_front() {
                for &neighbour in &neighbourhoods[point] {
                    if labels[neighbour] != NOISE {
                        continue;
                    }
                    labels[neighbour] = current_cluster_id;
                    if is_core[neighbour] {
                        process_queue.push_back(neighbour);
                    }
                }
            }
            current_cluster_id += 1;
        }

        if current_cluster_id == 0 {
            return Err(EnsembleError::DegenerateCluster(format!(
                "DBSCAN labelled all {} points as noise (eps = {}, min_samples = {})",
                self.data.len(),
                self.hp.eps,
                self.hp.min_samples
            )));
        }
        Ok(labels)
    }

    /// Indices of every point within `eps` of each point, itself included, ascending.
    fn calc_neighbourhoods(&self) -> Result<Vec<Vec<usize>>, EnsembleError> {
        let n_samples = self.data.len();
        let eps = T::from(self.hp.eps).unwrap_or_else(T::zero);
        match (self.hp.nn_algo, n_samples) {
            (NnAlgorithm::Auto, usize::MIN..=BRUTE_FORCE_N_SAMPLES_LIMIT) => {
                Ok(BruteForce::calc_neighbourhoods(self.data, eps, self.hp.dist_metric))
            }
            (NnAlgorithm::BruteForce, _) => {
                Ok(BruteForce::calc_neighbourhoods(self.data, eps, self.hp.dist_metric))
            }
            (NnAlgorithm::Auto, _) | (NnAlgorithm::KdTree, _) => {
                KdTree::calc_neighbourhoods(self.data, eps, self.hp.dist_metric)
            }
        }
    }
}

struct BruteForce;

impl BruteForce {
    fn calc_neighbourhoods<T: Float>(
        data: &[Vec<T>],
        eps: T,
        dist_metric: DistanceMetric,
    ) -> Vec<Vec<usize>> {
        let dist_func = get_dist_func(&dist_metric);
        data.iter()
            .map(|point| {
                data.iter()
                    .enumerate()
                    .filter(|(_, other)| dist_func(point, other.as_slice()) <= eps)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect()
    }
}

struct KdTree;

impl KdTree {
    fn calc_neighbourhoods<T: Float>(
        data: &[Vec<T>],
        eps: T,
        dist_metric: DistanceMetric,
    ) -> Result<Vec<Vec<usize>>, EnsembleError> {
        let mut tree: kdtree::KdTree<T, usize, &Vec<T>> = kdtree::KdTree::new(data[0].len());
        for (n, datapoint) in data.iter().enumerate() {
            tree.add(datapoint, n).map_err(|err| {
                EnsembleError::Input(format!("Failed to index point {n} in k-d tree: {err:?}"))
            })?;
        }

        let dist_func = get_dist_func(&dist_metric);
        data.iter()
            .enumerate()
            .map(|(n, datapoint)| {
                let found = tree.within(datapoint, eps, &dist_func).map_err(|err| {
                    EnsembleError::Input(format!("Radius query failed for point {n}: {err:?}"))
                })?;
                let mut neighbours: Vec<usize> = found.into_iter().map(|(_, &idx)| idx).collect();
                neighbours.sort_unstable();
                Ok(neighbours)
            })
            .collect()
    }
}

impl Partitioner for DbscanHyperParams {
    fn method(&self) -> Method {
        Method::Dbscan
    }

    fn emits_noise(&self) -> bool {
        true
    }

    fn partition(&self, matrix: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        let labels = Dbscan::new(matrix.rows(), self.clone()).cluster()?;
        Ok(Partition::new(Method::Dbscan, labels)
            .with_param("eps", self.eps)
            .with_param("min_samples", self.min_samples as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn data() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 1.0],
            vec![1.1, 1.0],
            vec![1.0, 1.1],
            vec![1.1, 1.1],
            vec![4.0, 4.0],
            vec![4.1, 4.0],
            vec![4.0, 4.1],
            vec![4.1, 4.1],
            vec![10.0, 10.0],
        ]
    }

    #[test]
    fn clusters_with_noise() {
        let data = data();
        let hp = DbscanHyperParams::builder().eps(0.5).min_samples(3).build();
        let labels = Dbscan::new(&data, hp).cluster().unwrap();
        assert_eq!(vec![0, 0, 0, 0, 1, 1, 1, 1, -1], labels);
    }

    #[test]
    fn kd_tree_matches_brute_force() {
        let data = data();
        let brute = DbscanHyperParams::builder()
            .eps(0.5)
            .min_samples(3)
            .nn_algorithm(NnAlgorithm::BruteForce)
            .build();
        let kd = DbscanHyperParams::builder()
            .eps(0.5)
            .min_samples(3)
            .nn_algorithm(NnAlgorithm::KdTree)
            .build();
        assert_eq!(
            Dbscan::new(&data, brute).cluster().unwrap(),
            Dbscan::new(&data, kd).cluster().unwrap()
        );
    }

    #[test]
    fn all_noise_is_degenerate() {
        let data = data();
        let hp = DbscanHyperParams::builder().eps(0.01).min_samples(3).build();
        let result = Dbscan::new(&data, hp).cluster();
        assert!(matches!(result, Err(EnsembleError::DegenerateCluster(..))));
    }

    #[test]
    fn non_positive_eps_rejected() {
        let data = data();
        let hp = DbscanHyperParams::builder().eps(0.0).build();
        let result = Dbscan::new(&data, hp).cluster();
        assert!(matches!(result, Err(EnsembleError::Configuration(..))));
    }

    #[test]
    fn manhattan_radius() {
        let data = data();
        let hp = DbscanHyperParams::builder()
            .eps(0.15)
            .min_samples(3)
            .dist_metric(DistanceMetric::Manhattan)
            .build();
        let labels = Dbscan::new(&data, hp).cluster().unwrap();
        let clusters = labels.iter().filter(|&&l| l != NOISE).collect::<HashSet<_>>();
        assert_eq!(2, clusters.len());
    }
}
