use crate::centers::calc_centroids;
use crate::distance::squared_euclidean_distance;
use crate::hyper_parameters::validate_input_left_bound;
use crate::validation::DataValidator;
use crate::{EnsembleError, FeatureMatrix, Method, Partition, Partitioner};
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Defaults for parameters
const N_CLUSTERS_DEFAULT: usize = 3;
const MAX_ITER_DEFAULT: usize = 300;
const TOL_DEFAULT: f64 = 1e-4;
const N_INIT_DEFAULT: usize = 10;
const SEED_DEFAULT: u64 = 42;

// Valid minimums/left bounds of parameters
const N_CLUSTERS_MINIMUM: usize = 1;
const MAX_ITER_MINIMUM: usize = 1;
const N_INIT_MINIMUM: usize = 1;

/// Hyper parameters of the centroid-based (k-means) partitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansHyperParams {
    pub(crate) n_clusters: usize,
    pub(crate) max_iter: usize,
    pub(crate) tol: f64,
    pub(crate) n_init: usize,
    pub(crate) seed: u64,
}

/// Builder object to set custom k-means hyper parameters.
#[derive(Debug, Clone, Default)]
pub struct KMeansHyperParamBuilder {
    n_clusters: Option<usize>,
    max_iter: Option<usize>,
    tol: Option<f64>,
    n_init: Option<usize>,
    seed: Option<u64>,
}

impl Default for KMeansHyperParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl KMeansHyperParams {
    pub fn builder() -> KMeansHyperParamBuilder {
        KMeansHyperParamBuilder::default()
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl KMeansHyperParamBuilder {
    /// Sets k, the number of clusters to find. Defaults to 3.
    pub fn n_clusters(mut self, n_clusters: usize) -> KMeansHyperParamBuilder {
        self.n_clusters =
            Some(validate_input_left_bound(n_clusters, N_CLUSTERS_MINIMUM, "n_clusters"));
        self
    }

    /// Sets the maximum number of Lloyd iterations per restart. Defaults to 300.
    pub fn max_iter(mut self, max_iter: usize) -> KMeansHyperParamBuilder {
        self.max_iter = Some(validate_input_left_bound(max_iter, MAX_ITER_MINIMUM, "max_iter"));
        self
    }

    /// Sets the convergence tolerance, relative to the mean feature variance. Defaults to 1e-4.
    pub fn tol(mut self, tol: f64) -> KMeansHyperParamBuilder {
        self.tol = Some(validate_input_left_bound(tol, 0.0, "tol"));
        self
    }

    /// Sets the number of k-means++ restarts; the restart with the lowest inertia wins.
    /// Defaults to 10.
    pub fn n_init(mut self, n_init: usize) -> KMeansHyperParamBuilder {
        self.n_init = Some(validate_input_left_bound(n_init, N_INIT_MINIMUM, "n_init"));
        self
    }

    /// Sets the seed of the random number generator used for seeding centroids. Runs with the
    /// same seed on the same data produce the same labels. Defaults to 42.
    pub fn seed(mut self, seed: u64) -> KMeansHyperParamBuilder {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> KMeansHyperParams {
        KMeansHyperParams {
            n_clusters: self.n_clusters.unwrap_or(N_CLUSTERS_DEFAULT),
            max_iter: self.max_iter.unwrap_or(MAX_ITER_DEFAULT),
            tol: self.tol.unwrap_or(TOL_DEFAULT),
            n_init: self.n_init.unwrap_or(N_INIT_DEFAULT),
            seed: self.seed.unwrap_or(SEED_DEFAULT),
        }
    }
}

/// The result of a k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit<T> {
    pub labels: Vec<i32>,
    pub centroids: Vec<Vec<T>>,
    /// Sum of squared distances of points to their assigned centroid.
    pub inertia: T,
    pub n_iter: usize,
}

/// Lloyd's k-means with k-means++ seeding. Generic over floating point numeric types.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans<'a, T> {
    data: &'a [Vec<T>],
    hp: KMeansHyperParams,
}

impl<'a, T: Float> KMeans<'a, T> {
    pub fn new(data: &'a [Vec<T>], hyper_params: KMeansHyperParams) -> Self {
        KMeans { data, hp: hyper_params }
    }

    /// Performs clustering, returning one label in `0..k` per data point.
    pub fn cluster(&self) -> Result<Vec<i32>, EnsembleError> {
        self.fit().map(|fit| fit.labels)
    }

    /// Performs clustering, returning labels, centroids and inertia of the best restart.
    ///
    /// # Returns
    /// * An `Input` error for empty, ragged or non-finite data, a `Configuration` error if k is
    ///   larger than the number of points and a `DegenerateCluster` error if there are fewer
    ///   than k distinct points.
    pub fn fit(&self) -> Result<KMeansFit<T>, EnsembleError> {
        let validator = DataValidator::new(self.data);
        validator.validate_input_data()?;
        validator.validate_n_clusters(self.hp.n_clusters)?;
        let n_distinct = validator.count_distinct_points(self.hp.n_clusters);
        if n_distinct < self.hp.n_clusters {
            return Err(EnsembleError::DegenerateCluster(format!(
                "k-means needs {} distinct points but only {n_distinct} exist",
                self.hp.n_clusters
            )));
        }

        let tol = self.absolute_tolerance();
        let mut rng = StdRng::seed_from_u64(self.hp.seed);
        let mut best: Option<KMeansFit<T>> = None;
        for _ in 0..self.hp.n_init {
            let centroids = self.init_centroids_plusplus(&mut rng);
            let fit = self.lloyd(centroids, tol);
            let is_better = best.as_ref().map_or(true, |current| fit.inertia < current.inertia);
            if is_better {
                best = Some(fit);
            }
        }
        best.ok_or_else(|| {
            EnsembleError::Configuration(String::from("k-means requires at least one restart"))
        })
    }

    fn absolute_tolerance(&self) -> T {
        let n_samples = T::from(self.data.len()).unwrap_or_else(T::one);
        let n_dims = self.data[0].len();
        let mean = crate::centers::calc_global_centroid(self.data);
        let total_variance = (0..n_dims)
            .map(|dim| {
                self.data
                    .iter()
                    .map(|row| (row[dim] - mean[dim]) * (row[dim] - mean[dim]))
                    .fold(T::zero(), std::ops::Add::add)
                    / n_samples
            })
            .fold(T::zero(), std::ops::Add::add);
        let mean_variance = total_variance / T::from(n_dims).unwrap_or_else(T::one);
        mean_variance * T::from(self.hp.tol).unwrap_or_else(T::zero)
    }

    fn init_centroids_plusplus(&self, rng: &mut StdRng) -> Vec<Vec<T>> {
        let n_samples = self.data.len();
        let mut centroids = Vec::with_capacity(self.hp.n_clusters);
        centroids.push(self.data[rng.gen_range(0..n_samples)].clone());

        let mut min_dists: Vec<T> = self
            .data
            .iter()
            .map(|point| squared_euclidean_distance(point, &centroids[0]))
            .collect();

        while centroids.len() < self.hp.n_clusters {
            let total = min_dists.iter().fold(T::zero(), |acc, &d| acc + d);
            let chosen = if total <= T::zero() {
                rng.gen_range(0..n_samples)
            } else {
                let mut threshold = T::from(rng.gen::<f64>()).unwrap_or_else(T::zero) * total;
                let mut chosen = min_dists
                    .iter()
                    .rposition(|&dist| dist > T::zero())
                    .unwrap_or(n_samples - 1);
                for (i, &dist) in min_dists.iter().enumerate() {
                    if dist <= T::zero() {
                        continue;
                    }
                    threshold = threshold - dist;
                    if threshold <= T::zero() {
                        chosen = i;
                        break;
                    }
                }
                chosen
            };
            let centroid = self.data[chosen].clone();
            for (min_dist, point) in min_dists.iter_mut().zip(self.data) {
                let dist = squared_euclidean_distance(point, &centroid);
                if dist < *min_dist {
                    *min_dist = dist;
                }
            }
            centroids.push(centroid);
        }
        centroids
    }

    fn lloyd(&self, mut centroids: Vec<Vec<T>>, tol: T) -> KMeansFit<T> {
        let mut labels = vec![0_i32; self.data.len()];
        let mut n_iter = 0;
        for _ in 0..self.hp.max_iter {
            n_iter += 1;
            self.assign_clusters(&centroids, &mut labels);
            let new_centroids = self.update_centroids(&centroids, &labels);
            let shift = centroids
                .iter()
                .zip(&new_centroids)
                .map(|(old, new)| squared_euclidean_distance(old, new))
                .fold(T::zero(), std::ops::Add::add);
            centroids = new_centroids;
            if shift <= tol {
                break;
            }
        }
        let inertia = self.assign_clusters(&centroids, &mut labels);
        KMeansFit { labels, centroids, inertia, n_iter }
    }

    /// Assigns every point to its nearest centroid (lowest index on ties), returning inertia.
    fn assign_clusters(&self, centroids: &[Vec<T>], labels: &mut [i32]) -> T {
        let mut inertia = T::zero();
        for (label, point) in labels.iter_mut().zip(self.data) {
            let (nearest, dist) = nearest_centroid(point, centroids);
            *label = nearest as i32;
            inertia = inertia + dist;
        }
        inertia
    }

    fn update_centroids(&self, centroids: &[Vec<T>], labels: &[i32]) -> Vec<Vec<T>> {
        let (mut new_centroids, counts) = calc_centroids(self.data, labels, centroids.len());
        let mut taken: Vec<usize> = Vec::new();
        for (cluster, &count) in counts.iter().enumerate() {
            if count > 0 {
                continue;
            }
            // Relocate an empty cluster onto the point furthest from its current centroid.
            let mut furthest = None;
            let mut furthest_dist = T::neg_infinity();
            for (i, (point, &label)) in self.data.iter().zip(labels).enumerate() {
                if taken.contains(&i) {
                    continue;
                }
                let dist = squared_euclidean_distance(point, &centroids[label as usize]);
                if dist > furthest_dist {
                    furthest_dist = dist;
                    furthest = Some(i);
                }
            }
            if let Some(i) = furthest {
                taken.push(i);
                new_centroids[cluster] = self.data[i].clone();
            }
        }
        new_centroids
    }
}

pub(crate) fn nearest_centroid<T: Float>(point: &[T], centroids: &[Vec<T>]) -> (usize, T) {
    let mut nearest = 0;
    let mut nearest_dist = T::infinity();
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean_distance(point, centroid);
        if dist < nearest_dist {
            nearest_dist = dist;
            nearest = i;
        }
    }
    (nearest, nearest_dist)
}

impl Partitioner for KMeansHyperParams {
    fn method(&self) -> Method {
        Method::KMeans
    }

    fn partition(&self, matrix: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        let fit = KMeans::new(matrix.rows(), self.clone()).fit()?;
        Ok(Partition::new(Method::KMeans, fit.labels)
            .with_param("n_clusters", self.n_clusters as f64)
            .with_param("n_init", self.n_init as f64)
            .with_param("seed", self.seed as f64))
    }
}
