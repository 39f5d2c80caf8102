use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Possible distance metrics used when comparing feature rows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    pub(crate) fn calc_dist<T: Float>(&self, a: &[T], b: &[T]) -> T {
        match *self {
            Self::Euclidean => euclidean_distance(a, b),
            Self::Manhattan => manhattan_distance(a, b),
        }
    }
}

pub(crate) fn get_dist_func<T: Float>(metric: &DistanceMetric) -> impl Fn(&[T], &[T]) -> T {
    match metric {
        DistanceMetric::Euclidean => euclidean_distance,
        DistanceMetric::Manhattan => manhattan_distance,
    }
}

pub(crate) fn euclidean_distance<T: Float>(a: &[T], b: &[T]) -> T {
    squared_euclidean_distance(a, b).sqrt()
}

pub(crate) fn squared_euclidean_distance<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x - *y) * (*x - *y))
        .fold(T::zero(), std::ops::Add::add)
}

pub(crate) fn manhattan_distance<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x - *y).abs())
        .fold(T::zero(), std::ops::Add::add)
}

/// Dense pairwise distance matrix between all rows.
pub(crate) fn pairwise_distances<T: Float>(data: &[Vec<T>], metric: DistanceMetric) -> Vec<Vec<T>> {
    let n_samples = data.len();
    let mut distances = vec![vec![T::zero(); n_samples]; n_samples];
    for i in 0..n_samples {
        for j in (i + 1)..n_samples {
            let dist = metric.calc_dist(&data[i], &data[j]);
            distances[i][j] = dist;
            distances[j][i] = dist;
        }
    }
    distances
}

#[cfg(feature = "parallel")]
pub(crate) fn pairwise_distances_par<T: Float + Send + Sync>(
    data: &[Vec<T>],
    metric: DistanceMetric,
) -> Vec<Vec<T>> {
    use rayon::prelude::*;

    data.par_iter()
        .map(|point| data.iter().map(|other| metric.calc_dist(point, other)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_eq!(5.0, euclidean_distance(&a, &b));
        assert_eq!(25.0, squared_euclidean_distance(&a, &b));
        assert_eq!(7.0, manhattan_distance(&a, &b));
        assert_eq!(7.0, get_dist_func(&DistanceMetric::Manhattan)(&a, &b));
    }

    #[test]
    fn pairwise_is_symmetric() {
        let data = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![6.0, 8.0]];
        let distances = pairwise_distances(&data, DistanceMetric::Euclidean);
        assert_eq!(10.0, distances[0][2]);
        assert_eq!(distances[1][2], distances[2][1]);
        assert_eq!(0.0, distances[1][1]);
    }
}
