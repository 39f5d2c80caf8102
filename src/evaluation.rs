//! Internal validity scores of a partition and agreement between partitions.
//!
//! All scores use Euclidean distances over the rows they are given, which in the pipeline are
//! the standardised feature rows.

use crate::centers::{calc_centroids, calc_global_centroid};
use crate::co_association::remap_noise;
use crate::distance::{
    euclidean_distance, pairwise_distances, squared_euclidean_distance, DistanceMetric,
};
use crate::partition::{canonical_labels, NOISE};
use crate::validation::validate_labels_len;
use crate::EnsembleError;
use num_traits::Float;
use serde::Serialize;
use std::collections::HashMap;

/// Internal validity scores of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScores {
    /// Mean silhouette coefficient in [-1, 1]. Higher is better.
    pub silhouette: f64,
    /// Mean worst-case ratio of within-cluster scatter to centroid separation. Lower is better.
    pub davies_bouldin: f64,
    /// Ratio of between to within cluster dispersion. Higher is better.
    pub calinski_harabasz: f64,
}

/// Scores a partition of `data`.
///
/// With `exclude_noise` set, rows labelled `-1` are dropped before scoring. Otherwise all noise
/// rows together are treated as one extra cluster.
///
/// # Returns
/// * An `Input` error if the label count differs from the row count, and an
///   `InsufficientClusters` error if fewer than two clusters remain or every remaining cluster
///   is a single point.
pub fn evaluate<T: Float>(
    data: &[Vec<T>],
    labels: &[i32],
    exclude_noise: bool,
) -> Result<ClusterScores, EnsembleError> {
    validate_labels_len(labels, data.len(), "Cannot evaluate partition")?;
    let noise_label = labels.iter().copied().max().unwrap_or(0).max(0) + 1;
    let (rows, kept): (Vec<Vec<T>>, Vec<i32>) = data
        .iter()
        .zip(labels)
        .filter(|&(_, &label)| !(exclude_noise && label == NOISE))
        .map(|(row, &label)| (row.clone(), if label == NOISE { noise_label } else { label }))
        .unzip();
    let labels = canonical_labels(&kept);
    let n_clusters = labels.iter().max().map_or(0, |&max| max as usize + 1);
    if n_clusters < 2 {
        return Err(EnsembleError::InsufficientClusters(format!(
            "At least 2 clusters are needed for scoring, found {n_clusters}"
        )));
    }
    if n_clusters == rows.len() {
        return Err(EnsembleError::InsufficientClusters(String::from(
            "Every scored point is its own cluster",
        )));
    }

    Ok(ClusterScores {
        silhouette: silhouette(&rows, &labels, n_clusters),
        davies_bouldin: davies_bouldin(&rows, &labels, n_clusters),
        calinski_harabasz: calinski_harabasz(&rows, &labels, n_clusters),
    })
}

/// Mean silhouette over all points, with singleton clusters contributing 0.
fn silhouette<T: Float>(data: &[Vec<T>], labels: &[i32], n_clusters: usize) -> f64 {
    let distances = pairwise_distances(data, DistanceMetric::Euclidean);
    let (_, counts) = calc_centroids(data, labels, n_clusters);

    let total: f64 = distances
        .iter()
        .zip(labels)
        .map(|(row, &own)| {
            let own = own as usize;
            if counts[own] < 2 {
                return 0.0;
            }
            let mut sums = vec![0.0; n_clusters];
            for (dist, &label) in row.iter().zip(labels) {
                sums[label as usize] += to_f64(*dist);
            }
            // The self distance is zero, so only the divisor needs correcting.
            let a = sums[own] / (counts[own] - 1) as f64;
            let b = (0..n_clusters)
                .filter(|&cluster| cluster != own && counts[cluster] > 0)
                .map(|cluster| sums[cluster] / counts[cluster] as f64)
                .fold(f64::INFINITY, f64::min);
            let denominator = a.max(b);
            if denominator > 0.0 {
                (b - a) / denominator
            } else {
                0.0
            }
        })
        .sum();
    total / data.len() as f64
}

fn davies_bouldin<T: Float>(data: &[Vec<T>], labels: &[i32], n_clusters: usize) -> f64 {
    let (centroids, counts) = calc_centroids(data, labels, n_clusters);
    let mut scatter = vec![0.0; n_clusters];
    for (row, &label) in data.iter().zip(labels) {
        scatter[label as usize] += to_f64(euclidean_distance(row, &centroids[label as usize]));
    }
    for (spread, &count) in scatter.iter_mut().zip(&counts) {
        *spread /= count as f64;
    }

    let total: f64 = (0..n_clusters)
        .map(|i| {
            (0..n_clusters)
                .filter(|&j| j != i)
                .map(|j| {
                    let separation = to_f64(euclidean_distance(&centroids[i], &centroids[j]));
                    // Coincident centroids add nothing rather than dividing by zero.
                    if separation == 0.0 {
                        0.0
                    } else {
                        (scatter[i] + scatter[j]) / separation
                    }
                })
                .fold(0.0, f64::max)
        })
        .sum();
    total / n_clusters as f64
}

fn calinski_harabasz<T: Float>(data: &[Vec<T>], labels: &[i32], n_clusters: usize) -> f64 {
    let (centroids, counts) = calc_centroids(data, labels, n_clusters);
    let global = calc_global_centroid(data);
    let between: f64 = centroids
        .iter()
        .zip(&counts)
        .map(|(centroid, &count)| {
            count as f64 * to_f64(squared_euclidean_distance(centroid, &global))
        })
        .sum();
    let within: f64 = data
        .iter()
        .zip(labels)
        .map(|(row, &label)| to_f64(squared_euclidean_distance(row, &centroids[label as usize])))
        .sum();
    if within == 0.0 {
        return 1.0;
    }
    let n_samples = data.len() as f64;
    let n_clusters = n_clusters as f64;
    (between / (n_clusters - 1.0)) / (within / (n_samples - n_clusters))
}

/// Adjusted Rand index between two labelings of the same rows: 1 for identical groupings,
/// around 0 for chance agreement. Noise points count as singletons.
///
/// # Returns
/// * An `Input` error if the labelings differ in length.
pub fn adjusted_rand_index(a: &[i32], b: &[i32]) -> Result<f64, EnsembleError> {
    validate_labels_len(b, a.len(), "Cannot compare partitions")?;
    let (a, b) = (remap_noise(a), remap_noise(b));

    let mut contingency: HashMap<(i64, i64), u64> = HashMap::new();
    let mut a_sizes: HashMap<i64, u64> = HashMap::new();
    let mut b_sizes: HashMap<i64, u64> = HashMap::new();
    for (&label_a, &label_b) in a.iter().zip(&b) {
        *contingency.entry((label_a, label_b)).or_default() += 1;
        *a_sizes.entry(label_a).or_default() += 1;
        *b_sizes.entry(label_b).or_default() += 1;
    }

    let pairs = |n: &u64| (n * n.saturating_sub(1) / 2) as f64;
    let index: f64 = contingency.values().map(pairs).sum();
    let a_pairs: f64 = a_sizes.values().map(pairs).sum();
    let b_pairs: f64 = b_sizes.values().map(pairs).sum();
    let total_pairs = pairs(&(a.len() as u64));
    if total_pairs == 0.0 {
        return Ok(1.0);
    }

    let expected = a_pairs * b_pairs / total_pairs;
    let max_index = (a_pairs + b_pairs) / 2.0;
    if max_index == expected {
        // Both labelings are trivial (all together or all apart).
        return Ok(1.0);
    }
    Ok((index - expected) / (max_index - expected))
}

fn to_f64<T: Float>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![10.0, 0.0], vec![10.0, 1.0]]
    }

    #[test]
    fn well_separated_scores() {
        let scores = evaluate(&blobs(), &[0, 0, 1, 1], true).unwrap();
        // a = 1, b = mean(10, sqrt(101)) for every point.
        let b = (10.0 + 101.0_f64.sqrt()) / 2.0;
        assert!((scores.silhouette - (b - 1.0) / b).abs() < 1e-12);
        // Scatter 0.5 per cluster, centroids 10 apart.
        assert!((scores.davies_bouldin - 0.1).abs() < 1e-12);
        // Between = 4 * 25 = 100 over 1, within = 4 * 0.25 = 1 over 2.
        assert!((scores.calinski_harabasz - 200.0).abs() < 1e-9);
    }

    #[test]
    fn noise_handling() {
        let data = vec![vec![0.0], vec![0.1], vec![5.0], vec![5.1], vec![50.0]];
        let labels = [0, 0, 1, 1, -1];
        let excluded = evaluate(&data, &labels, true).unwrap();
        let included = evaluate(&data, &labels, false).unwrap();
        assert!(excluded.silhouette > included.silhouette);
        assert_eq!(evaluate(&data[..4], &labels[..4], true).unwrap(), excluded);
    }

    #[test]
    fn only_noise_left() {
        let result = evaluate(&blobs(), &[-1, -1, 0, 0], true);
        assert!(matches!(result, Err(EnsembleError::InsufficientClusters(..))));
        let result = evaluate(&blobs(), &[0, 0, 0, 0], true);
        assert!(matches!(result, Err(EnsembleError::InsufficientClusters(..))));
        let result = evaluate(&blobs(), &[0, 0, 1], true);
        assert!(matches!(result, Err(EnsembleError::Input(..))));
    }

    #[test]
    fn singleton_clusters_score_zero_silhouette() {
        let data = vec![vec![0.0], vec![1.0], vec![10.0]];
        let scores = evaluate(&data, &[0, 0, 1], true).unwrap();
        // Point 2 contributes 0, points 0 and 1 have a = 1 and b = 10 and 9.
        let expected = ((10.0 - 1.0) / 10.0 + (9.0 - 1.0) / 9.0) / 3.0;
        assert!((scores.silhouette - expected).abs() < 1e-12);
    }

    #[test]
    fn rand_index() {
        assert_eq!(1.0, adjusted_rand_index(&[0, 0, 1, 1], &[5, 5, 2, 2]).unwrap());
        let ari = adjusted_rand_index(&[0, 0, 1, 1], &[0, 1, 0, 1]).unwrap();
        assert!(ari < 0.0);
        assert!(adjusted_rand_index(&[0, 1], &[0]).is_err());
    }

    #[test]
    fn scores_serialise_camel_case() {
        let scores = ClusterScores { silhouette: 0.5, davies_bouldin: 0.4, calinski_harabasz: 9.0 };
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(r#"{"silhouette":0.5,"daviesBouldin":0.4,"calinskiHarabasz":9.0}"#, json);
    }
}
