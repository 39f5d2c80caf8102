//! Data-driven choice of base partitioner parameters.
//!
//! Instead of reading an elbow or dendrogram plot, each candidate parameter is run and scored;
//! the highest mean silhouette wins, with ties going to the earlier candidate.

use crate::agglomerative::{Agglomerative, AgglomerativeHyperParams};
use crate::dbscan::{Dbscan, DbscanHyperParams};
use crate::distance::{pairwise_distances, DistanceMetric};
use crate::evaluation::{evaluate, ClusterScores};
use crate::kmeans::{KMeans, KMeansHyperParams};
use crate::partition::NOISE;
use crate::validation::DataValidator;
use crate::EnsembleError;
use log::debug;
use num_traits::Float;
use serde::Serialize;

/// Which partitioner a cluster count search runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMethod {
    KMeans(KMeansHyperParams),
    Hierarchical(AgglomerativeHyperParams),
}

/// One evaluated parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchCandidate<P> {
    pub value: P,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ClusterScores>,
    /// Within-cluster sum of squares, for k-means candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inertia: Option<f64>,
    /// Fraction of rows left as noise, for density candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_ratio: Option<f64>,
    /// Why the candidate could not be scored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<P> SearchCandidate<P> {
    fn new(value: P) -> Self {
        SearchCandidate { value, scores: None, inertia: None, noise_ratio: None, error: None }
    }

    fn failed(value: P, err: EnsembleError) -> Self {
        SearchCandidate { error: Some(err.to_string()), ..SearchCandidate::new(value) }
    }
}

/// All evaluated candidates and the best one, if any could be scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport<P> {
    pub best: Option<P>,
    pub candidates: Vec<SearchCandidate<P>>,
}

impl<P: Copy> SearchReport<P> {
    fn from_candidates(candidates: Vec<SearchCandidate<P>>) -> Self {
        let mut best: Option<(P, f64)> = None;
        for candidate in &candidates {
            if let Some(scores) = candidate.scores {
                if best.map_or(true, |(_, silhouette)| scores.silhouette > silhouette) {
                    best = Some((candidate.value, scores.silhouette));
                }
            }
        }
        SearchReport { best: best.map(|(value, _)| value), candidates }
    }
}

/// Scores each candidate cluster count with the given partitioner. The hierarchical tree is
/// built once and cut at every candidate.
///
/// # Returns
/// * The report, or an `Input` error if the data is invalid. Candidates that cannot be run
///   are kept in the report with their error.
pub fn search_n_clusters<T: Float>(
    data: &[Vec<T>],
    candidates: &[usize],
    method: &SearchMethod,
) -> Result<SearchReport<usize>, EnsembleError> {
    DataValidator::new(data).validate_input_data()?;
    let evaluated: Vec<SearchCandidate<usize>> = match method {
        SearchMethod::KMeans(hp) => candidates
            .iter()
            .map(|&n_clusters| {
                let hp = KMeansHyperParams { n_clusters, ..hp.clone() };
                let scored = KMeans::new(data, hp).fit().and_then(|fit| {
                    let scores = evaluate(data, &fit.labels, true)?;
                    Ok((scores, fit.inertia.to_f64()))
                });
                match scored {
                    Ok((scores, inertia)) => SearchCandidate {
                        scores: Some(scores),
                        inertia,
                        ..SearchCandidate::new(n_clusters)
                    },
                    Err(err) => SearchCandidate::failed(n_clusters, err),
                }
            })
            .collect(),
        SearchMethod::Hierarchical(hp) => {
            let dendrogram = Agglomerative::new(data, hp.clone()).dendrogram()?;
            candidates
                .iter()
                .map(|&n_clusters| {
                    let scored = dendrogram
                        .cut_clusters(n_clusters)
                        .and_then(|labels| evaluate(data, &labels, true));
                    match scored {
                        Ok(scores) => SearchCandidate {
                            scores: Some(scores),
                            ..SearchCandidate::new(n_clusters)
                        },
                        Err(err) => SearchCandidate::failed(n_clusters, err),
                    }
                })
                .collect()
        }
    };
    let report = SearchReport::from_candidates(evaluated);
    debug!("Cluster count search picked {:?}", report.best);
    Ok(report)
}

/// Scores DBSCAN radii taken from quantiles of the k-distance distribution, where k is
/// `min_samples`. Silhouettes are computed over non-noise rows only.
///
/// # Returns
/// * The report, or a `Configuration` error if a quantile lies outside (0, 1] or
///   `min_samples` is zero or exceeds the number of rows.
pub fn search_eps<T: Float>(
    data: &[Vec<T>],
    min_samples: usize,
    quantiles: &[f64],
) -> Result<SearchReport<f64>, EnsembleError> {
    DataValidator::new(data).validate_input_data()?;
    if min_samples == 0 || min_samples > data.len() {
        return Err(EnsembleError::Configuration(format!(
            "min_samples must be between 1 and {}, got {min_samples}",
            data.len()
        )));
    }
    if let Some(quantile) = quantiles.iter().find(|q| !(**q > 0.0 && **q <= 1.0)) {
        return Err(EnsembleError::Configuration(format!(
            "Quantiles must lie in (0, 1], got {quantile}"
        )));
    }

    let k_distances = k_distances(data, min_samples);
    let evaluated: Vec<SearchCandidate<f64>> = quantiles
        .iter()
        .map(|&quantile| {
            let eps = quantile_of_sorted(&k_distances, quantile);
            let hp = DbscanHyperParams::builder().eps(eps).min_samples(min_samples).build();
            let scored = Dbscan::new(data, hp).cluster().and_then(|labels| {
                let n_noise = labels.iter().filter(|&&label| label == NOISE).count();
                let scores = evaluate(data, &labels, true)?;
                Ok((scores, n_noise as f64 / data.len() as f64))
            });
            match scored {
                Ok((scores, noise_ratio)) => SearchCandidate {
                    scores: Some(scores),
                    noise_ratio: Some(noise_ratio),
                    ..SearchCandidate::new(eps)
                },
                Err(err) => SearchCandidate::failed(eps, err),
            }
        })
        .collect();
    let report = SearchReport::from_candidates(evaluated);
    debug!("Radius search picked {:?}", report.best);
    Ok(report)
}

/// Distance from each point to its `k`-th nearest point, counting the point itself, sorted
/// ascending.
fn k_distances<T: Float>(data: &[Vec<T>], k: usize) -> Vec<f64> {
    let mut k_distances: Vec<f64> = pairwise_distances(data, DistanceMetric::Euclidean)
        .into_iter()
        .map(|mut row| {
            row.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            row[k - 1].to_f64().unwrap_or(f64::NAN)
        })
        .collect();
    k_distances.sort_by(|a, b| a.total_cmp(b));
    k_distances
}

/// Linearly interpolated quantile of ascending values.
fn quantile_of_sorted(values: &[f64], quantile: f64) -> f64 {
    let position = quantile * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_blobs() -> Vec<Vec<f64>> {
        let mut data = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] {
            for (dx, dy) in [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5), (0.5, 0.5)] {
                data.push(vec![cx + dx, cy + dy]);
            }
        }
        data
    }

    #[test]
    fn kmeans_finds_three() {
        let method = SearchMethod::KMeans(Default::default());
        let report = search_n_clusters(&three_blobs(), &[2, 3, 4], &method).unwrap();
        assert_eq!(Some(3), report.best);
        assert!(report.candidates.iter().all(|c| c.inertia.is_some()));
        assert!(report.candidates[0].inertia > report.candidates[1].inertia);
    }

    #[test]
    fn hierarchical_finds_three() {
        let method = SearchMethod::Hierarchical(Default::default());
        let report = search_n_clusters(&three_blobs(), &[2, 3, 4, 20], &method).unwrap();
        assert_eq!(Some(3), report.best);
        assert!(report.candidates[3].error.is_some());
    }

    #[test]
    fn eps_from_k_distances() {
        let report = search_eps(&three_blobs(), 3, &[0.5, 1.0]).unwrap();
        // Every point's 3rd nearest (itself included) is 0.5 away.
        assert_eq!(0.5, report.candidates[0].value);
        assert_eq!(Some(0.0), report.candidates[0].noise_ratio);
        assert_eq!(Some(0.5), report.best);
    }

    #[test]
    fn invalid_search_parameters() {
        assert!(search_eps(&three_blobs(), 0, &[0.5]).is_err());
        assert!(search_eps(&three_blobs(), 3, &[0.0]).is_err());
        assert!(search_eps(&three_blobs(), 3, &[1.5]).is_err());
    }

    #[test]
    fn quantiles_interpolate() {
        assert_eq!(2.5, quantile_of_sorted(&[1.0, 2.0, 3.0, 4.0], 0.5));
        assert_eq!(4.0, quantile_of_sorted(&[1.0, 2.0, 3.0, 4.0], 1.0));
    }
}
