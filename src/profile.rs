use crate::partition::NOISE;
use crate::validation::validate_labels_len;
use crate::{EnsembleError, FeatureMatrix, Metric};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

const N_TAGS_DEFAULT: usize = 2;
const N_TAGS_MINIMUM: usize = 2;
const N_TAGS_MAXIMUM: usize = 3;

/// Relative performance tier of a cluster, assigned by rank of its overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Mid,
    Low,
    /// A noise point left outside every cluster. Not ranked against the clusters.
    Unranked,
}

impl Tier {
    fn recommendation(&self, strengths: &str, improvements: &str) -> String {
        match self {
            Tier::High => format!(
                "Top performing group. Preserve the relationship, building on {strengths}, \
                and keep an eye on {improvements}."
            ),
            Tier::Mid => format!(
                "Solid group with room to grow. Leverage {strengths} and set improvement \
                targets for {improvements}."
            ),
            Tier::Low => format!(
                "Underperforming group. Start corrective action plans on {improvements}; \
                {strengths} are relative strengths to negotiate from."
            ),
            Tier::Unranked => format!(
                "Atypical unit that fits no group. Review it individually, starting with \
                {improvements}."
            ),
        }
    }
}

/// Human-readable description of one cluster of a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    /// The partition label, or -1 for a noise point profiled on its own.
    pub cluster_id: i32,
    pub size: usize,
    /// Share of all rows, in percent.
    pub percentage: f64,
    /// Mean of each metric over the members, in original units.
    pub mean_metrics: BTreeMap<Metric, f64>,
    pub strengths: Vec<Metric>,
    pub improvements: Vec<Metric>,
    pub overall_score: f64,
    pub tier: Tier,
    pub recommendation: String,
    /// Row index of the noise point this profile describes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise_row: Option<usize>,
}

/// Builds [`ClusterProfile`]s for a labelled feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterProfiler {
    n_tags: usize,
}

impl Default for ClusterProfiler {
    fn default() -> Self {
        ClusterProfiler { n_tags: N_TAGS_DEFAULT }
    }
}

impl ClusterProfiler {
    /// A profiler listing `n_tags` strengths and improvement areas per cluster.
    ///
    /// # Returns
    /// * A `Configuration` error unless `n_tags` is 2 or 3.
    pub fn new(n_tags: usize) -> Result<Self, EnsembleError> {
        if !(N_TAGS_MINIMUM..=N_TAGS_MAXIMUM).contains(&n_tags) {
            return Err(EnsembleError::Configuration(format!(
                "n_tags must be between {N_TAGS_MINIMUM} and {N_TAGS_MAXIMUM}, got {n_tags}"
            )));
        }
        Ok(ClusterProfiler { n_tags })
    }

    /// Profiles every cluster in `labels`, ordered by cluster id, followed by one singleton
    /// profile per noise row in row order.
    ///
    /// Tiers depend only on which rows are grouped together, never on label values: clusters
    /// are ranked by overall score, with ties going to the cluster holding the lowest row.
    pub fn profile(
        &self,
        matrix: &FeatureMatrix,
        labels: &[i32],
    ) -> Result<Vec<ClusterProfile>, EnsembleError> {
        validate_labels_len(labels, matrix.n_samples(), "Cannot profile partition")?;
        if labels.iter().any(|&label| label < NOISE) {
            return Err(EnsembleError::Input(String::from(
                "Labels must be cluster ids or -1 for noise",
            )));
        }

        let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (row, &label) in labels.iter().enumerate().filter(|&(_, &label)| label != NOISE) {
            clusters.entry(label).or_default().push(row);
        }

        let mut profiles: Vec<ClusterProfile> = clusters
            .iter()
            .map(|(&cluster_id, members)| self.describe(matrix, cluster_id, members))
            .collect();
        assign_tiers(&mut profiles, clusters.values().map(|members| members[0]));
        for profile in profiles.iter_mut() {
            profile.recommendation = self.recommend(profile);
        }

        for (row, _) in labels.iter().enumerate().filter(|&(_, &label)| label == NOISE) {
            let mut profile = self.describe(matrix, NOISE, &[row]);
            profile.tier = Tier::Unranked;
            profile.noise_row = Some(row);
            profile.recommendation = self.recommend(&profile);
            profiles.push(profile);
        }
        Ok(profiles)
    }

    fn describe(
        &self,
        matrix: &FeatureMatrix,
        cluster_id: i32,
        members: &[usize],
    ) -> ClusterProfile {
        let size = members.len() as f64;
        let column_mean = |rows: &[Vec<f64>], col: usize| {
            members.iter().map(|&row| rows[row][col]).sum::<f64>() / size
        };

        let columns = matrix.columns();
        let mean_metrics = columns
            .iter()
            .enumerate()
            .map(|(col, &metric)| (metric, column_mean(matrix.raw_rows(), col)))
            .collect();
        let oriented: Vec<(Metric, f64)> = columns
            .iter()
            .enumerate()
            .map(|(col, &metric)| (metric, metric.orient(column_mean(matrix.rows(), col))))
            .collect();

        let mut ranked = oriented.clone();
        // Stable sorts keep column order among equal scores.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let mut remaining = ranked.split_off(self.n_tags.min(ranked.len()));
        let strengths = ranked.iter().map(|(metric, _)| *metric).collect();
        // Improvements come only from metrics not already listed as strengths.
        remaining.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        let improvements =
            remaining.iter().take(self.n_tags).map(|(metric, _)| *metric).collect();

        let overall_score = match matrix.overall_scores() {
            Some(scores) => members.iter().map(|&row| scores[row]).sum::<f64>() / size,
            None => oriented.iter().map(|(_, value)| value).sum::<f64>() / oriented.len() as f64,
        };

        ClusterProfile {
            cluster_id,
            size: members.len(),
            percentage: size / matrix.n_samples() as f64 * 100.0,
            mean_metrics,
            strengths,
            improvements,
            overall_score,
            tier: Tier::Mid,
            recommendation: String::new(),
            noise_row: None,
        }
    }

    fn recommend(&self, profile: &ClusterProfile) -> String {
        profile
            .tier
            .recommendation(&join_labels(&profile.strengths), &join_labels(&profile.improvements))
    }
}

/// Top score is `High`, bottom is `Low`, everything between is `Mid`.
fn assign_tiers(profiles: &mut [ClusterProfile], first_rows: impl Iterator<Item = usize>) {
    let mut order: Vec<(usize, usize)> = first_rows.enumerate().collect();
    order.sort_by(|&(a, row_a), &(b, row_b)| {
        profiles[b]
            .overall_score
            .partial_cmp(&profiles[a].overall_score)
            .unwrap_or(Ordering::Equal)
            .then(row_a.cmp(&row_b))
    });
    let last = order.len().saturating_sub(1);
    for (rank, (idx, _)) in order.into_iter().enumerate() {
        profiles[idx].tier = match rank {
            0 => Tier::High,
            rank if rank == last => Tier::Low,
            _ => Tier::Mid,
        };
    }
}

fn join_labels(metrics: &[Metric]) -> String {
    match metrics {
        [] => String::from("overall performance"),
        [only] => only.label().to_string(),
        [init @ .., last] => {
            let init: Vec<&str> = init.iter().map(Metric::label).collect();
            format!("{} and {}", init.join(", "), last.label())
        }
    }
}
