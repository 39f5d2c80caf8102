use crate::partition::NOISE;
use crate::{EnsembleError, Partition};
use log::debug;
use std::collections::HashMap;

/// Pairwise agreement between rows: the fraction of partitions in which two rows share a
/// cluster. Symmetric, with a diagonal of exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct CoAssociationMatrix {
    n_samples: usize,
    n_partitions: usize,
    values: Vec<f64>,
}

impl CoAssociationMatrix {
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of partitions the agreement fractions were computed over.
    pub fn n_partitions(&self) -> usize {
        self.n_partitions
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n_samples + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_samples..(i + 1) * self.n_samples]
    }

    /// The dissimilarity matrix `1 - agreement`, row-major.
    pub fn to_distances(&self) -> Vec<f64> {
        self.values.iter().map(|agreement| 1.0 - agreement).collect()
    }

    /// Like `to_distances`, reusing this matrix's storage.
    pub fn into_distances(self) -> Vec<f64> {
        let mut values = self.values;
        for value in values.iter_mut() {
            *value = 1.0 - *value;
        }
        values
    }
}

/// Aggregates independent partitions of the same rows into a [`CoAssociationMatrix`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CoAssociationBuilder;

impl CoAssociationBuilder {
    /// Builds the co-association matrix.
    ///
    /// Noise points are moved into fresh singleton clusters first, so a noise point never
    /// agrees with anything in the partition that left it unassigned. Pairs are only counted
    /// inside clusters, so each partition costs O(n) plus the squared size of each cluster.
    ///
    /// # Returns
    /// * An `Input` error if no partitions are supplied or their lengths differ.
    pub fn build(&self, partitions: &[Partition]) -> Result<CoAssociationMatrix, EnsembleError> {
        let first = partitions.first().ok_or_else(|| {
            EnsembleError::Input(String::from("At least one partition is required"))
        })?;
        let n_samples = first.n_samples();
        if n_samples == 0 {
            return Err(EnsembleError::Input(String::from("Partitions cover zero rows")));
        }
        if let Some(mismatch) = partitions.iter().find(|p| p.n_samples() != n_samples) {
            return Err(EnsembleError::Input(format!(
                "Partition from '{}' has {} rows, but '{}' has {n_samples}",
                mismatch.method,
                mismatch.n_samples(),
                first.method
            )));
        }

        // Counts are accumulated in the output buffer and normalised in place.
        let mut values = vec![0.0_f64; n_samples * n_samples];
        for partition in partitions {
            for members in group_by_label(&remap_noise(&partition.labels)) {
                for (pos, &i) in members.iter().enumerate() {
                    for &j in &members[pos + 1..] {
                        values[i * n_samples + j] += 1.0;
                        values[j * n_samples + i] += 1.0;
                    }
                }
            }
        }

        let n_partitions = partitions.len();
        for value in values.iter_mut() {
            *value /= n_partitions as f64;
        }
        for i in 0..n_samples {
            values[i * n_samples + i] = 1.0;
        }
        debug!("Built {n_samples}x{n_samples} co-association matrix from {n_partitions} partitions");
        Ok(CoAssociationMatrix { n_samples, n_partitions, values })
    }
}

/// Gives every noise point its own label, distinct from all real labels and from each other.
pub(crate) fn remap_noise(labels: &[i32]) -> Vec<i64> {
    let mut next_label = labels.iter().copied().max().unwrap_or(0).max(0) as i64 + 1;
    labels
        .iter()
        .map(|&label| {
            if label == NOISE {
                next_label += 1;
                next_label - 1
            } else {
                label as i64
            }
        })
        .collect()
}

/// Row indices grouped by label, each group ascending, groups ordered by first member.
fn group_by_label(labels: &[i64]) -> Vec<Vec<usize>> {
    let mut positions: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row, label) in labels.iter().enumerate() {
        let group = *positions.entry(*label).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(row);
    }
    groups
}
