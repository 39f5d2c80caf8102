use crate::{EnsembleError, Metric};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One cleaned supplier (or transaction) row, as handed over by the data cleaning layer.
/// Metric fields are optional only so that missing values can be rejected with a clear error;
/// the feature builder never imputes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub unit_id: String,
    pub quality_score: Option<f64>,
    pub delivery_reliability: Option<f64>,
    pub cost_efficiency: Option<f64>,
    pub customer_satisfaction: Option<f64>,
    pub defect_rate: Option<f64>,
    pub on_time_delivery_rate: Option<f64>,
    pub response_time_hours: Option<f64>,
    /// Precomputed composite score, when the source data carries one.
    #[serde(default)]
    pub overall_score: Option<f64>,
}

impl SupplierRecord {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::QualityScore => self.quality_score,
            Metric::DeliveryReliability => self.delivery_reliability,
            Metric::CostEfficiency => self.cost_efficiency,
            Metric::CustomerSatisfaction => self.customer_satisfaction,
            Metric::DefectRate => self.defect_rate,
            Metric::OnTimeDeliveryRate => self.on_time_delivery_rate,
            Metric::ResponseTimeHours => self.response_time_hours,
        }
    }
}

/// A dense, standardised feature matrix. Row order is the unit identity used by every
/// downstream structure.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    unit_ids: Vec<String>,
    columns: Vec<Metric>,
    rows: Vec<Vec<f64>>,
    raw: Vec<Vec<f64>>,
    means: Vec<f64>,
    std_devs: Vec<f64>,
    overall_scores: Option<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn unit_ids(&self) -> &[String] {
        &self.unit_ids
    }

    pub fn columns(&self) -> &[Metric] {
        &self.columns
    }

    /// The standardised rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// The original, non-standardised rows.
    pub fn raw_rows(&self) -> &[Vec<f64>] {
        &self.raw
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }

    /// Per-row overall scores, present only if every record carried one.
    pub fn overall_scores(&self) -> Option<&[f64]> {
        self.overall_scores.as_deref()
    }
}

/// Turns validated records into a standardised [`FeatureMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrixBuilder {
    columns: Vec<Metric>,
}

impl Default for FeatureMatrixBuilder {
    fn default() -> Self {
        Self::new(Metric::ALL.to_vec())
    }
}

impl FeatureMatrixBuilder {
    pub fn new(columns: Vec<Metric>) -> Self {
        Self { columns }
    }

    /// Builds the feature matrix.
    ///
    /// # Returns
    /// * The standardised matrix, or an `Input` error for empty/duplicated/missing data and a
    ///   `DegenerateFeature` error for any constant column.
    pub fn build(&self, records: &[SupplierRecord]) -> Result<FeatureMatrix, EnsembleError> {
        self.validate_columns()?;
        if records.is_empty() {
            return Err(EnsembleError::Input(String::from("The record set is empty")));
        }

        let mut seen = HashSet::with_capacity(records.len());
        let mut raw = Vec::with_capacity(records.len());
        for (n, record) in records.iter().enumerate() {
            if !seen.insert(record.unit_id.as_str()) {
                return Err(EnsembleError::Input(format!(
                    "Duplicate unit id '{}' at row {n}",
                    record.unit_id
                )));
            }
            raw.push(self.extract_row(n, record)?);
        }

        let n_samples = raw.len() as f64;
        let mut means = Vec::with_capacity(self.columns.len());
        let mut std_devs = Vec::with_capacity(self.columns.len());
        for (col, metric) in self.columns.iter().enumerate() {
            let mean = raw.iter().map(|row| row[col]).sum::<f64>() / n_samples;
            let variance =
                raw.iter().map(|row| (row[col] - mean).powi(2)).sum::<f64>() / n_samples;
            let std_dev = variance.sqrt();
            if std_dev == 0.0 || !std_dev.is_finite() {
                return Err(EnsembleError::DegenerateFeature(format!(
                    "Column '{metric}' has zero standard deviation and cannot be standardised"
                )));
            }
            means.push(mean);
            std_devs.push(std_dev);
        }

        let rows = raw
            .iter()
            .map(|row| {
                row.iter()
                    .zip(means.iter().zip(&std_devs))
                    .map(|(value, (mean, std_dev))| (value - mean) / std_dev)
                    .collect()
            })
            .collect();

        let overall_scores = records
            .iter()
            .map(|record| record.overall_score.filter(|score| score.is_finite()))
            .collect::<Option<Vec<_>>>();

        debug!(
            "Standardised {} rows over {} feature columns",
            records.len(),
            self.columns.len()
        );
        Ok(FeatureMatrix {
            unit_ids: records.iter().map(|record| record.unit_id.clone()).collect(),
            columns: self.columns.clone(),
            rows,
            raw,
            means,
            std_devs,
            overall_scores,
        })
    }

    fn validate_columns(&self) -> Result<(), EnsembleError> {
        if self.columns.is_empty() {
            return Err(EnsembleError::Input(String::from("No feature columns were defined")));
        }
        let unique = self.columns.iter().collect::<HashSet<_>>();
        if unique.len() != self.columns.len() {
            return Err(EnsembleError::Input(String::from(
                "Feature columns must not contain duplicates",
            )));
        }
        Ok(())
    }

    fn extract_row(&self, n: usize, record: &SupplierRecord) -> Result<Vec<f64>, EnsembleError> {
        self.columns
            .iter()
            .map(|metric| match record.value(*metric) {
                Some(value) if value.is_finite() => Ok(value),
                Some(_) => Err(EnsembleError::Input(format!(
                    "Row {n} ('{}') has a non-finite value for '{metric}'",
                    record.unit_id
                ))),
                None => Err(EnsembleError::Input(format!(
                    "Row {n} ('{}') is missing a value for '{metric}'",
                    record.unit_id
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, quality: f64, defects: f64) -> SupplierRecord {
        SupplierRecord {
            unit_id: id.to_string(),
            quality_score: Some(quality),
            defect_rate: Some(defects),
            ..Default::default()
        }
    }

    #[test]
    fn standardises_columns() {
        let records = vec![record("a", 80.0, 1.0), record("b", 90.0, 3.0)];
        let builder = FeatureMatrixBuilder::new(vec![Metric::QualityScore, Metric::DefectRate]);
        let matrix = builder.build(&records).unwrap();
        assert_eq!(vec![vec![-1.0, -1.0], vec![1.0, 1.0]], matrix.rows());
        assert_eq!(&[85.0, 2.0], matrix.means());
        assert_eq!(vec![80.0, 1.0], matrix.raw_rows()[0]);
        assert!(matrix.overall_scores().is_none());
    }

    #[test]
    fn constant_column_is_degenerate() {
        let records = vec![record("a", 80.0, 1.0), record("b", 80.0, 3.0)];
        let builder = FeatureMatrixBuilder::new(vec![Metric::QualityScore, Metric::DefectRate]);
        let result = builder.build(&records);
        assert!(matches!(result, Err(EnsembleError::DegenerateFeature(..))));
    }

    #[test]
    fn missing_value_is_input_error() {
        let records = vec![record("a", 80.0, 1.0), record("b", 90.0, 3.0)];
        let result = FeatureMatrixBuilder::default().build(&records);
        assert!(matches!(result, Err(EnsembleError::Input(..))));
    }

    #[test]
    fn nan_and_duplicates_rejected() {
        let builder = FeatureMatrixBuilder::new(vec![Metric::QualityScore]);
        let nan = vec![record("a", f64::NAN, 1.0), record("b", 90.0, 3.0)];
        assert!(matches!(builder.build(&nan), Err(EnsembleError::Input(..))));
        let dupes = vec![record("a", 70.0, 1.0), record("a", 90.0, 3.0)];
        assert!(matches!(builder.build(&dupes), Err(EnsembleError::Input(..))));
        assert!(matches!(builder.build(&[]), Err(EnsembleError::Input(..))));
    }
}
