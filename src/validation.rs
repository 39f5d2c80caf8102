use crate::EnsembleError;
use num_traits::Float;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DataValidator<'a, T> {
    data: &'a [Vec<T>],
}

impl<'a, T: Float> DataValidator<'a, T> {
    pub(crate) fn new(data: &'a [Vec<T>]) -> Self {
        Self { data }
    }

    pub(crate) fn validate_input_data(&self) -> Result<(), EnsembleError> {
        if self.data.is_empty() {
            return Err(EnsembleError::Input(String::from("The dataset provided is empty")));
        }
        let dims_0th = self.data[0].len();
        if dims_0th == 0 {
            return Err(EnsembleError::Input(String::from(
                "Data points must have at least one dimension",
            )));
        }
        for (n, datapoint) in self.data.iter().enumerate() {
            if datapoint.iter().any(|element| !element.is_finite()) {
                return Err(EnsembleError::Input(format!(
                    "{n}th vector contains non-finite element(s)"
                )));
            }
            let dims_nth = datapoint.len();
            if dims_nth != dims_0th {
                return Err(EnsembleError::Input(format!(
                    "0th data point has {dims_0th} dimensions, but {n}th has {dims_nth}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn validate_n_clusters(&self, n_clusters: usize) -> Result<(), EnsembleError> {
        if n_clusters == 0 {
            return Err(EnsembleError::Configuration(String::from(
                "The number of clusters must be at least 1",
            )));
        }
        if n_clusters > self.data.len() {
            return Err(EnsembleError::Configuration(format!(
                "Cannot form {n_clusters} clusters from {} data points",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Number of distinct rows (compared exactly), counting no further than `limit`.
    pub(crate) fn count_distinct_points(&self, limit: usize) -> usize {
        let mut distinct: Vec<&Vec<T>> = Vec::new();
        for datapoint in self.data {
            if distinct.len() >= limit {
                break;
            }
            if !distinct.iter().any(|seen| *seen == datapoint) {
                distinct.push(datapoint);
            }
        }
        distinct.len()
    }
}

pub(crate) fn validate_labels_len(
    labels: &[i32],
    n_samples: usize,
    context: &str,
) -> Result<(), EnsembleError> {
    if labels.len() != n_samples {
        return Err(EnsembleError::Input(format!(
            "{context}: {} labels supplied for {n_samples} rows",
            labels.len()
        )));
    }
    Ok(())
}
