use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Pipeline stages, used to give fatal errors enough context to surface to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FeatureMatrix,
    BasePartitioning,
    CoAssociation,
    Consensus,
    Evaluation,
    Profiling,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FeatureMatrix => "feature matrix",
            Stage::BasePartitioning => "base partitioning",
            Stage::CoAssociation => "co-association",
            Stage::Consensus => "consensus clustering",
            Stage::Evaluation => "evaluation",
            Stage::Profiling => "cluster profiling",
        };
        write!(f, "{name}")
    }
}

/// Possible errors that arise while building a consensus partition and its profiles.
#[derive(Debug, Clone)]
pub enum EnsembleError {
    /// Malformed or mismatched inputs.
    Input(String),
    /// A feature column cannot be standardised (e.g. zero variance).
    DegenerateFeature(String),
    /// A base algorithm could not produce a meaningful partition of the data.
    DegenerateCluster(String),
    /// Too few base partitioners succeeded to form a consensus.
    InsufficientPartitions {
        succeeded: usize,
        required: usize,
        failures: BTreeMap<String, String>,
    },
    /// Quality metrics are undefined for fewer than two clusters.
    InsufficientClusters(String),
    /// Invalid cluster counts or algorithm parameters.
    Configuration(String),
    /// The run was cancelled by the caller.
    Cancelled,
    /// A fatal error, tagged with the stage it occurred in.
    Stage {
        stage: Stage,
        source: Box<EnsembleError>,
    },
}

impl EnsembleError {
    pub(crate) fn in_stage(self, stage: Stage) -> Self {
        match self {
            EnsembleError::Stage { .. } | EnsembleError::Cancelled => self,
            other => EnsembleError::Stage { stage, source: Box::new(other) },
        }
    }

    /// Strips any stage wrapping, returning the underlying error.
    pub fn root_cause(&self) -> &EnsembleError {
        match self {
            EnsembleError::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl Error for EnsembleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EnsembleError::Stage { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl Display for EnsembleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            EnsembleError::Input(msg) => format!("Invalid input: {msg}"),
            EnsembleError::DegenerateFeature(msg) => format!("Degenerate feature: {msg}"),
            EnsembleError::DegenerateCluster(msg) => format!("Degenerate clustering: {msg}"),
            EnsembleError::InsufficientPartitions { succeeded, required, failures } => {
                let detail = failures
                    .iter()
                    .map(|(method, reason)| format!("{method}: {reason}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                format!(
                    "Only {succeeded} base partition(s) succeeded, at least {required} required \
                    ({detail})"
                )
            }
            EnsembleError::InsufficientClusters(msg) => format!("Insufficient clusters: {msg}"),
            EnsembleError::Configuration(msg) => format!("Invalid configuration: {msg}"),
            EnsembleError::Cancelled => String::from("The evaluation run was cancelled"),
            EnsembleError::Stage { stage, source } => format!("{stage} failed: {source}"),
        };
        write!(f, "{message}")
    }
}
