use crate::consensus::{ConsensusClusterer, ConsensusPartition};
use crate::ensemble::{unique_key, Ensemble, EnsembleOutcome};
use crate::error::Stage;
use crate::evaluation::{adjusted_rand_index, evaluate, ClusterScores};
use crate::profile::{ClusterProfile, ClusterProfiler, Tier};
use crate::{
    CoAssociationBuilder, EnsembleConfig, EnsembleError, FeatureMatrix, FeatureMatrixBuilder,
    Method, Partition, Partitioner, SupplierRecord,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type ScoresByMethod = BTreeMap<String, ClusterScores>;

/// The consensus cluster and tier of one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitAssignment {
    pub unit_id: String,
    pub cluster_id: i32,
    pub tier: Tier,
}

/// Everything a consensus run produces for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub assignments: Vec<UnitAssignment>,
    pub profiles: Vec<ClusterProfile>,
    /// Validity scores per base method and for `consensus`.
    pub evaluation: BTreeMap<String, ClusterScores>,
    /// Adjusted Rand index of each base method against the consensus.
    pub agreement: BTreeMap<String, f64>,
    /// Reason per base method that produced no partition.
    pub failures: BTreeMap<String, String>,
    #[serde(skip)]
    pub partitions: Vec<Partition>,
    #[serde(skip)]
    pub consensus: ConsensusPartition,
}

/// The full flow from cleaned records to tiered cluster profiles: feature matrix, base
/// partitions, co-association, consensus, evaluation and profiling.
#[derive(Clone)]
pub struct Pipeline {
    config: EnsembleConfig,
    partitioners: Vec<Arc<dyn Partitioner>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    /// A pipeline running the default ensemble described by `config`.
    pub fn new(config: EnsembleConfig) -> Self {
        let partitioners = config.partitioners();
        Pipeline { config, partitioners, cancel: None }
    }

    /// Replaces the base partitioners.
    pub fn with_partitioners(mut self, partitioners: Vec<Arc<dyn Partitioner>>) -> Self {
        self.partitioners = partitioners;
        self
    }

    /// Checks `cancel` between stages; once set, the run stops with `EnsembleError::Cancelled`.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    /// Runs the base partitioners one at a time, the other stages on the calling thread.
    #[cfg(feature = "serial")]
    pub fn run(&self, records: &[SupplierRecord]) -> Result<EvaluationReport, EnsembleError> {
        self.execute(records, |ensemble, matrix| ensemble.run(Arc::clone(matrix)))
    }

    /// Runs the base partitioners concurrently, the other stages on the calling thread.
    #[cfg(feature = "parallel")]
    pub fn run_par(&self, records: &[SupplierRecord]) -> Result<EvaluationReport, EnsembleError> {
        self.execute(records, |ensemble, matrix| ensemble.run_par(Arc::clone(matrix)))
    }

    fn execute<F>(
        &self,
        records: &[SupplierRecord],
        run_ensemble: F,
    ) -> Result<EvaluationReport, EnsembleError>
    where
        F: FnOnce(&Ensemble, &Arc<FeatureMatrix>) -> Result<EnsembleOutcome, EnsembleError>,
    {
        self.check_cancelled()?;
        let matrix = FeatureMatrixBuilder::default()
            .build(records)
            .map_err(|err| err.in_stage(Stage::FeatureMatrix))?;
        let matrix = Arc::new(matrix);
        info!("Built feature matrix of {} units", matrix.n_samples());

        self.check_cancelled()?;
        let ensemble = Ensemble::new(
            self.partitioners.clone(),
            self.config.min_successful,
            self.config.timeout,
        )
        .map_err(|err| err.in_stage(Stage::BasePartitioning))?;
        let outcome = run_ensemble(&ensemble, &matrix)
            .map_err(|err| err.in_stage(Stage::BasePartitioning))?;
        info!(
            "{} of {} base partitioners succeeded",
            outcome.partitions.len(),
            ensemble.n_partitioners()
        );

        self.check_cancelled()?;
        let coassoc = CoAssociationBuilder
            .build(&outcome.partitions)
            .map_err(|err| err.in_stage(Stage::CoAssociation))?;

        self.check_cancelled()?;
        let consensus = ConsensusClusterer::new(self.config.consensus_cut)
            .consolidate_owned(coassoc)
            .map_err(|err| err.in_stage(Stage::Consensus))?;
        info!("Consensus formed {} clusters", consensus.n_clusters);

        self.check_cancelled()?;
        let (evaluation, agreement) = self.evaluate_all(&matrix, &outcome.partitions, &consensus)?;

        self.check_cancelled()?;
        let profiles = ClusterProfiler::new(self.config.n_tags)
            .and_then(|profiler| profiler.profile(&matrix, &consensus.labels))
            .map_err(|err| err.in_stage(Stage::Profiling))?;

        let tiers: HashMap<i32, Tier> =
            profiles.iter().map(|profile| (profile.cluster_id, profile.tier)).collect();
        let assignments = matrix
            .unit_ids()
            .iter()
            .zip(&consensus.labels)
            .map(|(unit_id, &cluster_id)| UnitAssignment {
                unit_id: unit_id.clone(),
                cluster_id,
                tier: tiers.get(&cluster_id).copied().unwrap_or(Tier::Unranked),
            })
            .collect();

        Ok(EvaluationReport {
            assignments,
            profiles,
            evaluation,
            agreement,
            failures: outcome.failures,
            partitions: outcome.partitions,
            consensus,
        })
    }

    /// Scores every partition. An unscorable base partition is only reported; an unscorable
    /// consensus is fatal.
    fn evaluate_all(
        &self,
        matrix: &FeatureMatrix,
        partitions: &[Partition],
        consensus: &ConsensusPartition,
    ) -> Result<(ScoresByMethod, BTreeMap<String, f64>), EnsembleError> {
        let mut evaluation: ScoresByMethod = BTreeMap::new();
        let mut agreement: BTreeMap<String, f64> = BTreeMap::new();
        for partition in partitions {
            let name = partition.method.name();
            match evaluate(matrix.rows(), &partition.labels, self.config.exclude_noise) {
                Ok(scores) => {
                    let key = unique_key(&evaluation, name);
                    evaluation.insert(key, scores);
                }
                Err(err) => warn!("Skipping evaluation of {name}: {err}"),
            }
            let ari = adjusted_rand_index(&partition.labels, &consensus.labels)
                .map_err(|err| err.in_stage(Stage::Evaluation))?;
            let key = unique_key(&agreement, name);
            agreement.insert(key, ari);
        }

        let scores = evaluate(matrix.rows(), &consensus.labels, self.config.exclude_noise)
            .map_err(|err| err.in_stage(Stage::Evaluation))?;
        debug!("Consensus silhouette {:.4}", scores.silhouette);
        evaluation.insert(Method::Consensus.name().to_string(), scores);
        Ok((evaluation, agreement))
    }

    fn check_cancelled(&self) -> Result<(), EnsembleError> {
        match &self.cancel {
            Some(cancel) if cancel.load(Ordering::Relaxed) => {
                info!("Run cancelled");
                Err(EnsembleError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}
