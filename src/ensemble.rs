use crate::hyper_parameters::validate_min_successful;
use crate::partition::NOISE;
use crate::{EnsembleError, FeatureMatrix, Partition, Partitioner};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// The result of one partitioner run. `None` marks a run that overran its time budget.
type RunResult = Option<Result<Partition, String>>;

/// Progress reported by a partitioner's worker thread.
enum RunEvent {
    Started(usize, Instant),
    Finished(usize, Instant, Result<Partition, String>),
}

/// Successful partitions, in partitioner order, and a failure reason per failed method.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutcome {
    pub partitions: Vec<Partition>,
    pub failures: BTreeMap<String, String>,
}

/// Runs a set of independent base partitioners over one feature matrix and collects what they
/// produce. A failing partitioner never stops the others.
///
/// With a timeout set, every run gets its own budget, counted from the moment that run
/// starts. A run that overruns is recorded as timed out and abandoned on its worker thread;
/// the remaining partitioners are unaffected.
#[derive(Clone)]
pub struct Ensemble {
    partitioners: Vec<Arc<dyn Partitioner>>,
    min_successful: usize,
    timeout: Option<Duration>,
}

impl Ensemble {
    /// # Returns
    /// * A `Configuration` error if `min_successful` is zero or larger than the number of
    ///   partitioners.
    pub fn new(
        partitioners: Vec<Arc<dyn Partitioner>>,
        min_successful: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, EnsembleError> {
        validate_min_successful(min_successful, partitioners.len())?;
        Ok(Ensemble { partitioners, min_successful, timeout })
    }

    pub fn n_partitioners(&self) -> usize {
        self.partitioners.len()
    }

    /// Runs the partitioners one after another. Without a timeout they run on the calling
    /// thread; with one, each runs on its own worker thread so an overrunning run can be
    /// abandoned before the next one starts.
    ///
    /// # Returns
    /// * The outcome, or `InsufficientPartitions` if fewer than `min_successful` succeeded.
    #[cfg(feature = "serial")]
    pub fn run(&self, matrix: Arc<FeatureMatrix>) -> Result<EnsembleOutcome, EnsembleError> {
        let results = self
            .partitioners
            .iter()
            .map(|partitioner| {
                if self.timeout.is_none() {
                    return Some(run_isolated(partitioner.as_ref(), &matrix));
                }
                let (sender, receiver) = mpsc::channel();
                match spawn_run(0, partitioner, &matrix, sender) {
                    Ok(()) => self.await_runs(&receiver, 1, 1).pop().flatten(),
                    Err(reason) => Some(Err(reason)),
                }
            })
            .collect();
        self.collect(results)
    }

    /// Runs every partitioner concurrently, each on a dedicated worker thread, so a hung run
    /// neither delays the start of the others nor holds a shared pool thread.
    ///
    /// # Returns
    /// * The outcome, or `InsufficientPartitions` if fewer than `min_successful` succeeded.
    #[cfg(feature = "parallel")]
    pub fn run_par(&self, matrix: Arc<FeatureMatrix>) -> Result<EnsembleOutcome, EnsembleError> {
        let n_runs = self.partitioners.len();
        let (sender, receiver) = mpsc::channel();
        let mut spawn_failures = BTreeMap::new();
        for (idx, partitioner) in self.partitioners.iter().enumerate() {
            if let Err(reason) = spawn_run(idx, partitioner, &matrix, sender.clone()) {
                spawn_failures.insert(idx, reason);
            }
        }
        drop(sender);

        let mut results = self.await_runs(&receiver, n_runs, n_runs - spawn_failures.len());
        for (idx, reason) in spawn_failures {
            results[idx] = Some(Err(reason));
        }
        self.collect(results)
    }

    /// Waits until `expected` runs have finished or overrun their own deadline, each deadline
    /// being the run's start plus the timeout.
    fn await_runs(
        &self,
        receiver: &Receiver<RunEvent>,
        n_slots: usize,
        expected: usize,
    ) -> Vec<RunResult> {
        let mut results: Vec<RunResult> = vec![None; n_slots];
        let mut deadlines: Vec<Option<Instant>> = vec![None; n_slots];
        let mut settled = vec![false; n_slots];
        let mut n_settled = 0;
        while n_settled < expected {
            let next_deadline = (0..n_slots)
                .filter(|&idx| !settled[idx])
                .filter_map(|idx| deadlines[idx])
                .min();
            let event = match next_deadline {
                Some(deadline) => {
                    receiver.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match event {
                Ok(RunEvent::Started(idx, started)) => {
                    deadlines[idx] = self.timeout.map(|timeout| started + timeout);
                }
                Ok(RunEvent::Finished(idx, finished, result)) => {
                    if settled[idx] {
                        continue;
                    }
                    settled[idx] = true;
                    n_settled += 1;
                    let late = deadlines[idx].map_or(false, |deadline| finished > deadline);
                    results[idx] = if late { None } else { Some(result) };
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    for idx in 0..n_slots {
                        let overran = deadlines[idx].map_or(false, |deadline| deadline <= now);
                        if !settled[idx] && overran {
                            debug!("Abandoning partitioner run {idx} after its deadline");
                            settled[idx] = true;
                            n_settled += 1;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        results
    }

    /// `None` marks a partitioner that did not finish within the time budget.
    fn collect(
        &self,
        results: Vec<RunResult>,
    ) -> Result<EnsembleOutcome, EnsembleError> {
        let mut partitions = Vec::with_capacity(results.len());
        let mut failures = BTreeMap::new();
        for (partitioner, result) in self.partitioners.iter().zip(results) {
            let method = partitioner.method();
            match result {
                Some(Ok(partition)) => {
                    info!(
                        "{method} produced {} clusters and {} noise points",
                        partition.n_clusters(),
                        partition.n_noise()
                    );
                    partitions.push(partition);
                }
                Some(Err(reason)) => {
                    warn!("{method} failed: {reason}");
                    let key = unique_key(&failures, method.name());
                    failures.insert(key, reason);
                }
                None => {
                    warn!("{method} timed out");
                    let key = unique_key(&failures, method.name());
                    failures.insert(key, String::from("timed out"));
                }
            }
        }

        if partitions.len() < self.min_successful {
            return Err(EnsembleError::InsufficientPartitions {
                succeeded: partitions.len(),
                required: self.min_successful,
                failures,
            });
        }
        Ok(EnsembleOutcome { partitions, failures })
    }
}

/// Starts one partitioner run on its own named worker thread, reporting to `sender`.
fn spawn_run(
    idx: usize,
    partitioner: &Arc<dyn Partitioner>,
    matrix: &Arc<FeatureMatrix>,
    sender: Sender<RunEvent>,
) -> Result<(), String> {
    let partitioner = Arc::clone(partitioner);
    let matrix = Arc::clone(matrix);
    thread::Builder::new()
        .name(format!("partitioner-{}", partitioner.method()))
        .spawn(move || {
            // Sends only fail once the run has been abandoned.
            let _ = sender.send(RunEvent::Started(idx, Instant::now()));
            let result = run_isolated(partitioner.as_ref(), &matrix);
            let _ = sender.send(RunEvent::Finished(idx, Instant::now(), result));
        })
        .map(|_| ())
        .map_err(|err| format!("could not start a worker thread: {err}"))
}

/// Runs one partitioner, turning errors, panics and malformed output into a failure reason.
fn run_isolated(
    partitioner: &dyn Partitioner,
    matrix: &FeatureMatrix,
) -> Result<Partition, String> {
    let partition = catch_unwind(AssertUnwindSafe(|| partitioner.partition(matrix)))
        .map_err(|_| String::from("panicked"))?
        .map_err(|err| err.to_string())?;
    if partition.n_samples() != matrix.n_samples() {
        return Err(format!(
            "returned {} labels for {} rows",
            partition.n_samples(),
            matrix.n_samples()
        ));
    }
    if partition.labels.iter().any(|&label| label < NOISE) {
        return Err(String::from("returned labels below -1"));
    }
    if !partitioner.emits_noise() && partition.labels.contains(&NOISE) {
        return Err(String::from("returned noise labels but is not a density-based method"));
    }
    Ok(partition)
}

/// Two partitioners may share a method name; later ones get a numeric suffix.
pub(crate) fn unique_key<V>(map: &BTreeMap<String, V>, name: &str) -> String {
    if !map.contains_key(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{name}#{n}"))
        .find(|key| !map.contains_key(key))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeatureMatrixBuilder, Method, Metric, SupplierRecord};

    struct Fixed(Vec<i32>);

    impl Partitioner for Fixed {
        fn method(&self) -> Method {
            Method::Custom("fixed")
        }

        fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
            Ok(Partition::new(self.method(), self.0.clone()))
        }
    }

    /// Like `Fixed`, but declared density based.
    struct Density(Vec<i32>);

    impl Partitioner for Density {
        fn method(&self) -> Method {
            Method::Custom("density")
        }

        fn emits_noise(&self) -> bool {
            true
        }

        fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
            Ok(Partition::new(self.method(), self.0.clone()))
        }
    }

    fn matrix() -> FeatureMatrix {
        let records: Vec<SupplierRecord> = [70.0, 80.0, 90.0]
            .iter()
            .enumerate()
            .map(|(n, &quality)| SupplierRecord {
                unit_id: format!("s{n}"),
                quality_score: Some(quality),
                ..Default::default()
            })
            .collect();
        FeatureMatrixBuilder::new(vec![Metric::QualityScore]).build(&records).unwrap()
    }

    #[test]
    fn noise_only_from_density_methods() {
        let matrix = matrix();
        let result = run_isolated(&Fixed(vec![0, 0, -1]), &matrix);
        assert!(result.unwrap_err().contains("not a density-based method"));
        assert!(run_isolated(&Density(vec![0, 0, -1]), &matrix).is_ok());
        assert!(run_isolated(&Density(vec![0, 0, -2]), &matrix).is_err());
        assert!(run_isolated(&Fixed(vec![0, 1]), &matrix).is_err());
    }

    #[cfg(feature = "serial")]
    #[test]
    fn each_run_has_its_own_budget() {
        struct Sleepy;

        impl Partitioner for Sleepy {
            fn method(&self) -> Method {
                Method::Custom("sleepy")
            }

            fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
                thread::sleep(Duration::from_millis(500));
                Ok(Partition::new(self.method(), vec![0, 0, 1]))
            }
        }

        let partitioners: Vec<Arc<dyn Partitioner>> = vec![
            Arc::new(Sleepy),
            Arc::new(Fixed(vec![0, 0, 1])),
            Arc::new(Fixed(vec![0, 1, 1])),
        ];
        let ensemble = Ensemble::new(partitioners, 2, Some(Duration::from_millis(100))).unwrap();
        let outcome = ensemble.run(Arc::new(matrix())).unwrap();
        assert_eq!(2, outcome.partitions.len());
        assert_eq!(Some("timed out"), outcome.failures.get("sleepy").map(String::as_str));
        assert_eq!(1, outcome.failures.len());
    }

    #[test]
    fn rejects_bad_thresholds() {
        let partitioners: Vec<Arc<dyn Partitioner>> = vec![Arc::new(Fixed(vec![0]))];
        assert!(Ensemble::new(partitioners.clone(), 0, None).is_err());
        assert!(Ensemble::new(partitioners, 2, None).is_err());
    }

    #[test]
    fn duplicate_failure_names() {
        let mut failures: BTreeMap<String, String> = BTreeMap::new();
        for _ in 0..2 {
            let key = unique_key(&failures, "fixed");
            failures.insert(key, String::new());
        }
        assert_eq!(vec!["fixed", "fixed#2"], failures.keys().map(String::as_str).collect::<Vec<_>>());
    }
}
