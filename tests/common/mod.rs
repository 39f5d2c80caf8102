#![allow(dead_code)]
use consensus_tiers::{
    EnsembleConfig, EnsembleError, EvaluationReport, FeatureMatrix, Method, Partition,
    Partitioner, Pipeline, Stage, SupplierRecord, Tier,
};
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type RunFn = fn(&Pipeline, &[SupplierRecord]) -> Result<EvaluationReport, EnsembleError>;

pub fn test_three_tiers(run_fn: RunFn) {
    let records = supplier_records();
    let report = run_fn(&Pipeline::new(EnsembleConfig::default()), &records).unwrap();

    assert_eq!(records.len(), report.assignments.len());
    assert_eq!(3, report.consensus.n_clusters);
    // Each group of ten is one consensus cluster
    for group in 0..3 {
        let rows = group * GROUP_SIZE..(group + 1) * GROUP_SIZE;
        let labels = report.consensus.labels[rows].iter().collect::<HashSet<_>>();
        assert_eq!(1, labels.len());
    }
    assert_eq!(Tier::High, tier_of(&report, "good-0"));
    assert_eq!(Tier::Mid, tier_of(&report, "mid-0"));
    assert_eq!(Tier::Low, tier_of(&report, "poor-0"));

    assert_eq!(records.len(), report.profiles.iter().map(|p| p.size).sum::<usize>());
    let total_percentage = report.profiles.iter().map(|p| p.percentage).sum::<f64>();
    assert!((total_percentage - 100.0).abs() < 1e-9);
    assert!(report.evaluation.contains_key("consensus"));
    assert!(report.evaluation["consensus"].silhouette > 0.8);
    assert!(report.agreement.contains_key("kmeans"));
}

pub fn test_deterministic(run_fn: RunFn) {
    let records = supplier_records();
    let config = EnsembleConfig::builder().seed(7).build().unwrap();
    let pipeline = Pipeline::new(config);
    let first = run_fn(&pipeline, &records).unwrap();
    let second = run_fn(&pipeline, &records).unwrap();
    assert_eq!(first, second);
}

pub fn test_tolerates_failing_partitioner(run_fn: RunFn) {
    let config = EnsembleConfig::default();
    let mut partitioners = config.partitioners();
    partitioners.push(Arc::new(Failing("broken")));
    let pipeline = Pipeline::new(config).with_partitioners(partitioners);

    let report = run_fn(&pipeline, &supplier_records()).unwrap();
    assert!(report.failures["broken"].contains("always fails"));
    assert_eq!(3, report.consensus.n_clusters);
}

pub fn test_insufficient_partitions(run_fn: RunFn) {
    let partitioners: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Failing("first")),
        Arc::new(Failing("second")),
        Arc::new(Fixed("fixed", group_labels())),
    ];
    let pipeline = Pipeline::new(EnsembleConfig::default()).with_partitioners(partitioners);

    let err = run_fn(&pipeline, &supplier_records()).unwrap_err();
    assert!(matches!(err, EnsembleError::Stage { stage: Stage::BasePartitioning, .. }));
    match err.root_cause() {
        EnsembleError::InsufficientPartitions { succeeded, required, failures } => {
            assert_eq!(1, *succeeded);
            assert_eq!(2, *required);
            assert_eq!(2, failures.len());
        }
        other => panic!("unexpected error {other}"),
    }
}

pub fn test_timeout(run_fn: RunFn) {
    let partitioners: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Fixed("fast", group_labels())),
        Arc::new(Fixed("also_fast", group_labels())),
        Arc::new(Slow("slow", Duration::from_millis(800))),
    ];
    let config = EnsembleConfig::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).with_partitioners(partitioners);

    let report = run_fn(&pipeline, &supplier_records()).unwrap();
    assert_eq!("timed out", report.failures["slow"]);
    assert_eq!(2, report.partitions.len());
}

pub fn test_slow_partitioner_first(run_fn: RunFn) {
    let partitioners: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Slow("slow", Duration::from_millis(800))),
        Arc::new(Fixed("fast", group_labels())),
        Arc::new(Fixed("also_fast", group_labels())),
    ];
    let config = EnsembleConfig::builder()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config).with_partitioners(partitioners);

    let report = run_fn(&pipeline, &supplier_records()).unwrap();
    // Only the slow run is lost; the others get their own time budget.
    assert_eq!(1, report.failures.len());
    assert_eq!("timed out", report.failures["slow"]);
    let methods: Vec<&str> = report.partitions.iter().map(|p| p.method.name()).collect();
    assert_eq!(vec!["fast", "also_fast"], methods);
    assert_eq!(3, report.consensus.n_clusters);
}

pub fn test_relabelling_invariance(run_fn: RunFn) {
    let relabel = |labels: Vec<i32>| -> Vec<i32> {
        labels.into_iter().map(|l| (l + 1) % 3 * 10).collect()
    };
    let split_mid = |labels: Vec<i32>| -> Vec<i32> {
        labels.into_iter().enumerate().map(|(row, l)| if row == 15 { 7 } else { l }).collect()
    };
    let original: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Fixed("a", group_labels())),
        Arc::new(Fixed("b", split_mid(group_labels()))),
    ];
    let relabelled: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Fixed("a", relabel(group_labels()))),
        Arc::new(Fixed("b", split_mid(relabel(group_labels())))),
    ];

    let records = supplier_records();
    let run = |partitioners| {
        let pipeline = Pipeline::new(EnsembleConfig::default()).with_partitioners(partitioners);
        run_fn(&pipeline, &records).unwrap()
    };
    let first = run(original);
    let second = run(relabelled);
    assert_eq!(first.consensus.labels, second.consensus.labels);
    assert_eq!(first.assignments, second.assignments);
}

pub fn test_noise_from_base_partition(run_fn: RunFn) {
    let mut noisy = group_labels();
    noisy[0] = -1;
    noisy[29] = -1;
    let partitioners: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Noisy("noisy", noisy)),
        Arc::new(Fixed("clean", group_labels())),
    ];
    let pipeline = Pipeline::new(EnsembleConfig::default()).with_partitioners(partitioners);

    let report = run_fn(&pipeline, &supplier_records()).unwrap();
    // The clean partition still ties noise rows to their groups
    assert_eq!(report.consensus.labels[0], report.consensus.labels[1]);
    assert!(report.consensus.labels.iter().all(|&label| label >= 0));
    assert!(report.agreement["noisy"] < 1.0);
}

pub fn test_noise_from_non_density_method(run_fn: RunFn) {
    let mut noisy = group_labels();
    noisy[0] = -1;
    let partitioners: Vec<Arc<dyn Partitioner>> = vec![
        Arc::new(Fixed("centroid", noisy)),
        Arc::new(Fixed("clean", group_labels())),
        Arc::new(Fixed("also_clean", group_labels())),
    ];
    let pipeline = Pipeline::new(EnsembleConfig::default()).with_partitioners(partitioners);

    let report = run_fn(&pipeline, &supplier_records()).unwrap();
    assert!(report.failures["centroid"].contains("not a density-based method"));
    assert_eq!(2, report.partitions.len());
}

pub fn test_cancelled(run_fn: RunFn) {
    let cancel = Arc::new(AtomicBool::new(true));
    let pipeline = Pipeline::new(EnsembleConfig::default()).with_cancel_flag(cancel);
    let err = run_fn(&pipeline, &supplier_records()).unwrap_err();
    assert!(matches!(err, EnsembleError::Cancelled));
}

pub fn test_degenerate_feature(run_fn: RunFn) {
    let mut records = supplier_records();
    for record in records.iter_mut() {
        record.cost_efficiency = Some(70.0);
    }
    let err = run_fn(&Pipeline::new(EnsembleConfig::default()), &records).unwrap_err();
    assert!(matches!(err, EnsembleError::Stage { stage: Stage::FeatureMatrix, .. }));
    assert!(matches!(err.root_cause(), EnsembleError::DegenerateFeature(..)));
    assert!(err.to_string().contains("cost_efficiency"));
}

pub fn test_missing_value(run_fn: RunFn) {
    let mut records = supplier_records();
    records[4].defect_rate = None;
    let err = run_fn(&Pipeline::new(EnsembleConfig::default()), &records).unwrap_err();
    assert!(matches!(err.root_cause(), EnsembleError::Input(..)));
}

pub const GROUP_SIZE: usize = 10;

/// Thirty suppliers in three clearly separated performance groups of ten: `good-*`, `mid-*`
/// and `poor-*`, in that row order.
pub fn supplier_records() -> Vec<SupplierRecord> {
    let groups = [
        ("good", [92.0, 95.0, 85.0, 4.6, 1.0, 96.0, 4.0], 9.0),
        ("mid", [78.0, 82.0, 70.0, 3.8, 3.0, 85.0, 12.0], 6.5),
        ("poor", [60.0, 65.0, 55.0, 2.9, 6.5, 70.0, 30.0], 3.5),
    ];
    let mut records = Vec::new();
    for (name, base, score) in groups {
        for i in 0..GROUP_SIZE {
            // Up to one percent of deterministic jitter per column
            let value = |col: usize| {
                let step = ((i * 7 + col * 3) % 5) as f64 - 2.0;
                Some(base[col] * (1.0 + step * 0.005))
            };
            records.push(SupplierRecord {
                unit_id: format!("{name}-{i}"),
                quality_score: value(0),
                delivery_reliability: value(1),
                cost_efficiency: value(2),
                customer_satisfaction: value(3),
                defect_rate: value(4),
                on_time_delivery_rate: value(5),
                response_time_hours: value(6),
                overall_score: Some(score),
            });
        }
    }
    records
}

/// The true group of each row of `supplier_records`.
pub fn group_labels() -> Vec<i32> {
    (0..3 * GROUP_SIZE).map(|row| (row / GROUP_SIZE) as i32).collect()
}

pub fn tier_of(report: &EvaluationReport, unit_id: &str) -> Tier {
    report
        .assignments
        .iter()
        .find(|assignment| assignment.unit_id == unit_id)
        .map(|assignment| assignment.tier)
        .unwrap()
}

/// Returns the same labels whatever the data.
pub struct Fixed(pub &'static str, pub Vec<i32>);

impl Partitioner for Fixed {
    fn method(&self) -> Method {
        Method::Custom(self.0)
    }

    fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        Ok(Partition::new(self.method(), self.1.clone()))
    }
}

/// Returns the same labels whatever the data, and may leave rows as noise.
pub struct Noisy(pub &'static str, pub Vec<i32>);

impl Partitioner for Noisy {
    fn method(&self) -> Method {
        Method::Custom(self.0)
    }

    fn emits_noise(&self) -> bool {
        true
    }

    fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        Ok(Partition::new(self.method(), self.1.clone()))
    }
}

pub struct Failing(pub &'static str);

impl Partitioner for Failing {
    fn method(&self) -> Method {
        Method::Custom(self.0)
    }

    fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        Err(EnsembleError::DegenerateCluster(String::from("always fails")))
    }
}

/// Sleeps before returning the true groups.
pub struct Slow(pub &'static str, pub Duration);

impl Partitioner for Slow {
    fn method(&self) -> Method {
        Method::Custom(self.0)
    }

    fn partition(&self, _: &FeatureMatrix) -> Result<Partition, EnsembleError> {
        thread::sleep(self.1);
        Ok(Partition::new(self.method(), group_labels()))
    }
}
