#![cfg(feature = "parallel")]
use consensus_tiers::{
    Agglomerative, AgglomerativeHyperParams, EnsembleConfig, EnsembleError, EvaluationReport,
    Pipeline, SupplierRecord,
};

mod common;

macro_rules! define_parallel_test {
    ($test_fn:ident) => {
        #[test]
        fn $test_fn() {
            fn run_fn(
                pipeline: &Pipeline,
                records: &[SupplierRecord],
            ) -> Result<EvaluationReport, EnsembleError> {
                pipeline.run_par(records)
            }

            common::$test_fn(run_fn);
        }
    };
}

define_parallel_test!(test_three_tiers);
define_parallel_test!(test_deterministic);
define_parallel_test!(test_tolerates_failing_partitioner);
define_parallel_test!(test_insufficient_partitions);
define_parallel_test!(test_timeout);
define_parallel_test!(test_slow_partitioner_first);
define_parallel_test!(test_relabelling_invariance);
define_parallel_test!(test_noise_from_base_partition);
define_parallel_test!(test_noise_from_non_density_method);
define_parallel_test!(test_cancelled);
define_parallel_test!(test_degenerate_feature);
define_parallel_test!(test_missing_value);

#[cfg(feature = "serial")]
#[test]
fn parallel_matches_serial() {
    let records = common::supplier_records();
    let pipeline = Pipeline::new(EnsembleConfig::default());
    assert_eq!(pipeline.run(&records).unwrap(), pipeline.run_par(&records).unwrap());
}

#[test]
fn agglomerative_parallel_distances() {
    let data = vec![
        vec![0.0, 0.0],
        vec![0.2, 0.1],
        vec![5.0, 5.0],
        vec![5.1, 5.2],
        vec![0.1, 0.2],
        vec![9.0, 0.0],
    ];
    let hp = AgglomerativeHyperParams::builder().n_clusters(3).build();
    let clusterer = Agglomerative::new(&data, hp);
    assert_eq!(clusterer.cluster().unwrap(), clusterer.cluster_par().unwrap());
}
