use anyhow::{Context, Result};
use clap::Parser;
use consensus_tiers::{ConsensusCut, DbscanHyperParams, EnsembleConfig, Pipeline, SupplierRecord};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding an array of cleaned supplier records
    #[arg(long)]
    input: PathBuf,

    /// Number of consensus clusters
    #[arg(long, default_value_t = 3)]
    k: usize,

    /// Seed for every stochastic step
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// DBSCAN neighbourhood radius, in standardised units
    #[arg(long, default_value_t = 1.5)]
    eps: f64,

    /// DBSCAN core point threshold
    #[arg(long, default_value_t = 5)]
    min_samples: usize,

    /// Time budget for the base partitioners, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Base partitioners that must succeed
    #[arg(long, default_value_t = 2)]
    min_successful: usize,

    /// Cut the consensus tree at this co-association distance instead of into k clusters
    #[arg(long)]
    cut_height: Option<f64>,

    /// Run the base partitioners one after another
    #[arg(long)]
    serial: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let contents = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let records: Vec<SupplierRecord> =
        serde_json::from_str(&contents).context("Failed to parse supplier records")?;
    info!("Loaded {} records from {}", records.len(), args.input.display());

    let mut builder = EnsembleConfig::builder()
        .n_clusters(args.k)
        .seed(args.seed)
        .min_successful(args.min_successful)
        .dbscan(
            DbscanHyperParams::builder()
                .eps(args.eps)
                .min_samples(args.min_samples)
                .build(),
        );
    if let Some(timeout_ms) = args.timeout_ms {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(height) = args.cut_height {
        builder = builder.consensus_cut(ConsensusCut::Height(height));
    }
    let config = builder.build().context("Invalid configuration")?;

    let pipeline = Pipeline::new(config);
    let result = if args.serial { pipeline.run(&records) } else { pipeline.run_par(&records) };
    let report = result.context("Consensus run failed")?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");
    Ok(())
}
