use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use txn_pipeline::config::PipelineConfig;
use txn_pipeline::logging;
use txn_pipeline::observability::metrics;
use txn_pipeline::pipeline::{new_run_stamp, Pipeline, RunStatus, RunSummary};

#[derive(Parser)]
#[command(name = "txn-pipeline")]
#[command(about = "Batch ETL pipeline for sales transaction analytics")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./pipeline.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input CSV; synthesized (and saved here) when missing
    #[arg(long)]
    input: Option<PathBuf>,
    /// Directory receiving every artifact
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Number of synthetic records to generate
    #[arg(long)]
    records: Option<usize>,
    /// Seed for synthetic generation
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(input) = &self.input {
            config.ingestion.input_path = input.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(records) = self.records {
            config.ingestion.synthetic_records = records;
        }
        if let Some(seed) = self.seed {
            config.ingestion.seed = seed;
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    config.apply_env_overrides()?;
    cli.apply(&mut config);
    config.validate()?;

    let run_stamp = new_run_stamp();
    let (log_path, _guard) =
        logging::init_logging(&config.logging, &run_stamp).context("failed to initialize logging")?;
    info!("Logging to {}", log_path.display());

    if config.metrics.enabled {
        metrics::init();
    }

    let pipeline = Pipeline::new(config);
    let result = pipeline.run_with_stamp(&run_stamp);

    if pipeline.config().metrics.enabled {
        match metrics::write_snapshot(&pipeline.config().output.dir, &run_stamp) {
            Ok(Some(path)) => info!("Metrics snapshot saved to {}", path.display()),
            Ok(None) => {}
            Err(e) => warn!("Failed to write metrics snapshot: {}", e),
        }
    }

    let summary = result.context("pipeline aborted")?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Pipeline run {} ({})", summary.run_id, summary.run_stamp);
    for timing in &summary.timings {
        println!(
            "   {:<15} {:>8.3}s  {:>7} rows",
            timing.stage,
            timing.elapsed.as_secs_f64(),
            timing.rows
        );
    }
    println!("   Raw records: {}", summary.raw_rows);
    println!("   Processed: {}", summary.transformed_rows);
    println!("   Dropped: {}", summary.drops.total());
    for (reason, count) in &summary.drops.counts {
        println!("     - {}: {}", reason.as_str(), count);
    }
    println!("   Data quality: {}", summary.validation_status);
    println!("   Artifacts written: {}", summary.artifacts.len());
    for artifact in &summary.artifacts {
        println!("     - {}", artifact.path.display());
    }

    if summary.status == RunStatus::PartialSuccess {
        println!("\n⚠️  {} artifacts failed:", summary.failures.len());
        for failure in &summary.failures {
            println!("   - {}", failure);
        }
    }
    println!(
        "\n{} Finished with status {} in {:.2}s",
        if summary.status == RunStatus::Success { "✅" } else { "⚠️" },
        summary.status.as_str(),
        summary.total_elapsed().as_secs_f64()
    );
}
