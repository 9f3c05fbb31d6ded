use chrono::{DateTime, Local, Utc};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::constants::RUN_STAMP_FORMAT;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::{CsvIngestor, DataSource, Ingestor};
use crate::pipeline::output::{Artifact, ArtifactWriter, FileArtifactWriter, OutputBundle};
use crate::pipeline::processing::aggregate::{Aggregator, DefaultAggregator};
use crate::pipeline::processing::quality_gate::{profile, DataValidator, Validator};
use crate::pipeline::processing::transform::{DefaultTransformer, DropReport, Transformer};

pub const STAGE_INGESTION: &str = "ingestion";
pub const STAGE_TRANSFORMATION: &str = "transformation";
pub const STAGE_VALIDATION: &str = "validation";
pub const STAGE_AGGREGATION: &str = "aggregation";
pub const STAGE_OUTPUT: &str = "output";

const STAGE_COUNT: usize = 5;

/// Final state of a run that was not aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every artifact was written
    Success,
    /// Some artifact writes failed
    PartialSuccess,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::PartialSuccess => "PARTIAL_SUCCESS",
        }
    }
}

/// Elapsed time and output rows of one stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed: Duration,
    pub rows: usize,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub run_stamp: String,
    pub started_at: DateTime<Utc>,
    pub source: DataSource,
    pub timings: Vec<StageTiming>,
    pub raw_rows: usize,
    pub transformed_rows: usize,
    pub drops: DropReport,
    pub validation_passed: bool,
    pub validation_status: &'static str,
    /// Row count per aggregation view
    pub view_rows: BTreeMap<String, usize>,
    pub artifacts: Vec<Artifact>,
    /// Human-readable artifact failures
    pub failures: Vec<String>,
    pub status: RunStatus,
}

impl RunSummary {
    pub fn total_elapsed(&self) -> Duration {
        self.timings.iter().map(|t| t.elapsed).sum()
    }

    pub fn timing(&self, stage: &str) -> Option<&StageTiming> {
        self.timings.iter().find(|t| t.stage == stage)
    }
}

/// Stamp shared by every artifact and the log file of one run
pub fn new_run_stamp() -> String {
    Local::now().format(RUN_STAMP_FORMAT).to_string()
}

/// Runs the five stages in order over one configuration
pub struct Pipeline {
    config: PipelineConfig,
    ingestor: Box<dyn Ingestor>,
    transformer: Box<dyn Transformer>,
    validator: Box<dyn Validator>,
    aggregator: Box<dyn Aggregator>,
    writer: Box<dyn ArtifactWriter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            ingestor: Box::new(CsvIngestor::new(config.ingestion.clone())),
            transformer: Box::new(DefaultTransformer::new(config.transformation.clone())),
            validator: Box::new(DataValidator::new(config.validation.clone())),
            aggregator: Box::new(DefaultAggregator),
            writer: Box::new(FileArtifactWriter::new(config.output.clone())),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run with a freshly generated stamp
    pub fn run(&self) -> Result<RunSummary> {
        self.run_with_stamp(&new_run_stamp())
    }

    /// Run all stages; ingestion and transformation failures abort, everything else is reported
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub fn run_with_stamp(&self, run_stamp: &str) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();
        let mut timings = Vec::with_capacity(STAGE_COUNT);

        info!("🚀 Starting pipeline run {} ({})", run_id, run_stamp);

        // Stage 1
        banner(1, "DATA INGESTION");
        let started = Instant::now();
        let input = Some(self.config.ingestion.input_path.as_path());
        let ingested = self.ingestor.ingest(input).map_err(|e| abort(STAGE_INGESTION, e.into()))?;
        timings.push(finish(STAGE_INGESTION, started, ingested.records.len()));

        // Stage 2
        banner(2, "DATA TRANSFORMATION");
        let started = Instant::now();
        let transformed = self
            .transformer
            .transform(&ingested.records)
            .map_err(|e| abort(STAGE_TRANSFORMATION, e.into()))?;
        timings.push(finish(STAGE_TRANSFORMATION, started, transformed.records.len()));
        let data = transformed.records.as_slice();

        // Stage 3
        banner(3, "DATA VALIDATION");
        let started = Instant::now();
        let report = self.validator.validate(data);
        for column in profile(data) {
            info!(
                column = %column.column,
                missing = column.missing,
                unique = column.unique,
                min = ?column.min,
                max = ?column.max,
                mean = ?column.mean,
                "Column profile"
            );
        }
        if !report.overall_passed() {
            warn!("Data quality checks failed; continuing with aggregation");
        }
        timings.push(finish(STAGE_VALIDATION, started, report.total_records()));

        // Stage 4
        banner(4, "DATA AGGREGATION");
        let started = Instant::now();
        let views = self.aggregator.aggregate(data);
        let view_rows: BTreeMap<String, usize> = views
            .tables()
            .iter()
            .map(|t| (t.name.clone(), t.row_count()))
            .collect();
        timings.push(finish(STAGE_AGGREGATION, started, view_rows.values().sum()));

        // Stage 5
        banner(5, "DATA OUTPUT");
        let started = Instant::now();
        let bundle = OutputBundle {
            processed: data,
            validation: &report,
            views: &views,
        };
        let output = self.writer.write_artifacts(&bundle, run_stamp);
        timings.push(finish(STAGE_OUTPUT, started, output.written.len()));

        let status = if output.is_complete() {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };

        let summary = RunSummary {
            run_id,
            run_stamp: run_stamp.to_string(),
            started_at,
            source: ingested.source,
            raw_rows: ingested.records.len(),
            transformed_rows: data.len(),
            drops: transformed.drops,
            validation_passed: report.overall_passed(),
            validation_status: report.overall_status(),
            view_rows,
            failures: output.failures.iter().map(ToString::to_string).collect(),
            artifacts: output.written,
            status,
            timings,
        };

        metrics::run::completed();
        info!(
            "✅ Pipeline finished with status {} in {:.2}s ({} raw, {} processed, {} dropped, quality {})",
            summary.status.as_str(),
            summary.total_elapsed().as_secs_f64(),
            summary.raw_rows,
            summary.transformed_rows,
            summary.drops.total(),
            summary.validation_status
        );
        Ok(summary)
    }
}

fn banner(stage: usize, title: &str) {
    info!("{}", "=".repeat(60));
    info!("STAGE {}/{}: {}", stage, STAGE_COUNT, title);
    info!("{}", "=".repeat(60));
}

fn finish(stage: &'static str, started: Instant, rows: usize) -> StageTiming {
    let elapsed = started.elapsed();
    info!("Stage {} completed in {:.3}s ({} rows)", stage, elapsed.as_secs_f64(), rows);
    metrics::stage::duration(stage, elapsed.as_secs_f64());
    metrics::stage::rows(stage, rows);
    StageTiming { stage, elapsed, rows }
}

fn abort(stage: &'static str, err: PipelineError) -> PipelineError {
    error!("Pipeline aborted during {}: {}", stage, err);
    metrics::run::aborted();
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngestionConfig, OutputConfig};
    use crate::error::IngestionError;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_config(dir: &std::path::Path, records: usize) -> PipelineConfig {
        PipelineConfig {
            ingestion: IngestionConfig {
                input_path: dir.join("raw").join("transactions.csv"),
                synthetic_records: records,
                ..IngestionConfig::default()
            },
            output: OutputConfig {
                dir: dir.join("processed"),
                ..OutputConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_run_records_every_stage() {
        let dir = tempdir().unwrap();
        let pipeline = Pipeline::new(create_test_config(dir.path(), 500));

        let summary = pipeline.run_with_stamp("20240101_000000").unwrap();
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.timings.len(), STAGE_COUNT);
        assert_eq!(summary.raw_rows, 500);
        assert_eq!(summary.transformed_rows + summary.drops.total(), 500);
        assert_eq!(summary.timing(STAGE_OUTPUT).unwrap().rows, 9);
        assert_eq!(summary.view_rows.len(), 5);
        assert!(summary.failures.is_empty());
        // Duplicate ids survive transformation, so uniqueness fails without changing the status
        assert!(!summary.validation_passed);
    }

    #[test]
    fn test_schema_error_aborts_run() {
        let dir = tempdir().unwrap();
        let config = create_test_config(dir.path(), 10);
        fs::create_dir_all(dir.path().join("raw")).unwrap();
        fs::write(&config.ingestion.input_path, "transaction_id,timestamp\nTXN-1,2023-01-01\n").unwrap();

        let err = Pipeline::new(config).run().unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion(IngestionError::Schema { .. })));
        assert!(!dir.path().join("processed").exists());
    }

    #[test]
    fn test_failed_artifact_makes_partial_success() {
        let dir = tempdir().unwrap();
        let stamp = "20240101_000001";
        let config = create_test_config(dir.path(), 100);
        fs::create_dir_all(config.output.dir.join(format!("daily_summary_{}.csv", stamp))).unwrap();

        let summary = Pipeline::new(config).run_with_stamp(stamp).unwrap();
        assert_eq!(summary.status, RunStatus::PartialSuccess);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.artifacts.len(), 8);
    }
}
