//! Pipeline metrics recorded through the `metrics` facade.
//!
//! A batch run is short-lived, so instead of exposing an HTTP endpoint the
//! Prometheus recorder is installed in-process and its rendered snapshot is
//! written next to the run's artifacts.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Every metric name emitted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    StageDuration,
    StageRows,
    RowsDropped,
    ChecksPassed,
    ChecksFailed,
    ViewRows,
    ArtifactsWritten,
    ArtifactsFailed,
    RunsCompleted,
    RunsAborted,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::StageDuration => "txn_pipeline_stage_duration_seconds",
            MetricName::StageRows => "txn_pipeline_stage_rows",
            MetricName::RowsDropped => "txn_pipeline_rows_dropped_total",
            MetricName::ChecksPassed => "txn_pipeline_checks_passed_total",
            MetricName::ChecksFailed => "txn_pipeline_checks_failed_total",
            MetricName::ViewRows => "txn_pipeline_view_rows",
            MetricName::ArtifactsWritten => "txn_pipeline_artifacts_written_total",
            MetricName::ArtifactsFailed => "txn_pipeline_artifacts_failed_total",
            MetricName::RunsCompleted => "txn_pipeline_runs_completed_total",
            MetricName::RunsAborted => "txn_pipeline_runs_aborted_total",
        }
    }
}

/// Install the in-process Prometheus recorder. Idempotent.
pub fn init() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Prometheus recorder installed (snapshot written after each run)");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    }
}

/// Rendered exposition text, when the recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

/// Write the current snapshot as `pipeline_metrics_<stamp>.prom` under `dir`
pub fn write_snapshot(dir: &Path, run_stamp: &str) -> std::io::Result<Option<PathBuf>> {
    let Some(text) = render() else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("pipeline_metrics_{}.prom", run_stamp));
    std::fs::write(&path, text)?;
    Ok(Some(path))
}

// ============================================================================
// Stage metrics
// ============================================================================

pub mod stage {
    use super::MetricName;

    pub fn duration(stage: &'static str, secs: f64) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
    }

    pub fn rows(stage: &'static str, rows: usize) {
        ::metrics::gauge!(MetricName::StageRows.as_str(), "stage" => stage).set(rows as f64);
    }
}

pub mod transformation {
    use super::MetricName;

    pub fn rows_dropped(reason: &'static str, count: usize) {
        ::metrics::counter!(MetricName::RowsDropped.as_str(), "reason" => reason).increment(count as u64);
    }
}

pub mod validation {
    use super::MetricName;

    pub fn check_outcome(check: &'static str, passed: bool) {
        let name = if passed {
            MetricName::ChecksPassed
        } else {
            MetricName::ChecksFailed
        };
        ::metrics::counter!(name.as_str(), "check" => check).increment(1);
    }
}

pub mod aggregation {
    use super::MetricName;

    pub fn view_rows(view: &'static str, rows: usize) {
        ::metrics::gauge!(MetricName::ViewRows.as_str(), "view" => view).set(rows as f64);
    }
}

pub mod output {
    use super::MetricName;

    pub fn artifact_written() {
        ::metrics::counter!(MetricName::ArtifactsWritten.as_str()).increment(1);
    }

    pub fn artifact_failed() {
        ::metrics::counter!(MetricName::ArtifactsFailed.as_str()).increment(1);
    }
}

pub mod run {
    use super::MetricName;

    pub fn completed() {
        ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
    }

    pub fn aborted() {
        ::metrics::counter!(MetricName::RunsAborted.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed_and_unique() {
        let all = [
            MetricName::StageDuration,
            MetricName::StageRows,
            MetricName::RowsDropped,
            MetricName::ChecksPassed,
            MetricName::ChecksFailed,
            MetricName::ViewRows,
            MetricName::ArtifactsWritten,
            MetricName::ArtifactsFailed,
            MetricName::RunsCompleted,
            MetricName::RunsAborted,
        ];
        let names: std::collections::HashSet<_> = all.iter().map(|m| m.as_str()).collect();
        assert_eq!(names.len(), all.len());
        assert!(names.iter().all(|n| n.starts_with("txn_pipeline_")));
    }

    #[test]
    fn test_recording_without_recorder_is_a_noop() {
        stage::rows("ingestion", 10);
        transformation::rows_dropped("missing_identifier", 3);
        validation::check_outcome("uniqueness", false);
    }
}
