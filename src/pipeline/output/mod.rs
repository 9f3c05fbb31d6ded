// Pipeline output: CSV views, JSON quality report, summary statistics and the workbook

pub mod stats;

use rust_xlsxwriter::{Workbook, XlsxError};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::OutputConfig;
use crate::constants::sheet_name;
use crate::domain::Transaction;
use crate::error::OutputError;
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::AggregationViews;
use crate::pipeline::processing::quality_gate::ValidationReport;
use crate::table::{transaction_numeric_hint, Cell, Table};

pub const PROCESSED_TRANSACTIONS: &str = "processed_transactions";
pub const VALIDATION_REPORT: &str = "validation_report";
pub const ANALYTICS_REPORT: &str = "analytics_report";
pub const PROCESSED_SHEET: &str = "Processed_Data";

/// Data rows available on one worksheet below the header row
const SHEET_MAX_DATA_ROWS: usize = 1_048_575;

/// Longest text a worksheet cell holds
const CELL_MAX_CHARS: usize = 32_767;

/// A persisted artifact
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Artifact stem, e.g. `daily_summary`
    pub name: String,
    pub path: PathBuf,
    /// Data rows written (JSON reports count their checks)
    pub rows: usize,
    /// Hex SHA-256 of the bytes on disk
    pub sha256: String,
}

/// What the output stage managed to persist
#[derive(Debug, Default)]
pub struct OutputReport {
    pub written: Vec<Artifact>,
    pub failures: Vec<OutputError>,
}

impl OutputReport {
    /// True when no artifact write failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.written.iter().find(|a| a.name == name)
    }

    fn record(&mut self, result: Result<Artifact, OutputError>) {
        match result {
            Ok(artifact) => {
                info!(
                    "💾 Saved {} ({} rows, sha256 {})",
                    artifact.path.display(),
                    artifact.rows,
                    &artifact.sha256[..12]
                );
                metrics::output::artifact_written();
                self.written.push(artifact);
            }
            Err(e) => {
                error!("Failed to write artifact: {}", e);
                metrics::output::artifact_failed();
                self.failures.push(e);
            }
        }
    }
}

/// Everything the output stage persists from one run
pub struct OutputBundle<'a> {
    pub processed: &'a [Transaction],
    pub validation: &'a ValidationReport,
    pub views: &'a AggregationViews,
}

/// Trait for persisting a run's results
pub trait ArtifactWriter {
    /// Write every artifact independently; failures are collected, not returned early
    fn write_artifacts(&self, bundle: &OutputBundle<'_>, run_stamp: &str) -> OutputReport;
}

/// Writes all artifacts as files under the configured output directory
pub struct FileArtifactWriter {
    pub config: OutputConfig,
}

impl FileArtifactWriter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    fn path_for(&self, name: &str, run_stamp: &str, extension: &str) -> PathBuf {
        self.config.dir.join(format!("{}_{}.{}", name, run_stamp, extension))
    }

    fn write_table_csv(&self, table: &Table, run_stamp: &str) -> Result<Artifact, OutputError> {
        let path = self.path_for(&table.name, run_stamp, "csv");
        let label = file_label(&path);
        let bytes = encode_csv(table).map_err(|source| OutputError::Csv {
            artifact: label.clone(),
            source,
        })?;
        persist(&table.name, &path, &bytes, table.row_count())
    }

    fn write_validation_report(&self, report: &ValidationReport, run_stamp: &str) -> Result<Artifact, OutputError> {
        let path = self.path_for(VALIDATION_REPORT, run_stamp, "json");
        let bytes = serde_json::to_vec_pretty(report).map_err(|source| OutputError::Json {
            artifact: file_label(&path),
            source,
        })?;
        persist(VALIDATION_REPORT, &path, &bytes, report.checks().len())
    }

    fn write_workbook(&self, processed: &Table, views: &[Table], run_stamp: &str) -> Result<Artifact, OutputError> {
        let path = self.path_for(ANALYTICS_REPORT, run_stamp, "xlsx");
        let workbook_err = |source: XlsxError| OutputError::Workbook {
            artifact: file_label(&path),
            source,
        };

        let mut workbook = Workbook::new();
        let limit = self.config.workbook_row_limit.min(SHEET_MAX_DATA_ROWS);
        if processed.row_count() > limit {
            info!(
                "Processed sheet truncated to {} of {} rows",
                limit,
                processed.row_count()
            );
        }
        let mut rows = add_sheet(&mut workbook, PROCESSED_SHEET, processed, limit).map_err(workbook_err)?;
        for table in views {
            rows += add_sheet(&mut workbook, &sheet_name(&table.name), table, SHEET_MAX_DATA_ROWS)
                .map_err(workbook_err)?;
        }
        let bytes = workbook.save_to_buffer().map_err(workbook_err)?;
        persist(ANALYTICS_REPORT, &path, &bytes, rows)
    }
}

impl ArtifactWriter for FileArtifactWriter {
    fn write_artifacts(&self, bundle: &OutputBundle<'_>, run_stamp: &str) -> OutputReport {
        info!("📁 Writing artifacts to {}", self.config.dir.display());
        let mut report = OutputReport::default();

        let processed = Table::from_rows(PROCESSED_TRANSACTIONS, bundle.processed);
        let views = bundle.views.tables();

        report.record(self.write_table_csv(&processed, run_stamp));
        for table in &views {
            report.record(self.write_table_csv(table, run_stamp));
        }
        report.record(self.write_validation_report(bundle.validation, run_stamp));

        let summary = stats::describe(&processed, &transaction_numeric_hint());
        report.record(self.write_table_csv(&summary, run_stamp));

        report.record(self.write_workbook(&processed, &views, run_stamp));

        info!(
            "Output complete: {} written, {} failed",
            report.written.len(),
            report.failures.len()
        );
        report
    }
}

fn encode_csv(table: &Table) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&table.headers)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(Cell::render))?;
    }
    wtr.into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))
}

/// Write one sheet (header plus at most `limit` rows); returns data rows written
fn add_sheet(workbook: &mut Workbook, name: &str, table: &Table, limit: usize) -> Result<usize, XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string(0, col as u16, header.as_str())?;
    }

    let mut written = 0;
    let mut truncated = 0;
    for (index, row) in table.rows.iter().take(limit).enumerate() {
        let r = (index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Text(s) => {
                    let text = match s.char_indices().nth(CELL_MAX_CHARS) {
                        Some((end, _)) => {
                            truncated += 1;
                            &s[..end]
                        }
                        None => s.as_str(),
                    };
                    sheet.write_string(r, c, text)?;
                }
                Cell::Int(v) => {
                    sheet.write_number(r, c, *v as f64)?;
                }
                Cell::Number(v) if v.is_finite() => {
                    sheet.write_number(r, c, *v)?;
                }
                Cell::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Cell::Number(_) | Cell::Empty => {}
            }
        }
        written += 1;
    }
    if truncated > 0 {
        warn!("{} cells on sheet {} truncated to {} characters", truncated, name, CELL_MAX_CHARS);
    }
    Ok(written)
}

/// Write bytes to `path` and record their checksum
fn persist(name: &str, path: &Path, bytes: &[u8], rows: usize) -> Result<Artifact, OutputError> {
    let io_err = |source: std::io::Error| OutputError::Io {
        artifact: file_label(path),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, bytes).map_err(io_err)?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(Artifact {
        name: name.to_string(),
        path: path.to_path_buf(),
        rows,
        sha256: hex::encode(hasher.finalize()),
    })
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
