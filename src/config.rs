use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{UNKNOWN_LABEL, UNKNOWN_PRODUCT_ID};
use crate::error::{PipelineError, Result};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";

/// Complete pipeline configuration; every section falls back to its defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingestion: IngestionConfig,
    pub transformation: TransformationConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// CSV file to load; synthesized when absent
    pub input_path: PathBuf,
    /// Number of rows to synthesize when no input exists
    pub synthetic_records: usize,
    /// RNG seed for the synthetic dataset
    pub seed: u64,
    /// First synthetic timestamp; rows are spaced one hour apart
    pub start_timestamp: NaiveDateTime,
    /// Fraction of synthetic rows with the customer id removed
    pub missing_rate: f64,
    /// Fraction of synthetic rows that reuse another row's transaction id
    pub duplicate_rate: f64,
    /// Fraction of synthetic rows with a negative quantity
    pub invalid_quantity_rate: f64,
    /// Write the synthetic dataset to `input_path` so later runs reload it
    pub persist_generated: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/raw/transactions.csv"),
            synthetic_records: 10_000,
            seed: 42,
            start_timestamp: chrono::NaiveDate::from_ymd_opt(2023, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(NaiveDateTime::MIN),
            missing_rate: 0.02,
            duplicate_rate: 0.01,
            invalid_quantity_rate: 0.0,
            persist_generated: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
    /// Replacement for a missing product id
    pub unknown_product_id: String,
    /// Replacement for missing category, region and payment method
    pub unknown_label: String,
    /// Drop later rows that repeat an earlier transaction id
    pub deduplicate: bool,
}

impl Default for TransformationConfig {
    fn default() -> Self {
        Self {
            unknown_product_id: UNKNOWN_PRODUCT_ID.to_string(),
            unknown_label: UNKNOWN_LABEL.to_string(),
            deduplicate: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Highest tolerated fraction of missing values in any required column
    pub completeness_tolerance: f64,
    /// Absolute tolerance when reconciling totals (currency units)
    pub consistency_abs_tolerance: f64,
    /// Relative tolerance when reconciling totals
    pub consistency_rel_tolerance: f64,
    /// Largest quantity considered realistic
    pub max_quantity: i64,
    /// Largest unit price considered realistic
    pub max_unit_price: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            completeness_tolerance: 0.0,
            consistency_abs_tolerance: 0.01,
            consistency_rel_tolerance: 0.001,
            max_quantity: 1000,
            max_unit_price: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving every artifact of a run
    pub dir: PathBuf,
    /// Maximum processed rows copied into the workbook
    pub workbook_row_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/processed"),
            workbook_row_limit: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving the per-run log file
    pub dir: PathBuf,
    /// Filter used when RUST_LOG is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            default_filter: "txn_pipeline=info,info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and write a snapshot after each run
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PipelineConfig {
    /// Load configuration: explicit file, else `pipeline.toml` if present, else defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::load_from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `PIPELINE_*` environment overrides on top of the loaded values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(input) = std::env::var("PIPELINE_INPUT") {
            self.ingestion.input_path = PathBuf::from(input);
        }
        if let Ok(dir) = std::env::var("PIPELINE_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Ok(records) = std::env::var("PIPELINE_RECORDS") {
            self.ingestion.synthetic_records = records.parse().map_err(|_| {
                PipelineError::Config(format!("PIPELINE_RECORDS is not a count: {}", records))
            })?;
        }
        if let Ok(seed) = std::env::var("PIPELINE_SEED") {
            self.ingestion.seed = seed
                .parse()
                .map_err(|_| PipelineError::Config(format!("PIPELINE_SEED is not a number: {}", seed)))?;
        }
        Ok(())
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("ingestion.missing_rate", self.ingestion.missing_rate),
            ("ingestion.duplicate_rate", self.ingestion.duplicate_rate),
            ("ingestion.invalid_quantity_rate", self.ingestion.invalid_quantity_rate),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(PipelineError::Config(format!("{} must be within [0, 1], got {}", name, rate)));
            }
        }
        let injected = self.ingestion.missing_rate
            + self.ingestion.duplicate_rate
            + self.ingestion.invalid_quantity_rate;
        if injected >= 1.0 {
            return Err(PipelineError::Config(
                "injected missing, duplicate and invalid rates must leave clean rows".to_string(),
            ));
        }
        let v = &self.validation;
        if v.completeness_tolerance < 0.0 || v.consistency_abs_tolerance < 0.0 || v.consistency_rel_tolerance < 0.0 {
            return Err(PipelineError::Config("validation tolerances must be non-negative".to_string()));
        }
        if v.max_quantity <= 0 || v.max_unit_price < 0.0 {
            return Err(PipelineError::Config("validation bounds must be positive".to_string()));
        }
        Ok(())
    }
}
