use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures while producing the raw dataset
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Schema error: missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Malformed input file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist generated dataset to {path}: {message}")]
    Generate { path: PathBuf, message: String },
}

/// Coercion failures the missing-value policy cannot absorb
#[derive(Error, Debug)]
pub enum TransformationError {
    #[error("Transaction {transaction_id}: derived column '{column}' is not finite")]
    NonFinite {
        transaction_id: String,
        column: &'static str,
    },
}

/// A single artifact write failure; collected, never fatal
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error writing {artifact}: {source}")]
    Io {
        artifact: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error writing {artifact}: {source}")]
    Csv {
        artifact: String,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error writing {artifact}: {source}")]
    Json {
        artifact: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Workbook error writing {artifact}: {source}")]
    Workbook {
        artifact: String,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

impl OutputError {
    /// Name of the artifact that failed to persist
    pub fn artifact(&self) -> &str {
        match self {
            OutputError::Io { artifact, .. }
            | OutputError::Csv { artifact, .. }
            | OutputError::Json { artifact, .. }
            | OutputError::Workbook { artifact, .. } => artifact,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
