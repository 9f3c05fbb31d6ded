// Pipeline ingestion: CSV loading with schema checks, or a synthetic dataset

pub mod synthetic;

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::IngestionConfig;
use crate::constants::REQUIRED_COLUMNS;
use crate::domain::{RawDataset, RawTransaction};
use crate::error::IngestionError;

pub use synthetic::{generate, GeneratedDataset, InjectionSummary};

/// Where a raw dataset came from
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Parsed from an existing file
    File(PathBuf),
    /// Synthesized because no input existed
    Generated {
        injected: InjectionSummary,
        persisted_to: Option<PathBuf>,
    },
}

/// The raw dataset plus its provenance
#[derive(Debug, Clone)]
pub struct IngestedDataset {
    pub records: RawDataset,
    pub source: DataSource,
}

/// Trait for producing the raw dataset at the start of a run
pub trait Ingestor {
    /// Load `path` when it exists, otherwise synthesize a dataset
    fn ingest(&self, path: Option<&Path>) -> Result<IngestedDataset, IngestionError>;
}

/// Default ingestor: CSV files on disk, seeded synthetic data as fallback
pub struct CsvIngestor {
    pub config: IngestionConfig,
}

impl CsvIngestor {
    pub fn new(config: IngestionConfig) -> Self {
        Self { config }
    }

    /// Parse a CSV file carrying the fixed column set. The first malformed
    /// record aborts the load; nothing partial is returned.
    pub fn load_csv(&self, path: &Path) -> Result<RawDataset, IngestionError> {
        let file = File::open(path).map_err(|source| IngestionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = rdr.headers().map_err(|e| malformed(path, e.to_string()))?.clone();
        let header_names: Vec<&str> = headers.iter().collect();
        validate_schema(&header_names, &REQUIRED_COLUMNS)?;

        let mut records = Vec::new();
        for (index, result) in rdr.deserialize::<RawTransaction>().enumerate() {
            let record = result.map_err(|e| malformed(path, format!("record {}: {}", index + 1, e)))?;
            records.push(record);
        }
        Ok(records)
    }

    fn persist(&self, records: &[RawTransaction], path: &Path) -> Result<(), IngestionError> {
        let generate_err = |message: String| IngestionError::Generate {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| generate_err(e.to_string()))?;
        }
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| generate_err(e.to_string()))?;
        // Header written explicitly so an empty dataset still reloads
        wtr.write_record(REQUIRED_COLUMNS)
            .map_err(|e| generate_err(e.to_string()))?;
        for record in records {
            wtr.serialize(record).map_err(|e| generate_err(e.to_string()))?;
        }
        wtr.flush().map_err(|e| generate_err(e.to_string()))?;
        Ok(())
    }
}

impl Ingestor for CsvIngestor {
    fn ingest(&self, path: Option<&Path>) -> Result<IngestedDataset, IngestionError> {
        if let Some(path) = path {
            if path.exists() {
                info!("📥 Loading data from {}", path.display());
                let records = self.load_csv(path).inspect_err(|e| error!("Error loading data: {}", e))?;
                info!("Loaded {} records from {}", records.len(), path.display());
                return Ok(IngestedDataset {
                    records,
                    source: DataSource::File(path.to_path_buf()),
                });
            }
            warn!("File not found: {}", path.display());
        }

        info!("🎲 Generating {} synthetic transactions (seed {})", self.config.synthetic_records, self.config.seed);
        let GeneratedDataset { records, injected } = generate(&self.config);
        info!(
            "Generated {} records ({} missing customer ids, {} duplicate ids, {} invalid quantities)",
            records.len(),
            injected.missing_customer_ids,
            injected.duplicate_ids,
            injected.invalid_quantities
        );

        let persisted_to = match path {
            Some(path) if self.config.persist_generated => {
                self.persist(&records, path)?;
                info!("Sample data saved to {}", path.display());
                Some(path.to_path_buf())
            }
            _ => None,
        };

        Ok(IngestedDataset {
            records,
            source: DataSource::Generated { injected, persisted_to },
        })
    }
}

/// Fail with a schema error naming every required column absent from `headers`
pub fn validate_schema(headers: &[&str], required: &[&str]) -> Result<(), IngestionError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.contains(col))
        .map(|col| col.to_string())
        .collect();

    if !missing.is_empty() {
        let err = IngestionError::Schema { missing };
        error!("{}", err);
        return Err(err);
    }

    info!("Schema validation passed");
    Ok(())
}

fn malformed(path: &Path, message: String) -> IngestionError {
    IngestionError::Malformed {
        path: path.to_path_buf(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const HEADER: &str = "transaction_id,timestamp,customer_id,product_id,product_category,quantity,unit_price,total_amount,region,payment_method,discount_applied";

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn create_test_ingestor(records: usize) -> CsvIngestor {
        CsvIngestor::new(IngestionConfig {
            synthetic_records: records,
            ..IngestionConfig::default()
        })
    }

    #[test]
    fn test_loads_csv_with_missing_and_invalid_values() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "transactions.csv",
            &format!(
                "{}\nTXN-1,2023-01-01 10:00:00,CUST-1,PROD-1,Food,2,10.00,20.00,North,Cash,0\nTXN-2,2023-01-01 11:00:00,,PROD-2,Home,abc,5.00,,South,Mobile,0.1\n",
                HEADER
            ),
        );

        let ingested = create_test_ingestor(0).ingest(Some(&path)).unwrap();
        assert_eq!(ingested.source, DataSource::File(path));
        assert_eq!(ingested.records.len(), 2);

        let second = &ingested.records[1];
        assert_eq!(second.customer_id, None);
        assert_eq!(second.quantity.as_deref(), Some("abc"));
        assert_eq!(second.total_amount, None);
        assert_eq!(second.unit_cost, None);
    }

    #[test]
    fn test_missing_columns_is_schema_error() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "bad.csv", "transaction_id,timestamp\nTXN-1,2023-01-01\n");

        let err = create_test_ingestor(0).ingest(Some(&path)).unwrap_err();
        match err {
            IngestionError::Schema { missing } => {
                assert_eq!(missing.len(), 9);
                assert!(missing.contains(&"customer_id".to_string()));
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "ragged.csv", &format!("{}\nTXN-1,2023-01-01\n", HEADER));

        let err = create_test_ingestor(0).ingest(Some(&path)).unwrap_err();
        assert!(matches!(err, IngestionError::Malformed { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.csv");
        let mut contents = format!("{}\nTXN-1,2023-01-01 10:00:00,CUST-", HEADER).into_bytes();
        contents.push(0xff);
        contents.extend_from_slice(b"1,PROD-1,Food,2,10.00,20.00,North,Cash,0\n");
        std::fs::write(&path, contents).unwrap();

        let err = create_test_ingestor(0).ingest(Some(&path)).unwrap_err();
        assert!(matches!(err, IngestionError::Malformed { .. }));
    }

    #[test]
    fn test_header_only_file_is_empty_dataset() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "empty.csv", &format!("{}\n", HEADER));

        let ingested = create_test_ingestor(0).ingest(Some(&path)).unwrap();
        assert!(ingested.records.is_empty());
    }

    #[test]
    fn test_missing_file_generates_and_persists_reloadable_dataset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw").join("transactions.csv");
        let ingestor = create_test_ingestor(200);

        let generated = ingestor.ingest(Some(&path)).unwrap();
        assert_eq!(generated.records.len(), 200);
        assert!(matches!(
            generated.source,
            DataSource::Generated { persisted_to: Some(_), .. }
        ));

        let reloaded = ingestor.ingest(Some(&path)).unwrap();
        assert_eq!(reloaded.source, DataSource::File(path));
        assert_eq!(reloaded.records, generated.records);
    }

    #[test]
    fn test_no_path_generates_without_persisting() {
        let ingested = create_test_ingestor(50).ingest(None).unwrap();
        assert_eq!(ingested.records.len(), 50);
        assert!(matches!(
            ingested.source,
            DataSource::Generated { persisted_to: None, .. }
        ));
    }

    #[test]
    fn test_validate_schema_accepts_extra_columns() {
        let mut headers: Vec<&str> = REQUIRED_COLUMNS.to_vec();
        headers.push("unit_cost");
        headers.push("store_id");
        assert!(validate_schema(&headers, &REQUIRED_COLUMNS).is_ok());
    }
}
