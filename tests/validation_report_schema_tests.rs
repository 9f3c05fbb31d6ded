use anyhow::Result;
use jsonschema::JSONSchema;
use serde_json::json;
use tempfile::tempdir;

use txn_pipeline::config::{IngestionConfig, OutputConfig, PipelineConfig};
use txn_pipeline::pipeline::Pipeline;

fn compiled_schema() -> JSONSchema {
    let schema = include_str!("../schemas/validation_report.v1.json");
    let schema_json: serde_json::Value = serde_json::from_str(schema).unwrap();
    let schema_static: &'static serde_json::Value = Box::leak(Box::new(schema_json));
    JSONSchema::options().compile(schema_static).unwrap()
}

fn written_report(records: usize) -> Result<serde_json::Value> {
    let temp_dir = tempdir()?;
    let stamp = "20240101_101010";
    let config = PipelineConfig {
        ingestion: IngestionConfig {
            input_path: temp_dir.path().join("transactions.csv"),
            synthetic_records: records,
            ..IngestionConfig::default()
        },
        output: OutputConfig {
            dir: temp_dir.path().join("out"),
            ..OutputConfig::default()
        },
        ..PipelineConfig::default()
    };
    Pipeline::new(config).run_with_stamp(stamp)?;

    let path = temp_dir.path().join("out").join(format!("validation_report_{}.json", stamp));
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[test]
fn written_report_is_valid() -> Result<()> {
    let compiled = compiled_schema();
    let report = written_report(500)?;
    assert!(compiled.is_valid(&report));
    Ok(())
}

#[test]
fn empty_dataset_report_is_valid() -> Result<()> {
    let compiled = compiled_schema();
    let report = written_report(0)?;
    assert!(compiled.is_valid(&report));
    assert_eq!(report["overall_passed"], true);
    Ok(())
}

#[test]
fn unknown_status_is_rejected() -> Result<()> {
    let compiled = compiled_schema();
    let mut report = written_report(50)?;
    report["overall_status"] = json!("MOSTLY_FINE");
    assert!(!compiled.is_valid(&report), "status enum should fail");
    Ok(())
}

#[test]
fn missing_check_is_rejected() -> Result<()> {
    let compiled = compiled_schema();
    let mut report = written_report(50)?;
    if let Some(checks) = report["checks"].as_object_mut() {
        checks.remove("accuracy");
    }
    assert!(!compiled.is_valid(&report), "all four checks are required");
    Ok(())
}
