// Data processing pipeline: ingestion, processing, output, and the orchestrator that runs them

pub mod ingestion;
pub mod orchestrator;
pub mod output;
pub mod processing;

pub use orchestrator::{new_run_stamp, Pipeline, RunStatus, RunSummary};
