// Pipeline processing: cleaning, quality checks, and aggregation views

pub mod aggregate;
pub mod quality_gate;
pub mod transform;
