// Observability: metrics recorded alongside the tracing logs

pub mod metrics;
