//! Telemetry
//!
//! Metrics for the token lifecycle. Logging goes through `tracing` directly.

pub mod metrics;

pub use metrics::{
    create_in_memory_metrics, no_op_metrics, InMemoryMetrics, MetricEntry, MetricLabels,
    NoOpMetrics, TokenMetrics,
};
