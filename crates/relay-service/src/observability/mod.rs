//! Observability for the relay: health probes and Prometheus metrics.
//!
//! Instrumentation never records ticket candidates or payload bodies, only
//! their lengths.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
