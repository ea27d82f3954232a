//! # Observability
//!
//! Prometheus metrics for the operator. Tracing is configured once at startup in
//! `runtime::initialization`.

pub mod metrics;

pub use metrics::*;
