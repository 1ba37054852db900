//! Telemetry for the deployer services: structured logging through
//! [`tracing`] and a process wide Prometheus recorder.

pub mod metrics;
pub mod tracing;
