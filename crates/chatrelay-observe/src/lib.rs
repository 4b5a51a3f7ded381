//! Observability setup for the chat relay: structured logging and an
//! optional OpenTelemetry bridge.

pub mod tracing_setup;
