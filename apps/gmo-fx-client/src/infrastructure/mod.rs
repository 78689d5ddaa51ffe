//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loaded from the environment.
pub mod config;

/// GMO Coin FX REST and WebSocket adapters.
pub mod gmo;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber setup.
pub mod telemetry;
