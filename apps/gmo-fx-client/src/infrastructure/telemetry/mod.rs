//! Tracing Subscriber Setup
//!
//! Installs a `fmt` subscriber filtered by `RUST_LOG`, with quiet defaults
//! for the HTTP and WebSocket stacks.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: extra filter directives (e.g. `gmo_fx_client=debug`)
//! - `LOG_TARGETS`: set to "false" to hide event targets (default: true)
//!
//! Only the binary calls [`init`]. The library emits events and never
//! installs a subscriber.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Whether event targets are printed.
    pub with_target: bool,
    /// Whether ANSI colors are used.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            with_target: true,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let with_target = std::env::var("LOG_TARGETS")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);
        let ansi = std::env::var_os("NO_COLOR").is_none();

        Self { with_target, ansi }
    }
}

/// Initialize logging with configuration from the environment.
pub fn init() -> Result<(), TryInitError> {
    init_with_config(&TelemetryConfig::from_env())
}

/// Initialize logging with custom configuration.
///
/// Fails if a global subscriber is already installed.
#[allow(clippy::expect_used)]
pub fn init_with_config(config: &TelemetryConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "gmo_fx_client=info"
                .parse()
                .expect("static directive 'gmo_fx_client=info' is valid"),
        )
        .add_directive(
            "tungstenite=warn"
                .parse()
                .expect("static directive 'tungstenite=warn' is valid"),
        )
        .add_directive(
            "hyper=warn"
                .parse()
                .expect("static directive 'hyper=warn' is valid"),
        )
        .add_directive(
            "reqwest=warn"
                .parse()
                .expect("static directive 'reqwest=warn' is valid"),
        );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TelemetryConfig::default();
        assert!(config.with_target);
        assert!(config.ansi);
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = TelemetryConfig::default();
        let _ = init_with_config(&config);
        assert!(init_with_config(&config).is_err());
    }
}
