#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! GMO Coin FX Client - Resilient Stream Subscriptions
//!
//! A client for the GMO Coin foreign-exchange API. The core keeps public
//! and private WebSocket channel subscriptions alive across disconnects,
//! replaying every registered subscription on each new connection and
//! routing inbound frames to per-channel callbacks.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming types with no transport knowledge
//!   - `streaming`: Frames, callbacks, access tokens, run state
//!   - `subscription`: Channels, stream types, the subscription registry
//!
//! - **Application**: Port definitions
//!   - `ports`: Interfaces for duplex transports and token lifecycle
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `gmo`: REST client, WebSocket session, supervisor, dispatcher
//!   - `config`: Environment-driven configuration
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber setup
//!
//! # Data Flow
//!
//! ```text
//!                 ┌────────────┐  token   ┌──────────────┐
//!                 │ PrivateApi │◄────────►│  Supervisor  │ (private)
//!                 └────────────┘          └──────┬───────┘
//!                                                │ session per attempt
//! GMO public WS ──► Session ──► Dispatcher ──► callbacks
//! GMO private WS ─► Session ──► Dispatcher ──► callbacks
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{AccessToken, Callback, CallbackError, Frame, RunState};
pub use domain::subscription::{Channel, StreamType, Subscription, SubscriptionRegistry};

// Ports
pub use application::ports::{
    Connector, FrameTransport, InboundFrame, TokenError, TokenProvider, TransportError,
};

// Infrastructure config
pub use infrastructure::config::{
    ClientConfig, ConfigError, Credentials, RateLimitSettings, RestSettings, StreamSettings,
};

// Streaming client
pub use infrastructure::gmo::client::{
    DEFAULT_POSITION_SUMMARY_OPTION, StreamClient, StreamClientBuilder, StreamClientError,
};
pub use infrastructure::gmo::session::WebSocketConnector;
pub use infrastructure::gmo::supervisor::{ErrorCallback, StreamError};

// REST clients
pub use infrastructure::gmo::error::{GmoError, ValidationError};
pub use infrastructure::gmo::private_api::PrivateApi;
pub use infrastructure::gmo::public_api::PublicApi;
pub use infrastructure::gmo::rate_limit::RateLimits;

// Stream message types
pub use infrastructure::gmo::messages::{
    ExecutionEvent, OrderEvent, PositionEvent, PositionSummaryEvent, TickerMessage,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, init as init_telemetry};
