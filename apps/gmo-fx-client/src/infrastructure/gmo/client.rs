//! Streaming Client
//!
//! The caller-facing surface of the streaming core. Register channel
//! callbacks, then [`start`](StreamClient::start) spawns one supervised loop
//! per stream that has subscriptions; [`close`](StreamClient::close) stops
//! them and waits until no background work remains.
//!
//! ```ignore
//! let client = StreamClient::builder(StreamSettings::default())
//!     .credentials(credentials)
//!     .on_error(|e| tracing::warn!(error = %e, "stream error"))
//!     .build()?;
//!
//! client.subscribe_ticker("USD_JPY", Callback::infallible(|frame| println!("{frame:?}")));
//! client.subscribe_orders(Callback::infallible(|frame| println!("{frame:?}")));
//! client.start()?;
//! // ...
//! client.close().await;
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dispatcher::MessageDispatcher;
use super::error::GmoError;
use super::private_api::PrivateApi;
use super::rate_limit::RateLimits;
use super::session::{ConnectionSession, WebSocketConnector};
use super::supervisor::{ErrorCallback, StreamAccess, StreamError, StreamSupervisor};
use crate::application::ports::{Connector, TokenProvider};
use crate::domain::streaming::{Callback, RunState};
use crate::domain::subscription::{Channel, StreamType, Subscription, SubscriptionRegistry};
use crate::infrastructure::config::{ClientConfig, Credentials, RestSettings, StreamSettings};

/// Option sent with `positionSummaryEvents` when none is given.
pub const DEFAULT_POSITION_SUMMARY_OPTION: &str = "PERIODIC";

// =============================================================================
// Error Type
// =============================================================================

/// Errors surfaced synchronously to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// Private channels are registered but no credentials or token provider was given.
    #[error("private stream subscriptions require API credentials")]
    MissingCredentials,

    /// `start` was called while the client is running.
    #[error("stream client is already running")]
    AlreadyRunning,

    /// `start` was called outside a Tokio runtime.
    #[error("stream client must be started inside a Tokio runtime")]
    NoRuntime,

    /// The token provider could not be built.
    #[error("failed to build REST client: {0}")]
    Rest(#[from] GmoError),
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`StreamClient`].
pub struct StreamClientBuilder {
    settings: StreamSettings,
    rest: RestSettings,
    rate_limits: RateLimits,
    credentials: Option<Credentials>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    connector: Option<Arc<dyn Connector>>,
    on_error: Option<ErrorCallback>,
}

impl StreamClientBuilder {
    /// Start from configuration: stream and REST settings, rate limits, and
    /// credentials if present.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = StreamClient::builder(config.stream.clone())
            .rest_settings(config.rest.clone())
            .rate_limits(RateLimits::new(
                config.rate_limits.get_per_second,
                config.rate_limits.post_per_second,
            ));
        builder.credentials = config.credentials.clone();
        builder
    }

    /// API credentials. Used to build the token provider when none is set.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// REST settings for the token endpoints.
    #[must_use]
    pub fn rest_settings(mut self, rest: RestSettings) -> Self {
        self.rest = rest;
        self
    }

    /// Rate limiters for the token endpoints. Share them with other API
    /// clients to throttle all calls jointly.
    #[must_use]
    pub fn rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = rate_limits;
        self
    }

    /// Custom token lifecycle implementation.
    #[must_use]
    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Custom transport.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Callback for recoverable stream errors.
    #[must_use]
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<StreamClient, StreamClientError> {
        let token_provider = match (self.token_provider, &self.credentials) {
            (Some(provider), _) => Some(provider),
            (None, Some(credentials)) => {
                let api = PrivateApi::new(&self.rest, credentials, self.rate_limits)?;
                Some(Arc::new(api) as Arc<dyn TokenProvider>)
            }
            (None, None) => None,
        };

        Ok(StreamClient {
            settings: self.settings,
            registry: Arc::new(SubscriptionRegistry::new()),
            run_state: Arc::new(RunState::new()),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(WebSocketConnector::new())),
            token_provider,
            on_error: self.on_error,
            running: Mutex::new(None),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

struct RunningStreams {
    cancel: CancellationToken,
    handles: Vec<(StreamType, JoinHandle<()>)>,
}

/// Resilient subscription client for the public and private streams.
pub struct StreamClient {
    settings: StreamSettings,
    registry: Arc<SubscriptionRegistry>,
    run_state: Arc<RunState>,
    connector: Arc<dyn Connector>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    on_error: Option<ErrorCallback>,
    running: Mutex<Option<RunningStreams>>,
}

impl StreamClient {
    /// Create a builder.
    #[must_use]
    pub fn builder(settings: StreamSettings) -> StreamClientBuilder {
        StreamClientBuilder {
            settings,
            rest: RestSettings::default(),
            rate_limits: RateLimits::default(),
            credentials: None,
            token_provider: None,
            connector: None,
            on_error: None,
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    fn register(&self, subscription: Subscription, callback: Callback) {
        let channel = subscription.channel();
        let added = self.registry.subscribe(subscription, callback);
        tracing::debug!(%channel, replaced = !added, "Subscription registered");
    }

    /// Subscribe to quotes for `symbol` on the public stream.
    ///
    /// Only one ticker subscription exists; a second call replaces the first.
    pub fn subscribe_ticker(&self, symbol: impl Into<String>, callback: Callback) {
        self.register(Subscription::new(Channel::Ticker).with_symbol(symbol), callback);
    }

    /// Subscribe to fills.
    pub fn subscribe_executions(&self, callback: Callback) {
        self.register(Subscription::new(Channel::ExecutionEvents), callback);
    }

    /// Subscribe to order state changes.
    pub fn subscribe_orders(&self, callback: Callback) {
        self.register(Subscription::new(Channel::OrderEvents), callback);
    }

    /// Subscribe to position changes.
    pub fn subscribe_positions(&self, callback: Callback) {
        self.register(Subscription::new(Channel::PositionEvents), callback);
    }

    /// Subscribe to position summaries. `None` selects `PERIODIC`.
    pub fn subscribe_position_summary(&self, callback: Callback, option: Option<&str>) {
        self.register(
            Subscription::new(Channel::PositionSummaryEvents)
                .with_option(option.unwrap_or(DEFAULT_POSITION_SUMMARY_OPTION)),
            callback,
        );
    }

    /// Get the subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Check whether the client is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    /// Start one background loop per stream with subscriptions.
    ///
    /// Fails before any network activity if private channels are registered
    /// without credentials.
    pub fn start(&self) -> Result<(), StreamClientError> {
        let needs_private = self.registry.has_subscriptions(StreamType::Private);
        if needs_private && self.token_provider.is_none() {
            return Err(StreamClientError::MissingCredentials);
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| StreamClientError::NoRuntime)?;

        let mut running = self.running.lock();
        if running.is_some() || !self.run_state.start() {
            return Err(StreamClientError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        for stream in [StreamType::Public, StreamType::Private] {
            if !self.registry.has_subscriptions(stream) {
                continue;
            }
            let access = match (stream, &self.token_provider) {
                (StreamType::Private, Some(provider)) => StreamAccess::Private(Arc::clone(provider)),
                (StreamType::Private, None) => continue,
                (StreamType::Public, _) => StreamAccess::Public,
            };
            let supervisor = self.supervisor(access);
            handles.push((stream, runtime.spawn(supervisor.run(cancel.child_token()))));
        }

        tracing::info!(streams = handles.len(), "Stream client started");
        *running = Some(RunningStreams { cancel, handles });
        Ok(())
    }

    fn supervisor(&self, access: StreamAccess) -> StreamSupervisor {
        let stream = access.stream();
        let dispatcher = MessageDispatcher::new(stream, Arc::clone(&self.registry));
        let session = ConnectionSession::new(
            stream,
            Arc::clone(&self.connector),
            dispatcher,
            self.settings.liveness_timeout,
        )
        .with_connect_timeout(self.settings.connect_timeout);
        StreamSupervisor::new(
            access,
            self.settings.clone(),
            session,
            Arc::clone(&self.registry),
            Arc::clone(&self.run_state),
        )
        .with_error_callback(self.on_error.clone())
    }

    /// Stop all loops and wait for them to finish. Never fails.
    ///
    /// Subscriptions are kept, so `start` may be called again.
    pub async fn close(&self) {
        self.run_state.stop();
        let running = self.running.lock().take();

        if let Some(RunningStreams { cancel, handles }) = running {
            cancel.cancel();
            for (stream, handle) in handles {
                if let Err(e) = handle.await {
                    tracing::error!(stream = %stream, error = %e, "Stream task ended abnormally");
                }
            }
        }

        tracing::info!("Stream client closed");
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.run_state.stop();
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("registry", &self.registry)
            .field("running", &self.is_running())
            .field("private_enabled", &self.token_provider.is_some())
            .finish_non_exhaustive()
    }
}
