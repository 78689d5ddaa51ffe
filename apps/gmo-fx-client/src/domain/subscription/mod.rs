//! Subscription Registry
//!
//! Holds the channel subscriptions a caller has requested together with the
//! callback for each channel. The registry outlives individual connections:
//! every (re)connect of a stream replays its subscribe commands from here.
//!
//! # Design
//!
//! - Subscriptions are unique by channel. Registering a channel again replaces
//!   its parameters and callback in place, keeping its original position.
//! - Subscribe commands are replayed in registration order.
//! - Registering never triggers network I/O; an open connection picks up the
//!   change on its next reconnect.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;

use super::streaming::Callback;

// =============================================================================
// Types
// =============================================================================

/// Connection category. Each stream has its own URL and lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Market data, no authentication required.
    Public,
    /// Account events, requires credentials and an access token.
    Private,
}

impl StreamType {
    /// Get the stream name used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named logical feed multiplexed over a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Latest ask/bid for a symbol.
    Ticker,
    /// Fills on the account.
    ExecutionEvents,
    /// Order state changes.
    OrderEvents,
    /// Position opens, changes, and closes.
    PositionEvents,
    /// Aggregated position summary.
    PositionSummaryEvents,
}

impl Channel {
    /// Get every channel.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Ticker,
            Self::ExecutionEvents,
            Self::OrderEvents,
            Self::PositionEvents,
            Self::PositionSummaryEvents,
        ]
    }

    /// Get the channel name as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::ExecutionEvents => "executionEvents",
            Self::OrderEvents => "orderEvents",
            Self::PositionEvents => "positionEvents",
            Self::PositionSummaryEvents => "positionSummaryEvents",
        }
    }

    /// Parse a wire channel name. Unknown names yield `None`.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == name)
    }

    /// Get the stream that carries this channel.
    #[must_use]
    pub const fn stream_type(&self) -> StreamType {
        match self {
            Self::Ticker => StreamType::Public,
            Self::ExecutionEvents
            | Self::OrderEvents
            | Self::PositionEvents
            | Self::PositionSummaryEvents => StreamType::Private,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical feed the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    channel: Channel,
    symbol: Option<String>,
    option: Option<String>,
}

impl Subscription {
    /// Create a subscription with no parameters.
    #[must_use]
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            symbol: None,
            option: None,
        }
    }

    /// Set the symbol parameter.
    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the option parameter.
    #[must_use]
    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    /// Get the channel.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Get the symbol parameter.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Get the option parameter.
    #[must_use]
    pub fn option(&self) -> Option<&str> {
        self.option.as_deref()
    }

    /// Get the stream that carries this subscription.
    #[must_use]
    pub const fn stream_type(&self) -> StreamType {
        self.channel.stream_type()
    }

    /// Build the subscribe command sent on every connect.
    #[must_use]
    pub fn to_command(&self) -> SubscribeCommand<'_> {
        SubscribeCommand {
            command: "subscribe",
            channel: self.channel.as_str(),
            symbol: self.symbol.as_deref(),
            option: self.option.as_deref(),
        }
    }
}

/// Outbound subscribe command.
///
/// Serializes as `{"command":"subscribe","channel":"...","symbol":"...","option":"..."}`
/// with absent parameters omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscribeCommand<'a> {
    /// Always `subscribe`.
    pub command: &'static str,
    /// Channel name.
    pub channel: &'a str,
    /// Symbol parameter, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<&'a str>,
    /// Option parameter, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<&'a str>,
}

// =============================================================================
// Subscription Registry
// =============================================================================

#[derive(Default)]
struct RegistryState {
    /// Subscriptions in registration order.
    subscriptions: Vec<Subscription>,
    callbacks: HashMap<Channel, Callback>,
}

/// Registered subscriptions and their callbacks.
///
/// Shared between the client (writer) and the stream loops and dispatcher
/// (readers). Reads take a snapshot so no lock is held across an await.
#[derive(Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription and its callback.
    ///
    /// Returns `true` when the channel was newly added, `false` when an
    /// existing registration for the channel was replaced.
    pub fn subscribe(&self, subscription: Subscription, callback: Callback) -> bool {
        let mut state = self.state.write();
        let channel = subscription.channel();
        state.callbacks.insert(channel, callback);

        if let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.channel() == channel)
        {
            *existing = subscription;
            false
        } else {
            state.subscriptions.push(subscription);
            true
        }
    }

    /// Snapshot the subscriptions for one stream, in registration order.
    #[must_use]
    pub fn subscriptions(&self, stream: StreamType) -> Vec<Subscription> {
        self.state
            .read()
            .subscriptions
            .iter()
            .filter(|s| s.stream_type() == stream)
            .cloned()
            .collect()
    }

    /// Check whether a stream has at least one subscription.
    #[must_use]
    pub fn has_subscriptions(&self, stream: StreamType) -> bool {
        self.state
            .read()
            .subscriptions
            .iter()
            .any(|s| s.stream_type() == stream)
    }

    /// Look up the callback registered for a channel.
    #[must_use]
    pub fn callback(&self, channel: Channel) -> Option<Callback> {
        self.state.read().callbacks.get(&channel).cloned()
    }

    /// Number of registered subscriptions across both streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().subscriptions.len()
    }

    /// Check if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().subscriptions.is_empty()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &state.subscriptions)
            .finish_non_exhaustive()
    }
}
