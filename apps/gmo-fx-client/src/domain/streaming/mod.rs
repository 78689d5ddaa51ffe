//! Streaming Types
//!
//! Inbound frames, the callback abstraction, access tokens, and the
//! client-wide run flag.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

// =============================================================================
// Frames
// =============================================================================

/// A decoded inbound message: a JSON object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    fields: Map<String, Value>,
}

impl Frame {
    /// Wrap a JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get the `channel` field, if present and a string.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.fields.get("channel").and_then(Value::as_str)
    }

    /// Check whether the frame names a channel.
    ///
    /// A `null` or empty `channel` counts as absent.
    #[must_use]
    pub fn has_channel(&self) -> bool {
        self.channel().is_some_and(|channel| !channel.is_empty())
    }

    /// Check whether the frame looks like a ticker update (has both `ask` and `bid`).
    #[must_use]
    pub fn is_ticker_shaped(&self) -> bool {
        self.fields.contains_key("ask") && self.fields.contains_key("bid")
    }

    /// Get a field by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Borrow all fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Decode the frame into a typed message.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields do not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.fields.clone()))
    }
}

impl TryFrom<Value> for Frame {
    type Error = Value;

    /// Accepts JSON objects; anything else is handed back unchanged.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(other),
        }
    }
}

// =============================================================================
// Callbacks
// =============================================================================

/// Error a callback may return. It is logged and never propagated.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Future produced by invoking a callback.
pub type CallbackFuture = BoxFuture<'static, Result<(), CallbackError>>;

type CallbackFn = dyn Fn(Frame) -> CallbackFuture + Send + Sync;

/// Handler for frames on one channel.
///
/// Synchronous and asynchronous handlers share one shape: a function from a
/// frame to a future. Synchronous handlers run on first poll and resolve
/// immediately.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<CallbackFn>,
}

impl Callback {
    /// Wrap an asynchronous handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Frame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallbackError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |frame: Frame| -> CallbackFuture { Box::pin(handler(frame)) }),
        }
    }

    /// Wrap a synchronous handler.
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(Frame) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            inner: Arc::new(move |frame: Frame| -> CallbackFuture {
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler(frame) })
            }),
        }
    }

    /// Wrap a synchronous handler that cannot fail.
    pub fn infallible<F>(handler: F) -> Self
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        Self::sync(move |frame| {
            handler(frame);
            Ok(())
        })
    }

    /// Invoke the handler.
    pub fn call(&self, frame: Frame) -> CallbackFuture {
        (self.inner)(frame)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// Short-lived credential that opens a private stream connection.
///
/// Issued by the server with 60 minutes of validity. Only a prefix is shown
/// in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the token is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(4).collect();
        write!(f, "AccessToken({prefix}…)")
    }
}

// =============================================================================
// Run State
// =============================================================================

/// Client-wide running flag shared by both stream loops.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
}

impl RunState {
    /// Create a stopped run state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Check whether the client is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Transition Stopped → Running. Returns `false` if already running.
    pub fn start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Transition to Stopped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn frame(value: Value) -> Frame {
        Frame::try_from(value).unwrap()
    }

    #[test]
    fn frame_channel_lookup() {
        let f = frame(json!({"channel": "orderEvents", "orderId": 1}));
        assert_eq!(f.channel(), Some("orderEvents"));
        assert!(f.has_channel());
        assert!(!f.is_ticker_shaped());
    }

    #[test]
    fn null_or_empty_channel_is_absent() {
        assert!(!frame(json!({"channel": null, "ask": "1", "bid": "1"})).has_channel());
        assert!(!frame(json!({"channel": "", "ask": "1", "bid": "1"})).has_channel());
        assert!(!frame(json!({"ask": "1", "bid": "1"})).has_channel());
    }

    #[test]
    fn frame_ticker_shape() {
        let f = frame(json!({"ask": "137.6", "bid": "137.5"}));
        assert_eq!(f.channel(), None);
        assert!(f.is_ticker_shaped());

        let only_ask = frame(json!({"ask": "137.6"}));
        assert!(!only_ask.is_ticker_shaped());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(Frame::try_from(json!([1, 2, 3])).is_err());
        assert!(Frame::try_from(json!("text")).is_err());
    }

    #[test]
    fn frame_parse_typed() {
        #[derive(Deserialize)]
        struct Partial {
            symbol: String,
        }
        let f = frame(json!({"symbol": "USD_JPY", "ask": "1"}));
        let parsed: Partial = f.parse().unwrap();
        assert_eq!(parsed.symbol, "USD_JPY");
    }

    #[tokio::test]
    async fn sync_and_async_callbacks_share_shape() {
        let sync_cb = Callback::sync(|f| {
            if f.channel().is_some() {
                Ok(())
            } else {
                Err("missing channel".into())
            }
        });
        let async_cb = Callback::new(|f: Frame| async move {
            tokio::task::yield_now().await;
            let result: Result<(), CallbackError> = if f.is_ticker_shaped() {
                Ok(())
            } else {
                Err("not a ticker".into())
            };
            result
        });

        let with_channel = frame(json!({"channel": "ticker"}));
        let ticker = frame(json!({"ask": "1", "bid": "1"}));

        assert!(sync_cb.call(with_channel.clone()).await.is_ok());
        assert!(sync_cb.call(ticker.clone()).await.is_err());
        assert!(async_cb.call(ticker).await.is_ok());
        assert!(async_cb.call(with_channel).await.is_err());
    }

    #[test]
    fn access_token_debug_is_truncated() {
        let token = AccessToken::new("abcdefghijklmnop");
        let debug = format!("{token:?}");
        assert!(debug.contains("abcd"));
        assert!(!debug.contains("efgh"));
    }

    #[test]
    fn run_state_transitions() {
        let state = RunState::new();
        assert!(!state.is_running());
        assert!(state.start());
        assert!(!state.start());
        assert!(state.is_running());
        state.stop();
        assert!(!state.is_running());
        assert!(state.start());
    }
}
