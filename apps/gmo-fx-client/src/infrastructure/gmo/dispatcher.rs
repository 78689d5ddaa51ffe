//! Message Dispatcher
//!
//! Routes decoded frames to the callback registered for their channel.
//!
//! Routing order:
//! 1. A frame with a non-empty `channel` goes to that channel's callback.
//! 2. A channel-less frame with both `ask` and `bid` goes to the ticker callback.
//! 3. Anything else is logged and dropped.
//!
//! Callback errors and panics are caught here and never reach the receive loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use crate::domain::streaming::Frame;
use crate::domain::subscription::{Channel, StreamType, SubscriptionRegistry};
use crate::infrastructure::metrics::{self, DropReason};

/// What happened to a dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The callback ran and succeeded.
    Delivered(Channel),
    /// The callback returned an error or panicked.
    CallbackFailed(Channel),
    /// The frame names a channel with no registered callback.
    Unrouted,
    /// The frame has no channel and is not ticker-shaped.
    Unrecognized,
}

/// Routes frames from one stream to registered callbacks.
#[derive(Debug, Clone)]
pub struct MessageDispatcher {
    stream: StreamType,
    registry: Arc<SubscriptionRegistry>,
}

impl MessageDispatcher {
    /// Create a dispatcher reading callbacks from `registry`.
    #[must_use]
    pub const fn new(stream: StreamType, registry: Arc<SubscriptionRegistry>) -> Self {
        Self { stream, registry }
    }

    /// Resolve the target channel for a frame.
    ///
    /// `Err` carries the drop reason when the frame cannot be routed.
    fn route(&self, frame: &Frame) -> Result<Channel, DropReason> {
        if frame.has_channel() {
            return frame
                .channel()
                .and_then(Channel::from_wire)
                .ok_or(DropReason::Unrouted);
        }
        if frame.is_ticker_shaped() {
            return Ok(Channel::Ticker);
        }
        Err(DropReason::Unrecognized)
    }

    /// Deliver one frame. Never fails.
    pub async fn dispatch(&self, frame: Frame) -> DispatchOutcome {
        let channel = match self.route(&frame) {
            Ok(channel) => channel,
            Err(reason) => {
                tracing::debug!(
                    stream = %self.stream,
                    channel = frame.channel(),
                    reason = ?reason,
                    "Dropping frame"
                );
                metrics::record_frame_dropped(reason);
                return if reason == DropReason::Unrecognized {
                    DispatchOutcome::Unrecognized
                } else {
                    DispatchOutcome::Unrouted
                };
            }
        };

        let Some(callback) = self.registry.callback(channel) else {
            tracing::trace!(stream = %self.stream, %channel, "No callback registered");
            metrics::record_frame_dropped(DropReason::Unrouted);
            return DispatchOutcome::Unrouted;
        };

        let started = Instant::now();
        let result = AssertUnwindSafe(async move { callback.call(frame).await })
            .catch_unwind()
            .await;
        metrics::record_callback_duration(channel, started.elapsed());

        match result {
            Ok(Ok(())) => DispatchOutcome::Delivered(channel),
            Ok(Err(e)) => {
                tracing::warn!(stream = %self.stream, %channel, error = %e, "Callback failed");
                metrics::record_callback_failure(channel);
                DispatchOutcome::CallbackFailed(channel)
            }
            Err(_) => {
                tracing::error!(stream = %self.stream, %channel, "Callback panicked");
                metrics::record_callback_failure(channel);
                DispatchOutcome::CallbackFailed(channel)
            }
        }
    }
}
