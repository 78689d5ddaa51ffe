//! Prometheus Metrics Module
//!
//! Records stream and REST activity through the `metrics` facade.
//!
//! # Metrics Categories
//!
//! - **Frames**: frames received and dropped per stream
//! - **Callbacks**: handler failures and durations per channel
//! - **Connections**: open connections and reconnect attempts per stream
//! - **Tokens**: access token issue/extend/delete outcomes
//!
//! The library only records. An exporter is installed by the binary with
//! [`init_metrics`]; without one every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::subscription::{Channel, StreamType};

// =============================================================================
// Exporter
// =============================================================================

/// Install the Prometheus recorder with an HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(listen_addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .install()?;
    register_metrics();
    Ok(())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "gmo_fx_frames_received_total",
        "Total text frames received per stream"
    );
    describe_counter!(
        "gmo_fx_frames_dropped_total",
        "Total frames dropped by reason"
    );
    describe_counter!(
        "gmo_fx_callback_failures_total",
        "Total callback errors and panics per channel"
    );
    describe_histogram!(
        "gmo_fx_callback_duration_seconds",
        "Time spent in channel callbacks"
    );
    describe_gauge!(
        "gmo_fx_stream_connections",
        "Open stream connections per stream"
    );
    describe_counter!(
        "gmo_fx_reconnects_total",
        "Total reconnect attempts per stream"
    );
    describe_counter!(
        "gmo_fx_token_operations_total",
        "Access token operations by kind and outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why a frame was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a JSON object.
    Decode,
    /// Channel has no registered callback.
    Unrouted,
    /// Neither a channel nor a ticker shape.
    Unrecognized,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Unrouted => "unrouted",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Record a text frame received on a stream.
pub fn record_frame_received(stream: StreamType) {
    counter!(
        "gmo_fx_frames_received_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Record a dropped frame.
pub fn record_frame_dropped(reason: DropReason) {
    counter!(
        "gmo_fx_frames_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a callback that returned an error or panicked.
pub fn record_callback_failure(channel: Channel) {
    counter!(
        "gmo_fx_callback_failures_total",
        "channel" => channel.as_str()
    )
    .increment(1);
}

/// Record time spent in a callback.
pub fn record_callback_duration(channel: Channel, duration: Duration) {
    histogram!(
        "gmo_fx_callback_duration_seconds",
        "channel" => channel.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Mark a stream connection as open or closed.
pub fn set_stream_connected(stream: StreamType, connected: bool) {
    gauge!(
        "gmo_fx_stream_connections",
        "stream" => stream.as_str()
    )
    .set(if connected { 1.0 } else { 0.0 });
}

/// Record a reconnect attempt.
pub fn record_reconnect(stream: StreamType) {
    counter!(
        "gmo_fx_reconnects_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Record an access token operation.
pub fn record_token_operation(operation: &'static str, success: bool) {
    counter!(
        "gmo_fx_token_operations_total",
        "operation" => operation,
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_reason_as_str() {
        assert_eq!(DropReason::Decode.as_str(), "decode");
        assert_eq!(DropReason::Unrouted.as_str(), "unrouted");
        assert_eq!(DropReason::Unrecognized.as_str(), "unrecognized");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received(StreamType::Public);
        record_frame_dropped(DropReason::Decode);
        record_callback_failure(Channel::Ticker);
        record_callback_duration(Channel::OrderEvents, Duration::from_millis(3));
        set_stream_connected(StreamType::Private, true);
        record_reconnect(StreamType::Private);
        record_token_operation("issue", false);
    }
}
