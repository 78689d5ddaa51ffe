//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Connector` / `FrameTransport`: one duplex text-frame connection
//! - `TokenProvider`: issue, extend, and delete private stream access tokens

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::streaming::AccessToken;

// =============================================================================
// Transport
// =============================================================================

/// Errors raised by a duplex transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered the upgrade with a non-101 status.
    #[error("upgrade rejected with HTTP status {status}")]
    UpgradeRejected {
        /// HTTP status returned instead of 101.
        status: u16,
    },

    /// DNS, TCP, or TLS failure while connecting.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Protocol or I/O error on an open connection.
    #[error("transport error: {0}")]
    Protocol(String),

    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
}

/// One inbound unit read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A text payload to decode and dispatch.
    Text(String),
    /// Control traffic (ping/pong). Proves the link is alive; carries no data.
    Keepalive,
}

/// An open duplex connection carrying text frames.
#[async_trait]
pub trait FrameTransport: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Await the next inbound frame. `Ok(None)` means the server closed the
    /// connection in an orderly way.
    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens duplex connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and complete the upgrade handshake.
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameTransport>, TransportError>;
}

// =============================================================================
// Token Lifecycle
// =============================================================================

/// Errors raised by token lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// The server returned no token.
    #[error("server returned an empty access token")]
    EmptyToken,

    /// The request could not be completed or was refused.
    #[error("token request failed: {0}")]
    Request(String),
}

/// Issues, extends, and deletes private stream access tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a fresh token.
    async fn issue_token(&self) -> Result<AccessToken, TokenError>;

    /// Reset a token's validity to the full period.
    async fn extend_token(&self, token: &AccessToken) -> Result<(), TokenError>;

    /// Revoke a token so it no longer counts against the per-key quota.
    async fn delete_token(&self, token: &AccessToken) -> Result<(), TokenError>;
}
