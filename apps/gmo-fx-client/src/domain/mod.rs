//! Domain Layer - Core streaming types and subscription state.
//!
//! This layer contains the types the streaming core reasons about with no
//! knowledge of the wire transport or the REST API.

/// Inbound frames, callbacks, access tokens, and run state.
pub mod streaming;

/// Channels, stream types, and the subscription registry.
pub mod subscription;
