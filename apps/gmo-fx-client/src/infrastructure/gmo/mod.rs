//! GMO Coin FX Integration
//!
//! REST and WebSocket adapters for the GMO Coin foreign-exchange API.
//!
//! - `signer`, `rate_limit`, `http_client`: signed, throttled REST transport
//! - `public_api`, `private_api`: request/response operations
//! - `codec`, `messages`: stream wire format
//! - `session`, `supervisor`, `reconnect`, `dispatcher`: the streaming core
//! - `client`: the public streaming surface

pub mod api_types;
pub mod client;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod http_client;
pub mod messages;
pub mod private_api;
pub mod public_api;
pub mod rate_limit;
pub mod reconnect;
pub mod session;
pub mod signer;
pub mod supervisor;
