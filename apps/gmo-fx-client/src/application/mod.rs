//! Application Layer - Port definitions.
//!
//! The streaming core reaches the outside world only through the traits
//! declared here, so transports and token issuers can be swapped in tests.

/// Port interfaces for the duplex transport and token lifecycle.
pub mod ports;
