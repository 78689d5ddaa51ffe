//! Configuration Module
//!
//! Client configuration loaded from environment variables.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, Credentials, DEFAULT_PRIVATE_REST_URL, DEFAULT_PRIVATE_WS_URL,
    DEFAULT_PUBLIC_REST_URL, DEFAULT_PUBLIC_WS_URL, RateLimitSettings, RestSettings,
    StreamSettings,
};
