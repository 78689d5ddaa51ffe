//! Client Configuration Settings
//!
//! Configuration types for the REST and streaming clients, loaded from
//! environment variables. Unparseable optional values fall back to defaults.

use std::time::Duration;

/// Public stream endpoint.
pub const DEFAULT_PUBLIC_WS_URL: &str = "wss://forex-api.coin.z.com/ws/public/v1";
/// Private stream endpoint; the access token is appended as a path segment.
pub const DEFAULT_PRIVATE_WS_URL: &str = "wss://forex-api.coin.z.com/ws/private/v1";
/// Public REST base URL.
pub const DEFAULT_PUBLIC_REST_URL: &str = "https://forex-api.coin.z.com/public";
/// Private REST base URL.
pub const DEFAULT_PRIVATE_REST_URL: &str = "https://forex-api.coin.z.com/private";

const ENV_API_KEY: &str = "GMO_API_KEY";
const ENV_API_SECRET: &str = "GMO_API_SECRET";

/// GMO API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API secret.
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// REST endpoint settings.
#[derive(Debug, Clone)]
pub struct RestSettings {
    /// Public REST base URL.
    pub public_url: String,
    /// Private REST base URL.
    pub private_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            public_url: DEFAULT_PUBLIC_REST_URL.to_string(),
            private_url: DEFAULT_PRIVATE_REST_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// REST rate limit budgets, per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// GET requests per second.
    pub get_per_second: usize,
    /// POST, PUT, and DELETE requests per second.
    pub post_per_second: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            get_per_second: 6,
            post_per_second: 1,
        }
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Public stream URL.
    pub public_url: String,
    /// Private stream base URL (token appended).
    pub private_url: String,
    /// Maximum read silence before a connection is presumed dead.
    ///
    /// The server pings every 60 seconds.
    pub liveness_timeout: Duration,
    /// Delay before the first reconnection attempt.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier (1.0 = fixed delay).
    pub reconnect_delay_multiplier: f64,
    /// Reconnection delay jitter as a fraction (0.1 = ±10%, 0.0 = none).
    pub reconnect_jitter: f64,
    /// Maximum consecutive reconnection attempts (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Timeout for opening a connection, including the upgrade handshake.
    pub connect_timeout: Duration,
    /// Access token extension interval while streaming (`None` = never).
    pub token_refresh_interval: Option<Duration>,
    /// Timeout for best-effort token deletion when a private session ends.
    pub token_cleanup_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            public_url: DEFAULT_PUBLIC_WS_URL.to_string(),
            private_url: DEFAULT_PRIVATE_WS_URL.to_string(),
            liveness_timeout: Duration::from_secs(70),
            reconnect_delay_initial: Duration::from_secs(5),
            reconnect_delay_max: Duration::from_secs(5),
            reconnect_delay_multiplier: 1.0,
            reconnect_jitter: 0.0,
            max_reconnect_attempts: 0, // Unlimited
            connect_timeout: Duration::from_secs(10),
            token_refresh_interval: Some(Duration::from_secs(50 * 60)),
            token_cleanup_timeout: Duration::from_secs(5),
        }
    }
}

impl StreamSettings {
    /// Build the private stream URL for a token.
    #[must_use]
    pub fn private_url_for(&self, token: &str) -> String {
        format!("{}/{token}", self.private_url.trim_end_matches('/'))
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// API credentials; required for private REST calls and private streams.
    pub credentials: Option<Credentials>,
    /// REST endpoint settings.
    pub rest: RestSettings,
    /// REST rate limits.
    pub rate_limits: RateLimitSettings,
    /// Streaming settings.
    pub stream: StreamSettings,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if only one of `GMO_API_KEY` / `GMO_API_SECRET` is
    /// set, or if either is set but empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = match (lookup(ENV_API_KEY), lookup(ENV_API_SECRET)) {
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::IncompleteCredentials(ENV_API_SECRET)),
            (None, Some(_)) => return Err(ConfigError::IncompleteCredentials(ENV_API_KEY)),
            (Some(key), Some(secret)) => {
                if key.is_empty() {
                    return Err(ConfigError::EmptyValue(ENV_API_KEY.to_string()));
                }
                if secret.is_empty() {
                    return Err(ConfigError::EmptyValue(ENV_API_SECRET.to_string()));
                }
                Some(Credentials::new(key, secret))
            }
        };

        let rest_defaults = RestSettings::default();
        let rest = RestSettings {
            public_url: lookup("GMO_FX_PUBLIC_REST_URL").unwrap_or(rest_defaults.public_url),
            private_url: lookup("GMO_FX_PRIVATE_REST_URL").unwrap_or(rest_defaults.private_url),
            timeout: parse_duration_secs(&lookup, "GMO_FX_REST_TIMEOUT_SECS", rest_defaults.timeout),
        };

        let limit_defaults = RateLimitSettings::default();
        let rate_limits = RateLimitSettings {
            get_per_second: parse_or(&lookup, "GMO_FX_GET_RATE_LIMIT", limit_defaults.get_per_second),
            post_per_second: parse_or(
                &lookup,
                "GMO_FX_POST_RATE_LIMIT",
                limit_defaults.post_per_second,
            ),
        };

        let stream_defaults = StreamSettings::default();
        let reconnect_delay_initial = parse_duration_secs(
            &lookup,
            "GMO_FX_RECONNECT_DELAY_SECS",
            stream_defaults.reconnect_delay_initial,
        );
        let stream = StreamSettings {
            public_url: lookup("GMO_FX_PUBLIC_WS_URL").unwrap_or(stream_defaults.public_url),
            private_url: lookup("GMO_FX_PRIVATE_WS_URL").unwrap_or(stream_defaults.private_url),
            liveness_timeout: parse_duration_secs(
                &lookup,
                "GMO_FX_LIVENESS_TIMEOUT_SECS",
                stream_defaults.liveness_timeout,
            ),
            reconnect_delay_initial,
            reconnect_delay_max: parse_duration_secs(
                &lookup,
                "GMO_FX_RECONNECT_DELAY_MAX_SECS",
                reconnect_delay_initial,
            )
            .max(reconnect_delay_initial),
            reconnect_delay_multiplier: parse_or(
                &lookup,
                "GMO_FX_RECONNECT_MULTIPLIER",
                stream_defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_or(
                &lookup,
                "GMO_FX_RECONNECT_JITTER",
                stream_defaults.reconnect_jitter,
            )
            .clamp(0.0, 1.0),
            max_reconnect_attempts: parse_or(
                &lookup,
                "GMO_FX_MAX_RECONNECT_ATTEMPTS",
                stream_defaults.max_reconnect_attempts,
            ),
            connect_timeout: parse_duration_secs(
                &lookup,
                "GMO_FX_CONNECT_TIMEOUT_SECS",
                stream_defaults.connect_timeout,
            ),
            token_refresh_interval: match lookup("GMO_FX_TOKEN_REFRESH_SECS")
                .and_then(|v| v.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => stream_defaults.token_refresh_interval,
            },
            token_cleanup_timeout: stream_defaults.token_cleanup_timeout,
        };

        Ok(Self {
            credentials,
            rest,
            rate_limits,
            stream,
        })
    }

    /// Attach credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Only one half of the credential pair is set.
    #[error("incomplete credentials: {0} is not set")]
    IncompleteCredentials(&'static str),
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
