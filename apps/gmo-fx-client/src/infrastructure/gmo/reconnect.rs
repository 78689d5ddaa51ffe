//! Reconnection Policy
//!
//! Backoff between stream reconnect attempts. The default is a fixed 5 second
//! delay with unlimited attempts; exponential growth, a cap, jitter, and an
//! attempt limit are available through configuration.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Growth factor per attempt (1.0 keeps the delay fixed).
    pub multiplier: f64,
    /// Jitter factor as a fraction (e.g., 0.1 = ±10% randomization).
    pub jitter_factor: f64,
    /// Maximum number of consecutive attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_RECONNECT_DELAY,
            max_delay: DEFAULT_RECONNECT_DELAY,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0, // Unlimited
        }
    }
}

impl ReconnectConfig {
    /// A fixed delay with unlimited attempts.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub const fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: settings.reconnect_jitter,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Reconnection policy with optional exponential backoff and jitter.
///
/// # Example
///
/// ```rust
/// use gmo_fx_client::infrastructure::gmo::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
///
/// // A session connected: start over.
/// policy.reset();
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Get the next delay duration.
    ///
    /// Returns `None` once the attempt limit is reached.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count += 1;

        let delay_with_jitter = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        Some(delay_with_jitter)
    }

    /// Reset the policy after a session that connected.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Get the configured attempt limit (0 = unlimited).
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor.is_nan() || self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds_forever() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        for _ in 0..1000 {
            assert_eq!(policy.next_delay(), Some(DEFAULT_RECONNECT_DELAY));
        }
        assert!(policy.should_retry());
    }

    #[test]
    fn from_stream_settings_copies_backoff() {
        let settings = StreamSettings {
            reconnect_delay_initial: Duration::from_secs(2),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.2,
            max_reconnect_attempts: 7,
            ..StreamSettings::default()
        };
        let config = ReconnectConfig::from_stream_settings(&settings);
        assert_eq!(config.initial_delay, Duration::from_secs(2));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
        assert!((config.jitter_factor - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.max_attempts, 7);
    }

    #[test]
    fn policy_exponential_backoff_with_cap() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        });

        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(350)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(350)));
    }

    #[test]
    fn policy_max_attempts_and_reset() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            max_attempts: 2,
            ..ReconnectConfig::fixed(Duration::from_millis(10))
        });

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.attempt_count(), 2);
        assert!(policy.next_delay().is_none());
        assert!(!policy.should_retry());

        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn policy_jitter_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig::from_stream_settings(
                &StreamSettings {
                    reconnect_delay_initial: Duration::from_millis(1000),
                    reconnect_delay_max: Duration::from_millis(1000),
                    reconnect_jitter: 0.1,
                    ..StreamSettings::default()
                },
            ));
            let millis = policy.next_delay().unwrap().as_millis();
            assert!(millis >= 900, "delay {millis}ms is below minimum 900ms");
            assert!(millis <= 1100, "delay {millis}ms is above maximum 1100ms");
        }
    }

    #[test]
    fn nan_jitter_is_ignored() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            jitter_factor: f64::NAN,
            ..ReconnectConfig::fixed(Duration::from_millis(500))
        });
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(500)));
    }
}
