//! Reconnect Supervisor
//!
//! One retry loop per stream. Each iteration is a connection attempt:
//!
//! ```text
//! Connecting → Streaming → Disconnected → [delay] → Connecting → ...
//! ```
//!
//! The loop stops when the run state is cleared or the stop signal fires.
//! For the private stream every attempt issues a fresh access token, extends
//! it periodically while streaming, and deletes it (best effort) afterwards.
//!
//! Failures inside the loop never escape it. They are logged and passed to
//! the optional error callback, except while stopping.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::session::{ConnectionSession, SessionError};
use crate::application::ports::{TokenError, TokenProvider};
use crate::domain::streaming::{AccessToken, RunState};
use crate::domain::subscription::{StreamType, Subscription, SubscriptionRegistry};
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Error Reporting
// =============================================================================

/// Recoverable stream failures passed to the error callback.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StreamError {
    /// A connection attempt or open connection failed.
    #[error("{stream} stream: {source}")]
    Session {
        /// Affected stream.
        stream: StreamType,
        /// Underlying failure.
        #[source]
        source: SessionError,
    },

    /// No access token could be obtained for the private stream.
    #[error("access token issue failed: {0}")]
    TokenIssue(#[source] TokenError),

    /// A streaming access token could not be extended.
    #[error("access token extension failed: {0}")]
    TokenExtend(#[source] TokenError),

    /// The configured attempt limit was reached; the stream has stopped.
    #[error("{stream} stream gave up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        /// Affected stream.
        stream: StreamType,
        /// Attempt limit.
        attempts: u32,
    },
}

impl StreamError {
    /// Get the stream the error belongs to.
    #[must_use]
    pub const fn stream(&self) -> StreamType {
        match self {
            Self::Session { stream, .. } | Self::ReconnectExhausted { stream, .. } => *stream,
            Self::TokenIssue(_) | Self::TokenExtend(_) => StreamType::Private,
        }
    }
}

/// Global error callback.
pub type ErrorCallback = Arc<dyn Fn(&StreamError) + Send + Sync>;

// =============================================================================
// Supervisor
// =============================================================================

/// How a stream authenticates.
#[derive(Clone)]
pub enum StreamAccess {
    /// No authentication.
    Public,
    /// A fresh access token per connection.
    Private(Arc<dyn TokenProvider>),
}

impl StreamAccess {
    /// Get the stream this access mode belongs to.
    #[must_use]
    pub const fn stream(&self) -> StreamType {
        match self {
            Self::Public => StreamType::Public,
            Self::Private(_) => StreamType::Private,
        }
    }
}

/// Retry loop owning one stream's connection lifecycle.
pub struct StreamSupervisor {
    access: StreamAccess,
    settings: StreamSettings,
    session: ConnectionSession,
    registry: Arc<SubscriptionRegistry>,
    run_state: Arc<RunState>,
    on_error: Option<ErrorCallback>,
}

impl StreamSupervisor {
    /// Create a supervisor.
    #[must_use]
    pub const fn new(
        access: StreamAccess,
        settings: StreamSettings,
        session: ConnectionSession,
        registry: Arc<SubscriptionRegistry>,
        run_state: Arc<RunState>,
    ) -> Self {
        Self {
            access,
            settings,
            session,
            registry,
            run_state,
            on_error: None,
        }
    }

    /// Set the error callback.
    #[must_use]
    pub fn with_error_callback(mut self, on_error: Option<ErrorCallback>) -> Self {
        self.on_error = on_error;
        self
    }

    /// Get the supervised stream.
    #[must_use]
    pub const fn stream(&self) -> StreamType {
        self.access.stream()
    }

    fn stopping(&self, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || !self.run_state.is_running()
    }

    /// Run the loop until stopped or the attempt limit is reached.
    pub async fn run(self, cancel: CancellationToken) {
        let stream = self.stream();
        let mut policy = ReconnectPolicy::new(ReconnectConfig::from_stream_settings(&self.settings));

        while !self.stopping(&cancel) {
            let connected = self.attempt(&cancel).await;

            if self.stopping(&cancel) {
                break;
            }
            if connected {
                policy.reset();
            }

            let Some(delay) = policy.next_delay() else {
                self.report(StreamError::ReconnectExhausted {
                    stream,
                    attempts: policy.max_attempts(),
                });
                break;
            };

            metrics::record_reconnect(stream);
            tracing::info!(
                stream = %stream,
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Reconnecting"
            );

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(stream = %stream, "Stream loop stopped");
    }

    /// One connection attempt. Returns whether a connection was established.
    async fn attempt(&self, cancel: &CancellationToken) -> bool {
        let subscriptions = self.registry.subscriptions(self.stream());

        let tokens = match &self.access {
            StreamAccess::Public => {
                let url = self.settings.public_url.clone();
                return self.run_session(&url, &subscriptions, cancel).await;
            }
            StreamAccess::Private(tokens) => Arc::clone(tokens),
        };

        let issued = tokio::select! {
            () = cancel.cancelled() => return false,
            issued = tokens.issue_token() => issued,
        };
        let token = match issued {
            Ok(token) => token,
            Err(e) => {
                if !self.stopping(cancel) {
                    self.report(StreamError::TokenIssue(e));
                }
                return false;
            }
        };
        tracing::debug!(token = ?token, "Access token issued");

        let url = self.settings.private_url_for(token.as_str());
        let connected = tokio::select! {
            connected = self.run_session(&url, &subscriptions, cancel) => connected,
            () = self.keep_token_alive(tokens.as_ref(), &token) => false,
        };

        self.release_token(tokens.as_ref(), &token).await;
        connected
    }

    async fn run_session(
        &self,
        url: &str,
        subscriptions: &[Subscription],
        cancel: &CancellationToken,
    ) -> bool {
        match self.session.run(url, subscriptions, cancel).await {
            Ok(_) => true,
            Err(e) => {
                if !self.stopping(cancel) {
                    self.report(StreamError::Session {
                        stream: self.stream(),
                        source: e.clone(),
                    });
                }
                !e.before_connect()
            }
        }
    }

    /// Extend the token on a fixed interval. Never completes.
    async fn keep_token_alive(&self, tokens: &dyn TokenProvider, token: &AccessToken) {
        let Some(period) = self
            .settings
            .token_refresh_interval
            .filter(|period| !period.is_zero())
        else {
            return std::future::pending().await;
        };

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            match tokens.extend_token(token).await {
                Ok(()) => tracing::debug!("Access token extended"),
                Err(e) => self.report(StreamError::TokenExtend(e)),
            }
        }
    }

    async fn release_token(&self, tokens: &dyn TokenProvider, token: &AccessToken) {
        let timeout = self.settings.token_cleanup_timeout;
        match tokio::time::timeout(timeout, tokens.delete_token(token)).await {
            Ok(Ok(())) => tracing::debug!("Access token deleted"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to delete access token"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timed out deleting access token"
            ),
        }
    }

    fn report(&self, error: StreamError) {
        tracing::warn!(stream = %error.stream(), error = %error, "Stream error");
        if let Some(on_error) = &self.on_error
            && std::panic::catch_unwind(AssertUnwindSafe(|| on_error(&error))).is_err()
        {
            tracing::error!("Error callback panicked");
        }
    }
}

impl std::fmt::Debug for StreamSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSupervisor")
            .field("stream", &self.stream())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{
        Connector, FrameTransport, InboundFrame, MockTokenProvider, TransportError,
    };
    use crate::domain::streaming::Callback;
    use crate::domain::subscription::Channel;
    use crate::infrastructure::gmo::dispatcher::MessageDispatcher;

    /// Accepts every connection; each closes after one frame.
    #[derive(Default)]
    struct OneFrameConnector {
        urls: Mutex<Vec<String>>,
    }

    struct OneFrameTransport {
        sent_frame: bool,
    }

    #[async_trait]
    impl FrameTransport for OneFrameTransport {
        async fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
            if self.sent_frame {
                return Ok(None);
            }
            self.sent_frame = true;
            Ok(Some(InboundFrame::Text(
                r#"{"channel":"orderEvents"}"#.to_string(),
            )))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for OneFrameConnector {
        async fn connect(&self, url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
            self.urls.lock().push(url.to_string());
            Ok(Box::new(OneFrameTransport { sent_frame: false }))
        }
    }

    /// Rejects the upgrade, or accepts and then fails the first read.
    struct FailingConnector {
        reject: bool,
    }

    struct BrokenTransport;

    #[async_trait]
    impl FrameTransport for BrokenTransport {
        async fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
            Err(TransportError::Protocol("connection reset".to_string()))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
            if self.reject {
                return Err(TransportError::UpgradeRejected { status: 401 });
            }
            Ok(Box::new(BrokenTransport))
        }
    }

    fn counting_tokens(deleted: &Arc<Mutex<Vec<String>>>) -> MockTokenProvider {
        let issued = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::clone(deleted);
        let mut tokens = MockTokenProvider::new();
        tokens.expect_issue_token().returning(move || {
            let n = issued.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken::new(format!("token-{n}")))
        });
        tokens.expect_delete_token().returning(move |token| {
            deleted.lock().push(token.as_str().to_string());
            Ok(())
        });
        tokens.expect_extend_token().never();
        tokens
    }

    fn private_supervisor(
        tokens: MockTokenProvider,
        connector: Arc<dyn Connector>,
        frames: Arc<AtomicUsize>,
        run_state: Arc<RunState>,
        on_error: ErrorCallback,
    ) -> StreamSupervisor {
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.subscribe(
            Subscription::new(Channel::OrderEvents),
            Callback::infallible(move |_| {
                frames.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let settings = StreamSettings {
            private_url: "wss://stream.test/ws/private/v1".to_string(),
            max_reconnect_attempts: 2,
            ..StreamSettings::default()
        };
        let dispatcher = MessageDispatcher::new(StreamType::Private, Arc::clone(&registry));
        let session = ConnectionSession::new(
            StreamType::Private,
            connector,
            dispatcher,
            settings.liveness_timeout,
        );
        StreamSupervisor::new(
            StreamAccess::Private(Arc::new(tokens)),
            settings,
            session,
            registry,
            run_state,
        )
        .with_error_callback(Some(on_error))
    }

    #[tokio::test(start_paused = true)]
    async fn token_issue_failure_is_reported_and_retried() {
        let mut tokens = MockTokenProvider::new();
        tokens
            .expect_issue_token()
            .times(3)
            .returning(|| Err(TokenError::EmptyToken));
        tokens.expect_delete_token().never();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let run_state = Arc::new(RunState::new());
        run_state.start();

        let supervisor = private_supervisor(
            tokens,
            Arc::new(OneFrameConnector::default()),
            Arc::new(AtomicUsize::new(0)),
            run_state,
            Arc::new(move |e: &StreamError| sink.lock().push(e.to_string())),
        );
        supervisor.run(CancellationToken::new()).await;

        let errors = errors.lock();
        assert_eq!(errors.len(), 4);
        assert!(errors[..3].iter().all(|e| e.contains("access token issue failed")));
        assert!(errors[3].contains("gave up after 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn each_private_attempt_issues_and_deletes_one_token() {
        let issued = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&issued);
        let mut tokens = MockTokenProvider::new();
        tokens.expect_issue_token().returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken::new(format!("token-{n}")))
        });
        tokens.expect_delete_token().times(3).returning(|_| Ok(()));
        tokens.expect_extend_token().never();

        let connector = Arc::new(OneFrameConnector::default());
        let frames = Arc::new(AtomicUsize::new(0));
        let run_state = Arc::new(RunState::new());
        run_state.start();
        let cancel = CancellationToken::new();

        let supervisor = private_supervisor(
            tokens,
            Arc::<OneFrameConnector>::clone(&connector),
            Arc::clone(&frames),
            Arc::clone(&run_state),
            Arc::new(|_: &StreamError| {}),
        );
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        // Three sessions: at t=0, t=5s, t=10s.
        tokio::time::sleep(Duration::from_secs(12)).await;
        run_state.stop();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(issued.load(Ordering::SeqCst), 3);
        assert_eq!(frames.load(Ordering::SeqCst), 3);
        assert_eq!(
            *connector.urls.lock(),
            vec![
                "wss://stream.test/ws/private/v1/token-0".to_string(),
                "wss://stream.test/ws/private/v1/token-1".to_string(),
                "wss://stream.test/ws/private/v1/token-2".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_private_connects_still_delete_each_token() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&errors);
        let run_state = Arc::new(RunState::new());
        run_state.start();

        let supervisor = private_supervisor(
            counting_tokens(&deleted),
            Arc::new(FailingConnector { reject: true }),
            Arc::new(AtomicUsize::new(0)),
            run_state,
            Arc::new(move |_: &StreamError| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        );
        supervisor.run(CancellationToken::new()).await;

        // Three rejected attempts, then the limit.
        assert_eq!(
            *deleted.lock(),
            vec![
                "token-0".to_string(),
                "token-1".to_string(),
                "token-2".to_string(),
            ]
        );
        assert_eq!(errors.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_private_receive_still_deletes_the_token() {
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let run_state = Arc::new(RunState::new());
        run_state.start();
        let cancel = CancellationToken::new();

        let supervisor = private_supervisor(
            counting_tokens(&deleted),
            Arc::new(FailingConnector { reject: false }),
            Arc::new(AtomicUsize::new(0)),
            Arc::clone(&run_state),
            Arc::new(|_: &StreamError| {}),
        );
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        // Sessions at t=0 and t=5s.
        tokio::time::sleep(Duration::from_secs(7)).await;
        run_state.stop();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(
            *deleted.lock(),
            vec!["token-0".to_string(), "token-1".to_string()]
        );
    }

    #[tokio::test]
    async fn stopped_run_state_exits_immediately() {
        let mut tokens = MockTokenProvider::new();
        tokens.expect_issue_token().never();

        let supervisor = private_supervisor(
            tokens,
            Arc::new(OneFrameConnector::default()),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(RunState::new()),
            Arc::new(|_: &StreamError| panic!("no errors expected")),
        );
        supervisor.run(CancellationToken::new()).await;
    }

    #[test]
    fn stream_error_stream() {
        assert_eq!(
            StreamError::TokenIssue(TokenError::EmptyToken).stream(),
            StreamType::Private
        );
        assert_eq!(
            StreamError::ReconnectExhausted {
                stream: StreamType::Public,
                attempts: 3
            }
            .stream(),
            StreamType::Public
        );
    }
}
