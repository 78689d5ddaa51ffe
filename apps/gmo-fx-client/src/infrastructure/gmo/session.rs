//! Connection Session
//!
//! Drives one physical stream connection from connect to teardown:
//!
//! 1. connect (bounded by a connect timeout),
//! 2. send one subscribe command per registered subscription, in order,
//! 3. receive and dispatch frames until the server closes, the read side
//!    stays silent past the liveness timeout, a transport error occurs, or
//!    the session is cancelled,
//! 4. close the transport exactly once.
//!
//! Also provides [`WebSocketConnector`], the `tokio-tungstenite` adapter for
//! the [`Connector`] port.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, JsonCodec};
use super::dispatcher::MessageDispatcher;
use crate::application::ports::{Connector, FrameTransport, InboundFrame, TransportError};
use crate::domain::subscription::{StreamType, Subscription};
use crate::infrastructure::metrics::{self, DropReason};

/// Default upper bound on connect + upgrade.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Outcomes
// =============================================================================

/// How a session that connected came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the connection.
    ServerClosed,
    /// Nothing arrived within the liveness timeout.
    LivenessTimeout,
    /// The stop signal fired.
    Cancelled,
}

/// Session failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Connecting or upgrading failed.
    #[error("connect failed: {0}")]
    Connect(TransportError),

    /// Connecting did not finish in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A subscribe command could not be encoded.
    #[error("failed to encode subscribe command: {0}")]
    Encode(String),

    /// A subscribe command could not be sent.
    #[error("subscribe failed: {0}")]
    Subscribe(TransportError),

    /// The connection failed while receiving.
    #[error("receive failed: {0}")]
    Receive(TransportError),
}

impl SessionError {
    /// Whether the failure happened before a connection was established.
    #[must_use]
    pub const fn before_connect(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ConnectTimeout(_))
    }
}

impl From<CodecError> for SessionError {
    fn from(e: CodecError) -> Self {
        Self::Encode(e.to_string())
    }
}

// =============================================================================
// Connection Session
// =============================================================================

/// Runs connection attempts for one stream.
///
/// A session holds no connection between runs; every call to [`run`](Self::run)
/// opens a fresh one.
#[derive(Clone)]
pub struct ConnectionSession {
    stream: StreamType,
    connector: Arc<dyn Connector>,
    dispatcher: MessageDispatcher,
    codec: JsonCodec,
    liveness_timeout: Duration,
    connect_timeout: Duration,
}

impl ConnectionSession {
    /// Create a session runner.
    #[must_use]
    pub fn new(
        stream: StreamType,
        connector: Arc<dyn Connector>,
        dispatcher: MessageDispatcher,
        liveness_timeout: Duration,
    ) -> Self {
        Self {
            stream,
            connector,
            dispatcher,
            codec: JsonCodec::new(),
            liveness_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get the stream this session serves.
    #[must_use]
    pub const fn stream(&self) -> StreamType {
        self.stream
    }

    /// Run one connection to completion.
    pub async fn run(
        &self,
        url: &str,
        subscriptions: &[Subscription],
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        tracing::info!(stream = %self.stream, "Connecting to stream");

        let connect = tokio::time::timeout(self.connect_timeout, self.connector.connect(url));
        let mut transport = tokio::select! {
            () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            result = connect => match result {
                Ok(Ok(transport)) => transport,
                Ok(Err(e)) => return Err(SessionError::Connect(e)),
                Err(_) => return Err(SessionError::ConnectTimeout(self.connect_timeout)),
            },
        };

        tracing::info!(stream = %self.stream, "Stream connected");
        metrics::set_stream_connected(self.stream, true);

        let result = self
            .subscribe_and_receive(transport.as_mut(), subscriptions, cancel)
            .await;

        metrics::set_stream_connected(self.stream, false);
        if let Err(e) = transport.close().await {
            tracing::debug!(stream = %self.stream, error = %e, "Error closing transport");
        }

        match &result {
            Ok(end) => tracing::info!(stream = %self.stream, end = ?end, "Stream session ended"),
            Err(e) => tracing::warn!(stream = %self.stream, error = %e, "Stream session failed"),
        }
        result
    }

    async fn subscribe_and_receive(
        &self,
        transport: &mut dyn FrameTransport,
        subscriptions: &[Subscription],
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, SessionError> {
        for subscription in subscriptions {
            let command = self.codec.encode_subscribe(subscription)?;
            tracing::debug!(
                stream = %self.stream,
                channel = %subscription.channel(),
                symbol = subscription.symbol(),
                "Sending subscribe command"
            );
            tokio::select! {
                () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                sent = transport.send_text(command) => sent.map_err(SessionError::Subscribe)?,
            }
        }

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                next = tokio::time::timeout(self.liveness_timeout, transport.next_frame()) => next,
            };

            match next {
                Err(_) => {
                    tracing::warn!(
                        stream = %self.stream,
                        timeout_secs = self.liveness_timeout.as_secs(),
                        "No traffic within liveness timeout"
                    );
                    return Ok(SessionEnd::LivenessTimeout);
                }
                Ok(Ok(None)) => return Ok(SessionEnd::ServerClosed),
                Ok(Ok(Some(InboundFrame::Keepalive))) => {
                    tracing::trace!(stream = %self.stream, "Keepalive");
                }
                Ok(Ok(Some(InboundFrame::Text(text)))) => {
                    metrics::record_frame_received(self.stream);
                    match self.codec.decode(&text) {
                        Ok(frame) => {
                            self.dispatcher.dispatch(frame).await;
                        }
                        Err(e) => {
                            tracing::warn!(stream = %self.stream, error = %e, "Dropping undecodable frame");
                            metrics::record_frame_dropped(DropReason::Decode);
                        }
                    }
                }
                Ok(Err(e)) => return Err(SessionError::Receive(e)),
            }
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("stream", &self.stream)
            .field("liveness_timeout", &self.liveness_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// WebSocket Adapter
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections with `tokio-tungstenite` over rustls.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
        // Fails only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (ws, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(connect_error)?;
        tracing::debug!(status = response.status().as_u16(), "WebSocket upgrade complete");

        Ok(Box::new(WebSocketTransport { ws }))
    }
}

fn connect_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::Http(response) => TransportError::UpgradeRejected {
            status: response.status().as_u16(),
        },
        other => TransportError::Connect(other.to_string()),
    }
}

fn send_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        other => TransportError::Protocol(other.to_string()),
    }
}

/// One open WebSocket connection.
struct WebSocketTransport {
    ws: WsStream,
}

#[async_trait]
impl FrameTransport for WebSocketTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(send_error)
    }

    async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        match self.ws.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(InboundFrame::Text(text.as_str().to_owned()))),
            Some(Ok(Message::Binary(data))) => Ok(Some(InboundFrame::Text(
                String::from_utf8_lossy(&data).into_owned(),
            ))),
            // tungstenite queues pong replies to pings on its own.
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                Ok(Some(InboundFrame::Keepalive))
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(frame = ?frame, "Server sent close frame");
                Ok(None)
            }
            Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
            | None => Ok(None),
            Some(Err(e)) => Err(TransportError::Protocol(e.to_string())),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.ws.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TransportError::Protocol(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::domain::streaming::Callback;
    use crate::domain::subscription::{Channel, SubscriptionRegistry};

    #[derive(Debug, Clone)]
    enum Step {
        Frame(InboundFrame),
        Fail,
        Hang,
    }

    #[derive(Default)]
    struct Log {
        sent: Mutex<Vec<String>>,
        closes: AtomicUsize,
    }

    struct ScriptedTransport {
        steps: VecDeque<Step>,
        log: Arc<Log>,
    }

    #[async_trait]
    impl FrameTransport for ScriptedTransport {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.log.sent.lock().push(text);
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<InboundFrame>, TransportError> {
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => Ok(Some(frame)),
                Some(Step::Fail) => Err(TransportError::Protocol("reset".into())),
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptedConnector {
        steps: Vec<Step>,
        log: Arc<Log>,
        reject: bool,
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
            if self.reject {
                return Err(TransportError::UpgradeRejected { status: 503 });
            }
            Ok(Box::new(ScriptedTransport {
                steps: self.steps.clone().into(),
                log: Arc::clone(&self.log),
            }))
        }
    }

    fn text(s: &str) -> Step {
        Step::Frame(InboundFrame::Text(s.to_string()))
    }

    fn session_with(
        steps: Vec<Step>,
        reject: bool,
        registry: Arc<SubscriptionRegistry>,
    ) -> (ConnectionSession, Arc<Log>) {
        let log = Arc::new(Log::default());
        let connector = Arc::new(ScriptedConnector {
            steps,
            log: Arc::clone(&log),
            reject,
        });
        let dispatcher = MessageDispatcher::new(StreamType::Public, registry);
        let session = ConnectionSession::new(
            StreamType::Public,
            connector,
            dispatcher,
            Duration::from_secs(70),
        );
        (session, log)
    }

    fn ticker_registry(hits: &Arc<AtomicUsize>) -> Arc<SubscriptionRegistry> {
        let registry = Arc::new(SubscriptionRegistry::new());
        let hits = Arc::clone(hits);
        registry.subscribe(
            Subscription::new(Channel::Ticker).with_symbol("USD_JPY"),
            Callback::infallible(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }),
        );
        registry
    }

    #[tokio::test]
    async fn subscribes_in_order_then_dispatches_until_server_close() {
        let hits = Arc::new(AtomicUsize::new(0));
        let registry = ticker_registry(&hits);
        let (session, log) = session_with(
            vec![
                text(r#"{"ask":"1","bid":"1"}"#),
                Step::Frame(InboundFrame::Keepalive),
                text(r#"{"channel":"ticker","ask":"2","bid":"2"}"#),
            ],
            false,
            Arc::clone(&registry),
        );
        let subs = vec![
            Subscription::new(Channel::Ticker).with_symbol("USD_JPY"),
            Subscription::new(Channel::OrderEvents),
        ];

        let end = session
            .run("ws://test", &subs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::ServerClosed);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(
            *log.sent.lock(),
            vec![
                r#"{"command":"subscribe","channel":"ticker","symbol":"USD_JPY"}"#.to_string(),
                r#"{"command":"subscribe","channel":"orderEvents"}"#.to_string(),
            ]
        );
        assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_not_fatal() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (session, log) = session_with(
            vec![text("{oops"), text(r#"{"ask":"1","bid":"1"}"#)],
            false,
            ticker_registry(&hits),
        );

        let end = session
            .run("ws://test", &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::ServerClosed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_ends_with_liveness_timeout() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (session, log) = session_with(vec![Step::Hang], false, ticker_registry(&hits));

        let end = session
            .run("ws://test", &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(end, SessionEnd::LivenessTimeout);
        assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn receive_error_still_closes_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (session, log) = session_with(vec![Step::Fail], false, ticker_registry(&hits));

        let err = session
            .run("ws://test", &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Receive(_)));
        assert!(!err.before_connect());
        assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_upgrade_is_a_connect_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (session, log) = session_with(vec![], true, ticker_registry(&hits));

        let err = session
            .run("ws://test", &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Connect(TransportError::UpgradeRejected { status: 503 })
        ));
        assert!(err.before_connect());
        assert_eq!(log.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_ends_session_and_closes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let (session, log) = session_with(vec![Step::Hang], false, ticker_registry(&hits));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                cancel.cancel();
            })
        };
        let end = session.run("ws://test", &[], &cancel).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(log.closes.load(Ordering::SeqCst), 1);
    }

    struct StalledConnector;

    #[async_trait]
    impl Connector for StalledConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connect_hits_configured_timeout() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let session = ConnectionSession::new(
            StreamType::Public,
            Arc::new(StalledConnector),
            MessageDispatcher::new(StreamType::Public, registry),
            Duration::from_secs(70),
        )
        .with_connect_timeout(Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        let err = session
            .run("ws://test", &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::ConnectTimeout(t) if t == Duration::from_secs(3)));
        assert!(err.before_connect());
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(70));
    }

    #[test]
    fn send_on_closed_socket_maps_to_closed() {
        assert!(matches!(
            send_error(tungstenite::Error::ConnectionClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            send_error(tungstenite::Error::AlreadyClosed),
            TransportError::Closed
        ));
        assert!(matches!(
            send_error(tungstenite::Error::Utf8(String::new())),
            TransportError::Protocol(_)
        ));
    }

    #[test]
    fn http_error_maps_to_upgrade_rejected() {
        let response = tungstenite::http::Response::builder()
            .status(401)
            .body(None)
            .unwrap();
        let err = connect_error(tungstenite::Error::Http(Box::new(response)));
        assert!(matches!(
            err,
            TransportError::UpgradeRejected { status: 401 }
        ));
    }
}
