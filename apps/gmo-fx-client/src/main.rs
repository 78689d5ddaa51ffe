//! GMO FX Stream Client Binary
//!
//! Subscribes to the ticker for one symbol and, when credentials are set,
//! to every private channel, then logs each event until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin gmo-fx-client
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `GMO_API_KEY` / `GMO_API_SECRET`: API credentials (enables private channels)
//! - `GMO_FX_SYMBOL`: Ticker symbol (default: `USD_JPY`)
//! - `GMO_FX_POSITION_SUMMARY_OPTION`: Position summary option (default: PERIODIC)
//! - `GMO_FX_METRICS_ADDR`: Prometheus listen address (disabled when unset)
//! - `GMO_FX_PUBLIC_WS_URL` / `GMO_FX_PRIVATE_WS_URL`: Stream endpoints
//! - `GMO_FX_RECONNECT_DELAY_SECS`: Reconnect delay (default: 5)
//! - `GMO_FX_RECONNECT_JITTER`: Reconnect delay jitter fraction, 0 to 1 (default: 0)
//! - `GMO_FX_CONNECT_TIMEOUT_SECS`: Connection open timeout (default: 10)
//! - `GMO_FX_LIVENESS_TIMEOUT_SECS`: Read silence limit (default: 70)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use gmo_fx_client::infrastructure::telemetry;
use gmo_fx_client::{
    Callback, ClientConfig, ExecutionEvent, Frame, OrderEvent, PositionEvent,
    PositionSummaryEvent, StreamClient, StreamClientBuilder, TickerMessage, init_metrics,
};
use serde::de::DeserializeOwned;
use tokio::signal;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    telemetry::init().context("failed to install tracing subscriber")?;

    if let Ok(addr) = std::env::var("GMO_FX_METRICS_ADDR") {
        let addr: SocketAddr = addr.parse().context("invalid GMO_FX_METRICS_ADDR")?;
        init_metrics(addr).context("failed to start metrics exporter")?;
        tracing::info!(%addr, "Metrics exporter listening");
    }

    let config = ClientConfig::from_env()?;
    log_config(&config);

    let client = StreamClientBuilder::from_config(&config)
        .on_error(|e| tracing::warn!(stream = %e.stream(), error = %e, "Stream error"))
        .build()?;

    let symbol = std::env::var("GMO_FX_SYMBOL").unwrap_or_else(|_| "USD_JPY".to_string());
    client.subscribe_ticker(
        symbol,
        logging::<TickerMessage>("ticker", |t| {
            tracing::info!(
                symbol = %t.symbol,
                ask = %t.ask,
                bid = %t.bid,
                spread = %t.spread(),
                "Ticker"
            );
        }),
    );

    if config.credentials.is_some() {
        subscribe_private(&client);
    } else {
        tracing::info!("No credentials set, private channels disabled");
    }

    client.start()?;

    await_shutdown().await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, client.close())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn subscribe_private(client: &StreamClient) {
    client.subscribe_executions(logging::<ExecutionEvent>("execution", |e| {
        tracing::info!(
            symbol = %e.symbol,
            order_id = e.order_id,
            price = ?e.execution_price,
            "Execution"
        );
    }));
    client.subscribe_orders(logging::<OrderEvent>("order", |o| {
        tracing::info!(order_id = o.order_id, status = ?o.status, "Order");
    }));
    client.subscribe_positions(logging::<PositionEvent>("position", |p| {
        tracing::info!(position_id = p.position_id, size = ?p.size, "Position");
    }));

    let option = std::env::var("GMO_FX_POSITION_SUMMARY_OPTION").ok();
    client.subscribe_position_summary(
        logging::<PositionSummaryEvent>("position summary", |s| {
            tracing::info!(symbol = %s.symbol, side = ?s.side, "Position summary");
        }),
        option.as_deref(),
    );
}

/// A callback that decodes each frame into `T` and hands it to `log`.
fn logging<T>(kind: &'static str, log: impl Fn(&T) + Send + Sync + 'static) -> Callback
where
    T: DeserializeOwned + 'static,
{
    Callback::sync(move |frame: Frame| {
        let event = frame.parse::<T>()?;
        log(&event);
        tracing::trace!(kind, "Event handled");
        Ok(())
    })
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        private_enabled = config.credentials.is_some(),
        liveness_timeout_secs = config.stream.liveness_timeout.as_secs(),
        reconnect_delay_secs = config.stream.reconnect_delay_initial.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        public_url = %config.stream.public_url,
        private_url = %config.stream.private_url,
        "WebSocket endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
