//! Quote Stream Binary
//!
//! Streams quotes for a configured symbol list and serves health and
//! Prometheus endpoints.
//!
//! # Usage
//!
//! ```bash
//! QUOTE_STREAM_SYMBOLS=AAPL,MSFT,BTC-USD cargo run --bin quote-stream
//! ```
//!
//! # Environment Variables
//!
//! - `QUOTE_STREAM_SYMBOLS`: Comma-separated symbols subscribed at startup
//! - `QUOTE_STREAM_URL`: Feed endpoint (default: wss://streamer.finance.yahoo.com/?version=2)
//! - `QUOTE_STREAM_HEALTH_PORT`: Health check HTTP port, 0 to disable (default: 8082)
//! - `QUOTE_STREAM_METRICS_ENABLED`: Install the Prometheus recorder (default: true)
//! - `QUOTE_STREAM_*`: Stream tuning, see `StreamConfig::from_env`
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: quote_stream=info)

use std::sync::Arc;

use anyhow::Context;
use quote_stream::infrastructure::broadcast::{EventBus, EventReceiver};
use quote_stream::infrastructure::health::{HealthServer, HealthServerState};
use quote_stream::infrastructure::telemetry;
use quote_stream::{ConnectionManager, ServiceConfig, StreamEvent, init_metrics};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Quote Stream");

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.metrics_enabled {
        init_metrics().context("failed to install Prometheus recorder")?;
    }

    let event_bus = Arc::new(EventBus::with_defaults());
    tokio::spawn(log_events(event_bus.subscribe()));

    let manager = ConnectionManager::with_websocket(config.stream.clone(), event_bus.clone())
        .context("failed to create stream client")?;

    let health_cancel = CancellationToken::new();
    if config.health_port > 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            manager.clone(),
            Arc::clone(&event_bus),
        ));
        let health_server =
            HealthServer::new(config.health_port, health_state, health_cancel.clone());
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    manager.subscribe(&config.symbols);
    manager.connect();
    manager.close_on(shutdown_signal());

    tracing::info!(session_id = manager.session_id(), "Quote stream ready");

    manager.stopped().await;
    health_cancel.cancel();

    tracing::info!("Quote stream stopped");
    Ok(())
}

/// Log session events that are not already logged by the client.
async fn log_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(StreamEvent::Pricing(quote)) => {
                tracing::debug!(
                    symbol = %quote.symbol,
                    price = quote.price,
                    change_percent = ?quote.change_percent,
                    "Quote"
                );
            }
            Ok(StreamEvent::Heartbeat(info)) if !info.alive => {
                tracing::debug!(age_seconds = info.age_seconds, "Feed silent");
            }
            Ok(StreamEvent::Latency(info)) => {
                tracing::trace!(symbol = %info.symbol, latency_ms = info.latency_ms, "Latency");
            }
            Ok(StreamEvent::Shutdown(_)) | Err(RecvError::Closed) => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
        }
    }
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
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        url = %config.stream.url,
        symbols = config.symbols.len(),
        health_port = config.health_port,
        metrics_enabled = config.metrics_enabled,
        "Configuration loaded"
    );
    tracing::debug!(
        report_interval_minutes = config.stream.report_interval_minutes,
        refresh_interval_minutes = config.stream.refresh_interval_minutes,
        heartbeat_threshold_secs = config.stream.heartbeat_threshold_secs,
        reconnect_base_delay_ms = config.stream.reconnect_base_delay_ms,
        reconnect_max_delay_ms = config.stream.reconnect_max_delay_ms,
        features = ?config.stream.features,
        "Stream settings"
    );
}

/// Resolve on SIGTERM or SIGINT.
async fn shutdown_signal() {
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
