//! Broadcast Relay
//!
//! Ticket-gated WebSocket broadcast relay.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Connect the Redis ticket backend
//! 5. Build the broadcast hub with the ticket backend injected
//! 6. Bind the HTTP + WebSocket listener (fail fast)
//! 7. Serve until Ctrl+C / SIGTERM
//!
//! # Shutdown Flow
//!
//! 1. Mark not ready and stop accepting new connections
//! 2. Ask every open connection to close
//! 3. Wait up to `RELAY_SHUTDOWN_GRACE_SECONDS` for the registry to drain
//! 4. Cancel whatever is left

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::secret::ExposeSecret;
use relay_service::config::{Config, LogFormat};
use relay_service::hub::{BroadcastHub, CloseReason};
use relay_service::observability::{init_metrics_recorder, HealthState};
use relay_service::routes::{build_routes, AppState};
use relay_service::tickets::{RedisTicketService, TicketService};
use relay_service::transport::TransportSettings;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Poll interval while waiting for connections to drain.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Config is not loaded yet; an invalid value is reported by Config::from_env below.
    let log_format = std::env::var("RELAY_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(LogFormat::Text);
    init_tracing(log_format);

    info!("Starting Broadcast Relay");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        relay_id = %config.relay_id,
        bind_address = %config.bind_address,
        ticket_key_prefix = %config.ticket_key_prefix,
        send_queue_capacity = config.send_queue_capacity,
        send_timeout_ms = config.send_timeout.as_millis(),
        shutdown_grace_seconds = config.shutdown_grace.as_secs(),
        "Configuration loaded successfully"
    );

    // This must happen before any metrics are recorded
    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    info!("Connecting to Redis...");
    let tickets: Arc<dyn TicketService> = Arc::new(
        RedisTicketService::connect(config.redis_url.expose_secret(), &config.ticket_key_prefix)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to connect to Redis");
                e
            })?,
    );
    info!("Redis connection established");

    let hub = Arc::new(BroadcastHub::new(
        Arc::clone(&tickets),
        config.ack_message.as_str(),
    ));

    // Connections run on children of this token
    let connections_token = CancellationToken::new();

    let state = Arc::new(AppState {
        hub: Arc::clone(&hub),
        tickets,
        health: Arc::clone(&health_state),
        transport: TransportSettings {
            send_queue_capacity: config.send_queue_capacity,
            send_timeout: config.send_timeout,
        },
        shutdown: connections_token.clone(),
    });
    let app = build_routes(state, Some(prometheus_handle));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        format!("Invalid bind address: {e}")
    })?;

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind listener");
        format!("Failed to bind listener to {addr}: {e}")
    })?;
    info!(addr = %addr, "Listener bound successfully");

    let accept_token = CancellationToken::new();
    let server_accept_token = accept_token.clone();
    let server = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            server_accept_token.cancelled().await;
            info!("HTTP server no longer accepting connections");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    health_state.set_ready();
    info!("Broadcast Relay running - press Ctrl+C to shutdown");

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop sending traffic
    health_state.set_not_ready();
    accept_token.cancel();

    let closing = hub.close_all(CloseReason::ShuttingDown);
    info!(connections = closing, "Closing open connections");

    if tokio::time::timeout(config.shutdown_grace, wait_for_drain(&hub))
        .await
        .is_err()
    {
        warn!(
            remaining = hub.connection_count(),
            "Connections did not drain within grace period, cancelling"
        );
    }
    connections_token.cancel();

    if tokio::time::timeout(config.shutdown_grace, server).await.is_err() {
        warn!("HTTP server did not stop within grace period");
    }

    info!("Broadcast Relay shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relay_service=debug,tower_http=debug".into());

    let (text_layer, json_layer) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}

async fn wait_for_drain(hub: &BroadcastHub) {
    while hub.connection_count() > 0 {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
