//! Health endpoints for the relay.
//!
//! - `GET /health` - ticket backend reachability (JSON body)
//! - `GET /ready` - readiness probe (can we accept connections?)
//!
//! The `/metrics` endpoint is served separately via `metrics-exporter-prometheus`.

use crate::tickets::TicketService;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Health state for the relay.
///
/// `ready` is true while the relay accepts new connections (false during
/// startup and shutdown drain).
#[derive(Debug)]
pub struct HealthState {
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service as ready to serve traffic.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// `/health` response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "UP" or "DOWN".
    pub status: &'static str,
    /// "CONNECTED" or "DISCONNECTED".
    pub redis: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
}

#[derive(Clone)]
struct HealthContext {
    state: Arc<HealthState>,
    tickets: Arc<dyn TicketService>,
}

/// Create the health router.
///
/// # Endpoints
///
/// - `GET /health` - 200 with `status: UP` when the ticket backend answers a
///   probe, 503 with `status: DOWN` otherwise
/// - `GET /ready` - 200 if ready to accept connections, 503 otherwise
pub fn health_router(health_state: Arc<HealthState>, tickets: Arc<dyn TicketService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .with_state(HealthContext {
            state: health_state,
            tickets,
        })
}

#[instrument(skip_all, name = "relay.health.check")]
async fn health_handler(
    State(ctx): State<HealthContext>,
) -> (StatusCode, Json<HealthResponse>) {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match ctx.tickets.probe().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "UP",
                redis: "CONNECTED",
                error: None,
                timestamp,
            }),
        ),
        Err(e) => {
            warn!(target: "relay.http", error = %e, "Ticket backend unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "DOWN",
                    redis: "DISCONNECTED",
                    error: Some("Ticket backend unreachable".to_string()),
                    timestamp,
                }),
            )
        }
    }
}

async fn readiness_handler(State(ctx): State<HealthContext>) -> StatusCode {
    if ctx.state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
