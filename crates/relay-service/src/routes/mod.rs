//! HTTP routes for the relay.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::hub::BroadcastHub;
use crate::observability::{health_router, HealthState};
use crate::tickets::TicketService;
use crate::transport::{self, TransportSettings};

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Path clients open their relay WebSocket on.
pub const WS_PATH: &str = "/bbService";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The broadcast core.
    pub hub: Arc<BroadcastHub>,

    /// Ticket backend, shared with the hub.
    pub tickets: Arc<dyn TicketService>,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,

    /// Per-connection queue and timeout settings.
    pub transport: TransportSettings,

    /// Server-wide shutdown token; every connection runs on a child of it.
    pub shutdown: CancellationToken,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/bbService` - relay WebSocket
/// - `/status` - status line
/// - `/getticket` - issue an admission ticket
/// - `/health`, `/ready` - health probes
/// - `/metrics` - Prometheus text, when a recorder handle is given
/// - TraceLayer for request logging
/// - 30 second request timeout (upgrade requests complete before the socket
///   session starts, so relay connections are not affected)
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let health = health_router(Arc::clone(&state.health), Arc::clone(&state.tickets));

    let mut router = Router::new()
        .route(WS_PATH, get(transport::ws_handler))
        .route("/status", get(handlers::get_status))
        .route("/getticket", get(handlers::get_ticket))
        .with_state(state)
        .merge(health);

    if let Some(handle) = metrics_handle {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    router
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tickets::stub::StubTicketService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn app(tickets: StubTicketService) -> Router {
        let tickets: Arc<dyn TicketService> = Arc::new(tickets);
        let state = Arc::new(AppState {
            hub: Arc::new(BroadcastHub::new(Arc::clone(&tickets), "ack")),
            tickets,
            health: Arc::new(HealthState::new()),
            transport: TransportSettings {
                send_queue_capacity: 8,
                send_timeout: Duration::from_secs(1),
            },
            shutdown: CancellationToken::new(),
        });
        build_routes(state, None)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = app.oneshot(request).await.expect("Failed to execute request");
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_status_route() {
        let (status, json) = get_json(app(StubTicketService::accepting(&[])), "/status").await;

        assert_eq!(status, StatusCode::OK);
        assert!(json["status"]
            .as_str()
            .unwrap()
            .ends_with("The server is Running!"));
    }

    #[tokio::test]
    async fn test_getticket_route_issues_ticket() {
        let (status, json) = get_json(app(StubTicketService::accepting(&[])), "/getticket").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ticket"], 1);
    }

    #[tokio::test]
    async fn test_getticket_route_backend_down() {
        let (status, json) = get_json(app(StubTicketService::failing()), "/getticket").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"]["code"], "TICKET_SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_health_route_is_merged() {
        let (status, json) = get_json(app(StubTicketService::accepting(&[])), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "UP");
    }

    #[tokio::test]
    async fn test_metrics_route_absent_without_handle() {
        let (status, _) = get_json(app(StubTicketService::accepting(&[])), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let (status, _) = get_json(app(StubTicketService::accepting(&[])), WS_PATH).await;
        assert!(status.is_client_error());
    }
}
