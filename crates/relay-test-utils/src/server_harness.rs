//! Test server harness for E2E testing
//!
//! Provides `TestRelayServer` for spawning real relay instances in tests.

use crate::mock_tickets::MockTicketService;
use relay_service::config::DEFAULT_ACK_MESSAGE;
use relay_service::hub::BroadcastHub;
use relay_service::observability::HealthState;
use relay_service::routes::{self, AppState, WS_PATH};
use relay_service::tickets::TicketService;
use relay_service::transport::TransportSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the relay in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_getticket_e2e() -> Result<(), anyhow::Error> {
///     let server = TestRelayServer::spawn(Arc::new(MockTicketService::new())).await?;
///
///     let body: serde_json::Value = reqwest::get(format!("{}/getticket", server.url()))
///         .await?
///         .json()
///         .await?;
///
///     assert_eq!(body["ticket"], 1);
///     Ok(())
/// }
/// ```
pub struct TestRelayServer {
    addr: SocketAddr,
    hub: Arc<BroadcastHub>,
    tickets: Arc<MockTicketService>,
    health: Arc<HealthState>,
    shutdown: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestRelayServer {
    /// Spawn a relay backed by `tickets` with default transport settings.
    pub async fn spawn(tickets: Arc<MockTicketService>) -> Result<Self, anyhow::Error> {
        Self::spawn_with_settings(
            tickets,
            TransportSettings {
                send_queue_capacity: 64,
                send_timeout: Duration::from_secs(2),
            },
        )
        .await
    }

    /// Spawn a relay with explicit transport settings.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP + WebSocket server in the background
    /// - Report ready on `/ready`
    pub async fn spawn_with_settings(
        tickets: Arc<MockTicketService>,
        transport: TransportSettings,
    ) -> Result<Self, anyhow::Error> {
        let dyn_tickets: Arc<dyn TicketService> = tickets.clone();
        let hub = Arc::new(BroadcastHub::new(
            Arc::clone(&dyn_tickets),
            DEFAULT_ACK_MESSAGE,
        ));
        let health = Arc::new(HealthState::new());
        let shutdown = CancellationToken::new();

        let state = Arc::new(AppState {
            hub: Arc::clone(&hub),
            tickets: dyn_tickets,
            health: Arc::clone(&health),
            transport,
            shutdown: shutdown.clone(),
        });

        // Build routes using the relay's real route builder
        let app = routes::build_routes(state, None);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        health.set_ready();

        Ok(Self {
            addr,
            hub,
            tickets,
            health,
            shutdown,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the relay WebSocket URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, WS_PATH)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn tickets(&self) -> &Arc<MockTicketService> {
        &self.tickets
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    /// Cancel every open relay connection, as server shutdown does.
    pub fn cancel_connections(&self) {
        self.shutdown.cancel();
    }

    /// Wait until the hub has exactly `count` registered connections.
    pub async fn wait_for_connections(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.hub.connection_count() != count {
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "expected {count} connections, hub has {}",
                    self.hub.connection_count()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestRelayServer {
    fn drop(&mut self) {
        // Stop open relay connections and the HTTP server task.
        self.shutdown.cancel();
        self._handle.abort();
    }
}
