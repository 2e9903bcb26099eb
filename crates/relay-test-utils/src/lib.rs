//! # Relay Test Utilities
//!
//! Shared test utilities for the broadcast relay.
//!
//! ## Modules
//!
//! - `mock_tickets` - In-memory ticket service with one-shot tickets
//! - `fixtures` - Hub-level test connections backed by a plain queue
//! - `server_harness` - Real relay router on a random local port
//! - `ws_client` - Minimal WebSocket client for end-to-end tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let tickets = Arc::new(MockTicketService::with_tickets(&["T1"]));
//!     let server = TestRelayServer::spawn(Arc::clone(&tickets)).await.unwrap();
//!
//!     let mut client = WsClient::connect(&server.ws_url()).await.unwrap();
//!     assert_eq!(client.next_text().await, "Connection established.");
//!     client.send_text("T1").await;
//! }
//! ```

pub mod fixtures;
pub mod mock_tickets;
pub mod server_harness;
pub mod ws_client;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_tickets::*;
pub use server_harness::*;
pub use ws_client::*;
