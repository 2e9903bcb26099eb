//! Broadcast Relay Service Library
//!
//! A ticket-gated real-time relay: clients fetch a one-time ticket over HTTP,
//! open a WebSocket, present the ticket as their first message, and from then
//! on every message they send is fanned out to every other open connection.
//!
//! # Architecture
//!
//! ```text
//! HTTP: /getticket /status /health /ready /metrics
//!   │
//!   └── TicketService (Redis counter + single-use store)
//!            ▲
//! WS: /bbService ──> transport ──> BroadcastHub
//!                                   ├── ConnectionRegistry (shared)
//!                                   └── ConnectionSession  (per connection)
//!                                        └── AdmissionGate
//! ```
//!
//! # Key Design Decisions
//!
//! - **Explicit injection**: the hub receives its ticket backend as an
//!   `Arc<dyn TicketService>` at construction
//! - **Non-blocking fan-out**: every connection has a bounded outbound queue;
//!   a slow peer loses messages instead of stalling the round
//! - **Fail closed**: a ticket backend error refuses admission
//! - **Eager removal**: a rejected connection leaves the registry immediately
//!
//! # Modules
//!
//! - [`hub`] - registry, admission gate, fan-out
//! - [`tickets`] - ticket service contract and Redis backend
//! - [`transport`] - WebSocket boundary
//! - [`handlers`], [`routes`] - HTTP surface
//! - [`observability`] - health probes and metrics
//! - [`config`] - service configuration from environment
//! - [`errors`] - error types and HTTP mapping

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod hub;
pub mod observability;
pub mod routes;
pub mod tickets;
pub mod transport;
