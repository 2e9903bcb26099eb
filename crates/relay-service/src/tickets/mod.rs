//! Ticket Service contract and its Redis backend.
//!
//! The hub only needs two capabilities from the ticket backend: issue a fresh
//! credential, and decide whether a candidate is currently acceptable. How
//! values are generated, stored, and expired is the backend's business.
//!
//! - [`TicketService`] - the contract the hub and the HTTP surface depend on
//! - [`RedisTicketService`] - counter + single-use store in Redis

pub mod lua_scripts;
pub mod redis;

pub use self::redis::RedisTicketService;

use crate::errors::RelayError;
use common::types::TicketValue;

/// Candidate used by [`TicketService::probe`]. Never issued, so validating it
/// exercises the backend without consuming anything.
pub const PROBE_CANDIDATE: &str = "health-probe";

/// Issues and validates one-time admission tickets.
///
/// Implementations must be safe to call concurrently from every connection
/// task. `validate` returning `Err` means the backend could not answer; the
/// caller treats that as a failed validation (fail closed).
#[async_trait::async_trait]
pub trait TicketService: Send + Sync {
    /// Produce a fresh admission credential.
    async fn issue(&self) -> Result<TicketValue, RelayError>;

    /// Whether `candidate` is currently acceptable. A successful validation
    /// consumes the ticket.
    async fn validate(&self, candidate: &str) -> Result<bool, RelayError>;

    /// Connectivity check used by `/health`.
    async fn probe(&self) -> Result<(), RelayError> {
        self.validate(PROBE_CANDIDATE).await.map(|_| ())
    }
}
