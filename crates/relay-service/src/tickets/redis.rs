//! Redis-backed ticket service.
//!
//! # Key Patterns
//!
//! - `{prefix}:counter` - monotonically increasing ticket counter
//! - `{prefix}:store` - LIST of issued, not yet redeemed tickets
//!
//! Validation removes exactly one occurrence of the candidate from the store
//! (`LREM store 1 candidate`), so each ticket admits exactly one connection.
//!
//! # Connection Pattern
//!
//! `MultiplexedConnection` is cheap to clone and safe to use concurrently; each
//! call clones it instead of sharing a lock.

use super::lua_scripts;
use super::TicketService;
use crate::errors::RelayError;
use crate::observability::metrics::{record_ticket_issued, record_ticket_latency};
use common::types::TicketValue;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

/// Ticket service storing issued tickets in Redis.
#[derive(Clone)]
pub struct RedisTicketService {
    connection: MultiplexedConnection,
    counter_key: String,
    store_key: String,
    issue_script: Script,
}

/// Whether `candidate` is spelled exactly as an issued ticket is stored.
///
/// Tickets are stored as plain decimal integers, so anything else (padding,
/// leading zeros, signs) can never match and is rejected without a round trip.
pub(crate) fn is_stored_form(candidate: &str) -> bool {
    candidate
        .parse::<u64>()
        .is_ok_and(|value| value.to_string() == candidate)
}

impl RedisTicketService {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Redis` if the URL is invalid or the connection fails.
    pub async fn connect(redis_url: &str, key_prefix: &str) -> Result<Self, RelayError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do NOT log redis_url, it may contain credentials
            error!(
                target: "relay.tickets.redis",
                error = %e,
                "Failed to open Redis client"
            );
            RelayError::Redis(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(
                    target: "relay.tickets.redis",
                    error = %e,
                    "Failed to connect to Redis"
                );
                RelayError::Redis(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self::with_connection(connection, key_prefix))
    }

    /// Build from an existing connection.
    #[must_use]
    pub fn with_connection(connection: MultiplexedConnection, key_prefix: &str) -> Self {
        Self {
            connection,
            counter_key: format!("{key_prefix}:counter"),
            store_key: format!("{key_prefix}:store"),
            issue_script: Script::new(lua_scripts::ISSUE_TICKET),
        }
    }
}

#[async_trait::async_trait]
impl TicketService for RedisTicketService {
    #[instrument(skip_all, name = "relay.tickets.issue")]
    async fn issue(&self) -> Result<TicketValue, RelayError> {
        let mut conn = self.connection.clone();
        let start = Instant::now();

        let ticket: u64 = self
            .issue_script
            .key(&self.counter_key)
            .key(&self.store_key)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(
                    target: "relay.tickets.redis",
                    error = %e,
                    "Failed to issue ticket"
                );
                RelayError::TicketService(format!("Failed to issue ticket: {e}"))
            })?;

        record_ticket_latency("issue", start.elapsed());
        record_ticket_issued();

        debug!(target: "relay.tickets.redis", "Issued ticket");
        Ok(TicketValue(ticket))
    }

    #[instrument(skip_all, name = "relay.tickets.validate")]
    async fn validate(&self, candidate: &str) -> Result<bool, RelayError> {
        if !is_stored_form(candidate) {
            debug!(
                target: "relay.tickets.redis",
                candidate_len = candidate.len(),
                "Candidate is not a ticket value"
            );
            return Ok(false);
        }

        let mut conn = self.connection.clone();
        let start = Instant::now();

        let removed: i64 = conn
            .lrem(&self.store_key, 1, candidate)
            .await
            .map_err(|e| {
                warn!(
                    target: "relay.tickets.redis",
                    error = %e,
                    "Failed to validate ticket"
                );
                RelayError::TicketService(format!("Failed to validate ticket: {e}"))
            })?;

        record_ticket_latency("validate", start.elapsed());

        Ok(removed > 0)
    }

    #[instrument(skip_all, name = "relay.tickets.probe")]
    async fn probe(&self) -> Result<(), RelayError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.exists(&self.store_key).await.map_err(|e| {
            warn!(
                target: "relay.tickets.redis",
                error = %e,
                "Ticket backend probe failed"
            );
            RelayError::TicketService(format!("Probe failed: {e}"))
        })?;
        Ok(())
    }
}
