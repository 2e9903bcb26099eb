//! Identifier and credential newtypes for the broadcast relay.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identity of one open client connection.
///
/// Stable for the lifetime of the connection; used as the registry key and
/// for self-exclusion during fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A one-time admission credential handed out by the ticket backend.
///
/// Serializes as a bare number so `/getticket` returns `{"ticket": 42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketValue(pub u64);

impl TicketValue {
    /// The wire form a client submits as its first message.
    #[must_use]
    pub fn as_candidate(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for TicketValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
