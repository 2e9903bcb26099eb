//! `AdmissionGate` - per-connection admission state machine.
//!
//! ```text
//!   Unadmitted --(valid ticket)--> Admitted
//!       |
//!       +--(invalid ticket / backend error)--> Reject (connection closed)
//! ```
//!
//! While unadmitted, every payload is a ticket candidate. Once admitted, every
//! payload is relayed verbatim and never re-validated. There is no way back.
//! The gate performs no I/O of its own beyond the ticket service call.

use crate::tickets::TicketService;

use std::sync::Arc;
use tracing::{debug, warn};

/// Admission state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Unadmitted,
    Admitted,
}

/// Why a candidate was refused. Both have the same effect on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The ticket service answered "not acceptable".
    InvalidTicket,
    /// The ticket service could not answer; fail closed.
    TicketServiceUnavailable,
}

impl RejectReason {
    /// Label for `relay_admissions_total`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidTicket => "invalid_ticket",
            RejectReason::TicketServiceUnavailable => "ticket_service_unavailable",
        }
    }
}

/// Result of submitting one payload to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The payload was a valid ticket; the connection is now admitted.
    Admit,
    /// The connection is admitted; relay this payload.
    Broadcast(String),
    /// The candidate was refused; the connection must be closed.
    Reject(RejectReason),
}

/// Admission gate for one connection.
///
/// Owned by the connection's own task, so no synchronization is needed.
pub struct AdmissionGate {
    state: AdmissionState,
    tickets: Arc<dyn TicketService>,
}

impl AdmissionGate {
    /// Create a gate in the `Unadmitted` state.
    #[must_use]
    pub fn new(tickets: Arc<dyn TicketService>) -> Self {
        Self {
            state: AdmissionState::Unadmitted,
            tickets,
        }
    }

    #[must_use]
    pub fn state(&self) -> AdmissionState {
        self.state
    }

    #[must_use]
    pub fn is_admitted(&self) -> bool {
        self.state == AdmissionState::Admitted
    }

    /// Route one inbound payload.
    pub async fn submit(&mut self, payload: String) -> GateOutcome {
        if self.state == AdmissionState::Admitted {
            return GateOutcome::Broadcast(payload);
        }

        match self.tickets.validate(&payload).await {
            Ok(true) => {
                self.state = AdmissionState::Admitted;
                GateOutcome::Admit
            }
            Ok(false) => {
                debug!(
                    target: "relay.hub.gate",
                    candidate_len = payload.len(),
                    "Ticket rejected"
                );
                GateOutcome::Reject(RejectReason::InvalidTicket)
            }
            Err(e) => {
                warn!(
                    target: "relay.hub.gate",
                    error = %e,
                    "Ticket service unavailable, refusing admission"
                );
                GateOutcome::Reject(RejectReason::TicketServiceUnavailable)
            }
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tickets::stub::StubTicketService;

    fn gate(tickets: StubTicketService) -> AdmissionGate {
        AdmissionGate::new(Arc::new(tickets))
    }

    #[tokio::test]
    async fn test_valid_ticket_admits() {
        let mut gate = gate(StubTicketService::accepting(&["T1"]));

        assert_eq!(gate.state(), AdmissionState::Unadmitted);
        assert_eq!(gate.submit("T1".to_string()).await, GateOutcome::Admit);
        assert_eq!(gate.state(), AdmissionState::Admitted);
    }

    #[tokio::test]
    async fn test_admitted_gate_broadcasts_verbatim() {
        let mut gate = gate(StubTicketService::accepting(&["T1"]));
        gate.submit("T1".to_string()).await;

        assert_eq!(
            gate.submit("p(3,4)".to_string()).await,
            GateOutcome::Broadcast("p(3,4)".to_string())
        );
        // A payload equal to a ticket is still just a message once admitted.
        assert_eq!(
            gate.submit("T1".to_string()).await,
            GateOutcome::Broadcast("T1".to_string())
        );
        assert!(gate.is_admitted());
    }

    #[tokio::test]
    async fn test_invalid_ticket_rejects_and_stays_unadmitted() {
        let mut gate = gate(StubTicketService::accepting(&["T1"]));

        assert_eq!(
            gate.submit("bogus".to_string()).await,
            GateOutcome::Reject(RejectReason::InvalidTicket)
        );
        assert_eq!(gate.state(), AdmissionState::Unadmitted);
    }

    #[tokio::test]
    async fn test_unadmitted_never_broadcasts() {
        let mut gate = gate(StubTicketService::accepting(&[]));

        for payload in ["a", "p(1,2)", "", "42"] {
            let outcome = gate.submit(payload.to_string()).await;
            assert!(!matches!(outcome, GateOutcome::Broadcast(_)));
        }
        assert!(!gate.is_admitted());
    }

    #[tokio::test]
    async fn test_ticket_is_single_use_across_gates() {
        let tickets: Arc<dyn TicketService> = Arc::new(StubTicketService::accepting(&["T1"]));
        let mut first = AdmissionGate::new(Arc::clone(&tickets));
        let mut second = AdmissionGate::new(tickets);

        assert_eq!(first.submit("T1".to_string()).await, GateOutcome::Admit);
        assert_eq!(
            second.submit("T1".to_string()).await,
            GateOutcome::Reject(RejectReason::InvalidTicket)
        );
    }

    #[tokio::test]
    async fn test_backend_failure_fails_closed() {
        let mut gate = gate(StubTicketService::failing());

        assert_eq!(
            gate.submit("T1".to_string()).await,
            GateOutcome::Reject(RejectReason::TicketServiceUnavailable)
        );
        assert!(!gate.is_admitted());
    }

    #[test]
    fn test_reject_reason_labels() {
        assert_eq!(RejectReason::InvalidTicket.as_str(), "invalid_ticket");
        assert_eq!(
            RejectReason::TicketServiceUnavailable.as_str(),
            "ticket_service_unavailable"
        );
    }
}
