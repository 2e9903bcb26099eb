//! `BroadcastHub` - bridges connection lifecycle events to the registry and
//! the per-connection admission gates, and performs the fan-out.
//!
//! | Event      | Action                                                 |
//! |------------|--------------------------------------------------------|
//! | connect    | queue the acknowledgement, register                    |
//! | message    | `AdmissionGate::submit`, then admit / fan out / reject |
//! | disconnect | remove from the registry (idempotent)                  |
//! | error      | remove from the registry (idempotent)                  |
//!
//! A rejected connection is closed and removed right away; the disconnect that
//! the close later produces finds nothing to remove.

use super::connection::{CloseReason, ConnectionHandle};
use super::gate::{AdmissionGate, AdmissionState, GateOutcome, RejectReason};
use super::registry::ConnectionRegistry;
use crate::errors::RelayError;
use crate::observability::metrics;
use crate::tickets::TicketService;
use common::types::ConnectionId;

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-connection state owned by the connection's own task.
#[derive(Debug)]
pub struct ConnectionSession {
    handle: ConnectionHandle,
    gate: AdmissionGate,
}

impl ConnectionSession {
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    #[must_use]
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    #[must_use]
    pub fn admission_state(&self) -> AdmissionState {
        self.gate.state()
    }

    #[must_use]
    pub fn is_admitted(&self) -> bool {
        self.gate.is_admitted()
    }
}

/// Outcome of one fan-out round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Targets whose queue accepted the payload.
    pub delivered: usize,
    /// Targets that could not take the payload (full queue or closed).
    pub failed: usize,
}

/// What the hub did with one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// The payload was a valid ticket; the connection is now admitted.
    Admitted,
    /// The payload was relayed to every other connection.
    Broadcast(FanOutReport),
    /// The ticket was refused; the connection has been closed and removed.
    /// The transport should stop reading from it.
    Closed(RejectReason),
}

/// The relay's core: one per process, shared by every connection task.
pub struct BroadcastHub {
    registry: ConnectionRegistry,
    tickets: Arc<dyn TicketService>,
    ack_message: Arc<str>,
}

impl BroadcastHub {
    /// Create a hub validating tickets against `tickets` and greeting every
    /// new connection with `ack_message`.
    pub fn new(tickets: Arc<dyn TicketService>, ack_message: impl Into<Arc<str>>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            tickets,
            ack_message: ack_message.into(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Handle a connect event.
    ///
    /// The acknowledgement is queued before the connection becomes visible to
    /// fan-out, so it is always the first frame the client sees.
    #[instrument(skip_all, name = "relay.hub.connect", fields(connection_id = %handle.id()))]
    pub fn connect(&self, handle: ConnectionHandle) -> ConnectionSession {
        if let Err(e) = handle.send_text(Arc::clone(&self.ack_message)) {
            warn!(
                target: "relay.hub.broadcast",
                connection_id = %handle.id(),
                error = %e,
                "Failed to queue acknowledgement"
            );
        }

        self.registry.add(handle.clone());
        info!(
            target: "relay.hub.broadcast",
            connection_id = %handle.id(),
            connections = self.registry.len(),
            "Connection opened"
        );

        ConnectionSession {
            handle,
            gate: AdmissionGate::new(Arc::clone(&self.tickets)),
        }
    }

    /// Handle one inbound payload from `session`.
    #[instrument(
        skip_all,
        name = "relay.hub.message",
        fields(connection_id = %session.id(), payload_len = payload.len())
    )]
    pub async fn handle_message(
        &self,
        session: &mut ConnectionSession,
        payload: String,
    ) -> MessageDisposition {
        match session.gate.submit(payload).await {
            GateOutcome::Admit => {
                metrics::record_admission("admitted");
                info!(
                    target: "relay.hub.broadcast",
                    connection_id = %session.id(),
                    "Connection admitted"
                );
                MessageDisposition::Admitted
            }
            GateOutcome::Broadcast(payload) => {
                MessageDisposition::Broadcast(self.fan_out(&session.id(), payload))
            }
            GateOutcome::Reject(reason) => {
                metrics::record_admission(reason.as_str());
                self.reject(session, reason);
                MessageDisposition::Closed(reason)
            }
        }
    }

    fn reject(&self, session: &ConnectionSession, reason: RejectReason) {
        info!(
            target: "relay.hub.broadcast",
            connection_id = %session.id(),
            reason = reason.as_str(),
            "Admission refused, closing connection"
        );

        // Best effort: the peer may already be gone.
        if let Err(e) = session.handle.close(CloseReason::Rejected) {
            debug!(
                target: "relay.hub.broadcast",
                connection_id = %session.id(),
                error = %e,
                "Close of rejected connection failed"
            );
        }
        self.registry.remove(&session.id());
    }

    /// Send `payload` to every registered connection except `sender`.
    ///
    /// A failed target is logged and counted; the round always continues.
    pub fn fan_out(&self, sender: &ConnectionId, payload: impl Into<Arc<str>>) -> FanOutReport {
        let payload: Arc<str> = payload.into();
        let mut report = FanOutReport::default();

        self.registry.for_each_except(sender, |target| {
            match target.send_text(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    metrics::record_send_failure(e.send_failure_reason());
                    debug!(
                        target: "relay.hub.broadcast",
                        sender = %sender,
                        target_id = %target.id(),
                        error = %e,
                        "Send to target failed, continuing fan-out"
                    );
                }
            }
        });

        metrics::record_broadcast(report.delivered);
        debug!(
            target: "relay.hub.broadcast",
            sender = %sender,
            payload_len = payload.len(),
            delivered = report.delivered,
            failed = report.failed,
            "Fan-out complete"
        );
        report
    }

    /// Handle a disconnect event. Returns whether the connection was still
    /// registered.
    pub fn disconnect(&self, session: &ConnectionSession) -> bool {
        let removed = self.registry.remove(&session.id());
        if removed {
            info!(
                target: "relay.hub.broadcast",
                connection_id = %session.id(),
                connections = self.registry.len(),
                "Connection closed"
            );
        }
        removed
    }

    /// Handle a transport error event. Same effect as [`Self::disconnect`].
    pub fn connection_error(&self, session: &ConnectionSession, error: &RelayError) -> bool {
        warn!(
            target: "relay.hub.broadcast",
            connection_id = %session.id(),
            error = %error,
            "Connection error"
        );
        self.registry.remove(&session.id())
    }

    /// Ask every registered connection to close. Used on shutdown; entries are
    /// removed as each connection's task observes the close.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let connections = self.registry.snapshot();
        for connection in &connections {
            if let Err(e) = connection.close(reason) {
                debug!(
                    target: "relay.hub.broadcast",
                    connection_id = %connection.id(),
                    error = %e,
                    "Close failed"
                );
            }
        }
        connections.len()
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("connections", &self.registry.len())
            .finish_non_exhaustive()
    }
}
