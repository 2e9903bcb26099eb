//! `ConnectionHandle` - the hub's addressable view of one open client channel.
//!
//! A handle pairs the connection's identity with the sending half of a bounded
//! outbound queue. The transport's writer task owns the receiving half and the
//! socket; the hub never touches the socket directly.
//!
//! Sends never block: a full queue is reported as `RelayError::SendQueueFull`
//! and a queue whose writer is gone as `RelayError::ConnectionClosed`. That
//! keeps one slow peer from stalling a broadcast round for everyone else.

use crate::errors::RelayError;
use common::types::ConnectionId;

use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why the hub is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The first payload was not an acceptable ticket.
    Rejected,
    /// The relay is shutting down.
    ShuttingDown,
}

impl CloseReason {
    /// WebSocket close code (RFC 6455 section 7.4.1).
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            CloseReason::Rejected => 1008,
            CloseReason::ShuttingDown => 1001,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Rejected => "invalid ticket",
            CloseReason::ShuttingDown => "server shutting down",
        }
    }
}

/// Frames queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame. Shared so one fan-out does not copy the payload per target.
    Text(Arc<str>),
    /// Send a close frame and stop writing.
    Close(CloseReason),
}

/// Handle to one open connection.
///
/// Cheap to clone; the registry holds one clone per connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<Outbound>,
    cancel_token: CancellationToken,
    // Close reason that could not be queued; shared by every clone.
    forced_close: Arc<OnceLock<CloseReason>>,
}

impl ConnectionHandle {
    /// Create a handle and the outbound receiver its writer task drains.
    ///
    /// `cancel_token` is the connection's own token; cancelling it tells the
    /// transport to tear the connection down.
    #[must_use]
    pub fn new(
        id: ConnectionId,
        capacity: usize,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                sender,
                cancel_token,
                forced_close: Arc::new(OnceLock::new()),
            },
            receiver,
        )
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame for this connection.
    ///
    /// # Errors
    ///
    /// - `RelayError::SendQueueFull` if the peer is not draining its queue
    /// - `RelayError::ConnectionClosed` if the connection is already torn down
    pub fn send_text(&self, text: impl Into<Arc<str>>) -> Result<(), RelayError> {
        if self.cancel_token.is_cancelled() {
            return Err(RelayError::ConnectionClosed);
        }

        self.sender
            .try_send(Outbound::Text(text.into()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RelayError::SendQueueFull,
                mpsc::error::TrySendError::Closed(_) => RelayError::ConnectionClosed,
            })
    }

    /// Ask the transport to close this connection.
    ///
    /// If the queue is full the close frame cannot be queued behind pending
    /// text; the reason is recorded on the handle and the connection token is
    /// cancelled instead. The writer then discards the pending text and sends
    /// the recorded reason.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::ConnectionClosed` if the connection is already gone.
    pub fn close(&self, reason: CloseReason) -> Result<(), RelayError> {
        match self.sender.try_send(Outbound::Close(reason)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.forced_close.set(reason);
                self.cancel_token.cancel();
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RelayError::ConnectionClosed),
        }
    }

    /// The reason of a close that bypassed the full queue, if any.
    #[must_use]
    pub fn forced_close(&self) -> Option<CloseReason> {
        self.forced_close.get().copied()
    }

    /// Whether the writer side has gone away or the connection was cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.cancel_token.is_cancelled()
    }
}
