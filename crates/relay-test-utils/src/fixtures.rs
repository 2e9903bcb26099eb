//! Hub-level test connections.
//!
//! A `TestConnection` is a `ConnectionHandle` whose outbound queue is read by
//! the test instead of a socket writer.

use common::types::ConnectionId;
use relay_service::hub::{CloseReason, ConnectionHandle, Outbound};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default outbound capacity for test connections.
pub const TEST_QUEUE_CAPACITY: usize = 64;

/// How long `next_text` waits before failing the test.
const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// A connection whose outbound frames the test can inspect.
pub struct TestConnection {
    handle: ConnectionHandle,
    outbound: Option<mpsc::Receiver<Outbound>>,
    cancel_token: CancellationToken,
}

impl TestConnection {
    /// Create a connection with the default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(TEST_QUEUE_CAPACITY)
    }

    /// Create a connection with a specific queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let cancel_token = CancellationToken::new();
        let (handle, outbound) =
            ConnectionHandle::new(ConnectionId::new(), capacity, cancel_token.clone());
        Self {
            handle,
            outbound: Some(outbound),
            cancel_token,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// A handle to pass to `BroadcastHub::connect`.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Drop the receiving side, as if the socket writer had exited.
    pub fn drop_writer(&mut self) {
        self.outbound = None;
    }

    fn outbound(&mut self) -> &mut mpsc::Receiver<Outbound> {
        self.outbound
            .as_mut()
            .expect("writer side of test connection was dropped")
    }

    /// Take every text frame queued so far.
    pub fn drain_texts(&mut self) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(frame) = self.outbound().try_recv() {
            if let Outbound::Text(text) = frame {
                texts.push(text.to_string());
            }
        }
        texts
    }

    /// Wait for the next frame and assert it is text.
    pub async fn next_text(&mut self) -> String {
        match tokio::time::timeout(RECEIVE_TIMEOUT, self.outbound().recv()).await {
            Ok(Some(Outbound::Text(text))) => text.to_string(),
            Ok(Some(other)) => panic!("expected text frame, got {other:?}"),
            Ok(None) => panic!("outbound queue closed"),
            Err(_) => panic!("no frame within {RECEIVE_TIMEOUT:?}"),
        }
    }

    /// The close reason if a close frame is queued next, skipping text.
    pub fn take_close(&mut self) -> Option<CloseReason> {
        while let Ok(frame) = self.outbound().try_recv() {
            if let Outbound::Close(reason) = frame {
                return Some(reason);
            }
        }
        None
    }

    /// Whether no frames are queued.
    pub fn is_idle(&mut self) -> bool {
        self.outbound().is_empty()
    }
}

impl Default for TestConnection {
    fn default() -> Self {
        Self::new()
    }
}
