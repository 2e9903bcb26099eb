//! WebSocket transport for the relay.
//!
//! Each accepted socket is split into a reader half, driven by the
//! connection's own task, and a writer half owned by a spawned writer task:
//!
//! ```text
//! socket ──reader──> BroadcastHub::handle_message ──fan-out──> other queues
//!        <─writer─── mpsc::Receiver<Outbound>      <─────────── ConnectionHandle
//! ```
//!
//! Cancelling the connection's token (server shutdown, failed write, or a
//! close request on a full queue) stops both halves. A close that could not
//! be queued skips any text still pending for the peer.

use crate::errors::RelayError;
use crate::hub::{BroadcastHub, CloseReason, ConnectionHandle, MessageDisposition, Outbound};
use crate::observability::metrics::record_send_failure;
use crate::routes::AppState;
use common::types::ConnectionId;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-connection transport settings, taken from `Config`.
#[derive(Debug, Clone, Copy)]
pub struct TransportSettings {
    /// Outbound queue capacity per connection.
    pub send_queue_capacity: usize,
    /// Timeout for writing a single frame to the socket.
    pub send_timeout: Duration,
}

/// `GET /bbService` - upgrade to a relay WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        serve_connection(
            socket,
            Arc::clone(&state.hub),
            state.transport,
            state.shutdown.clone(),
        )
    })
}

/// Drive one relay connection until it closes.
///
/// Runs the reader loop on the calling task and the writer on a spawned one.
/// `shutdown` is the server-wide token; the connection gets a child of it.
/// Returns once the connection is removed from the hub and the writer has
/// finished (or the send timeout elapsed waiting for it).
pub async fn serve_connection(
    socket: WebSocket,
    hub: Arc<BroadcastHub>,
    settings: TransportSettings,
    shutdown: CancellationToken,
) {
    let id = ConnectionId::new();
    let cancel_token = shutdown.child_token();
    let (ws_tx, mut ws_rx) = socket.split();
    let (handle, outbound) =
        ConnectionHandle::new(id, settings.send_queue_capacity, cancel_token.clone());

    let writer = tokio::spawn(run_writer(
        handle.clone(),
        ws_tx,
        outbound,
        cancel_token.clone(),
        shutdown,
        settings.send_timeout,
    ));

    let mut session = hub.connect(handle);
    debug!(target: "relay.transport.ws", connection_id = %id, "WebSocket reader started");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(target: "relay.transport.ws", connection_id = %id, "Connection cancelled");
                hub.disconnect(&session);
                break;
            }
            frame = ws_rx.next() => {
                let payload = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!(
                                target: "relay.transport.ws",
                                connection_id = %id,
                                "Ignoring non-UTF-8 binary frame"
                            );
                            continue;
                        }
                    },
                    // Pong replies are queued by axum itself.
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => {
                        hub.disconnect(&session);
                        break;
                    }
                    Some(Err(e)) => {
                        hub.connection_error(&session, &RelayError::Transport(e.to_string()));
                        break;
                    }
                };

                if let MessageDisposition::Closed(_) = hub.handle_message(&mut session, payload).await {
                    break;
                }
            }
        }
    }

    // Lets the writer stop if it is still waiting on the queue. A queued
    // close frame is flushed first because the writer drains the queue
    // before it checks the token.
    cancel_token.cancel();
    if tokio::time::timeout(settings.send_timeout, writer).await.is_err() {
        warn!(
            target: "relay.transport.ws",
            connection_id = %id,
            "Writer did not finish within send timeout"
        );
    }
    debug!(target: "relay.transport.ws", connection_id = %id, "WebSocket connection finished");
}

/// Drain `outbound` into `sink` until a close frame, cancellation, or a
/// failed write.
async fn run_writer<S>(
    handle: ConnectionHandle,
    mut sink: S,
    mut outbound: mpsc::Receiver<Outbound>,
    cancel_token: CancellationToken,
    shutdown: CancellationToken,
    send_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let id = handle.id();

    loop {
        if let Some(reason) = handle.forced_close() {
            send_close(&mut sink, id, reason, send_timeout).await;
            break;
        }

        let next = tokio::select! {
            biased;
            frame = outbound.recv() => frame,
            () = cancel_token.cancelled() => {
                if shutdown.is_cancelled() {
                    Some(Outbound::Close(CloseReason::ShuttingDown))
                } else {
                    handle.forced_close().map(Outbound::Close)
                }
            }
        };

        match next {
            // Pending text is dropped once a forced close is recorded.
            Some(Outbound::Text(_)) if handle.forced_close().is_some() => {}
            Some(Outbound::Text(text)) => {
                if let Err(e) =
                    write_frame(&mut sink, Message::Text(text.to_string()), send_timeout).await
                {
                    record_send_failure(e.send_failure_reason());
                    warn!(
                        target: "relay.transport.ws",
                        connection_id = %id,
                        error = %e,
                        "Socket write failed, closing connection"
                    );
                    cancel_token.cancel();
                    break;
                }
            }
            Some(Outbound::Close(reason)) => {
                send_close(&mut sink, id, reason, send_timeout).await;
                cancel_token.cancel();
                break;
            }
            None => {
                // Peer went away or the reader finished; complete the close
                // handshake if the socket still allows it.
                let _ = tokio::time::timeout(send_timeout, sink.close()).await;
                break;
            }
        }
    }
}

async fn send_close<S>(
    sink: &mut S,
    id: ConnectionId,
    reason: CloseReason,
    send_timeout: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let frame = Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.as_str().into(),
    }));
    if let Err(e) = write_frame(sink, frame, send_timeout).await {
        debug!(
            target: "relay.transport.ws",
            connection_id = %id,
            error = %e,
            "Close frame not delivered"
        );
    }
    info!(
        target: "relay.transport.ws",
        connection_id = %id,
        reason = reason.as_str(),
        "Closed connection"
    );
}

async fn write_frame<S>(
    sink: &mut S,
    frame: Message,
    send_timeout: Duration,
) -> Result<(), RelayError>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match tokio::time::timeout(send_timeout, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RelayError::Transport(e.to_string())),
        Err(_) => Err(RelayError::SendTimeout(
            u64::try_from(send_timeout.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}
