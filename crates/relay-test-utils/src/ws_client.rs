//! Minimal WebSocket client for end-to-end relay tests.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long a receive waits before failing the test.
pub const WS_RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the server did with the socket, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    Text(String),
    /// Close frame with its code, if any.
    Closed(Option<u16>),
}

/// A connected relay client.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Connect to `url` (e.g. `ws://127.0.0.1:1234/bbService`).
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to {}: {}", url, e))?;
        Ok(Self { stream })
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .expect("failed to send text frame");
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, bytes: Vec<u8>) {
        self.stream
            .send(Message::Binary(bytes))
            .await
            .expect("failed to send binary frame");
    }

    /// Next text or close, skipping control frames. Panics on timeout.
    pub async fn next_event(&mut self) -> WsEvent {
        self.next_event_within(WS_RECEIVE_TIMEOUT)
            .await
            .unwrap_or_else(|| panic!("no frame within {WS_RECEIVE_TIMEOUT:?}"))
    }

    /// Next text or close within `wait`; `None` if nothing arrived.
    pub async fn next_event_within(&mut self, wait: Duration) -> Option<WsEvent> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .ok()?;
            match frame {
                Some(Ok(Message::Text(text))) => return Some(WsEvent::Text(text)),
                Some(Ok(Message::Close(frame))) => {
                    return Some(WsEvent::Closed(frame.map(|f| u16::from(f.code))))
                }
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return Some(WsEvent::Closed(None)),
            }
        }
    }

    /// Next text frame. Panics if the socket closes or times out instead.
    pub async fn next_text(&mut self) -> String {
        match self.next_event().await {
            WsEvent::Text(text) => text,
            WsEvent::Closed(code) => panic!("expected text, socket closed with {code:?}"),
        }
    }

    /// Assert that no text arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Some(WsEvent::Text(text)) = self.next_event_within(wait).await {
            panic!("expected no message, got {text:?}");
        }
    }

    /// Wait for the server to close the socket and return the close code.
    pub async fn expect_closed(&mut self) -> Option<u16> {
        loop {
            match self.next_event().await {
                WsEvent::Closed(code) => return code,
                WsEvent::Text(_) => continue,
            }
        }
    }

    /// Close the socket from the client side.
    pub async fn close(mut self) {
        let _ = self
            .stream
            .close(Some(
                tokio_tungstenite::tungstenite::protocol::CloseFrame {
                    code: CloseCode::Normal,
                    reason: "bye".into(),
                },
            ))
            .await;
    }
}
