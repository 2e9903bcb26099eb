//! Relay error types.
//!
//! Errors inside the hub are handled locally (logged, counted, and turned into
//! a closed connection or a skipped fan-out target). Only the HTTP surface
//! converts them into responses, via the `IntoResponse` impl below, and the
//! messages returned there never carry backend details.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Relay error type.
///
/// HTTP mapping:
/// - `TicketService`, `Redis`: 503 Service Unavailable
/// - everything else: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RelayError {
    /// Redis command or connection failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// The ticket backend could not answer an issue/validate request.
    #[error("Ticket service unavailable: {0}")]
    TicketService(String),

    /// The target's outbound queue is full (slow peer).
    #[error("Outbound queue full")]
    SendQueueFull,

    /// The target's writer has gone away; the connection is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A socket write did not finish within the configured timeout.
    #[error("Send timed out after {0}ms")]
    SendTimeout(u64),

    /// Transport-level failure reported by the socket.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RelayError {
    /// Bounded label for `relay_send_failures_total`.
    #[must_use]
    pub fn send_failure_reason(&self) -> &'static str {
        match self {
            RelayError::SendQueueFull => "queue_full",
            RelayError::ConnectionClosed => "closed",
            RelayError::SendTimeout(_) => "timeout",
            _ => "other",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            RelayError::TicketService(reason) | RelayError::Redis(reason) => {
                tracing::warn!(target: "relay.http", reason = %reason, "Ticket service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "TICKET_SERVICE_UNAVAILABLE",
                    "Ticket service temporarily unavailable",
                )
            }
            other => {
                tracing::error!(target: "relay.http", error = %other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}
