//! Ticket issuance handler.

use crate::errors::RelayError;
use crate::routes::AppState;
use common::types::TicketValue;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// `/getticket` response body.
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket: TicketValue,
}

/// Issue a fresh admission ticket.
///
/// The client sends the returned value as its first WebSocket message.
///
/// ## Responses
///
/// - 200 `{"ticket": 42}`
/// - 503 `{"error": {"code": "TICKET_SERVICE_UNAVAILABLE", ...}}` when the
///   backend cannot be reached
#[instrument(skip_all, name = "relay.http.get_ticket")]
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TicketResponse>, RelayError> {
    let ticket = state.tickets.issue().await?;
    debug!(target: "relay.http", "Ticket issued");
    Ok(Json(TicketResponse { ticket }))
}
