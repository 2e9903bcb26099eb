//! Status handler.
//!
//! A human-readable liveness line. Unlike `/health` it does not touch the
//! ticket backend.

use axum::Json;
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::fmt::Display;

/// `/status` response body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Render the status line for `now`.
pub fn status_line<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "Greetings from the relay. {}, {}. The server is Running!",
        now.format("%Y-%m-%d"),
        now.format("%H:%M:%S")
    )
}

/// Status handler.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "Greetings from the relay. 2024-05-01, 14:03:22. The server is Running!"
/// }
/// ```
pub async fn get_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: status_line(&chrono::Local::now()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_status_line_format() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 14, 3, 22).unwrap();

        assert_eq!(
            status_line(&now),
            "Greetings from the relay. 2024-05-01, 14:03:22. The server is Running!"
        );
    }

    #[tokio::test]
    async fn test_get_status_reports_running() {
        let Json(response) = get_status().await;
        assert!(response.status.starts_with("Greetings from the relay. "));
        assert!(response.status.ends_with("The server is Running!"));
    }
}
