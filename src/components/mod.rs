use crate::error::{AppResult, Error};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::debug;

// Export components
pub mod google_auth;
pub mod google_calendar;
pub mod google_drive;

// Re-export the API seams used by the run driver
pub use google_calendar::{CalendarApi, GoogleCalendarClient};
pub use google_drive::{DriveApi, GoogleDriveClient};

/// Send an authorized Google API request and decode the JSON response.
///
/// `context` names the operation in error messages, `make_error` picks the
/// error variant for the API being called.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    access_token: &str,
    context: &str,
    make_error: fn(&str) -> Error,
) -> AppResult<T> {
    let response = request
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| make_error(&format!("Failed to {}: {}", context, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(make_error(&format!(
            "Failed to {}: HTTP {} - {}",
            context, status, error_body
        )));
    }

    debug!("{}: HTTP {}", context, response.status());
    response
        .json()
        .await
        .map_err(|e| make_error(&format!("Failed to parse response to {}: {}", context, e)))
}
