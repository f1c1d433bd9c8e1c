//! Native Google API access over HTTP.
//!
//! Calendar and Sheets are reached with `reqwest`, authenticated by a
//! service-account key exchanged for short-lived access tokens.
//!
//! Modules:
//! - auth: service-account JWT bearer flow with token caching
//! - calendar: Calendar API v3 holiday lookup
//! - sheets: Drive v3 + Sheets v4 worksheet reader

pub mod auth;
pub mod calendar;
pub mod sheets;

use std::time::Duration;

pub use auth::{ServiceAccountAuth, ServiceAccountKey};
pub use calendar::CalendarHolidays;
pub use sheets::SheetsClient;

/// Read-only calendar scope used for holiday lookups.
pub const CALENDAR_SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar.readonly"];

/// Scopes requested for spreadsheet access (only reads are performed).
pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

#[derive(Debug, thiserror::Error)]
pub enum GoogleApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid credentials format: {0}")]
    InvalidCredentials(String),
    #[error("Failed to sign token request")]
    Signing,
    #[error("Token request failed: {0}")]
    TokenRequest(String),
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Builds the HTTP client shared by every Google API caller.
pub fn http_client() -> Result<reqwest::Client, GoogleApiError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Joins `segments` onto `base`, percent-encoding each one.
fn endpoint(base: &str, segments: &[&str]) -> Result<reqwest::Url, GoogleApiError> {
    let mut url =
        reqwest::Url::parse(base).map_err(|e| GoogleApiError::InvalidUrl(format!("{base}: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| GoogleApiError::InvalidUrl(base.to_owned()))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Turns a non-success response into [`GoogleApiError::ApiError`].
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, GoogleApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(GoogleApiError::ApiError {
        status: status.as_u16(),
        message,
    })
}
