use thiserror::Error;

use crate::http::FetchError;
use crate::window::WindowError;

/// Reasons a report run is aborted. Any of these replaces the report with a
/// single visible error notice.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
    #[error(transparent)]
    Window(#[from] WindowError),
}

impl ReportError {
    pub fn malformed(endpoint: &str, reason: impl Into<String>) -> Self {
        ReportError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}
