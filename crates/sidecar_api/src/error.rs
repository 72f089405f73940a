use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SidecarApiError {
    #[error("invalid sidecar base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to reach sidecar: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sidecar returned HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("unexpected sidecar response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SidecarApiError {
    #[must_use]
    pub fn status(status: StatusCode, body: &str) -> Self {
        Self::Status {
            status,
            message: parse_error_message(status, body),
        }
    }

    /// HTTP status for failures the sidecar answered, `None` for transport
    /// and decoding failures.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(error) => error.status(),
            _ => None,
        }
    }
}

/// Extracts a human-readable message from an error response body.
///
/// Recognizes `{"detail": ...}` and `{"error": {"message": ...}}` bodies, then
/// falls back to the raw body, then to the status reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let detail = value.get("detail").and_then(|detail| match detail {
            Value::String(text) => non_empty_string(text).map(ToString::to_string),
            Value::Null => None,
            other => Some(other.to_string()),
        });
        let error_message = value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .and_then(non_empty_string)
            .map(ToString::to_string);

        if let Some(message) = detail.or(error_message) {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
