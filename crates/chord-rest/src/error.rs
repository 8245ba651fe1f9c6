//! REST error types

use serde::Deserialize;
use thiserror::Error;

/// JSON error body returned by the API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

/// REST client error type
#[derive(Debug, Error)]
pub enum RestError {
    /// Transport-level failure (DNS, TLS, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status with a structured API error body
    #[error("{status}: {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    /// Non-success status with an unstructured body
    #[error("{status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl RestError {
    /// Build the error for a non-success response body
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiErrorBody>(body) {
            Ok(api) => Self::Api {
                status,
                code: api.code,
                message: api.message,
            },
            Err(_) => Self::Status {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    /// HTTP status code, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::InvalidUrl { .. } => None,
        }
    }
}

/// REST result type
pub type RestResult<T> = Result<T, RestError>;
