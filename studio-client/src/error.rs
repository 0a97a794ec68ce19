//! Error types for the studio client
//!
//! Transport failures and decode failures are kept apart: a
//! [`StudioError::ConnectionFailed`] ends a generation stream, while a
//! [`StudioError::Decode`] only costs the single record that produced it.

use thiserror::Error;

/// Result alias used throughout the client
pub type Result<T> = std::result::Result<T, StudioError>;

/// Errors produced by the studio client
#[derive(Debug, Error)]
pub enum StudioError {
    /// The connection could not be opened, or broke while reading
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, if any could be read
        body: String,
    },

    /// A stream record could not be decoded into an event
    #[error("malformed stream record: {reason}")]
    Decode {
        /// What went wrong
        reason: String,
        /// The offending record, truncated for logging
        record: String,
    },

    /// A request was rejected before anything was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// JSON (de)serialization failure outside of stream decoding
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure (reading attachments, etc.)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Build a decode error, keeping at most 200 bytes of the record
    pub fn decode(reason: impl Into<String>, record: &str) -> Self {
        let mut end = record.len().min(200);
        while !record.is_char_boundary(end) {
            end -= 1;
        }
        Self::Decode {
            reason: reason.into(),
            record: record[..end].to_string(),
        }
    }

    /// True for errors that end a stream (as opposed to a single skipped record)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Http { .. } | Self::Io(_))
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::ConnectionFailed(err.to_string())
        }
    }
}
