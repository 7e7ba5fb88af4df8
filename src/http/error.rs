//! Errors raised by the HTTP transport.

use serde_json::Value;

use crate::settings::Headers;

/// Failures the transport reports in addition to the underlying
/// `reqwest::Error`s it passes through.
#[derive(Debug)]
pub enum HttpError {
    /// The server answered with a non-2xx status.
    Status {
        status: u16,
        headers: Headers,
        /// Decoded response body, as for a successful response.
        data: Value,
    },
    /// A header name or value cannot be sent on the wire.
    InvalidHeader(String),
}

impl HttpError {
    /// Status code of a non-success response.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::InvalidHeader(_) => None,
        }
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::Status { status, data, .. } => match data {
                Value::Null => write!(f, "Request failed with status code {}", status),
                Value::String(body) => {
                    write!(f, "Request failed with status code {}: {}", status, body)
                }
                body => write!(f, "Request failed with status code {}: {}", status, body),
            },
            HttpError::InvalidHeader(name) => {
                write!(f, "Invalid header: {}", name)
            }
        }
    }
}

impl std::error::Error for HttpError {}
