//! Error types for the epost download client.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while downloading epost documents.
///
/// Every variant is fatal to a run. Per-item download failures are not errors;
/// they are recorded as [`ItemStatus::Failed`](crate::ItemStatus::Failed) and the
/// run continues.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failed (connection, TLS, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The landing page did not contain a usable SSO token.
    #[error("Failed getting a SSO token. Are you sure you provided your up to date cookies?")]
    Authentication,

    /// A folder listing request returned something other than HTTP 200.
    #[error("Request to {url} failed with HTTP {status}")]
    UnexpectedStatus {
        /// Requested URL, including query.
        url: String,
        /// Status code returned by the server.
        status: u16,
    },

    /// A folder listing response declared an empty body, which the service
    /// sends once the session has been invalidated.
    #[error("Failed getting a response from {url}. Are you sure you provided your up to date cookies?")]
    EmptyResponse {
        /// Requested URL, including query.
        url: String,
    },

    /// The server kept answering with a retryable status until the retry
    /// budget ran out.
    #[error("Request to {url} still failing with HTTP {status} after {retries} retries")]
    RetriesExhausted {
        /// Requested URL, including query.
        url: String,
        /// Status code of the last response.
        status: u16,
        /// Number of retries performed.
        retries: u32,
    },

    /// The listing response did not have the expected shape.
    #[error("Failed to parse folder listing: {msg}")]
    ResponseParse {
        /// What was missing or malformed.
        msg: String,
    },

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cookie string or token cannot be sent as an HTTP header.
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// Writing a downloaded document to disk failed.
    #[error("Failed writing {}: {source}", path.display())]
    Io {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
