//! Errors from the fetch layer: HTTP transport, status, and browser fallback.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed transport cause, so transports other than reqwest can report failures.
pub type TransportCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum FetchError {
    // HTTP client setup
    #[error("Failed to create HTTP client: {source}")]
    Client { source: reqwest::Error },

    #[error("Invalid proxy URL {url}: {source}")]
    InvalidProxy { url: String, source: reqwest::Error },

    #[error("Invalid header {name:?}: name or value contains characters not allowed in HTTP headers")]
    InvalidHeader { name: String },

    // HTTP and network
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: TransportCause },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    // Browser fallback
    #[error("Browser fallback unavailable: {reason}")]
    BrowserUnavailable { reason: String },

    #[error("Cannot prepare browser profile {path}: {source}")]
    BrowserProfile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Browser rendering failed for {url}: {reason}")]
    BrowserFailed { url: String, reason: String },

    #[error("Browser rendering of {url} did not finish within {secs}s")]
    BrowserTimeout { url: String, secs: u64 },
}

impl FetchError {
    /// True for errors caused by local setup (missing browser, bad header or proxy config)
    /// rather than by the remote site.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FetchError::Client { .. }
                | FetchError::InvalidProxy { .. }
                | FetchError::InvalidHeader { .. }
                | FetchError::BrowserUnavailable { .. }
                | FetchError::BrowserProfile { .. }
        )
    }
}
