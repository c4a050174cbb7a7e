//! Error types for Crawlkit

use thiserror::Error;

/// Errors that can occur during crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// URL has invalid scheme
    #[error("Invalid URL: must start with http:// or https://")]
    InvalidUrlScheme,

    /// Browser session could not be started
    #[error("Browser session failed to start: {0}")]
    SessionStart(String),

    /// Page could not be rendered
    #[error("Page render failed: {0}")]
    Render(String),

    /// Outbound HTTP request failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Search provider failed
    #[error("Search failed: {0}")]
    Search(String),

    /// Filesystem error while persisting output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Create a request error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CrawlError::Request("request timed out".to_string())
        } else if err.is_connect() {
            CrawlError::Request(format!("failed to connect: {err}"))
        } else {
            CrawlError::Request(err.to_string())
        }
    }
}
