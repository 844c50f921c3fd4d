//! Error types for navigation and crawling.

use thiserror::Error;

/// Errors that can occur while fetching or walking portal pages.
#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// A login form came back where content was expected
    #[error("Session expired while loading: {url}")]
    SessionExpired { url: String },

    /// Server returned an unexpected response
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// An expected table, header or column is missing
    #[error("Unexpected page structure at {url}: {message}")]
    Structure { url: String, message: String },

    /// URL parsing/construction failed
    #[error("URL error: {message}")]
    Url { message: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl ScrapeError {
    /// Returns true if this error indicates the session needs to be refreshed.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, ScrapeError::SessionExpired { .. })
    }

    /// Returns true if this error is potentially transient.
    ///
    /// Nothing is retried within a run; this only decides how the item is
    /// reported.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScrapeError::Network { .. } | ScrapeError::UnexpectedResponse { .. }
        )
    }

    /// Structural errors are page-level anomalies, reported as warnings.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ScrapeError::Structure { .. } | ScrapeError::SessionExpired { .. }
        )
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for ScrapeError {
    fn from(err: url::ParseError) -> Self {
        ScrapeError::Url {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::Io {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ScrapeError {
    fn from(err: rusqlite::Error) -> Self {
        ScrapeError::Database {
            message: err.to_string(),
        }
    }
}
