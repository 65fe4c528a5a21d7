use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// A live fetch that produced no response at all.
///
/// HTTP error statuses are responses, not fetch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Fetch failed with no cached copy: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to seed {url}: {source}")]
    Seed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Unexpected status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Cache has not been installed")]
    NotInstalled,

    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),
}
