//! # Search Errors
//!
//! Every failure a caller can observe from a search. Engine failures arrive
//! through the same channel as results; only descriptor misuse is returned
//! synchronously.

use thiserror::Error;

use crate::query::QueryError;
use crate::source::SourceError;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Search errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// Descriptor mutated after execution began
    #[error(transparent)]
    UsageOrder(#[from] QueryError),

    /// Remote source failure, verbatim
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(#[from] SourceError),

    /// Opening the cursor took longer than the configured bound
    #[error("Opening the search cursor timed out after {0}ms")]
    Timeout(u64),

    /// The session worker is no longer running
    #[error("Search session closed")]
    Closed,
}

impl SearchError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::UsageOrder(e) => e.code(),
            SearchError::RemoteFetch(_) => "PAGED_REMOTE_FETCH",
            SearchError::Timeout(_) => "PAGED_TIMEOUT",
            SearchError::Closed => "PAGED_CLOSED",
        }
    }
}
