//! # Source Errors

use thiserror::Error;

/// Result type for remote source calls
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised by a remote source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Error reported by the remote service, carried unchanged
    #[error("{code}: {message}")]
    Remote { code: String, message: String },

    /// Unknown search, cursor or record id
    #[error("Not found: {0}")]
    NotFound(String),

    /// The source broke the window contract
    #[error("Window {window} returned {returned} rows, more than the window size {window_size}")]
    WindowOverflow {
        window: usize,
        returned: usize,
        window_size: usize,
    },

    /// Offsets of a window do not fit in `usize`
    #[error("Window {window} starts beyond the addressable range for window size {window_size}")]
    RangeOverflow { window: usize, window_size: usize },
}

impl SourceError {
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
