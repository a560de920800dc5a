//! # Query Errors

use thiserror::Error;

/// Result type for descriptor operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query descriptor errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Descriptor mutated after it was used to open a cursor
    #[error("You can't add a {0} once you've executed the search")]
    UsageOrder(&'static str),
}

impl QueryError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UsageOrder(_) => "PAGED_USAGE_ORDER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_order_display() {
        let err = QueryError::UsageOrder("filter");
        assert_eq!(
            err.to_string(),
            "You can't add a filter once you've executed the search"
        );
        assert_eq!(err.code(), "PAGED_USAGE_ORDER");
    }
}
