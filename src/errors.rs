//! # Query Errors
//!
//! Error taxonomy shared by the filter compiler and the listing engine.
//!
//! Every error is scoped to a single request. Nothing here is retried
//! internally and nothing is fatal to the process.

use thiserror::Error;

use crate::cel::FilterError;
use crate::lister::StorageError;
use crate::pagination::TokenError;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query layer errors
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    // ==================
    // Client Errors
    // ==================
    /// Filter failed to parse, type-check, or translate
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Unknown sort field, malformed order string
    #[error("invalid order_by: {0}")]
    InvalidOrder(String),

    /// Page size outside the configured band
    #[error("invalid page_size: {size} is outside [{min}, {max}]")]
    InvalidPageSize { size: i32, min: i32, max: i32 },

    /// Page token failed to decode or does not match the request
    #[error("invalid page token: {0}")]
    InvalidToken(String),

    /// Parent name does not have the expected shape
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    /// Unknown aggregate or grouping requested
    #[error("invalid summary: {0}")]
    InvalidSummary(String),

    // ==================
    // Server Errors
    // ==================
    /// Storage collaborator failed to run the query
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization faults, missing row metadata
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Stable error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidFilter(_) => "QUERY_INVALID_FILTER",
            QueryError::InvalidOrder(_) => "QUERY_INVALID_ORDER",
            QueryError::InvalidPageSize { .. } => "QUERY_INVALID_PAGE_SIZE",
            QueryError::InvalidToken(_) => "QUERY_INVALID_TOKEN",
            QueryError::InvalidParent(_) => "QUERY_INVALID_PARENT",
            QueryError::InvalidSummary(_) => "QUERY_INVALID_SUMMARY",
            QueryError::Storage(_) => "QUERY_STORAGE_FAILED",
            QueryError::Internal(_) => "QUERY_INTERNAL",
        }
    }

    /// True when the caller sent something we refuse to run
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Storage(_) | QueryError::Internal(_))
    }
}

impl From<FilterError> for QueryError {
    fn from(err: FilterError) -> Self {
        QueryError::InvalidFilter(err.to_string())
    }
}

impl From<TokenError> for QueryError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encode(msg) => {
                QueryError::Internal(format!("encoding page token: {}", msg))
            }
            other => QueryError::InvalidToken(other.to_string()),
        }
    }
}

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        QueryError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(QueryError::InvalidFilter("x".into()).is_client_error());
        assert!(QueryError::InvalidToken("x".into()).is_client_error());
        assert!(QueryError::InvalidPageSize { size: -1, min: 0, max: 10 }.is_client_error());
        assert!(!QueryError::Internal("x".into()).is_client_error());
        assert!(!QueryError::Storage("x".into()).is_client_error());
    }

    #[test]
    fn test_token_error_display() {
        let err = QueryError::from(TokenError::Malformed("bad base64".into()));
        assert_eq!(err.code(), "QUERY_INVALID_TOKEN");
        assert!(err.to_string().starts_with("invalid page token: "));
    }

    #[test]
    fn test_encode_fault_is_internal() {
        let err = QueryError::from(TokenError::Encode("field too large".into()));
        assert_eq!(err.code(), "QUERY_INTERNAL");
    }
}
