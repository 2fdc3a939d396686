//! Storage collaborator interface
//!
//! The query layer builds SQL; something else runs it. Implementations
//! receive the structured [`SqlQuery`] and may render it with
//! [`SqlQuery::to_sql`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::context::RequestContext;
use crate::pagination::SqlQuery;

/// Storage failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

/// Executes composed queries
pub trait Storage<R> {
    /// Run `query`. The context is passed through untouched.
    fn query(&self, ctx: &RequestContext, query: &SqlQuery) -> Result<Vec<R>, StorageError>;
}

/// What the lister needs from a stored row to build the next token
pub trait PageRow {
    fn unique_id(&self) -> &str;

    /// Value of a timestamp sort column, `None` when absent
    fn order_value(&self, column: &str) -> Option<DateTime<Utc>>;
}
