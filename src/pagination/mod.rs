//! # Pagination
//!
//! Query builders for keyset pagination and the page-token codec.
//!
//! Builders are applied in a fixed order: offset and filter first so
//! storage can use its indexes, then order and limit.

mod filter;
mod limit;
mod offset;
mod order;
mod query;
mod token;

pub use filter::{EqualityClause, Filter, WILDCARD};
pub use limit::{Limit, PageSizeLimits};
pub use offset::Offset;
pub use order::{Direction, Order, SortableField, UNIQUE_ID_COLUMN};
pub use query::{OrderTerm, Predicate, QueryBuilder, SqlQuery, SqlValue};
pub use token::{LastItem, OrderValue, PageToken, TokenError};
