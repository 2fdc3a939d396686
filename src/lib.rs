//! results-query - filter compilation and keyset pagination for stored
//! pipeline results and records
//!
//! A filter expression is parsed, type-checked against a view and
//! translated to a SQL predicate. Listings combine that predicate with
//! parent scoping, ordering, page-size limits and an opaque page token
//! into one query per request.

pub mod cel;
pub mod cel2sql;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod lister;
pub mod observability;
pub mod pagination;
pub mod view;

pub use cel::{CompiledExpression, Environment, ExpressionCache};
pub use config::QueryConfig;
pub use context::RequestContext;
pub use errors::{QueryError, QueryResult};
pub use lister::{Aggregator, Collection, ListRequest, ListResponse, Lister, Storage};
pub use pagination::{Order, PageToken, SqlQuery};
