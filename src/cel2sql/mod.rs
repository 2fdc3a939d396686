//! Filter to SQL translation
//!
//! Turns a [`CompiledExpression`](crate::cel::CompiledExpression) into a
//! SQL boolean fragment suitable for a `WHERE` clause.
//!
//! # Rules
//!
//! - Fields render as their storage column; constants as literals
//! - Paths into dynamic JSON columns render as `->` / `->>` chains
//! - Fields of flattened messages render as prefixed snake_case columns
//! - `map["k"] == "v"` on a non-dynamic map renders as JSON containment
//! - Dynamic values compared with timestamps are cast first
//! - Anything else fails with an unsupported-expression error

mod dialect;
mod interpreter;
mod naming;

pub use dialect::{Dialect, PathSegment, Postgres};
pub use interpreter::convert;
pub use naming::{flattened_column, to_snake_case};
