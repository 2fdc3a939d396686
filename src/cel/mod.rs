//! Filter expression language
//!
//! Parses CEL-style boolean filters and type-checks them against a
//! [`View`](crate::view::View).
//!
//! # Pipeline
//!
//! 1. Lex and parse into a closed AST (literal, identifier, select, call, list)
//! 2. Type-check every node against the view's fields, constants and messages
//! 3. Require a boolean result
//!
//! Translation to SQL lives in [`cel2sql`](crate::cel2sql).

mod ast;
mod checker;
mod env;
mod errors;
mod lexer;
mod parser;
mod types;

pub use ast::{operators, Expr, ExprId, ExprKind, Literal, Position};
pub use env::{CompiledExpression, Environment, ExpressionCache, DEFAULT_CACHE_CAPACITY};
pub use errors::{FilterError, FilterErrorKind, FilterResult};
pub use parser::parse;
pub use types::Type;

pub(crate) use checker::{date_part, STRING_FUNCTIONS};
