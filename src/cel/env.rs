//! Compilation environment
//!
//! An [`Environment`] pairs a [`View`] with a SQL dialect. Compiling a
//! filter parses it, type-checks it against the view, and requires a
//! boolean result.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use super::ast::{Expr, ExprId};
use super::checker;
use super::errors::{FilterError, FilterErrorKind, FilterResult};
use super::parser;
use super::types::Type;
use crate::cel2sql::{self, Dialect, Postgres};
use crate::observability::{log_event_with_fields, Event};
use crate::view::View;

/// A parsed and type-checked filter, tied to the view it was checked against
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    view: &'static str,
    source: String,
    expr: Expr,
    types: HashMap<ExprId, Type>,
}

impl CompiledExpression {
    /// Name of the view this expression was checked against
    pub fn view_name(&self) -> &'static str {
        self.view
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Checked type of a node of this expression
    pub fn type_of(&self, expr: &Expr) -> &Type {
        self.types.get(&expr.id).unwrap_or(&Type::Dyn)
    }

    pub fn output_type(&self) -> &Type {
        self.type_of(&self.expr)
    }
}

/// View plus dialect used to compile and translate filters
#[derive(Clone)]
pub struct Environment {
    view: View,
    dialect: &'static dyn Dialect,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("view", &self.view.name())
            .finish()
    }
}

static POSTGRES: Postgres = Postgres;

impl Environment {
    /// Environment emitting Postgres SQL
    pub fn new(view: View) -> Self {
        Self {
            view,
            dialect: &POSTGRES,
        }
    }

    pub fn with_dialect(mut self, dialect: &'static dyn Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    /// Parse and type-check a filter
    pub fn compile(&self, filter: &str) -> FilterResult<CompiledExpression> {
        let result = self.compile_inner(filter);
        if let Err(err) = &result {
            log_event_with_fields(
                Event::FilterRejected,
                &[("error", &err.to_string()), ("view", self.view.name())],
            );
        }
        result
    }

    fn compile_inner(&self, filter: &str) -> FilterResult<CompiledExpression> {
        let expr = parser::parse(filter)?;
        let types = checker::check(&expr, &self.view)?;
        let output = types.get(&expr.id).cloned().unwrap_or(Type::Dyn);
        if output != Type::Bool {
            return Err(FilterError::type_error(
                format!("expected boolean expression, got {}", output),
                expr.position,
            ));
        }
        Ok(CompiledExpression {
            view: self.view.name(),
            source: filter.to_string(),
            expr,
            types,
        })
    }

    /// Translate a compiled expression into a SQL boolean fragment
    pub fn translate(&self, compiled: &CompiledExpression) -> FilterResult<String> {
        if compiled.view_name() != self.view.name() {
            return Err(FilterError::detached(
                FilterErrorKind::Unsupported,
                format!(
                    "expression was compiled for view '{}', not '{}'",
                    compiled.view_name(),
                    self.view.name()
                ),
            ));
        }
        let sql = cel2sql::convert(&self.view, self.dialect, compiled)?;
        log_event_with_fields(
            Event::FilterCompiled,
            &[("sql", &sql), ("view", self.view.name())],
        );
        Ok(sql)
    }

    /// Compile and translate in one step
    pub fn to_sql(&self, filter: &str) -> FilterResult<String> {
        let compiled = self.compile(filter)?;
        self.translate(&compiled)
    }
}

/// Entries kept by [`ExpressionCache::new`]
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

type CacheKey = (String, String);

#[derive(Debug, Default)]
struct CacheEntries {
    map: HashMap<CacheKey, Arc<CompiledExpression>>,
    /// Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Process-wide cache of compiled filters keyed by view and filter text.
///
/// Holds at most `capacity` entries; inserting past that evicts the
/// oldest entry.
#[derive(Debug)]
pub struct ExpressionCache {
    capacity: usize,
    entries: RwLock<CacheEntries>,
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(CacheEntries::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the cached expression or compile and insert it
    pub fn get_or_compile(
        &self,
        env: &Environment,
        filter: &str,
    ) -> FilterResult<Arc<CompiledExpression>> {
        let key = (env.view().name().to_string(), filter.to_string());
        if let Ok(entries) = self.entries.read() {
            if let Some(hit) = entries.map.get(&key) {
                return Ok(Arc::clone(hit));
            }
        }

        let compiled = Arc::new(env.compile(filter)?);
        if self.capacity == 0 {
            return Ok(compiled);
        }
        if let Ok(mut entries) = self.entries.write() {
            if !entries.map.contains_key(&key) {
                while entries.map.len() >= self.capacity {
                    let Some(oldest) = entries.order.pop_front() else {
                        break;
                    };
                    entries.map.remove(&oldest);
                }
                entries.order.push_back(key.clone());
                entries.map.insert(key, Arc::clone(&compiled));
            }
        }
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
