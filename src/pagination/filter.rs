//! Filter builder
//!
//! Parent-scoping equality clauses ANDed with the translated filter
//! expression. Both halves are optional.

use super::query::{Predicate, QueryBuilder, SqlQuery};
use crate::cel::{Environment, ExpressionCache};
use crate::errors::QueryResult;

/// Equality value meaning "no constraint"
pub const WILDCARD: &str = "-";

/// `column = value` scoping clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityClause {
    pub column: String,
    pub value: String,
}

impl EqualityClause {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == WILDCARD
    }
}

/// WHERE contribution of scoping clauses and a filter expression
pub struct Filter<'a> {
    environment: &'a Environment,
    equalities: Vec<EqualityClause>,
    expression: &'a str,
    cache: Option<&'a ExpressionCache>,
}

impl<'a> Filter<'a> {
    pub fn new(
        environment: &'a Environment,
        equalities: Vec<EqualityClause>,
        expression: &'a str,
    ) -> Self {
        Self {
            environment,
            equalities,
            expression,
            cache: None,
        }
    }

    /// Reuse compiled expressions from `cache`
    pub fn with_cache(mut self, cache: &'a ExpressionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn expression_sql(&self) -> QueryResult<Option<String>> {
        if self.expression.trim().is_empty() {
            return Ok(None);
        }
        let sql = match self.cache {
            Some(cache) => {
                let compiled = cache.get_or_compile(self.environment, self.expression)?;
                self.environment.translate(&compiled)?
            }
            None => self.environment.to_sql(self.expression)?,
        };
        Ok(Some(sql))
    }
}

impl QueryBuilder for Filter<'_> {
    fn build(&self, query: &mut SqlQuery) -> QueryResult<()> {
        for clause in self.equalities.iter().filter(|c| !c.is_wildcard()) {
            query.predicates.push(Predicate::Equality {
                column: clause.column.clone(),
                value: clause.value.clone(),
            });
        }
        if let Some(sql) = self.expression_sql()? {
            query.predicates.push(Predicate::Expression(sql));
        }
        Ok(())
    }
}
