//! Query composition
//!
//! Builders contribute structured fragments to a [`SqlQuery`]. The storage
//! collaborator receives both the structure and the rendered text with
//! `?` placeholders and ordered arguments.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use super::order::Direction;
use crate::errors::QueryResult;

/// A bound query argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Timestamp(ts) => {
                write!(f, "'{}'", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

/// One WHERE conjunct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = ?`
    Equality { column: String, value: String },
    /// `(c1, c2) > (?, ?)`, `<` when descending
    Keyset {
        columns: Vec<String>,
        values: Vec<SqlValue>,
        direction: Direction,
    },
    /// Translated filter expression
    Expression(String),
}

impl Predicate {
    /// Render this predicate, appending its arguments to `args`
    pub fn render(&self, args: &mut Vec<SqlValue>) -> String {
        match self {
            Predicate::Equality { column, value } => {
                args.push(SqlValue::Text(value.clone()));
                format!("{} = ?", column)
            }
            Predicate::Keyset {
                columns,
                values,
                direction,
            } => {
                args.extend(values.iter().cloned());
                let op = direction.comparison();
                if columns.len() == 1 {
                    format!("{} {} ?", columns[0], op)
                } else {
                    let marks = vec!["?"; values.len()].join(", ");
                    format!("({}) {} ({})", columns.join(", "), op, marks)
                }
            }
            Predicate::Expression(sql) => sql.clone(),
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub expression: String,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn new(expression: impl Into<String>, direction: Direction) -> Self {
        Self {
            expression: expression.into(),
            direction,
        }
    }
}

/// A composed SELECT
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlQuery {
    pub table: String,
    /// Select list; empty means `*`
    pub select: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<i64>,
}

impl SqlQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Apply a builder
    pub fn apply(&mut self, builder: &dyn QueryBuilder) -> QueryResult<()> {
        builder.build(self)
    }

    /// `WHERE` body and its arguments, or `None` without predicates
    pub fn where_clause(&self) -> Option<(String, Vec<SqlValue>)> {
        if self.predicates.is_empty() {
            return None;
        }
        let mut args = Vec::new();
        let several = self.predicates.len() > 1;
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| {
                let sql = p.render(&mut args);
                match p {
                    Predicate::Expression(_) if several => format!("({})", sql),
                    _ => sql,
                }
            })
            .collect();
        Some((parts.join(" AND "), args))
    }

    /// `ORDER BY ...`, or empty without terms
    pub fn order_clause(&self) -> String {
        if self.order_by.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = self
            .order_by
            .iter()
            .map(|t| format!("{} {}", t.expression, t.direction.as_str()))
            .collect();
        format!("ORDER BY {}", terms.join(", "))
    }

    /// Full statement text and ordered arguments
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let select = if self.select.is_empty() {
            "*".to_string()
        } else {
            self.select.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", select, self.table);
        let mut args = Vec::new();

        if let Some((clause, where_args)) = self.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
            args = where_args;
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        let order = self.order_clause();
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        (sql, args)
    }
}

/// Contributes a fragment to a query
pub trait QueryBuilder {
    fn build(&self, query: &mut SqlQuery) -> QueryResult<()>;
}
