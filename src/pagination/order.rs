//! Order builder
//!
//! Parses `"<field> [asc|desc]"` against a per-collection allow-list.
//! The unique id is always the final sort key so the order is total.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::query::{OrderTerm, QueryBuilder, SqlQuery};
use crate::errors::{QueryError, QueryResult};

/// Storage column holding each row's unique id
pub const UNIQUE_ID_COLUMN: &str = "id";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    /// Comparison selecting rows after a keyset in this direction
    pub fn comparison(&self) -> &'static str {
        match self {
            Direction::Asc => ">",
            Direction::Desc => "<",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Direction::Desc)
        } else {
            Err(QueryError::InvalidOrder(format!(
                "invalid sort direction \"{}\", expected asc or desc",
                s
            )))
        }
    }
}

/// A sortable public field and the column it sorts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortableField {
    pub name: &'static str,
    pub column: &'static str,
}

/// Resolved ordering
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Order {
    /// Storage column, empty for default order
    pub column_name: String,
    /// Public field name, empty for default order
    pub field_name: String,
    pub direction: Direction,
}

impl Order {
    /// Parse an order string against `allowed`. Empty input is the default order.
    pub fn parse(order_by: &str, allowed: &[SortableField]) -> QueryResult<Self> {
        let parts: Vec<&str> = order_by.split_whitespace().collect();
        let (field, direction) = match parts.as_slice() {
            [] => return Ok(Self::default()),
            [field] => (*field, Direction::Asc),
            [field, direction] => (*field, direction.parse()?),
            _ => {
                return Err(QueryError::InvalidOrder(format!(
                    "invalid format \"{}\", expected \"<field> [asc|desc]\"",
                    order_by.trim()
                )))
            }
        };

        let sortable = allowed.iter().find(|f| f.name == field).ok_or_else(|| {
            let names: Vec<&str> = allowed.iter().map(|f| f.name).collect();
            QueryError::InvalidOrder(format!(
                "field \"{}\" is not sortable, valid fields are: {}",
                field,
                names.join(", ")
            ))
        })?;

        Ok(Self {
            column_name: sortable.column.to_string(),
            field_name: sortable.name.to_string(),
            direction,
        })
    }

    /// True when a field other than the unique id was requested
    pub fn is_custom(&self) -> bool {
        !self.field_name.is_empty()
    }

    pub fn terms(&self) -> Vec<OrderTerm> {
        let mut terms = Vec::with_capacity(2);
        if self.is_custom() {
            terms.push(OrderTerm::new(self.column_name.clone(), self.direction));
        }
        terms.push(OrderTerm::new(UNIQUE_ID_COLUMN, self.direction));
        terms
    }

    /// `ORDER BY <column> <DIR>, id <DIR>`
    pub fn to_sql(&self) -> String {
        let mut query = SqlQuery::default();
        query.order_by = self.terms();
        query.order_clause()
    }
}

impl QueryBuilder for Order {
    fn build(&self, query: &mut SqlQuery) -> QueryResult<()> {
        query.order_by = self.terms();
        Ok(())
    }
}
