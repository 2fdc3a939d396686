//! Offset (keyset) builder
//!
//! Selects rows strictly after the last row of the previous page under
//! the current total order. Row offsets are never used.

use super::order::{Order, UNIQUE_ID_COLUMN};
use super::query::{Predicate, QueryBuilder, SqlQuery, SqlValue};
use super::token::LastItem;
use crate::errors::{QueryError, QueryResult};

/// Keyset predicate from a token's last item
#[derive(Debug, Clone)]
pub struct Offset<'a> {
    order: &'a Order,
    last_item: Option<&'a LastItem>,
}

impl<'a> Offset<'a> {
    pub fn new(order: &'a Order, last_item: Option<&'a LastItem>) -> Self {
        Self { order, last_item }
    }

    pub fn predicate(&self) -> QueryResult<Option<Predicate>> {
        let Some(last) = self.last_item else {
            return Ok(None);
        };
        let uid = SqlValue::Text(last.uid.clone());

        if !self.order.is_custom() {
            return Ok(Some(Predicate::Keyset {
                columns: vec![UNIQUE_ID_COLUMN.to_string()],
                values: vec![uid],
                direction: self.order.direction,
            }));
        }

        let value = last.order_by.as_ref().ok_or_else(|| {
            QueryError::InvalidToken(format!(
                "token has no value for order field \"{}\"",
                self.order.field_name
            ))
        })?;
        Ok(Some(Predicate::Keyset {
            columns: vec![self.order.column_name.clone(), UNIQUE_ID_COLUMN.to_string()],
            values: vec![SqlValue::Timestamp(value.value), uid],
            direction: self.order.direction,
        }))
    }
}

impl QueryBuilder for Offset<'_> {
    fn build(&self, query: &mut SqlQuery) -> QueryResult<()> {
        if let Some(predicate) = self.predicate()? {
            query.predicates.push(predicate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::order::Direction;
    use crate::pagination::token::OrderValue;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_first_page_has_no_predicate() {
        let order = Order::default();
        assert_eq!(Offset::new(&order, None).predicate().unwrap(), None);
    }

    #[test]
    fn test_default_order_compares_id() {
        let order = Order::default();
        let last = LastItem {
            uid: "abc".into(),
            order_by: None,
        };
        let mut query = SqlQuery::new("records");
        query.apply(&Offset::new(&order, Some(&last))).unwrap();
        let (clause, args) = query.where_clause().unwrap();
        assert_eq!(clause, "id > ?");
        assert_eq!(args, vec![SqlValue::Text("abc".into())]);
    }

    #[test]
    fn test_descending_tuple_comparison() {
        let t = Utc.with_ymd_and_hms(2023, 3, 4, 5, 6, 7).unwrap();
        let order = Order {
            column_name: "created_time".into(),
            field_name: "create_time".into(),
            direction: Direction::Desc,
        };
        let last = LastItem {
            uid: "bar".into(),
            order_by: Some(OrderValue {
                field_name: "create_time".into(),
                value: t,
                direction: Direction::Desc,
            }),
        };
        let mut query = SqlQuery::new("results");
        query.apply(&Offset::new(&order, Some(&last))).unwrap();
        let (clause, args) = query.where_clause().unwrap();
        assert_eq!(clause, "(created_time, id) < (?, ?)");
        assert_eq!(args, vec![SqlValue::Timestamp(t), SqlValue::Text("bar".into())]);
    }

    #[test]
    fn test_custom_order_without_value_is_rejected() {
        let order = Order {
            column_name: "created_time".into(),
            field_name: "create_time".into(),
            direction: Direction::Asc,
        };
        let last = LastItem {
            uid: "bar".into(),
            order_by: None,
        };
        let err = Offset::new(&order, Some(&last)).predicate().unwrap_err();
        assert_eq!(err.code(), "QUERY_INVALID_TOKEN");
    }
}
