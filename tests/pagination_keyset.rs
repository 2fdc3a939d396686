//! Keyset Pagination Tests
//!
//! Tests for listing invariants:
//! - Following next_page_token visits every row exactly once
//! - Custom orders break ties on the unique id
//! - Page tokens carry the keyset predicate into the next query
//! - Page sizes outside the configured band are rejected

use std::cmp::Ordering;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use results_query::config::QueryConfig;
use results_query::context::RequestContext;
use results_query::lister::{
    Collection, ListRequest, Lister, PageRow, Storage, StorageError,
};
use results_query::pagination::{
    Direction, LastItem, OrderValue, PageToken, Predicate, SqlQuery, SqlValue,
};
use results_query::QueryError;

// =============================================================================
// In-memory storage
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Row {
    parent: String,
    id: String,
    created_time: DateTime<Utc>,
}

impl PageRow for Row {
    fn unique_id(&self) -> &str {
        &self.id
    }

    fn order_value(&self, column: &str) -> Option<DateTime<Utc>> {
        match column {
            "created_time" => Some(self.created_time),
            _ => None,
        }
    }
}

/// Evaluates the structured query against a vector of rows
struct MemoryStore {
    rows: Vec<Row>,
}

impl MemoryStore {
    fn column(row: &Row, column: &str) -> Result<SqlValue, StorageError> {
        match column {
            "parent" => Ok(SqlValue::Text(row.parent.clone())),
            "id" => Ok(SqlValue::Text(row.id.clone())),
            "created_time" => Ok(SqlValue::Timestamp(row.created_time)),
            other => Err(StorageError::Query(format!("no column {}", other))),
        }
    }

    fn compare(a: &SqlValue, b: &SqlValue) -> Ordering {
        match (a, b) {
            (SqlValue::Text(a), SqlValue::Text(b)) => a.cmp(b),
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a.cmp(b),
            (SqlValue::Text(_), SqlValue::Timestamp(_)) => Ordering::Less,
            (SqlValue::Timestamp(_), SqlValue::Text(_)) => Ordering::Greater,
        }
    }

    fn matches(row: &Row, predicate: &Predicate) -> Result<bool, StorageError> {
        match predicate {
            Predicate::Equality { column, value } => {
                Ok(Self::column(row, column)? == SqlValue::Text(value.clone()))
            }
            Predicate::Keyset {
                columns,
                values,
                direction,
            } => {
                let mut ordering = Ordering::Equal;
                for (column, value) in columns.iter().zip(values) {
                    ordering = Self::compare(&Self::column(row, column)?, value);
                    if ordering != Ordering::Equal {
                        break;
                    }
                }
                Ok(match direction {
                    Direction::Asc => ordering == Ordering::Greater,
                    Direction::Desc => ordering == Ordering::Less,
                })
            }
            Predicate::Expression(sql) => {
                Err(StorageError::Query(format!("unsupported expression {}", sql)))
            }
        }
    }
}

impl Storage<Row> for MemoryStore {
    fn query(&self, _ctx: &RequestContext, query: &SqlQuery) -> Result<Vec<Row>, StorageError> {
        let mut out = Vec::new();
        for row in &self.rows {
            let mut keep = true;
            for predicate in &query.predicates {
                if !Self::matches(row, predicate)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                out.push(row.clone());
            }
        }

        let mut keyed = Vec::with_capacity(out.len());
        for row in out {
            let key = query
                .order_by
                .iter()
                .map(|t| Self::column(&row, &t.expression).map(|v| (v, t.direction)))
                .collect::<Result<Vec<_>, _>>()?;
            keyed.push((key, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for ((va, dir), (vb, _)) in a.iter().zip(b) {
                let ord = match dir {
                    Direction::Asc => Self::compare(va, vb),
                    Direction::Desc => Self::compare(vb, va),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let mut rows: Vec<Row> = keyed.into_iter().map(|(_, row)| row).collect();
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Rows under `parent` with creation offsets in minutes; ids are unique
fn rows(parent: &str, offsets: &[i64]) -> Vec<Row> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, minutes)| Row {
            parent: parent.to_string(),
            id: format!("id-{:03}", i),
            created_time: base_time() + Duration::minutes(*minutes),
        })
        .collect()
}

/// Follow next_page_token to the end, returning ids in visit order
fn list_all(
    lister: &Lister,
    store: &MemoryStore,
    parent: &str,
    order_by: &str,
    page_size: i32,
) -> Vec<String> {
    let ctx = RequestContext::new();
    let mut ids = Vec::new();
    let mut token = String::new();
    loop {
        let request = ListRequest {
            parent: parent.to_string(),
            filter: String::new(),
            order_by: order_by.to_string(),
            page_size,
            page_token: token.clone(),
        };
        let page = lister
            .list(&ctx, store, &request, |row: &Row| Ok(row.id.clone()))
            .unwrap();
        assert!(page.items.len() <= page_size as usize);
        ids.extend(page.items);
        if page.next_page_token.is_empty() {
            return ids;
        }
        token = page.next_page_token;
    }
}

fn expected(
    rows: &[Row],
    parent: &str,
    key: impl Fn(&Row) -> (DateTime<Utc>, String),
    desc: bool,
) -> Vec<String> {
    let mut selected: Vec<&Row> = rows.iter().filter(|r| r.parent == parent).collect();
    selected.sort_by_key(|r| key(r));
    if desc {
        selected.reverse();
    }
    selected.into_iter().map(|r| r.id.clone()).collect()
}

// =============================================================================
// Completeness
// =============================================================================

/// Every page size visits every row once in id order.
#[test]
fn test_default_order_visits_every_row() {
    let mut all = rows("foo", &[5, 3, 3, 9, 1, 0, 7]);
    all.extend(rows("other", &[1, 2]).into_iter().map(|mut r| {
        r.id = format!("x-{}", r.id);
        r
    }));
    let store = MemoryStore { rows: all.clone() };
    let lister = Lister::new(Collection::Results);
    let want = expected(&all, "foo", |r| (base_time(), r.id.clone()), false);

    for page_size in 1..=8 {
        let got = list_all(&lister, &store, "foo", "", page_size);
        assert_eq!(got, want, "page size {}", page_size);
    }
}

/// Ties on the order column are broken by id in the same direction.
#[test]
fn test_custom_order_with_ties() {
    let all = rows("foo", &[5, 3, 3, 9, 3, 0, 7]);
    let store = MemoryStore { rows: all.clone() };
    let lister = Lister::new(Collection::Results);

    let asc = expected(&all, "foo", |r| (r.created_time, r.id.clone()), false);
    let desc = expected(&all, "foo", |r| (r.created_time, r.id.clone()), true);

    for page_size in 1..=7 {
        assert_eq!(list_all(&lister, &store, "foo", "create_time", page_size), asc);
        assert_eq!(list_all(&lister, &store, "foo", "create_time desc", page_size), desc);
    }
}

/// The wildcard parent lists across namespaces.
#[test]
fn test_wildcard_parent_lists_everything() {
    let mut all = rows("a", &[1, 2]);
    all.extend(rows("b", &[3]).into_iter().map(|mut r| {
        r.id = "z".into();
        r
    }));
    let store = MemoryStore { rows: all };
    let lister = Lister::new(Collection::Results);
    let parent = Collection::Results.wildcard_parent();
    assert_eq!(list_all(&lister, &store, &parent, "", 1), vec!["id-000", "id-001", "z"]);
}

/// A short final page carries no token.
#[test]
fn test_exact_fit_has_no_token() {
    let store = MemoryStore { rows: rows("foo", &[1, 2, 3]) };
    let lister = Lister::new(Collection::Results);
    let ctx = RequestContext::new();
    let request = ListRequest {
        parent: "foo".into(),
        page_size: 3,
        ..Default::default()
    };
    let page = lister.list(&ctx, &store, &request, |r: &Row| Ok(r.id.clone())).unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(page.next_page_token.is_empty());
}

proptest! {
    #[test]
    fn test_pagination_is_complete(
        offsets in proptest::collection::vec(0i64..5, 0..25),
        page_size in 1i32..8,
        desc in any::<bool>(),
    ) {
        let all = rows("foo", &offsets);
        let store = MemoryStore { rows: all.clone() };
        let lister = Lister::new(Collection::Results);
        let order_by = if desc { "create_time desc" } else { "create_time asc" };
        let want = expected(&all, "foo", |r| (r.created_time, r.id.clone()), desc);
        prop_assert_eq!(list_all(&lister, &store, "foo", order_by, page_size), want);
    }
}

// =============================================================================
// Token Predicate
// =============================================================================

/// A token on a descending custom order produces a tuple comparison.
#[test]
fn test_token_keyset_predicate() {
    let t = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
    let token = PageToken {
        parent: "foo".into(),
        filter: String::new(),
        last_item: LastItem {
            uid: "bar".into(),
            order_by: Some(OrderValue {
                field_name: "create_time".into(),
                value: t,
                direction: Direction::Desc,
            }),
        },
    }
    .encode()
    .unwrap();

    let lister = Lister::new(Collection::Results);
    let prepared = lister
        .prepare(&ListRequest {
            parent: "foo".into(),
            order_by: "create_time desc".into(),
            page_size: 10,
            page_token: token,
            ..Default::default()
        })
        .unwrap();

    let (sql, args) = prepared.query.to_sql();
    assert_eq!(
        sql,
        "SELECT * FROM results WHERE (created_time, id) < (?, ?) AND parent = ? \
         ORDER BY created_time DESC, id DESC LIMIT 11"
    );
    assert_eq!(
        args,
        vec![
            SqlValue::Timestamp(t),
            SqlValue::Text("bar".into()),
            SqlValue::Text("foo".into()),
        ]
    );
}

/// A token minted under another order is rejected.
#[test]
fn test_token_from_other_order_rejected() {
    let token = PageToken {
        parent: "foo".into(),
        filter: String::new(),
        last_item: LastItem {
            uid: "bar".into(),
            order_by: None,
        },
    }
    .encode()
    .unwrap();

    let lister = Lister::new(Collection::Results);
    let err = lister
        .prepare(&ListRequest {
            parent: "foo".into(),
            order_by: "create_time desc".into(),
            page_token: token,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidToken(_)));
}

// =============================================================================
// Order And Page Size Validation
// =============================================================================

/// Unknown sort fields list the valid ones.
#[test]
fn test_unsupported_order_field() {
    let lister = Lister::new(Collection::Results);
    let err = lister
        .prepare(&ListRequest {
            parent: "foo".into(),
            order_by: "unsupported_field".into(),
            ..Default::default()
        })
        .unwrap_err();
    match err {
        QueryError::InvalidOrder(msg) => {
            assert!(msg.contains("unsupported_field"));
            for field in ["create_time", "update_time", "summary.start_time", "summary.end_time"] {
                assert!(msg.contains(field), "{} missing from {}", field, msg);
            }
        }
        other => panic!("expected InvalidOrder, got {:?}", other),
    }
}

/// Page sizes at the band edges are accepted; one past either edge is not.
#[test]
fn test_page_size_boundaries() {
    let config = QueryConfig {
        min_page_size: 1,
        max_page_size: 10,
        default_page_size: 5,
        log_queries: false,
    };
    let lister = Lister::with_config(Collection::Results, &config);
    let prepare = |page_size| {
        lister.prepare(&ListRequest {
            parent: "foo".into(),
            page_size,
            ..Default::default()
        })
    };

    assert!(matches!(prepare(0), Err(QueryError::InvalidPageSize { size: 0, min: 1, max: 10 })));
    assert_eq!(prepare(1).unwrap().page_size, 1);
    assert_eq!(prepare(10).unwrap().page_size, 10);
    assert!(matches!(prepare(11), Err(QueryError::InvalidPageSize { size: 11, .. })));
}

/// Storage failures surface as storage errors.
#[test]
fn test_filter_reaches_storage() {
    let store = MemoryStore { rows: rows("foo", &[1]) };
    let lister = Lister::new(Collection::Results);
    let err = lister
        .list(
            &RequestContext::new(),
            &store,
            &ListRequest {
                parent: "foo".into(),
                filter: "summary.status == SUCCESS".into(),
                ..Default::default()
            },
            |r: &Row| Ok(r.id.clone()),
        )
        .unwrap_err();
    assert!(matches!(err, QueryError::Storage(_)));
}
