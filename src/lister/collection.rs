//! Listable collections
//!
//! Each collection names its table, its filter view, the fields it can be
//! sorted by and how a parent name scopes it.

use std::fmt;
use std::str::FromStr;

use crate::errors::{QueryError, QueryResult};
use crate::pagination::{EqualityClause, SortableField, WILDCARD};
use crate::view::{self, View, RECORDS_VIEW, RESULTS_VIEW};

const RESULTS_SORTABLE: &[SortableField] = &[
    SortableField {
        name: "create_time",
        column: "created_time",
    },
    SortableField {
        name: "update_time",
        column: "updated_time",
    },
    SortableField {
        name: "summary.start_time",
        column: "recordsummary_start_time",
    },
    SortableField {
        name: "summary.end_time",
        column: "recordsummary_end_time",
    },
];

const RECORDS_SORTABLE: &[SortableField] = &[
    SortableField {
        name: "create_time",
        column: "created_time",
    },
    SortableField {
        name: "update_time",
        column: "updated_time",
    },
];

/// A listable collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Results,
    Records,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Results => RESULTS_VIEW,
            Collection::Records => RECORDS_VIEW,
        }
    }

    pub fn table(&self) -> &'static str {
        self.name()
    }

    pub fn view(&self) -> View {
        match self {
            Collection::Results => view::results(),
            Collection::Records => view::records(),
        }
    }

    pub fn sortable_fields(&self) -> &'static [SortableField] {
        match self {
            Collection::Results => RESULTS_SORTABLE,
            Collection::Records => RECORDS_SORTABLE,
        }
    }

    /// Equality clauses scoping a listing to `parent`.
    ///
    /// Results are scoped by `<namespace>`; records by
    /// `<namespace>/results/<result>`. Any segment may be `-`.
    pub fn scope(&self, parent: &str) -> QueryResult<Vec<EqualityClause>> {
        match self {
            Collection::Results => {
                if parent.is_empty() || parent.contains('/') {
                    return Err(QueryError::InvalidParent(format!(
                        "\"{}\" is not a namespace",
                        parent
                    )));
                }
                Ok(vec![EqualityClause::new("parent", parent)])
            }
            Collection::Records => {
                let segments: Vec<&str> = parent.split('/').collect();
                match segments.as_slice() {
                    [namespace, "results", result]
                        if !namespace.is_empty() && !result.is_empty() =>
                    {
                        Ok(vec![
                            EqualityClause::new("parent", *namespace),
                            EqualityClause::new("result_name", *result),
                        ])
                    }
                    _ => Err(QueryError::InvalidParent(format!(
                        "\"{}\" does not match <namespace>/results/<result>",
                        parent
                    ))),
                }
            }
        }
    }

    /// Parent that matches every row
    pub fn wildcard_parent(&self) -> String {
        match self {
            Collection::Results => WILDCARD.to_string(),
            Collection::Records => format!("{}/results/{}", WILDCARD, WILDCARD),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            RESULTS_VIEW => Ok(Collection::Results),
            RECORDS_VIEW => Ok(Collection::Records),
            other => Err(format!(
                "unknown collection '{}', expected {} or {}",
                other, RESULTS_VIEW, RECORDS_VIEW
            )),
        }
    }
}
