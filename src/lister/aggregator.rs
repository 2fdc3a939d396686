//! Aggregator
//!
//! Grouped summaries over run records. Shares scoping and filtering with
//! the lister; replaces ordering and limits with GROUP BY and a fixed
//! table of named aggregates.

use serde_json::{Map, Value};

use super::collection::Collection;
use super::storage::Storage;
use crate::cel::Environment;
use crate::cel2sql::{Dialect, PathSegment};
use crate::context::RequestContext;
use crate::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event};
use crate::pagination::{Direction, Filter, OrderTerm, SqlQuery};

/// Alias of the grouping column in the select list
pub const GROUP_VALUE: &str = "group_value";

/// Aggregate names in the order they are listed in errors
pub const AGGREGATES: &[&str] = &[
    "total",
    "succeeded",
    "failed",
    "cancelled",
    "running",
    "others",
    "avg_duration",
    "max_duration",
    "min_duration",
    "total_duration",
    "last_runtime",
];

const TIME_UNITS: &[&str] = &["minute", "hour", "day", "week", "month", "year"];

/// JSON path of each field grouping inside a record
const FIELD_GROUPS: &[(&str, &[&str])] = &[
    ("namespace", &["metadata", "namespace"]),
    ("pipeline", &["metadata", "labels", "tekton.dev/pipeline"]),
    (
        "repository",
        &["metadata", "annotations", "pipelinesascode.tekton.dev/repository"],
    ),
];

const SUCCEEDED_REASONS: &[&str] = &["Succeeded", "Completed"];
const FAILED_REASONS: &[&str] = &["Failed"];
const CANCELLED_REASONS: &[&str] = &["Cancelled", "PipelineRunCancelled", "TaskRunCancelled"];
const RUNNING_REASONS: &[&str] = &["Running"];

/// A summary call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryRequest {
    /// `<namespace>/results/<result>`, segments may be `-`
    pub parent: String,
    pub filter: String,
    /// Comma-separated aggregate names; empty means `total`
    pub summary: String,
    /// `<unit> [startTime|completionTime]` or a field group; empty for none
    pub group_by: String,
    /// `<aggregate|group_value> [asc|desc]`
    pub order_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeField {
    StartTime,
    CompletionTime,
}

impl TimeField {
    fn key(&self) -> &'static str {
        match self {
            TimeField::StartTime => "startTime",
            TimeField::CompletionTime => "completionTime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Grouping {
    Time { unit: &'static str, field: TimeField },
    Field(&'static [&'static str]),
}

/// Computes summaries over the records collection
#[derive(Debug, Clone)]
pub struct Aggregator {
    environment: Environment,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            environment: Environment::new(Collection::Records.view()),
        }
    }

    fn dialect(&self) -> &dyn Dialect {
        self.environment.dialect()
    }

    /// Compose the summary query for `request`
    pub fn prepare(&self, request: &SummaryRequest) -> QueryResult<SqlQuery> {
        let aggregates = parse_summary(&request.summary)?;
        let grouping = parse_group_by(&request.group_by)?;
        let order = parse_order(&request.order_by, &aggregates, grouping.is_some())?;
        let scope = Collection::Records.scope(&request.parent)?;

        let mut query = SqlQuery::new(Collection::Records.table());
        query.apply(&Filter::new(&self.environment, scope, &request.filter))?;

        if let Some(grouping) = &grouping {
            query
                .select
                .push(format!("{} AS {}", self.group_expression(grouping), GROUP_VALUE));
            query.group_by.push(GROUP_VALUE.to_string());
        }
        for name in &aggregates {
            query
                .select
                .push(format!("{} AS {}", self.aggregate_expression(name), name));
        }
        if let Some(term) = order {
            query.order_by.push(term);
        }
        Ok(query)
    }

    /// Run the summary query; one JSON object per group
    pub fn summarize<S>(
        &self,
        ctx: &RequestContext,
        storage: &S,
        request: &SummaryRequest,
    ) -> QueryResult<Vec<Map<String, Value>>>
    where
        S: Storage<Map<String, Value>> + ?Sized,
    {
        let query = self.prepare(request)?;
        let request_id = ctx.request_id.to_string();
        let rows = storage.query(ctx, &query).map_err(|err| {
            log_event_with_fields(
                Event::StorageFailed,
                &[("error", &err.to_string()), ("request_id", &request_id)],
            );
            QueryError::from(err)
        })?;
        log_event_with_fields(
            Event::SummaryComputed,
            &[
                ("groups", &rows.len().to_string()),
                ("request_id", &request_id),
                ("summary", &request.summary),
            ],
        );
        Ok(rows)
    }

    fn status_path(&self, key: &str) -> String {
        self.dialect().json_path(
            "data",
            &[PathSegment::Key("status".into()), PathSegment::Key(key.into())],
        )
    }

    fn time(&self, field: TimeField) -> String {
        self.dialect().cast_timestamp(&self.status_path(field.key()))
    }

    fn reason(&self) -> String {
        self.dialect().json_path(
            "data",
            &[
                PathSegment::Key("status".into()),
                PathSegment::Key("conditions".into()),
                PathSegment::Index(0),
                PathSegment::Key("reason".into()),
            ],
        )
    }

    fn reason_list(&self, reasons: &[&str]) -> String {
        let quoted: Vec<String> = reasons.iter().map(|r| self.dialect().quote_string(r)).collect();
        format!("({})", quoted.join(", "))
    }

    fn count_reasons(&self, reasons: &[&str]) -> String {
        format!(
            "COUNT(CASE WHEN {} IN {} THEN 1 END)",
            self.reason(),
            self.reason_list(reasons)
        )
    }

    fn duration(&self) -> String {
        format!(
            "{} - {}",
            self.time(TimeField::CompletionTime),
            self.time(TimeField::StartTime)
        )
    }

    fn aggregate_expression(&self, name: &str) -> String {
        match name {
            "succeeded" => self.count_reasons(SUCCEEDED_REASONS),
            "failed" => self.count_reasons(FAILED_REASONS),
            "cancelled" => self.count_reasons(CANCELLED_REASONS),
            "running" => self.count_reasons(RUNNING_REASONS),
            "others" => {
                let known: Vec<&str> = SUCCEEDED_REASONS
                    .iter()
                    .chain(FAILED_REASONS)
                    .chain(CANCELLED_REASONS)
                    .chain(RUNNING_REASONS)
                    .copied()
                    .collect();
                let reason = self.reason();
                format!(
                    "COUNT(CASE WHEN {} IS NULL OR {} NOT IN {} THEN 1 END)",
                    reason,
                    reason,
                    self.reason_list(&known)
                )
            }
            "avg_duration" => format!("AVG({})", self.duration()),
            "max_duration" => format!("MAX({})", self.duration()),
            "min_duration" => format!("MIN({})", self.duration()),
            "total_duration" => format!("SUM({})", self.duration()),
            "last_runtime" => format!("MAX({})", self.time(TimeField::StartTime)),
            _ => "COUNT(*)".to_string(),
        }
    }

    fn group_expression(&self, grouping: &Grouping) -> String {
        match grouping {
            Grouping::Time { unit, field } => format!(
                "EXTRACT(EPOCH FROM DATE_TRUNC({}, {}))",
                self.dialect().quote_string(unit),
                self.time(*field)
            ),
            Grouping::Field(path) => {
                let segments: Vec<PathSegment> =
                    path.iter().map(|k| PathSegment::Key(k.to_string())).collect();
                self.dialect().json_path("data", &segments)
            }
        }
    }
}

fn parse_summary(summary: &str) -> QueryResult<Vec<&'static str>> {
    let mut names: Vec<&'static str> = Vec::new();
    for raw in summary.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let name = AGGREGATES.iter().copied().find(|a| *a == raw).ok_or_else(|| {
            QueryError::InvalidSummary(format!(
                "unknown aggregate \"{}\", valid aggregates are: {}",
                raw,
                AGGREGATES.join(", ")
            ))
        })?;
        if !names.contains(&name) {
            names.push(name);
        }
    }
    if names.is_empty() {
        names.push("total");
    }
    Ok(names)
}

fn parse_group_by(group_by: &str) -> QueryResult<Option<Grouping>> {
    let parts: Vec<&str> = group_by.split_whitespace().collect();
    let invalid = || {
        let fields: Vec<&str> = FIELD_GROUPS.iter().map(|(name, _)| *name).collect();
        QueryError::InvalidSummary(format!(
            "invalid group_by \"{}\", expected one of {} [startTime|completionTime] or {}",
            group_by.trim(),
            TIME_UNITS.join("|"),
            fields.join("|")
        ))
    };

    let Some(first) = parts.first() else {
        return Ok(None);
    };
    if parts.len() > 2 {
        return Err(invalid());
    }

    if let Some(unit) = TIME_UNITS.iter().copied().find(|u| u.eq_ignore_ascii_case(first)) {
        let field = match parts.get(1) {
            None => TimeField::StartTime,
            Some(f) if *f == "startTime" => TimeField::StartTime,
            Some(f) if *f == "completionTime" => TimeField::CompletionTime,
            Some(_) => return Err(invalid()),
        };
        return Ok(Some(Grouping::Time { unit, field }));
    }

    match FIELD_GROUPS.iter().find(|(name, _)| name == first) {
        Some((_, path)) if parts.len() == 1 => Ok(Some(Grouping::Field(*path))),
        _ => Err(invalid()),
    }
}

fn parse_order(
    order_by: &str,
    aggregates: &[&str],
    grouped: bool,
) -> QueryResult<Option<OrderTerm>> {
    let parts: Vec<&str> = order_by.split_whitespace().collect();
    let (name, direction) = match parts.as_slice() {
        [] => return Ok(None),
        [name] => (*name, Direction::Asc),
        [name, direction] => (*name, direction.parse()?),
        _ => {
            return Err(QueryError::InvalidOrder(format!(
                "invalid format \"{}\", expected \"<name> [asc|desc]\"",
                order_by.trim()
            )))
        }
    };

    let mut allowed: Vec<&str> = aggregates.to_vec();
    if grouped {
        allowed.push(GROUP_VALUE);
    }
    if !allowed.contains(&name) {
        return Err(QueryError::InvalidOrder(format!(
            "cannot order by \"{}\", valid fields are: {}",
            name,
            allowed.join(", ")
        )));
    }
    Ok(Some(OrderTerm::new(name, direction)))
}
