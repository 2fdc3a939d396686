//! CLI command implementations
//!
//! Each command is a pure function of its arguments and the loaded
//! configuration, returning the JSON payload to print. Nothing here
//! touches storage: `list` and `summary` print the query they would run.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::args::{Cli, Command, TokenAction};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};
use crate::cel::Environment;
use crate::config::QueryConfig;
use crate::lister::{Aggregator, Collection, ListRequest, Lister, SummaryRequest};
use crate::observability::Logger;
use crate::pagination::{Direction, LastItem, Order, OrderValue, PageToken, SqlQuery};

/// Run the CLI with parsed arguments
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    Logger::set_min_severity(cli.log_level);

    let result = load_config(&cli).and_then(|config| {
        config.apply();
        run_command(cli.command, &config)
    });

    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

fn load_config(cli: &Cli) -> CliResult<QueryConfig> {
    let config = match &cli.config {
        Some(path) => QueryConfig::from_json_file(path)?,
        None => QueryConfig::from_env()?,
    };
    Ok(config)
}

/// Dispatch one command
pub fn run_command(command: Command, config: &QueryConfig) -> CliResult<Value> {
    match command {
        Command::Compile { view, filter } => compile(view, &filter),
        Command::Order { view, order_by } => order(view, &order_by),
        Command::List {
            collection,
            parent,
            filter,
            order_by,
            page_size,
            page_token,
        } => list(
            collection,
            config,
            ListRequest {
                parent,
                filter,
                order_by,
                page_size,
                page_token,
            },
        ),
        Command::Summary {
            parent,
            filter,
            summary: aggregates,
            group_by,
            order_by,
        } => summary(SummaryRequest {
            parent,
            filter,
            summary: aggregates,
            group_by,
            order_by,
        }),
        Command::Token { action } => match action {
            TokenAction::Decode { token } => decode_token(&token),
            TokenAction::Encode {
                parent,
                filter,
                uid,
                order_field,
                order_time,
                desc,
            } => encode_token(parent, filter, uid, order_field, order_time, desc),
        },
    }
}

fn compile(view: Collection, filter: &str) -> CliResult<Value> {
    let env = Environment::new(view.view());
    let compiled = env.compile(filter).map_err(crate::errors::QueryError::from)?;
    let sql = env
        .translate(&compiled)
        .map_err(crate::errors::QueryError::from)?;
    Ok(json!({
        "view": view.name(),
        "sql": sql,
        "type": compiled.output_type().to_string(),
    }))
}

fn order(view: Collection, order_by: &str) -> CliResult<Value> {
    let order = Order::parse(order_by, view.sortable_fields())?;
    Ok(json!({
        "field": order.field_name,
        "column": order.column_name,
        "direction": order.direction.as_str(),
        "sql": order.to_sql(),
    }))
}

fn list(collection: Collection, config: &QueryConfig, request: ListRequest) -> CliResult<Value> {
    let lister = Lister::with_config(collection, config);
    let prepared = lister.prepare(&request)?;
    let mut data = query_json(&prepared.query);
    data["page_size"] = json!(prepared.page_size);
    Ok(data)
}

fn summary(request: SummaryRequest) -> CliResult<Value> {
    let query = Aggregator::new().prepare(&request)?;
    Ok(query_json(&query))
}

fn query_json(query: &SqlQuery) -> Value {
    let (sql, args) = query.to_sql();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    json!({ "sql": sql, "args": args })
}

fn decode_token(token: &str) -> CliResult<Value> {
    let decoded = PageToken::decode(token).map_err(crate::errors::QueryError::from)?;
    Ok(serde_json::to_value(decoded)?)
}

fn encode_token(
    parent: String,
    filter: String,
    uid: String,
    order_field: Option<String>,
    order_time: Option<String>,
    desc: bool,
) -> CliResult<Value> {
    let direction = if desc { Direction::Desc } else { Direction::Asc };
    let order_by = match (order_field, order_time) {
        (Some(field_name), Some(time)) => Some(OrderValue {
            field_name,
            value: parse_time(&time)?,
            direction,
        }),
        _ => None,
    };
    let token = PageToken {
        parent,
        filter,
        last_item: LastItem { uid, order_by },
    };
    let encoded = token.encode().map_err(crate::errors::QueryError::from)?;
    Ok(json!({ "token": encoded }))
}

fn parse_time(value: &str) -> CliResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CliError::invalid_argument(format!("order time '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;

    fn config() -> QueryConfig {
        QueryConfig::default()
    }

    #[test]
    fn test_compile_command() {
        let out = run_command(
            Command::Compile {
                view: Collection::Results,
                filter: "summary.status == SUCCESS".into(),
            },
            &config(),
        )
        .unwrap();
        assert_eq!(out["sql"], "recordsummary_status = 1");
        assert_eq!(out["type"], "bool");
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        let err = run_command(
            Command::Compile {
                view: Collection::Records,
                filter: "nope == 1".into(),
            },
            &config(),
        )
        .unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::Query("QUERY_INVALID_FILTER"));
    }

    #[test]
    fn test_order_command() {
        let out = run_command(
            Command::Order {
                view: Collection::Records,
                order_by: "create_time desc".into(),
            },
            &config(),
        )
        .unwrap();
        assert_eq!(out["column"], "created_time");
        assert_eq!(out["sql"], "ORDER BY created_time DESC, id DESC");
    }

    #[test]
    fn test_list_command_prints_query() {
        let out = run_command(
            Command::List {
                collection: Collection::Results,
                parent: "foo".into(),
                filter: String::new(),
                order_by: String::new(),
                page_size: 5,
                page_token: String::new(),
            },
            &config(),
        )
        .unwrap();
        assert_eq!(out["page_size"], 5);
        assert_eq!(out["args"][0], "'foo'");
        assert!(out["sql"].as_str().unwrap().ends_with("LIMIT 6"));
    }

    #[test]
    fn test_summary_command_prints_query() {
        let out = run_command(
            Command::Summary {
                parent: "default/results/-".into(),
                filter: String::new(),
                summary: "total".into(),
                group_by: String::new(),
                order_by: String::new(),
            },
            &config(),
        )
        .unwrap();
        assert_eq!(out["sql"], "SELECT COUNT(*) AS total FROM records WHERE parent = ?");
        assert_eq!(out["args"][0], "'default'");
    }

    #[test]
    fn test_token_round_trip_through_commands() {
        let encoded = run_command(
            Command::Token {
                action: TokenAction::Encode {
                    parent: "foo".into(),
                    filter: String::new(),
                    uid: "bar".into(),
                    order_field: Some("create_time".into()),
                    order_time: Some("2024-01-02T03:04:05Z".into()),
                    desc: true,
                },
            },
            &config(),
        )
        .unwrap();
        let token = encoded["token"].as_str().unwrap().to_string();

        let decoded = run_command(
            Command::Token {
                action: TokenAction::Decode { token },
            },
            &config(),
        )
        .unwrap();
        assert_eq!(decoded["parent"], "foo");
        assert_eq!(decoded["last_item"]["uid"], "bar");
        assert_eq!(decoded["last_item"]["order_by"]["direction"], "desc");
    }

    #[test]
    fn test_bad_order_time() {
        let err = encode_token(
            "foo".into(),
            String::new(),
            "bar".into(),
            Some("create_time".into()),
            Some("yesterday".into()),
            false,
        )
        .unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);
    }
}
