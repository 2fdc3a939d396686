//! CLI argument definitions using clap
//!
//! Commands:
//! - results-query compile --view <results|records> <filter>
//! - results-query order --view <results|records> <order_by>
//! - results-query list --collection <c> --parent <p> [--filter ..] [--order-by ..] [--page-size n] [--page-token t]
//! - results-query summary --parent <p> [--summary ..] [--group-by ..] [--order-by ..] [--filter ..]
//! - results-query token decode <token>
//! - results-query token encode --parent <p> --uid <id> [--filter ..] [--order-field f --order-time t] [--desc]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::lister::Collection;
use crate::observability::Severity;

/// Filter compiler and pagination planner for the results query layer
#[derive(Parser, Debug)]
#[command(name = "results-query")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file; RESULTS_QUERY_* variables are used otherwise
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Minimum log severity written to stderr
    #[arg(long, global = true, default_value = "info")]
    pub log_level: Severity,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate a filter expression to SQL
    Compile {
        #[arg(long, default_value = "records")]
        view: Collection,

        filter: String,
    },

    /// Resolve an order_by string to an ORDER BY clause
    Order {
        #[arg(long, default_value = "records")]
        view: Collection,

        order_by: String,
    },

    /// Compose the query for one page of a listing
    List {
        #[arg(long, default_value = "records")]
        collection: Collection,

        #[arg(long)]
        parent: String,

        #[arg(long, default_value = "")]
        filter: String,

        #[arg(long, default_value = "")]
        order_by: String,

        #[arg(long, default_value_t = 0)]
        page_size: i32,

        #[arg(long, default_value = "")]
        page_token: String,
    },

    /// Compose a grouped summary query over records
    Summary {
        #[arg(long)]
        parent: String,

        #[arg(long, default_value = "")]
        filter: String,

        /// Comma-separated aggregate names
        #[arg(long, default_value = "total")]
        summary: String,

        #[arg(long, default_value = "")]
        group_by: String,

        #[arg(long, default_value = "")]
        order_by: String,
    },

    /// Inspect or build page tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Print the contents of a page token
    Decode { token: String },

    /// Build a page token
    Encode {
        #[arg(long)]
        parent: String,

        #[arg(long, default_value = "")]
        filter: String,

        /// Unique id of the last returned row
        #[arg(long)]
        uid: String,

        /// Public name of the order field
        #[arg(long, requires = "order_time")]
        order_field: Option<String>,

        /// RFC 3339 order value of the last returned row
        #[arg(long, requires = "order_field")]
        order_time: Option<String>,

        #[arg(long)]
        desc: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile() {
        let cli = Cli::try_parse_from([
            "results-query",
            "compile",
            "--view",
            "results",
            "summary.status == SUCCESS",
        ])
        .unwrap();
        match cli.command {
            Command::Compile { view, filter } => {
                assert_eq!(view, Collection::Results);
                assert_eq!(filter, "summary.status == SUCCESS");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_order_field_requires_time() {
        assert!(Cli::try_parse_from([
            "results-query",
            "token",
            "encode",
            "--parent",
            "default",
            "--uid",
            "x",
            "--order-field",
            "create_time",
        ])
        .is_err());
    }

    #[test]
    fn test_unknown_view() {
        let parsed = Cli::try_parse_from(["results-query", "compile", "--view", "runs", "true"]);
        assert!(parsed.is_err());
    }
}
