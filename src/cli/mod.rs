//! CLI module for results-query
//!
//! Provides command-line access to:
//! - compile: Filter expression to SQL
//! - order: order_by string to ORDER BY clause
//! - list: Query for one page of a listing
//! - summary: Grouped summary query
//! - token: Decode or build page tokens

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, TokenAction};
pub use commands::{run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
