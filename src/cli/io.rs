//! JSON output for the CLI
//!
//! Every command writes exactly one JSON object to stdout:
//! `{"status":"ok","data":...}` or `{"status":"error","code":..,"message":..}`.
//! Log lines go to stderr and never mix with it.

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

pub fn write_response(data: Value) -> CliResult<()> {
    write_to(&mut io::stdout(), &response(data))
}

pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_to(&mut io::stdout(), &error(code, message))
}

fn response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

fn error(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn write_to<W: Write>(writer: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
