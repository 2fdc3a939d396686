//! CLI-specific error types

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::errors::QueryError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file or environment error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Malformed command-line value
    InvalidArgument,
    /// The query layer rejected the request
    Query(&'static str),
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CLI_CONFIG_ERROR",
            Self::IoError => "CLI_IO_ERROR",
            Self::InvalidArgument => "CLI_INVALID_ARGUMENT",
            Self::Query(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        Self::new(CliErrorCode::Query(e.code()), e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_keeps_code() {
        let err = CliError::from(QueryError::InvalidOrder("bad".into()));
        assert_eq!(err.code_str(), "QUERY_INVALID_ORDER");
        assert_eq!(err.to_string(), "QUERY_INVALID_ORDER: invalid order_by: bad");
    }

    #[test]
    fn test_config_error_code() {
        let err = CliError::from(ConfigError::Invalid("min > max".into()));
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
