//! Filter compilation errors
//!
//! Every error names the offending construct and, when known, the
//! line/column it came from.

use std::fmt;

use super::ast::Position;

/// Stage that rejected the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    /// Lexing or parsing failed
    Syntax,
    /// Type check failed
    Type,
    /// Valid expression with no SQL translation
    Unsupported,
}

impl FilterErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterErrorKind::Syntax => "syntax error",
            FilterErrorKind::Type => "type error",
            FilterErrorKind::Unsupported => "unsupported expression",
        }
    }
}

/// Filter error with position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterError {
    kind: FilterErrorKind,
    message: String,
    position: Option<Position>,
}

impl FilterError {
    pub fn syntax(message: impl Into<String>, position: Position) -> Self {
        Self {
            kind: FilterErrorKind::Syntax,
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn type_error(message: impl Into<String>, position: Position) -> Self {
        Self {
            kind: FilterErrorKind::Type,
            message: message.into(),
            position: Some(position),
        }
    }

    pub fn unsupported(message: impl Into<String>, position: Position) -> Self {
        Self {
            kind: FilterErrorKind::Unsupported,
            message: message.into(),
            position: Some(position),
        }
    }

    /// Error not tied to a node, e.g. a view mismatch
    pub fn detached(kind: FilterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub fn kind(&self) -> FilterErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        if let Some(position) = self.position {
            write!(f, " (line {}, column {})", position.line, position.column)?;
        }
        Ok(())
    }
}

impl std::error::Error for FilterError {}

pub type FilterResult<T> = Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_position() {
        let err = FilterError::type_error(
            "undeclared reference to 'foo'",
            Position { line: 1, column: 5 },
        );
        let display = err.to_string();
        assert!(display.contains("type error"));
        assert!(display.contains("'foo'"));
        assert!(display.contains("line 1, column 5"));
    }

    #[test]
    fn test_detached_has_no_position() {
        let err = FilterError::detached(FilterErrorKind::Unsupported, "wrong view");
        assert_eq!(err.position(), None);
        assert_eq!(err.to_string(), "unsupported expression: wrong view");
    }
}
