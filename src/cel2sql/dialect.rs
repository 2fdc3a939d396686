//! SQL dialect
//!
//! Every backend-specific token the translator emits goes through
//! [`Dialect`]. The AST walk never writes casts, JSON operators or
//! string functions directly.

/// One step of a JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array position
    Index(i64),
}

/// Backend-specific SQL emission
pub trait Dialect: Send + Sync {
    /// Dialect name for diagnostics
    fn name(&self) -> &'static str;

    /// Quote a string literal
    fn quote_string(&self, value: &str) -> String;

    /// Cast an expression to a zoned timestamp
    fn cast_timestamp(&self, sql: &str) -> String;

    /// Zoned timestamp literal from an RFC 3339 string
    fn timestamp_literal(&self, rfc3339: &str) -> String;

    /// Interval literal of whole seconds
    fn interval_literal(&self, seconds: i64) -> String;

    /// Navigate a JSON document; the last step yields text
    fn json_path(&self, root: &str, path: &[PathSegment]) -> String;

    /// Child of a JSON document as text, `key` already rendered
    fn json_field_text(&self, base: &str, key: &str) -> String;

    /// JSON containment test against a literal document
    fn json_contains(&self, base: &str, document: &str) -> String;

    /// Concatenate several string expressions
    fn concat(&self, parts: &[String]) -> String;

    /// Binary string concatenation operator
    fn string_concat_operator(&self) -> &'static str;

    /// Regular expression match operator
    fn regex_match_operator(&self) -> &'static str;

    /// 1-based position of `needle` in `haystack`, 0 when absent
    fn position(&self, needle: &str, haystack: &str) -> String;

    /// Extract a date part from a timestamp expression
    fn extract(&self, unit: &str, sql: &str) -> String;
}

/// PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

const TIMESTAMP_TYPE: &str = "TIMESTAMP WITH TIME ZONE";

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn cast_timestamp(&self, sql: &str) -> String {
        if is_atomic(sql) {
            format!("{}::{}", sql, TIMESTAMP_TYPE)
        } else {
            format!("({})::{}", sql, TIMESTAMP_TYPE)
        }
    }

    fn timestamp_literal(&self, rfc3339: &str) -> String {
        format!("{} {}", TIMESTAMP_TYPE, self.quote_string(rfc3339))
    }

    fn interval_literal(&self, seconds: i64) -> String {
        format!("'{} SECONDS'", seconds)
    }

    fn json_path(&self, root: &str, path: &[PathSegment]) -> String {
        let mut out = String::with_capacity(root.len() + path.len() * 16);
        out.push('(');
        out.push_str(root);
        for (i, segment) in path.iter().enumerate() {
            out.push_str(if i + 1 == path.len() { "->>" } else { "->" });
            match segment {
                PathSegment::Key(key) => out.push_str(&self.quote_string(key)),
                PathSegment::Index(index) => out.push_str(&index.to_string()),
            }
        }
        out.push(')');
        out
    }

    fn json_field_text(&self, base: &str, key: &str) -> String {
        format!("{}->>{}", base, key)
    }

    fn json_contains(&self, base: &str, document: &str) -> String {
        format!("{} @> {}::jsonb", base, self.quote_string(document))
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn string_concat_operator(&self) -> &'static str {
        "||"
    }

    fn regex_match_operator(&self) -> &'static str {
        "~"
    }

    fn position(&self, needle: &str, haystack: &str) -> String {
        format!("POSITION({} IN {})", needle, haystack)
    }

    fn extract(&self, unit: &str, sql: &str) -> String {
        format!("EXTRACT({} FROM {})", unit, sql)
    }
}

/// True when `sql` needs no parentheses before a postfix cast
pub(crate) fn is_atomic(sql: &str) -> bool {
    if sql.is_empty() {
        return false;
    }
    if sql
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return true;
    }
    if sql.len() >= 2 && sql.starts_with('\'') && sql.ends_with('\'') {
        let inner = &sql[1..sql.len() - 1];
        return !inner.replace("''", "").contains('\'');
    }
    if sql.starts_with('(') && sql.ends_with(')') {
        return closes_at_end(sql);
    }
    false
}

/// True when the opening parenthesis at index 0 closes at the last byte
fn closes_at_end(sql: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote = false;
    let last = sql.len() - 1;
    for (i, c) in sql.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != last {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_string_doubles_quotes() {
        assert_eq!(Postgres.quote_string("foo"), "'foo'");
        assert_eq!(Postgres.quote_string("it's"), "'it''s'");
    }

    #[test]
    fn test_json_path() {
        let path = vec![
            PathSegment::Key("metadata".into()),
            PathSegment::Key("namespace".into()),
        ];
        assert_eq!(Postgres.json_path("data", &path), "(data->'metadata'->>'namespace')");

        let path = vec![PathSegment::Key("items".into()), PathSegment::Index(0)];
        assert_eq!(Postgres.json_path("data", &path), "(data->'items'->>0)");
    }

    #[test]
    fn test_cast_timestamp_parenthesizes_compound_sql() {
        assert_eq!(
            Postgres.cast_timestamp("created_time"),
            "created_time::TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(
            Postgres.cast_timestamp("(data->>'t')"),
            "(data->>'t')::TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(
            Postgres.cast_timestamp("data->>'t'"),
            "(data->>'t')::TIMESTAMP WITH TIME ZONE"
        );
    }

    #[test]
    fn test_is_atomic() {
        assert!(is_atomic("name"));
        assert!(is_atomic("'a''b'"));
        assert!(!is_atomic("'a' || 'b'"));
        assert!(is_atomic("(a = b)"));
        assert!(!is_atomic("(a) = (b)"));
    }

    #[test]
    fn test_contains_and_concat() {
        assert_eq!(
            Postgres.json_contains("annotations", "{\"a\":\"b\"}"),
            "annotations @> '{\"a\":\"b\"}'::jsonb"
        );
        assert_eq!(
            Postgres.concat(&["a".into(), "'-'".into(), "b".into()]),
            "CONCAT(a, '-', b)"
        );
    }
}
