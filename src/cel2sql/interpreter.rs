//! AST to SQL emitter
//!
//! A pure function of the checked expression: each node returns its SQL
//! text and nothing is accumulated across nodes. Parentheses are inserted
//! from the precedence of the emitted SQL, not from the source.

use chrono::SecondsFormat;
use serde_json::{Map, Value};

use super::dialect::{Dialect, PathSegment};
use super::naming::flattened_column;
use crate::cel::{
    date_part, operators, CompiledExpression, Expr, ExprKind, FilterError, FilterResult, Literal,
    Type, STRING_FUNCTIONS,
};
use crate::view::{ConstantValue, View};

const OR: u8 = 1;
const AND: u8 = 2;
const NOT: u8 = 3;
const RELATION: u8 = 4;
const ADDITIVE: u8 = 5;
const MULTIPLICATIVE: u8 = 6;
const UNARY: u8 = 7;
const ATOMIC: u8 = 9;

/// Binary operators: (function, SQL token, precedence)
const BINARY_OPERATORS: &[(&str, &str, u8)] = &[
    (operators::LOGICAL_OR, "OR", OR),
    (operators::LOGICAL_AND, "AND", AND),
    (operators::EQUALS, "=", RELATION),
    (operators::NOT_EQUALS, "<>", RELATION),
    (operators::LESS, "<", RELATION),
    (operators::LESS_EQUALS, "<=", RELATION),
    (operators::GREATER, ">", RELATION),
    (operators::GREATER_EQUALS, ">=", RELATION),
    (operators::IN, "IN", RELATION),
    (operators::ADD, "+", ADDITIVE),
    (operators::SUBTRACT, "-", ADDITIVE),
    (operators::MULTIPLY, "*", MULTIPLICATIVE),
    (operators::DIVIDE, "/", MULTIPLICATIVE),
    (operators::MODULO, "%", MULTIPLICATIVE),
];

fn binary_operator(function: &str) -> Option<(&'static str, u8)> {
    BINARY_OPERATORS
        .iter()
        .find(|(name, _, _)| *name == function)
        .map(|(_, token, precedence)| (*token, *precedence))
}

/// Translate a checked expression into a SQL boolean fragment
pub fn convert(
    view: &View,
    dialect: &dyn Dialect,
    compiled: &CompiledExpression,
) -> FilterResult<String> {
    Interpreter {
        view,
        dialect,
        compiled,
    }
    .visit(compiled.expr())
}

struct Interpreter<'a> {
    view: &'a View,
    dialect: &'a dyn Dialect,
    compiled: &'a CompiledExpression,
}

impl<'a> Interpreter<'a> {
    fn type_of(&self, expr: &Expr) -> &Type {
        self.compiled.type_of(expr)
    }

    fn visit(&self, expr: &Expr) -> FilterResult<String> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(self.literal(literal)),
            ExprKind::Ident(name) => self.ident(expr, name),
            ExprKind::Select { .. } => self.field_path(expr),
            ExprKind::List(elements) => {
                let parts = elements
                    .iter()
                    .map(|e| self.visit(e))
                    .collect::<FilterResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(", ")))
            }
            ExprKind::Call {
                target: Some(target),
                function,
                args,
            } => self.method(expr, target, function, args),
            ExprKind::Call {
                target: None,
                function,
                args,
            } => self.call(expr, function, args),
        }
    }

    fn literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(true) => "TRUE".to_string(),
            Literal::Bool(false) => "FALSE".to_string(),
            Literal::Int(v) => v.to_string(),
            Literal::Uint(v) => v.to_string(),
            Literal::Double(v) => format!("{:?}", v),
            Literal::String(s) => self.dialect.quote_string(s),
            Literal::Duration(secs) => self.dialect.interval_literal(*secs),
            Literal::Timestamp(ts) => self
                .dialect
                .timestamp_literal(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }

    fn ident(&self, expr: &Expr, name: &str) -> FilterResult<String> {
        if let Some(field) = self.view.resolve(name) {
            if let Type::Message(message) = &field.ty {
                return Err(FilterError::unsupported(
                    format!(
                        "'{}' is a {} message, compare one of its fields instead",
                        name, message
                    ),
                    expr.position,
                ));
            }
            return Ok(field.column.clone());
        }
        if let Some(constant) = self.view.constant(name) {
            return Ok(self.literal(&constant.literal()));
        }
        Err(FilterError::unsupported(
            format!("'{}' is not a recognized field", name),
            expr.position,
        ))
    }

    /// SQL precedence of the text `visit` produces for `expr`
    fn precedence(&self, expr: &Expr) -> u8 {
        match &expr.kind {
            ExprKind::Call {
                target: Some(_),
                function,
                ..
            } if STRING_FUNCTIONS.contains(&function.as_str()) => RELATION,
            ExprKind::Call {
                target: None,
                function,
                args,
            } => {
                let function = function.as_str();
                if function == operators::ADD && self.is_string_concat(args) {
                    return ATOMIC;
                }
                if let Some((_, precedence)) = binary_operator(function) {
                    return precedence;
                }
                match function {
                    operators::LOGICAL_NOT => NOT,
                    operators::NEGATE => UNARY,
                    f if STRING_FUNCTIONS.contains(&f) => RELATION,
                    _ => ATOMIC,
                }
            }
            _ => ATOMIC,
        }
    }

    /// Visit `child` as an operand of an operator with precedence `parent`
    fn operand(&self, child: &Expr, parent: u8, right: bool) -> FilterResult<String> {
        let sql = self.visit(child)?;
        let child_precedence = self.precedence(child);
        let wrap = child_precedence < parent
            || (child_precedence == parent && (right || parent == RELATION));
        Ok(if wrap { format!("({})", sql) } else { sql })
    }

    fn call(&self, expr: &Expr, function: &str, args: &[Expr]) -> FilterResult<String> {
        match (function, args) {
            (operators::INDEX, [operand, key]) => self.index(expr, operand, key),
            (operators::CONDITIONAL, [condition, then, otherwise]) => Ok(format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                self.visit(condition)?,
                self.visit(then)?,
                self.visit(otherwise)?
            )),
            (operators::EQUALS, [lhs, rhs]) => match self.containment(lhs, rhs)? {
                Some(sql) => Ok(sql),
                None => self.binary(function, lhs, rhs),
            },
            (operators::ADD, [_, _]) if self.is_string_concat(args) => {
                let mut parts = Vec::new();
                self.collect_concat(expr, &mut parts)?;
                Ok(self.dialect.concat(&parts))
            }
            (operators::IN, [_, container])
                if matches!(&container.kind, ExprKind::List(elements) if elements.is_empty()) =>
            {
                Err(FilterError::unsupported(
                    "'in' requires a non-empty list",
                    container.position,
                ))
            }
            (operators::IN, [_, container]) if !matches!(container.kind, ExprKind::List(_)) => {
                Err(FilterError::unsupported(
                    "'in' requires a list literal",
                    container.position,
                ))
            }
            (_, [lhs, rhs]) if binary_operator(function).is_some() => {
                self.binary(function, lhs, rhs)
            }
            (operators::LOGICAL_NOT, [arg]) => {
                let sql = self.visit(arg)?;
                if self.precedence(arg) < ATOMIC {
                    Ok(format!("NOT ({})", sql))
                } else {
                    Ok(format!("NOT {}", sql))
                }
            }
            (operators::NEGATE, [arg]) => {
                let sql = self.visit(arg)?;
                if self.precedence(arg) < ATOMIC || sql.starts_with('-') {
                    Ok(format!("-({})", sql))
                } else {
                    Ok(format!("-{}", sql))
                }
            }
            ("timestamp", [arg]) => Ok(self.dialect.cast_timestamp(&self.visit(arg)?)),
            (f, [subject, arg]) if STRING_FUNCTIONS.contains(&f) => {
                self.string_function(f, subject, arg)
            }
            _ => Err(FilterError::unsupported(
                format!(
                    "function '{}' cannot be translated",
                    operators::display_name(function)
                ),
                expr.position,
            )),
        }
    }

    fn method(
        &self,
        expr: &Expr,
        target: &Expr,
        function: &str,
        args: &[Expr],
    ) -> FilterResult<String> {
        if STRING_FUNCTIONS.contains(&function) {
            if let [arg] = args {
                return self.string_function(function, target, arg);
            }
        }
        if let Some((unit, decrement)) = date_part(function) {
            if !args.is_empty() {
                return Err(FilterError::unsupported(
                    format!("'{}' with a time zone argument is not supported", function),
                    expr.position,
                ));
            }
            let timestamp = self.dialect.cast_timestamp(&self.visit(target)?);
            let extracted = self.dialect.extract(unit, &timestamp);
            return Ok(if decrement {
                format!("({} - 1)", extracted)
            } else {
                extracted
            });
        }
        Err(FilterError::unsupported(
            format!("method '{}' cannot be translated", function),
            expr.position,
        ))
    }

    fn binary(&self, function: &str, lhs: &Expr, rhs: &Expr) -> FilterResult<String> {
        let (token, precedence) = binary_operator(function).ok_or_else(|| {
            FilterError::unsupported(
                format!("operator '{}' cannot be translated", operators::display_name(function)),
                lhs.position,
            )
        })?;
        let mut left = self.operand(lhs, precedence, false)?;
        let mut right = self.operand(rhs, precedence, true)?;

        if operators::is_relation(function) && function != operators::IN {
            let (lt, rt) = (self.type_of(lhs), self.type_of(rhs));
            if lt.is_dyn() && *rt == Type::Timestamp {
                left = self.dialect.cast_timestamp(&left);
            } else if rt.is_dyn() && *lt == Type::Timestamp {
                right = self.dialect.cast_timestamp(&right);
            }
        }
        Ok(format!("{} {} {}", left, token, right))
    }

    fn is_string_concat(&self, args: &[Expr]) -> bool {
        args.iter().any(|a| *self.type_of(a) == Type::String)
    }

    /// Flatten a left-nested chain of string additions
    fn collect_concat(&self, expr: &Expr, parts: &mut Vec<String>) -> FilterResult<()> {
        match expr.as_call_to(operators::ADD) {
            Some([lhs, rhs]) => {
                self.collect_concat(lhs, parts)?;
                parts.push(self.visit(rhs)?);
            }
            _ => parts.push(self.visit(expr)?),
        }
        Ok(())
    }

    fn string_function(&self, function: &str, subject: &Expr, arg: &Expr) -> FilterResult<String> {
        let s = self.operand(subject, ADDITIVE, false)?;
        let a = self.operand(arg, ADDITIVE, true)?;
        let concat = self.dialect.string_concat_operator();
        Ok(match function {
            "contains" => format!("{} <> 0", self.dialect.position(&a, &s)),
            "startsWith" => format!("{} LIKE {} {} '%'", s, a, concat),
            "endsWith" => format!("{} LIKE '%' {} {}", s, concat, a),
            _ => format!("{} {} {}", s, self.dialect.regex_match_operator(), a),
        })
    }

    /// `m["k"] == "v"` as a JSON containment test, when both sides are constant
    fn containment(&self, lhs: &Expr, rhs: &Expr) -> FilterResult<Option<String>> {
        for (indexed, other) in [(lhs, rhs), (rhs, lhs)] {
            let Some((base, key)) = indexed.as_index() else {
                continue;
            };
            if self.type_of(base).is_dyn() {
                continue;
            }
            let (Some(key), Some(value)) = (key.as_string_literal(), self.string_constant(other))
            else {
                continue;
            };
            let mut document = Map::new();
            document.insert(key.to_string(), Value::String(value.to_string()));
            let document = Value::Object(document).to_string();
            return Ok(Some(
                self.dialect.json_contains(&self.visit(base)?, &document),
            ));
        }
        Ok(None)
    }

    fn string_constant<'e>(&'e self, expr: &'e Expr) -> Option<&'e str> {
        match &expr.kind {
            ExprKind::Literal(Literal::String(s)) => Some(s),
            ExprKind::Ident(name) if self.view.resolve(name).is_none() => {
                match self.view.constant(name) {
                    Some(ConstantValue::String(s)) => Some(s),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn index(&self, expr: &Expr, operand: &Expr, key: &Expr) -> FilterResult<String> {
        if let ExprKind::Ident(name) = &operand.kind {
            if let Some(field) = self.view.resolve(name) {
                if matches!(field.ty, Type::Dyn | Type::Map(_, _)) {
                    let key_sql = self.visit(key)?;
                    return Ok(self.dialect.json_field_text(&field.column, &key_sql));
                }
            }
        }
        self.field_path(expr)
    }

    /// Render a chain of selections and constant indexes rooted at a field
    fn field_path(&self, expr: &Expr) -> FilterResult<String> {
        let mut segments = Vec::new();
        let mut current = expr;
        let root = loop {
            match &current.kind {
                ExprKind::Select { operand, field } => {
                    segments.push(PathSegment::Key(field.clone()));
                    current = operand;
                }
                ExprKind::Call { .. } => {
                    let Some((operand, key)) = current.as_index() else {
                        return Err(FilterError::unsupported(
                            "field access on a computed value is not supported",
                            current.position,
                        ));
                    };
                    segments.push(match &key.kind {
                        ExprKind::Literal(Literal::String(s)) => PathSegment::Key(s.clone()),
                        ExprKind::Literal(Literal::Int(i)) => PathSegment::Index(*i),
                        ExprKind::Literal(Literal::Uint(u)) => {
                            PathSegment::Index(i64::try_from(*u).unwrap_or(i64::MAX))
                        }
                        _ => {
                            return Err(FilterError::unsupported(
                                "index keys must be literals",
                                key.position,
                            ))
                        }
                    });
                    current = operand;
                }
                ExprKind::Ident(name) => break name,
                _ => {
                    return Err(FilterError::unsupported(
                        "field access on a computed value is not supported",
                        current.position,
                    ))
                }
            }
        };
        segments.reverse();

        let field = self.view.resolve(root).ok_or_else(|| {
            FilterError::unsupported(
                format!("'{}' is not a recognized field", root),
                current.position,
            )
        })?;

        match &field.ty {
            Type::Dyn => Ok(self.dialect.json_path(&field.column, &segments)),
            Type::Message(message) => match segments.as_slice() {
                [PathSegment::Key(name)] => flattened_column(message, name).ok_or_else(|| {
                    FilterError::unsupported(
                        format!("fields of '{}' are not stored as columns", message),
                        expr.position,
                    )
                }),
                [PathSegment::Key(name), ..] => Err(FilterError::unsupported(
                    format!(
                        "'{}.{}' is stored as a single column and cannot be accessed further",
                        root, name
                    ),
                    expr.position,
                )),
                _ => Err(FilterError::unsupported(
                    format!("'{}' can only be accessed by field name", root),
                    expr.position,
                )),
            },
            _ => Err(FilterError::unsupported(
                format!("'{}' is not a recognized field", root),
                expr.position,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cel::{Environment, FilterErrorKind};
    use crate::view;

    fn records_sql(filter: &str) -> String {
        Environment::new(view::records()).to_sql(filter).unwrap()
    }

    fn results_sql(filter: &str) -> String {
        Environment::new(view::results()).to_sql(filter).unwrap()
    }

    #[test]
    fn test_simple_equality() {
        assert_eq!(records_sql("name == \"foo\""), "name = 'foo'");
        assert_eq!(records_sql("uid != 'x'"), "id <> 'x'");
    }

    #[test]
    fn test_dyn_path() {
        assert_eq!(
            records_sql("data.metadata.namespace == \"default\""),
            "(data->'metadata'->>'namespace') = 'default'"
        );
        assert_eq!(
            records_sql("data.status.conditions[0].reason == \"Succeeded\""),
            "(data->'status'->'conditions'->0->>'reason') = 'Succeeded'"
        );
    }

    #[test]
    fn test_map_containment() {
        assert_eq!(
            results_sql("annotations[\"repo\"] == \"tektoncd/results\""),
            "annotations @> '{\"repo\":\"tektoncd/results\"}'::jsonb"
        );
        assert_eq!(
            results_sql("\"v\" == annotations[\"k\"]"),
            "annotations @> '{\"k\":\"v\"}'::jsonb"
        );
    }

    #[test]
    fn test_map_index_without_containment() {
        assert_eq!(
            results_sql("annotations[\"repo\"] != \"x\""),
            "annotations->>'repo' <> 'x'"
        );
    }

    #[test]
    fn test_date_part_with_decrement() {
        assert_eq!(
            records_sql("data.status.completionTime.getDayOfYear() > 15"),
            "(EXTRACT(DOY FROM (data->'status'->>'completionTime')::TIMESTAMP WITH TIME ZONE) - 1) > 15"
        );
        assert_eq!(
            results_sql("summary.start_time.getFullYear() == 2024"),
            "EXTRACT(YEAR FROM recordsummary_start_time::TIMESTAMP WITH TIME ZONE) = 2024"
        );
    }

    #[test]
    fn test_date_part_without_decrement() {
        assert_eq!(
            results_sql("create_time.getDate() == 1"),
            "EXTRACT(DAY FROM created_time::TIMESTAMP WITH TIME ZONE) = 1"
        );
        assert_eq!(
            results_sql("create_time.getDayOfWeek() == 0"),
            "EXTRACT(DOW FROM created_time::TIMESTAMP WITH TIME ZONE) = 0"
        );
        assert_eq!(
            results_sql("create_time.getDayOfMonth() == 0"),
            "(EXTRACT(DAY FROM created_time::TIMESTAMP WITH TIME ZONE) - 1) = 0"
        );
    }

    #[test]
    fn test_summary_columns_and_constants() {
        assert_eq!(
            results_sql("summary.status == SUCCESS"),
            "recordsummary_status = 1"
        );
        assert_eq!(
            results_sql("summary.type == PIPELINE_RUN"),
            "recordsummary_type = 'tekton.dev/v1.PipelineRun'"
        );
    }

    #[test]
    fn test_logical_precedence() {
        assert_eq!(
            records_sql("name == 'a' || name == 'b' && parent == 'c'"),
            "name = 'a' OR name = 'b' AND parent = 'c'"
        );
        assert_eq!(
            records_sql("(name == 'a' || name == 'b') && parent == 'c'"),
            "(name = 'a' OR name = 'b') AND parent = 'c'"
        );
        assert_eq!(records_sql("!(name == 'a')"), "NOT (name = 'a')");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(
            records_sql("name.contains('foo')"),
            "POSITION('foo' IN name) <> 0"
        );
        assert_eq!(
            records_sql("name.startsWith('foo')"),
            "name LIKE 'foo' || '%'"
        );
        assert_eq!(
            records_sql("endsWith(name, 'foo')"),
            "name LIKE '%' || 'foo'"
        );
        assert_eq!(records_sql("name.matches('^f.*o$')"), "name ~ '^f.*o$'");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            records_sql("parent + '/' + name == 'a/b'"),
            "CONCAT(parent, '/', name) = 'a/b'"
        );
    }

    #[test]
    fn test_in_list() {
        assert_eq!(
            records_sql("data_type in [PIPELINE_RUN, TASK_RUN]"),
            "type IN ('tekton.dev/v1.PipelineRun', 'tekton.dev/v1.TaskRun')"
        );
    }

    #[test]
    fn test_empty_in_list_is_rejected() {
        let err = Environment::new(view::records())
            .to_sql("name in []")
            .unwrap_err();
        assert_eq!(err.kind(), FilterErrorKind::Unsupported);
    }

    #[test]
    fn test_bare_message_field_is_rejected() {
        let env = Environment::new(view::results());
        let err = env.to_sql("summary == summary").unwrap_err();
        assert_eq!(err.kind(), FilterErrorKind::Unsupported);
        assert!(err.message().contains("compare one of its fields"));
    }

    #[test]
    fn test_access_below_flattened_column_names_the_column() {
        let env = Environment::new(view::results());
        let err = env.to_sql("summary.annotations['a'] != 'b'").unwrap_err();
        assert_eq!(err.kind(), FilterErrorKind::Unsupported);
        assert!(err.message().contains("'summary.annotations'"));
        assert!(!err.message().contains("not a recognized field"));
    }

    #[test]
    fn test_dyn_timestamp_comparison_is_cast() {
        assert_eq!(
            records_sql("data.status.startTime > timestamp('2022-01-01T00:00:00Z')"),
            "(data->'status'->>'startTime')::TIMESTAMP WITH TIME ZONE > TIMESTAMP WITH TIME ZONE '2022-01-01T00:00:00Z'"
        );
        assert_eq!(
            records_sql("timestamp('2022-01-01T00:00:00Z') < data.status.startTime"),
            "TIMESTAMP WITH TIME ZONE '2022-01-01T00:00:00Z' < (data->'status'->>'startTime')::TIMESTAMP WITH TIME ZONE"
        );
    }

    #[test]
    fn test_timestamp_of_computed_value_is_cast() {
        assert_eq!(
            records_sql("timestamp(data.status.startTime) > create_time"),
            "(data->'status'->>'startTime')::TIMESTAMP WITH TIME ZONE > created_time"
        );
    }

    #[test]
    fn test_malformed_timestamp_literal() {
        let err = Environment::new(view::records())
            .to_sql("create_time > timestamp('last tuesday')")
            .unwrap_err();
        assert_eq!(err.kind(), FilterErrorKind::Syntax);
    }

    #[test]
    fn test_timestamp_arithmetic_with_duration() {
        assert_eq!(
            records_sql("create_time > timestamp('2022-01-01T00:00:00Z') + duration('1h')"),
            "created_time > TIMESTAMP WITH TIME ZONE '2022-01-01T00:00:00Z' + '3600 SECONDS'"
        );
    }

    #[test]
    fn test_conditional() {
        assert_eq!(
            records_sql("(name == 'a' ? 1 : 2) == 1"),
            "CASE WHEN name = 'a' THEN 1 ELSE 2 END = 1"
        );
    }

    #[test]
    fn test_unsupported_construct() {
        let env = Environment::new(view::records());
        let err = env
            .to_sql("data.status.completionTime.getDayOfYear('UTC') > 1")
            .unwrap_err();
        assert_eq!(err.kind(), FilterErrorKind::Unsupported);
    }

    #[test]
    fn test_translation_is_deterministic() {
        let env = Environment::new(view::records());
        let compiled = env.compile("data.metadata.name == 'x' && name != 'y'").unwrap();
        let first = env.translate(&compiled).unwrap();
        let second = env.translate(&compiled).unwrap();
        assert_eq!(first, second);
    }
}
