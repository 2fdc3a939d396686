//! Type checker
//!
//! Assigns a [`Type`] to every node, resolving names against a [`View`].

use std::collections::HashMap;

use regex::Regex;

use super::ast::{operators, Expr, ExprId, ExprKind, Literal};
use super::errors::{FilterError, FilterResult};
use super::types::Type;
use crate::view::View;

/// String functions callable as `s.fn(arg)` or `fn(s, arg)`
pub(crate) const STRING_FUNCTIONS: &[&str] = &["contains", "startsWith", "endsWith", "matches"];

/// Timestamp accessors: (name, EXTRACT unit, subtract one)
pub(crate) const DATE_PART_FUNCTIONS: &[(&str, &str, bool)] = &[
    ("getDate", "DAY", false),
    ("getFullYear", "YEAR", false),
    ("getDayOfWeek", "DOW", false),
    ("getDayOfMonth", "DAY", true),
    ("getDayOfYear", "DOY", true),
    ("getMonth", "MONTH", true),
    ("getHours", "HOUR", false),
    ("getMinutes", "MINUTE", false),
    ("getSeconds", "SECOND", false),
];

pub(crate) fn date_part(function: &str) -> Option<(&'static str, bool)> {
    DATE_PART_FUNCTIONS
        .iter()
        .find(|(name, _, _)| *name == function)
        .map(|(_, unit, decrement)| (*unit, *decrement))
}

/// Check `expr` against `view`, returning the type of every node
pub fn check(expr: &Expr, view: &View) -> FilterResult<HashMap<ExprId, Type>> {
    let mut checker = Checker {
        view,
        types: HashMap::new(),
    };
    checker.check(expr)?;
    Ok(checker.types)
}

struct Checker<'a> {
    view: &'a View,
    types: HashMap<ExprId, Type>,
}

impl<'a> Checker<'a> {
    fn check(&mut self, expr: &Expr) -> FilterResult<Type> {
        let ty = match &expr.kind {
            ExprKind::Literal(literal) => literal_type(literal),
            ExprKind::Ident(name) => self.check_ident(expr, name)?,
            ExprKind::Select { operand, field } => self.check_select(expr, operand, field)?,
            ExprKind::List(elements) => {
                let mut elem = None::<Type>;
                for element in elements {
                    let ty = self.check(element)?;
                    elem = Some(match elem {
                        None => ty,
                        Some(prev) => prev.join(&ty),
                    });
                }
                Type::list(elem.unwrap_or(Type::Dyn))
            }
            ExprKind::Call {
                target,
                function,
                args,
            } => self.check_call(expr, target.as_deref(), function, args)?,
        };
        self.types.insert(expr.id, ty.clone());
        Ok(ty)
    }

    fn check_ident(&self, expr: &Expr, name: &str) -> FilterResult<Type> {
        if let Some(field) = self.view.resolve(name) {
            return Ok(field.ty.clone());
        }
        if let Some(constant) = self.view.constant(name) {
            return Ok(constant.ty());
        }
        Err(FilterError::type_error(
            format!("undeclared reference to '{}'", name),
            expr.position,
        ))
    }

    fn check_select(&mut self, expr: &Expr, operand: &Expr, field: &str) -> FilterResult<Type> {
        let operand_type = self.check(operand)?;
        match &operand_type {
            Type::Dyn => Ok(Type::Dyn),
            Type::Map(key, value) if **key == Type::String || key.is_dyn() => Ok((**value).clone()),
            Type::Message(name) => {
                let message = self.view.message(name).ok_or_else(|| {
                    FilterError::type_error(
                        format!("undeclared message type '{}'", name),
                        expr.position,
                    )
                })?;
                message.field_type(field).cloned().ok_or_else(|| {
                    FilterError::type_error(
                        format!("undefined field '{}' on {}", field, name),
                        expr.position,
                    )
                })
            }
            other => Err(FilterError::type_error(
                format!("type '{}' does not support field selection", other),
                expr.position,
            )),
        }
    }

    fn check_call(
        &mut self,
        expr: &Expr,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> FilterResult<Type> {
        let target_type = match target {
            Some(target) => Some(self.check(target)?),
            None => None,
        };
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.check(arg)?);
        }

        if let Some(target_type) = target_type {
            return self.check_method(expr, &target_type, function, args, &arg_types);
        }

        let no_overload = || {
            let shown: Vec<String> = arg_types.iter().map(|t| t.to_string()).collect();
            FilterError::type_error(
                format!(
                    "found no matching overload for '{}' applied to ({})",
                    operators::display_name(function),
                    shown.join(", ")
                ),
                expr.position,
            )
        };

        match (function, arg_types.as_slice()) {
            (operators::LOGICAL_AND | operators::LOGICAL_OR, [a, b]) => {
                if Type::Bool.is_assignable_from(a) && Type::Bool.is_assignable_from(b) {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload())
                }
            }
            (operators::LOGICAL_NOT, [a]) => {
                if Type::Bool.is_assignable_from(a) {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload())
                }
            }
            (operators::NEGATE, [a]) => match a {
                Type::Int | Type::Double | Type::Duration | Type::Dyn => Ok(a.clone()),
                _ => Err(no_overload()),
            },
            (operators::EQUALS | operators::NOT_EQUALS, [a, b]) => {
                if a.is_assignable_from(b) || (a.is_numeric() && b.is_numeric()) {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload())
                }
            }
            (
                operators::LESS
                | operators::LESS_EQUALS
                | operators::GREATER
                | operators::GREATER_EQUALS,
                [a, b],
            ) => {
                let orderable = |t: &Type| {
                    matches!(
                        t,
                        Type::Int
                            | Type::Uint
                            | Type::Double
                            | Type::String
                            | Type::Timestamp
                            | Type::Duration
                            | Type::Bool
                            | Type::Dyn
                    )
                };
                let compatible =
                    a.is_dyn() || b.is_dyn() || a == b || (a.is_numeric() && b.is_numeric());
                if orderable(a) && orderable(b) && compatible {
                    Ok(Type::Bool)
                } else {
                    Err(no_overload())
                }
            }
            (operators::ADD, [a, b]) => add_type(a, b).ok_or_else(no_overload),
            (operators::SUBTRACT, [a, b]) => subtract_type(a, b).ok_or_else(no_overload),
            (operators::MULTIPLY | operators::DIVIDE, [a, b]) => {
                numeric_type(a, b, &[Type::Int, Type::Uint, Type::Double]).ok_or_else(no_overload)
            }
            (operators::MODULO, [a, b]) => {
                numeric_type(a, b, &[Type::Int, Type::Uint]).ok_or_else(no_overload)
            }
            (operators::IN, [elem, container]) => match container {
                Type::List(item) if item.is_assignable_from(elem) => Ok(Type::Bool),
                Type::Map(key, _) if key.is_assignable_from(elem) => Ok(Type::Bool),
                Type::Dyn => Ok(Type::Bool),
                _ => Err(no_overload()),
            },
            (operators::INDEX, [container, key]) => match container {
                Type::List(item) if matches!(key, Type::Int | Type::Uint | Type::Dyn) => {
                    Ok((**item).clone())
                }
                Type::Map(key_type, value) if key_type.is_assignable_from(key) => {
                    Ok((**value).clone())
                }
                Type::Dyn => Ok(Type::Dyn),
                _ => Err(no_overload()),
            },
            (operators::CONDITIONAL, [condition, then, otherwise]) => {
                if Type::Bool.is_assignable_from(condition) {
                    Ok(then.join(otherwise))
                } else {
                    Err(no_overload())
                }
            }
            ("timestamp", [a]) => match a {
                Type::String | Type::Timestamp | Type::Int | Type::Dyn => Ok(Type::Timestamp),
                _ => Err(no_overload()),
            },
            ("duration", [a]) => match a {
                Type::String | Type::Duration | Type::Dyn => Ok(Type::Duration),
                _ => Err(no_overload()),
            },
            (name, [subject, rest @ ..]) if STRING_FUNCTIONS.contains(&name) && rest.len() == 1 => {
                self.check_string_function(expr, name, subject, &rest[0], &args[1])
            }
            _ if is_known_function(function) => Err(no_overload()),
            _ => Err(FilterError::type_error(
                format!("undeclared reference to function '{}'", function),
                expr.position,
            )),
        }
    }

    fn check_method(
        &mut self,
        expr: &Expr,
        target: &Type,
        function: &str,
        args: &[Expr],
        arg_types: &[Type],
    ) -> FilterResult<Type> {
        if STRING_FUNCTIONS.contains(&function) {
            if let ([arg], [arg_type]) = (args, arg_types) {
                return self.check_string_function(expr, function, target, arg_type, arg);
            }
        }
        if date_part(function).is_some() {
            let target_ok = matches!(target, Type::Timestamp | Type::Dyn);
            let args_ok = match arg_types {
                [] => true,
                [tz] => Type::String.is_assignable_from(tz),
                _ => false,
            };
            if target_ok && args_ok {
                return Ok(Type::Int);
            }
        }
        if STRING_FUNCTIONS.contains(&function) || date_part(function).is_some() {
            let shown: Vec<String> = arg_types.iter().map(|t| t.to_string()).collect();
            return Err(FilterError::type_error(
                format!(
                    "found no matching overload for '{}' applied to '{}.({})'",
                    function,
                    target,
                    shown.join(", ")
                ),
                expr.position,
            ));
        }
        Err(FilterError::type_error(
            format!("undeclared reference to function '{}'", function),
            expr.position,
        ))
    }

    fn check_string_function(
        &self,
        expr: &Expr,
        function: &str,
        subject: &Type,
        arg_type: &Type,
        arg: &Expr,
    ) -> FilterResult<Type> {
        if !Type::String.is_assignable_from(subject) || !Type::String.is_assignable_from(arg_type) {
            return Err(FilterError::type_error(
                format!(
                    "found no matching overload for '{}' applied to ({}, {})",
                    function, subject, arg_type
                ),
                expr.position,
            ));
        }
        if function == "matches" {
            if let Some(pattern) = arg.as_string_literal() {
                Regex::new(pattern).map_err(|e| {
                    FilterError::type_error(
                        format!("invalid regular expression '{}': {}", pattern, e),
                        arg.position,
                    )
                })?;
            }
        }
        Ok(Type::Bool)
    }
}

fn is_known_function(function: &str) -> bool {
    function.starts_with('_')
        || function.ends_with('_')
        || function == operators::IN
        || function == "timestamp"
        || function == "duration"
        || STRING_FUNCTIONS.contains(&function)
}

fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Null => Type::Null,
        Literal::Bool(_) => Type::Bool,
        Literal::Int(_) => Type::Int,
        Literal::Uint(_) => Type::Uint,
        Literal::Double(_) => Type::Double,
        Literal::String(_) => Type::String,
        Literal::Duration(_) => Type::Duration,
        Literal::Timestamp(_) => Type::Timestamp,
    }
}

fn add_type(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        (Type::Dyn, Type::Dyn) => Some(Type::Dyn),
        (Type::Dyn, other) | (other, Type::Dyn) => match other {
            Type::Int
            | Type::Uint
            | Type::Double
            | Type::String
            | Type::Duration
            | Type::List(_) => Some(other.clone()),
            Type::Timestamp => Some(Type::Timestamp),
            _ => None,
        },
        (Type::Int, Type::Int) => Some(Type::Int),
        (Type::Uint, Type::Uint) => Some(Type::Uint),
        (Type::Double, Type::Double) => Some(Type::Double),
        (Type::String, Type::String) => Some(Type::String),
        (Type::Timestamp, Type::Duration) | (Type::Duration, Type::Timestamp) => {
            Some(Type::Timestamp)
        }
        (Type::Duration, Type::Duration) => Some(Type::Duration),
        (Type::List(x), Type::List(y)) => Some(Type::list(x.join(y))),
        _ => None,
    }
}

fn subtract_type(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        (Type::Dyn, _) | (_, Type::Dyn) => Some(if a.is_dyn() { b.clone() } else { a.clone() }),
        (Type::Int, Type::Int) => Some(Type::Int),
        (Type::Uint, Type::Uint) => Some(Type::Uint),
        (Type::Double, Type::Double) => Some(Type::Double),
        (Type::Timestamp, Type::Timestamp) => Some(Type::Duration),
        (Type::Timestamp, Type::Duration) => Some(Type::Timestamp),
        (Type::Duration, Type::Duration) => Some(Type::Duration),
        _ => None,
    }
}

fn numeric_type(a: &Type, b: &Type, allowed: &[Type]) -> Option<Type> {
    match (a, b) {
        (Type::Dyn, Type::Dyn) => Some(Type::Dyn),
        (Type::Dyn, other) | (other, Type::Dyn) if allowed.contains(other) => Some(other.clone()),
        (x, y) if x == y && allowed.contains(x) => Some(x.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cel::parser::parse;
    use crate::view;

    fn type_of(filter: &str, view: &View) -> FilterResult<Type> {
        let expr = parse(filter)?;
        let types = check(&expr, view)?;
        Ok(types[&expr.id].clone())
    }

    #[test]
    fn test_field_and_constant_types() {
        let results = view::results();
        assert_eq!(type_of("summary.status == SUCCESS", &results).unwrap(), Type::Bool);
        assert_eq!(type_of("summary.start_time", &results).unwrap(), Type::Timestamp);
        assert_eq!(type_of("annotations[\"repo\"]", &results).unwrap(), Type::String);
    }

    #[test]
    fn test_dyn_selection() {
        let records = view::records();
        assert_eq!(type_of("data.metadata.namespace", &records).unwrap(), Type::Dyn);
        assert_eq!(
            type_of("data.status.completionTime.getDayOfYear() > 15", &records).unwrap(),
            Type::Bool
        );
    }

    #[test]
    fn test_undeclared_reference() {
        let err = type_of("nope == 1", &view::records()).unwrap_err();
        assert!(err.message().contains("undeclared reference to 'nope'"));
    }

    #[test]
    fn test_undefined_message_field() {
        let err = type_of("summary.bogus == 1", &view::results()).unwrap_err();
        assert!(err.message().contains("undefined field 'bogus'"));
    }

    #[test]
    fn test_operator_mismatch() {
        let err = type_of("name == 1", &view::records()).unwrap_err();
        assert!(err.message().contains("no matching overload for '=='"));
        assert!(type_of("name + 1", &view::records()).is_err());
    }

    #[test]
    fn test_string_concatenation_type() {
        assert_eq!(type_of("name + \"-\" + parent", &view::records()).unwrap(), Type::String);
    }

    #[test]
    fn test_unknown_function() {
        let err = type_of("size(name) > 1", &view::records()).unwrap_err();
        assert!(err.message().contains("undeclared reference to function 'size'"));
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let err = type_of("name.matches(\"(unclosed\")", &view::records()).unwrap_err();
        assert!(err.message().contains("invalid regular expression"));
    }

    #[test]
    fn test_in_list() {
        assert_eq!(
            type_of("data_type in [PIPELINE_RUN, TASK_RUN]", &view::records()).unwrap(),
            Type::Bool
        );
        assert!(type_of("data_type in [1, 2]", &view::records()).is_err());
    }

    #[test]
    fn test_timestamp_comparison_with_dyn() {
        assert_eq!(
            type_of(
                "data.status.startTime > timestamp(\"2022-01-01T00:00:00Z\")",
                &view::records()
            )
            .unwrap(),
            Type::Bool
        );
    }
}
