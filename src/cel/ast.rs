//! Filter expression AST
//!
//! The tree is closed over five node kinds. Operators are calls whose
//! function name is one of the constants in [`operators`].

use std::fmt;

use chrono::{DateTime, Utc};

/// Identifier of a node inside one parsed expression
pub type ExprId = u32;

/// Source position of a node (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    /// Whole seconds
    Duration(i64),
    Timestamp(DateTime<Utc>),
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub position: Position,
    /// Height of the subtree rooted here, 1 for leaves
    pub height: usize,
    pub kind: ExprKind,
}

/// Node kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Select {
        operand: Box<Expr>,
        field: String,
    },
    Call {
        target: Option<Box<Expr>>,
        function: String,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
}

impl ExprKind {
    /// Height of a node of this kind over its children
    pub fn height(&self) -> usize {
        let child = match self {
            ExprKind::Literal(_) | ExprKind::Ident(_) => 0,
            ExprKind::Select { operand, .. } => operand.height,
            ExprKind::Call { target, args, .. } => target
                .iter()
                .map(|t| t.height)
                .chain(args.iter().map(|a| a.height))
                .max()
                .unwrap_or(0),
            ExprKind::List(elements) => elements.iter().map(|e| e.height).max().unwrap_or(0),
        };
        child + 1
    }
}

impl Expr {
    /// Returns the call parts if this node is a call to `function`
    pub fn as_call_to(&self, function: &str) -> Option<&[Expr]> {
        match &self.kind {
            ExprKind::Call {
                target: None,
                function: f,
                args,
            } if f == function => Some(args),
            _ => None,
        }
    }

    /// Returns the operand and key if this node is an index operation
    pub fn as_index(&self) -> Option<(&Expr, &Expr)> {
        match self.as_call_to(operators::INDEX) {
            Some([operand, key]) => Some((operand, key)),
            _ => None,
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// Function names used for operators
pub mod operators {
    pub const LOGICAL_AND: &str = "_&&_";
    pub const LOGICAL_OR: &str = "_||_";
    pub const LOGICAL_NOT: &str = "!_";
    pub const NEGATE: &str = "-_";
    pub const EQUALS: &str = "_==_";
    pub const NOT_EQUALS: &str = "_!=_";
    pub const LESS: &str = "_<_";
    pub const LESS_EQUALS: &str = "_<=_";
    pub const GREATER: &str = "_>_";
    pub const GREATER_EQUALS: &str = "_>=_";
    pub const ADD: &str = "_+_";
    pub const SUBTRACT: &str = "_-_";
    pub const MULTIPLY: &str = "_*_";
    pub const DIVIDE: &str = "_/_";
    pub const MODULO: &str = "_%_";
    pub const IN: &str = "@in";
    pub const INDEX: &str = "_[_]";
    pub const CONDITIONAL: &str = "_?_:_";

    /// Display form used in diagnostics
    pub fn display_name(function: &str) -> &str {
        match function {
            LOGICAL_AND => "&&",
            LOGICAL_OR => "||",
            LOGICAL_NOT => "!",
            NEGATE => "-",
            EQUALS => "==",
            NOT_EQUALS => "!=",
            LESS => "<",
            LESS_EQUALS => "<=",
            GREATER => ">",
            GREATER_EQUALS => ">=",
            ADD => "+",
            SUBTRACT => "-",
            MULTIPLY => "*",
            DIVIDE => "/",
            MODULO => "%",
            IN => "in",
            INDEX => "[]",
            CONDITIONAL => "?:",
            other => other,
        }
    }

    pub fn is_relation(function: &str) -> bool {
        matches!(
            function,
            EQUALS | NOT_EQUALS | LESS | LESS_EQUALS | GREATER | GREATER_EQUALS | IN
        )
    }
}
