//! Recursive descent parser for filter expressions.
//!
//! Grammar (lowest precedence first):
//!   expr         = conditional ;
//!   conditional  = or [ "?" conditional ":" conditional ] ;
//!   or           = and { "||" and } ;
//!   and          = relation { "&&" relation } ;
//!   relation     = addition { ( "==" | "!=" | "<" | "<=" | ">" | ">=" | "in" ) addition } ;
//!   addition     = multiply { ( "+" | "-" ) multiply } ;
//!   multiply     = unary { ( "*" | "/" | "%" ) unary } ;
//!   unary        = { "!" | "-" } member ;
//!   member       = primary { "." IDENT [ "(" args ")" ] | "[" expr "]" } ;
//!   primary      = IDENT [ "(" args ")" ] | "(" expr ")" | "[" args "]" | literal ;

use chrono::{DateTime, Utc};

use super::ast::{operators, Expr, ExprId, ExprKind, Literal, Position};
use super::errors::{FilterError, FilterResult};
use super::lexer::{Lexer, Token, TokenKind};

/// Maximum parenthesis and bracket nesting accepted by the parser
const MAX_DEPTH: usize = 64;

/// Maximum height of the expression tree. The checker and the SQL emitter
/// walk the tree recursively, so this bounds their stack use.
pub const MAX_HEIGHT: usize = 200;

/// Parse a filter string into an expression tree
pub fn parse(input: &str) -> FilterResult<Expr> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        index: 0,
        next_id: 1,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(FilterError::syntax(
            format!("unexpected {}", trailing.kind.describe()),
            trailing.position,
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    next_id: ExprId,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind) -> FilterResult<Token> {
        if self.check(&kind) {
            return Ok(self.advance());
        }
        let found = self.peek();
        Err(FilterError::syntax(
            format!("expected {}, found {}", kind.describe(), found.kind.describe()),
            found.position,
        ))
    }

    fn node(&mut self, position: Position, kind: ExprKind) -> FilterResult<Expr> {
        let height = kind.height();
        if height > MAX_HEIGHT {
            return Err(FilterError::syntax(
                format!("expression exceeds the maximum depth of {}", MAX_HEIGHT),
                position,
            ));
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(Expr {
            id,
            position,
            height,
            kind,
        })
    }

    fn call(&mut self, position: Position, function: &str, args: Vec<Expr>) -> FilterResult<Expr> {
        self.node(
            position,
            ExprKind::Call {
                target: None,
                function: function.to_string(),
                args,
            },
        )
    }

    fn parse_expr(&mut self) -> FilterResult<Expr> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FilterError::syntax(
                "expression nested too deeply",
                self.peek().position,
            ));
        }
        let result = self.parse_conditional();
        self.depth -= 1;
        result
    }

    fn parse_conditional(&mut self) -> FilterResult<Expr> {
        let condition = self.parse_or()?;
        if !self.check(&TokenKind::Question) {
            return Ok(condition);
        }
        let position = self.advance().position;
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_expr()?;
        self.call(position, operators::CONDITIONAL, vec![condition, then, otherwise])
    }

    fn parse_or(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let position = self.advance().position;
            let right = self.parse_and()?;
            left = self.call(position, operators::LOGICAL_OR, vec![left, right])?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_relation()?;
        while self.check(&TokenKind::AndAnd) {
            let position = self.advance().position;
            let right = self.parse_relation()?;
            left = self.call(position, operators::LOGICAL_AND, vec![left, right])?;
        }
        Ok(left)
    }

    fn parse_relation(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_addition()?;
        loop {
            let function = match self.peek().kind {
                TokenKind::EqEq => operators::EQUALS,
                TokenKind::NotEq => operators::NOT_EQUALS,
                TokenKind::Lt => operators::LESS,
                TokenKind::Lte => operators::LESS_EQUALS,
                TokenKind::Gt => operators::GREATER,
                TokenKind::Gte => operators::GREATER_EQUALS,
                TokenKind::In => operators::IN,
                _ => return Ok(left),
            };
            let position = self.advance().position;
            let right = self.parse_addition()?;
            left = self.call(position, function, vec![left, right])?;
        }
    }

    fn parse_addition(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_multiply()?;
        loop {
            let function = match self.peek().kind {
                TokenKind::Plus => operators::ADD,
                TokenKind::Minus => operators::SUBTRACT,
                _ => return Ok(left),
            };
            let position = self.advance().position;
            let right = self.parse_multiply()?;
            left = self.call(position, function, vec![left, right])?;
        }
    }

    fn parse_multiply(&mut self) -> FilterResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let function = match self.peek().kind {
                TokenKind::Star => operators::MULTIPLY,
                TokenKind::Slash => operators::DIVIDE,
                TokenKind::Percent => operators::MODULO,
                _ => return Ok(left),
            };
            let position = self.advance().position;
            let right = self.parse_unary()?;
            left = self.call(position, function, vec![left, right])?;
        }
    }

    fn parse_unary(&mut self) -> FilterResult<Expr> {
        let mut prefixes = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Bang | TokenKind::Minus => {
                    let token = self.advance();
                    prefixes.push((token.kind, token.position));
                    if prefixes.len() > MAX_HEIGHT {
                        return Err(FilterError::syntax(
                            format!("expression exceeds the maximum depth of {}", MAX_HEIGHT),
                            token.position,
                        ));
                    }
                }
                _ => break,
            }
        }

        let mut expr = self.parse_member()?;
        for (kind, position) in prefixes.into_iter().rev() {
            expr = if kind == TokenKind::Bang {
                self.call(position, operators::LOGICAL_NOT, vec![expr])?
            } else {
                // fold negative numeric literals
                let folded = match &expr.kind {
                    ExprKind::Literal(Literal::Int(v)) => Some(Literal::Int(-v)),
                    ExprKind::Literal(Literal::Double(v)) => Some(Literal::Double(-v)),
                    _ => None,
                };
                match folded {
                    Some(literal) => self.node(position, ExprKind::Literal(literal))?,
                    None => self.call(position, operators::NEGATE, vec![expr])?,
                }
            };
        }
        Ok(expr)
    }

    fn parse_member(&mut self) -> FilterResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    let position = self.advance().position;
                    let name = self.expect_ident()?;
                    if self.check(&TokenKind::LParen) {
                        self.advance();
                        let args = self.parse_args(TokenKind::RParen)?;
                        expr = self.node(
                            position,
                            ExprKind::Call {
                                target: Some(Box::new(expr)),
                                function: name,
                                args,
                            },
                        )?;
                    } else {
                        expr = self.node(
                            position,
                            ExprKind::Select {
                                operand: Box::new(expr),
                                field: name,
                            },
                        )?;
                    }
                }
                TokenKind::LBracket => {
                    let position = self.advance().position;
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = self.call(position, operators::INDEX, vec![expr, key])?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> FilterResult<Expr> {
        let token = self.advance();
        let position = token.position;
        let literal = match token.kind {
            TokenKind::Int(v) => Literal::Int(v),
            TokenKind::Uint(v) => Literal::Uint(v),
            TokenKind::Double(v) => Literal::Double(v),
            TokenKind::String(s) => Literal::String(s),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),
            TokenKind::Null => Literal::Null,
            TokenKind::Ident(name) => {
                if !self.check(&TokenKind::LParen) {
                    return self.node(position, ExprKind::Ident(name));
                }
                self.advance();
                let args = self.parse_args(TokenKind::RParen)?;
                return self.global_call(position, name, args);
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                let elements = self.parse_args(TokenKind::RBracket)?;
                return self.node(position, ExprKind::List(elements));
            }
            TokenKind::LBrace => {
                return Err(FilterError::unsupported("map literals are not supported", position));
            }
            other => {
                return Err(FilterError::syntax(
                    format!("unexpected {}", other.describe()),
                    position,
                ))
            }
        };
        self.node(position, ExprKind::Literal(literal))
    }

    /// Global call; `duration("<literal>")` and `timestamp("<literal>")`
    /// fold into literals
    fn global_call(
        &mut self,
        position: Position,
        function: String,
        args: Vec<Expr>,
    ) -> FilterResult<Expr> {
        let text = match args.as_slice() {
            [arg] => arg.as_string_literal().map(|text| (text, arg.position)),
            _ => None,
        };
        if let Some((text, arg_position)) = text {
            let literal = match function.as_str() {
                "duration" => {
                    let seconds = parse_duration(text).ok_or_else(|| {
                        FilterError::syntax(format!("invalid duration \"{}\"", text), arg_position)
                    })?;
                    Some(Literal::Duration(seconds))
                }
                "timestamp" => {
                    let value = DateTime::parse_from_rfc3339(text).map_err(|e| {
                        FilterError::syntax(
                            format!("invalid timestamp \"{}\": {}", text, e),
                            arg_position,
                        )
                    })?;
                    Some(Literal::Timestamp(value.with_timezone(&Utc)))
                }
                _ => None,
            };
            if let Some(literal) = literal {
                return self.node(position, ExprKind::Literal(literal));
            }
        }
        self.node(
            position,
            ExprKind::Call {
                target: None,
                function,
                args,
            },
        )
    }

    fn parse_args(&mut self, close: TokenKind) -> FilterResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(&close) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                // trailing comma
                if self.check(&close) {
                    self.advance();
                    return Ok(args);
                }
                continue;
            }
            self.expect(close)?;
            return Ok(args);
        }
    }

    fn expect_ident(&mut self) -> FilterResult<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            other => Err(FilterError::syntax(
                format!("expected identifier, found {}", other.describe()),
                token.position,
            )),
        }
    }
}

/// Parse a duration string such as `"1h30m"` or `"90s"` into whole seconds
pub(crate) fn parse_duration(text: &str) -> Option<i64> {
    let (negative, mut rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(0);
    }

    let mut nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "h" => 3_600e9,
            "m" => 60e9,
            "s" => 1e9,
            "ms" => 1e6,
            "us" => 1e3,
            "ns" => 1.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        nanos += value * scale;
    }

    let seconds = (nanos / 1e9).trunc() as i64;
    Some(if negative { -seconds } else { seconds })
}
