//! Filter expression lexer

use super::ast::Position;
use super::errors::{FilterError, FilterResult};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    True,
    False,
    Null,
    In,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Question,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(v) => format!("integer {}", v),
            TokenKind::Uint(v) => format!("unsigned integer {}u", v),
            TokenKind::Double(v) => format!("number {}", v),
            TokenKind::String(s) => format!("string \"{}\"", s),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::In => "in",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Lte => "<=",
            TokenKind::Gt => ">",
            TokenKind::Gte => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Colon => ":",
            TokenKind::Question => "?",
            _ => "?",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

/// Lexer over a filter string
pub(crate) struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input, ending with `Eof`
    pub(crate) fn tokenize(mut self) -> FilterResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current_position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.pos = pos + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_second(&self) -> Option<char> {
        self.input[self.pos..].chars().nth(1)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> FilterResult<Token> {
        self.skip_whitespace_and_comments();
        let position = self.current_position();

        let ch = match self.peek() {
            Some(ch) => ch,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    position,
                })
            }
        };

        if ch == '"' || ch == '\'' {
            return self.read_string(ch, false);
        }
        if (ch == 'r' || ch == 'R') && matches!(self.peek_second(), Some('"') | Some('\'')) {
            self.advance();
            let quote = self.peek().unwrap_or('"');
            return self.read_string(quote, true);
        }
        if ch.is_ascii_digit() {
            return self.read_number();
        }
        if ch.is_alphabetic() || ch == '_' {
            return Ok(self.read_ident());
        }

        self.advance();
        let kind = match ch {
            '=' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::EqEq
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::NotEq
            }
            '!' => TokenKind::Bang,
            '<' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Lte
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.advance();
                TokenKind::Gte
            }
            '>' => TokenKind::Gt,
            '&' if self.peek() == Some('&') => {
                self.advance();
                TokenKind::AndAnd
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                TokenKind::OrOr
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            other => {
                return Err(FilterError::syntax(
                    format!("unexpected character '{}'", other),
                    position,
                ))
            }
        };

        Ok(Token { kind, position })
    }

    fn read_string(&mut self, quote: char, raw: bool) -> FilterResult<Token> {
        let start = self.current_position();
        self.advance();
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(FilterError::syntax("unterminated string literal", start));
                }
                Some(ch) if ch == quote => break,
                Some('\\') if !raw => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some(other) => {
                        return Err(FilterError::syntax(
                            format!("invalid escape sequence '\\{}'", other),
                            self.current_position(),
                        ))
                    }
                    None => {
                        return Err(FilterError::syntax("unterminated escape sequence", start));
                    }
                },
                Some(ch) => value.push(ch),
            }
        }

        Ok(Token {
            kind: TokenKind::String(value),
            position: start,
        })
    }

    fn read_number(&mut self) -> FilterResult<Token> {
        let position = self.current_position();
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_second(), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(ch) if ch.is_ascii_hexdigit()) {
                self.advance();
            }
            let digits = &self.input[digits_start..self.pos];
            let value = i64::from_str_radix(digits, 16).map_err(|_| {
                FilterError::syntax(format!("invalid hex literal '0x{}'", digits), position)
            })?;
            return Ok(Token {
                kind: TokenKind::Int(value),
                position,
            });
        }

        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }

        let mut is_double = false;
        if self.peek() == Some('.')
            && matches!(self.peek_second(), Some(ch) if ch.is_ascii_digit())
        {
            is_double = true;
            self.advance();
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_double = true;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[start..self.pos];
        let kind = if is_double {
            let value = text
                .parse::<f64>()
                .map_err(|_| FilterError::syntax(format!("invalid number '{}'", text), position))?;
            TokenKind::Double(value)
        } else if matches!(self.peek(), Some('u') | Some('U')) {
            self.advance();
            let value = text.parse::<u64>().map_err(|_| {
                FilterError::syntax(format!("unsigned integer '{}' out of range", text), position)
            })?;
            TokenKind::Uint(value)
        } else {
            let value = text.parse::<i64>().map_err(|_| {
                FilterError::syntax(format!("integer '{}' out of range", text), position)
            })?;
            TokenKind::Int(value)
        };

        Ok(Token { kind, position })
    }

    fn read_ident(&mut self) -> Token {
        let position = self.current_position();
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
            self.advance();
        }

        let kind = match &self.input[start..self.pos] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            ident => TokenKind::Ident(ident.to_string()),
        };

        Token { kind, position }
    }
}
