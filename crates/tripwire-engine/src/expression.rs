//! Arithmetic and interpolation expressions inside field values
//!
//! The grammar is deliberately small:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | '{{' path '}}' | '(' expr ')'
//! ```
//!
//! A `{{path}}` token resolves through [`Variables::resolve`]. An expression
//! that is nothing but a single `{{path}}` token is a pure interpolation: the
//! resolved value passes through without numeric coercion, so booleans and
//! text survive. Numbers are `f64` throughout. Trees deeper than 256 levels
//! are rejected at parse time.

use crate::error::ExpressionError;
use crate::value::{Value, ValueKind, Variables};

/// Deepest syntax tree the parser builds; evaluation recurses over it
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Variable(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Evaluate `expression` against `variables`, coercing the result to `expected`
pub fn evaluate(
    expected: ValueKind,
    expression: &str,
    variables: &Variables,
) -> Result<Value, ExpressionError> {
    let tokens = tokenize(expression)?;

    // Pure interpolation: pass through whatever the variable holds.
    if let [(Token::Variable(path), _)] = tokens.as_slice() {
        let value = variables
            .resolve(path)
            .ok_or_else(|| ExpressionError::Unresolved(path.clone()))?;
        return coerce(expected, value);
    }

    let mut parser = Parser {
        source: expression,
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    if let Some((token, at)) = tokens.get(parser.pos) {
        return Err(parse_error(expression, *at, format!("unexpected {:?}", token)));
    }

    let number = eval(&expr, variables)?;
    coerce(expected, Value::Number(number))
}

/// Convenience wrapper for numeric results
pub fn evaluate_number(expression: &str, variables: &Variables) -> Result<f64, ExpressionError> {
    match evaluate(ValueKind::Number, expression, variables)? {
        Value::Number(n) => Ok(n),
        other => Err(ExpressionError::Type {
            expected: ValueKind::Number.to_string(),
            found: other.to_string(),
        }),
    }
}

fn coerce(expected: ValueKind, value: Value) -> Result<Value, ExpressionError> {
    let type_error = |value: &Value| ExpressionError::Type {
        expected: expected.to_string(),
        found: value.to_string(),
    };

    match expected {
        ValueKind::Any => Ok(value),
        ValueKind::Number => value
            .as_number()
            .map(Value::Number)
            .ok_or_else(|| type_error(&value)),
        ValueKind::Bool => value.as_bool().map(Value::Bool).ok_or_else(|| type_error(&value)),
        ValueKind::Text => Ok(Value::Text(value.to_string())),
    }
}

fn parse_error(expression: &str, position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Parse {
        expression: expression.to_string(),
        position,
        message: message.into(),
    }
}

fn tokenize(expression: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
            }
            b'+' => {
                tokens.push((Token::Plus, i));
                i += 1;
            }
            b'-' => {
                tokens.push((Token::Minus, i));
                i += 1;
            }
            b'*' => {
                tokens.push((Token::Star, i));
                i += 1;
            }
            b'/' => {
                tokens.push((Token::Slash, i));
                i += 1;
            }
            b'(' => {
                tokens.push((Token::LParen, i));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, i));
                i += 1;
            }
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                let start = i + 2;
                let end = expression[start..]
                    .find("}}")
                    .map(|offset| start + offset)
                    .ok_or_else(|| parse_error(expression, i, "unterminated '{{'"))?;
                let path = expression[start..end].trim();
                if path.is_empty() || path.contains('{') {
                    return Err(parse_error(expression, i, "empty or nested variable"));
                }
                tokens.push((Token::Variable(path.to_string()), i));
                i = end + 2;
            }
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let text = &expression[start..i];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| parse_error(expression, start, format!("bad number '{}'", text)))?;
                tokens.push((Token::Number(number), start));
            }
            _ => {
                let ch = expression[i..].chars().next().unwrap_or('?');
                return Err(parse_error(expression, i, format!("unexpected character '{}'", ch)));
            }
        }
    }

    if tokens.is_empty() {
        return Err(parse_error(expression, 0, "empty expression"));
    }
    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [(Token, usize)],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, at)| *at)
            .unwrap_or(self.source.len())
    }

    /// Enter one more level of the tree being built
    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(parse_error(
                self.source,
                self.position(),
                format!("expression nested deeper than {}", MAX_DEPTH),
            ));
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_term()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            levels += 1;
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth -= levels;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            levels += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth -= levels;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        let at = self.position();
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| parse_error(self.source, at, "unexpected end of expression"))?;
        self.pos += 1;

        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Variable(path) => Ok(Expr::Variable(path)),
            Token::LParen => {
                self.descend()?;
                let inner = self.parse_expr()?;
                self.depth -= 1;
                if self.peek() != Some(&Token::RParen) {
                    return Err(parse_error(self.source, self.position(), "expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            other => Err(parse_error(self.source, at, format!("unexpected {:?}", other))),
        }
    }
}

fn eval(expr: &Expr, variables: &Variables) -> Result<f64, ExpressionError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Variable(path) => {
            let value = variables.resolve(path).ok_or_else(|| {
                ExpressionError::Arithmetic(format!("operand '{}' is absent", path))
            })?;
            value.as_number().ok_or_else(|| ExpressionError::Type {
                expected: ValueKind::Number.to_string(),
                found: value.to_string(),
            })
        }
        Expr::Negate(inner) => Ok(-eval(inner, variables)?),
        Expr::Binary(op, left, right) => {
            let l = eval(left, variables)?;
            let r = eval(right, variables)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Subtract => Ok(l - r),
                BinaryOp::Multiply => Ok(l * r),
                BinaryOp::Divide if r == 0.0 => {
                    Err(ExpressionError::Arithmetic("division by zero".to_string()))
                }
                BinaryOp::Divide => Ok(l / r),
            }
        }
    }
}
