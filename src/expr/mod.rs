//! # Expression Sub-language
//!
//! A small, standalone recursive-descent parser and tree-walking
//! interpreter used by `select(expr as alias)`, string templates
//! (`"text ${expr} text"`), and condition expressions. Kept separate from
//! the path grammar on purpose: here `/` is division and `.` is field
//! access, the opposite of the path grammar, so merging the two parsers
//! would make `/` ambiguous.

mod lexer;

use crate::error::ExprError;
use crate::value::{numeric_partial_cmp, Row, Value};
use jfrpath_ast::*;
use lexer::{Lexer, SpannedToken, Token};

/// Parse a standalone expression-language source string into an [`Expr`].
pub fn parse(source: &str) -> Result<Expr, crate::error::ParseError> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [SpannedToken]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> crate::error::ParseError {
        crate::error::ParseError::new(self.current().pos, message)
    }

    fn expect_eof(&self) -> Result<(), crate::error::ParseError> {
        if *self.peek() == Token::Eof {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing input: {:?}", self.peek())))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Token::Ident(s) if s == kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), crate::error::ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", token, self.peek())))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, crate::error::ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, crate::error::ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) || self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, crate::error::ParseError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::AndAnd) || self.eat_keyword("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, crate::error::ParseError> {
        if self.eat(&Token::Bang) || self.eat_keyword("not") {
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(self.parse_not()?),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, crate::error::ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::Eq => BinOp::Eq,
            Token::Ne => BinOp::Ne,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, crate::error::ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, crate::error::ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, crate::error::ParseError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(self.parse_unary()?),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, crate::error::ParseError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Token::Int(i) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(i)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(parse_string_literal(&s)?)
            }
            Token::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(Expr::Literal(Literal::Bool(true))),
                    "false" => Ok(Expr::Literal(Literal::Bool(false))),
                    "null" => Ok(Expr::Literal(Literal::Null)),
                    _ if *self.peek() == Token::LParen => self.parse_call(name),
                    _ => self.parse_path(name),
                }
            }
            other => Err(self.err(format!("unexpected token in expression: {other:?}"))),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, crate::error::ParseError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Expr::Call { name, args })
    }

    fn parse_path(&mut self, first: String) -> Result<Expr, crate::error::ParseError> {
        let mut steps = vec![PathStep::field(first)];
        while self.eat(&Token::Dot) {
            match self.advance().token {
                Token::Ident(name) => steps.push(PathStep::field(name)),
                other => {
                    return Err(crate::error::ParseError::new(
                        self.current().pos,
                        format!("expected field name after '.', found {other:?}"),
                    ))
                }
            }
        }
        Ok(Expr::Path(PathRef::new(steps)))
    }
}

/// Builds an `Expr::Literal` or `Expr::Template` from a string literal's
/// already-unescaped contents, splitting on `${...}` spans and recursively
/// parsing each one as its own expression.
fn parse_string_literal(s: &str) -> Result<Expr, crate::error::ParseError> {
    if !s.contains("${") {
        return Ok(Expr::Literal(Literal::Str(s.to_string())));
    }

    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            parts.push(TemplatePart::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| crate::error::ParseError::new(0, "unterminated '${' in template"))?;
        let inner = &after[..end];
        let inner_expr = parse(inner)?;
        parts.push(TemplatePart::Expr(Box::new(inner_expr)));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Text(rest.to_string()));
    }
    Ok(Expr::Template(parts))
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluates an [`Expr`] against a row context, as used by `select()`.
pub fn eval(expr: &Expr, row: &Row) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(lit) => Ok(literal_to_value(lit)),
        Expr::Path(path) => Ok(resolve_path(path, row)),
        Expr::Unary { op, expr } => eval_unary(*op, expr, row),
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, row),
        Expr::Call { name, args } => eval_call(name, args, row),
        Expr::Template(parts) => eval_template(parts, row),
    }
}

/// Evaluates an [`Expr`] as a condition (`if`/`elif` bodies). A type error
/// here surfaces as `false` rather than propagating.
pub fn eval_condition(expr: &Expr, row: &Row) -> bool {
    eval(expr, row).map(|v| truthy(&v)).unwrap_or(false)
}

pub(crate) fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Null => Value::Null,
    }
}

fn resolve_path(path: &PathRef, row: &Row) -> Value {
    let mut current = Value::Row(row.clone());
    for step in &path.steps {
        let Segment::Field(name) = &step.segment else {
            return Value::Null;
        };
        current = match &current {
            Value::Row(r) => r.get(name).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    current
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::Row(r) => !r.is_empty(),
        Value::List(items) => !items.is_empty(),
    }
}

fn eval_unary(op: UnaryOp, expr: &Expr, row: &Row) -> Result<Value, ExprError> {
    let v = eval(expr, row)?;
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
        UnaryOp::Neg => match v {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(ExprError::TypeMismatch(format!(
                "cannot negate a {}",
                other.type_name()
            ))),
        },
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, row: &Row) -> Result<Value, ExprError> {
    match op {
        BinOp::And => {
            let l = eval(lhs, row)?;
            if !truthy(&l) {
                return Ok(Value::Bool(false));
            }
            let r = eval(rhs, row)?;
            Ok(Value::Bool(truthy(&r)))
        }
        BinOp::Or => {
            let l = eval(lhs, row)?;
            if truthy(&l) {
                return Ok(Value::Bool(true));
            }
            let r = eval(rhs, row)?;
            Ok(Value::Bool(truthy(&r)))
        }
        _ => {
            let l = eval(lhs, row)?;
            let r = eval(rhs, row)?;
            eval_binary_values(op, &l, &r)
        }
    }
}

fn eval_binary_values(op: BinOp, l: &Value, r: &Value) -> Result<Value, ExprError> {
    match op {
        BinOp::Add => {
            if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
                Ok(numeric_result(l, r, a + b))
            } else if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                Ok(Value::Str(format!("{}{}", l.display_string(), r.display_string())))
            } else {
                Err(ExprError::TypeMismatch(format!(
                    "cannot add {} and {}",
                    l.type_name(),
                    r.type_name()
                )))
            }
        }
        BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let (a, b) = numeric_operands(op, l, r)?;
            match op {
                BinOp::Sub => Ok(numeric_result(l, r, a - b)),
                BinOp::Mul => Ok(numeric_result(l, r, a * b)),
                BinOp::Div => {
                    if b == 0.0 {
                        Err(ExprError::DivZero)
                    } else {
                        Ok(numeric_result(l, r, a / b))
                    }
                }
                _ => unreachable!(),
            }
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(l, r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(l, r))),
        BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => {
            let ord = numeric_partial_cmp(l, r).ok_or_else(|| {
                ExprError::TypeMismatch(format!(
                    "cannot compare {} and {}",
                    l.type_name(),
                    r.type_name()
                ))
            })?;
            let result = match op {
                BinOp::Gt => ord.is_gt(),
                BinOp::Ge => ord.is_ge(),
                BinOp::Lt => ord.is_lt(),
                BinOp::Le => ord.is_le(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
        BinOp::And | BinOp::Or => unreachable!("handled by eval_binary's short-circuit path"),
    }
}

fn numeric_operands(op: BinOp, l: &Value, r: &Value) -> Result<(f64, f64), ExprError> {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ExprError::TypeMismatch(format!(
            "cannot apply {op:?} to {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// Preserves `Int` when both operands were integers, otherwise produces a
/// `Float`, matching ordinary arithmetic widening.
fn numeric_result(l: &Value, r: &Value, result: f64) -> Value {
    if matches!(l, Value::Int(_)) && matches!(r, Value::Int(_)) {
        Value::Int(result as i64)
    } else {
        Value::Float(result)
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
        a == b
    } else {
        l == r
    }
}

fn eval_call(name: &str, args: &[Expr], row: &Row) -> Result<Value, ExprError> {
    match name {
        "if" => {
            if args.len() != 3 {
                return Err(ExprError::TypeMismatch(
                    "if() requires exactly 3 arguments".to_string(),
                ));
            }
            let cond = eval(&args[0], row)?;
            if truthy(&cond) {
                eval(&args[1], row)
            } else {
                eval(&args[2], row)
            }
        }
        "upper" => {
            let s = eval_string_arg(args, 0, row, "upper")?;
            Ok(Value::Str(s.to_uppercase()))
        }
        "lower" => {
            let s = eval_string_arg(args, 0, row, "lower")?;
            Ok(Value::Str(s.to_lowercase()))
        }
        "substring" => {
            let s = eval_string_arg(args, 0, row, "substring")?;
            let start = eval_int_arg(args, 1, row, "substring")? as usize;
            let end = if args.len() > 2 {
                eval_int_arg(args, 2, row, "substring")? as usize
            } else {
                s.chars().count()
            };
            let chars: Vec<char> = s.chars().collect();
            let start = start.min(chars.len());
            let end = end.min(chars.len()).max(start);
            Ok(Value::Str(chars[start..end].iter().collect()))
        }
        "length" => {
            let v = eval(args.first().ok_or_else(|| {
                ExprError::TypeMismatch("length() requires 1 argument".to_string())
            })?, row)?;
            let len = match &v {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Row(r) => r.len(),
                Value::Null => 0,
                other => {
                    return Err(ExprError::TypeMismatch(format!(
                        "length() not supported for {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Int(len as i64))
        }
        "coalesce" => {
            for a in args {
                let v = eval(a, row)?;
                if !v.is_null() {
                    return Ok(v);
                }
            }
            Ok(Value::Null)
        }
        other => Err(ExprError::UnknownFn(other.to_string())),
    }
}

fn eval_string_arg(args: &[Expr], idx: usize, row: &Row, fn_name: &str) -> Result<String, ExprError> {
    let v = eval(
        args.get(idx)
            .ok_or_else(|| ExprError::TypeMismatch(format!("{fn_name}() missing argument {idx}")))?,
        row,
    )?;
    match v {
        Value::Str(s) => Ok(s),
        other => Err(ExprError::TypeMismatch(format!(
            "{fn_name}() expected a string, found {}",
            other.type_name()
        ))),
    }
}

fn eval_int_arg(args: &[Expr], idx: usize, row: &Row, fn_name: &str) -> Result<i64, ExprError> {
    let v = eval(
        args.get(idx)
            .ok_or_else(|| ExprError::TypeMismatch(format!("{fn_name}() missing argument {idx}")))?,
        row,
    )?;
    match v {
        Value::Int(i) => Ok(i),
        Value::Float(f) => Ok(f as i64),
        other => Err(ExprError::TypeMismatch(format!(
            "{fn_name}() expected a number, found {}",
            other.type_name()
        ))),
    }
}

fn eval_template(parts: &[TemplatePart], row: &Row) -> Result<Value, ExprError> {
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Text(t) => out.push_str(t),
            TemplatePart::Expr(e) => {
                let v = eval(e, row)?;
                out.push_str(&v.display_string());
            }
        }
    }
    Ok(Value::Str(out))
}
