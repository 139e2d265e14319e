//! # JfrPath Parser
//!
//! Lexes and parses a JfrPath query string into the [`jfrpath_ast::Query`]
//! AST: hierarchical navigation, predicate filtering with list-quantifier
//! semantics, and a pipeline of aggregation/projection stages.
//!
//! The expression sub-language (`select(expr as alias)` bodies, string
//! templates) is deliberately **not** parsed here — see [`crate::expr`] —
//! since merging the two grammars would conflate `/` as path-separator in
//! this grammar with `/` as division in that one.

pub(crate) mod lexer;

use crate::error::ParseError;
use jfrpath_ast::*;
use lexer::{Lexer, SpannedToken, Token};

/// Parse a full JfrPath query string into a [`Query`] AST.
pub fn parse_query(source: &str) -> Result<Query, ParseError> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser::new(source, &tokens);
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

/// Parse a standalone `PathRef`, used by the variable substitutor when
/// validating `${name.path.sub}` segments against path syntax reused from
/// the query grammar.
pub fn parse_path_ref(source: &str) -> Result<PathRef, ParseError> {
    let tokens = Lexer::tokenize(source)?;
    let mut parser = Parser::new(source, &tokens);
    let path = parser.parse_path_ref()?;
    parser.expect_eof()?;
    Ok(path)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [SpannedToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [SpannedToken]) -> Self {
        Parser { source, tokens, pos: 0 }
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_token(&self) -> &Token {
        &self.current().token
    }

    fn advance(&mut self) -> SpannedToken {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.current().pos, message)
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if *self.peek_token() == Token::Eof {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing input: {:?}", self.peek_token())))
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.err(format!(
                "expected {:?}, found {:?}",
                token,
                self.peek_token()
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.advance().token {
            Token::Ident(s) => Ok(s),
            other => Err(ParseError::new(
                self.current().pos,
                format!("expected identifier, found {other:?}"),
            )),
        }
    }

    // ------------------------------------------------------------------
    // query := root ('/' segment (predicate)*)* ('|' pipeOp)*
    // ------------------------------------------------------------------

    fn parse_query(&mut self) -> Result<Query, ParseError> {
        let root = self.parse_root()?;
        let mut query = Query::new(root);

        while self.eat(&Token::Slash) {
            query.path.push(self.parse_path_step()?);
        }

        while self.eat(&Token::Pipe) {
            query.pipeline.push(self.parse_pipe_op()?);
        }

        Ok(query)
    }

    fn parse_root(&mut self) -> Result<Root, ParseError> {
        let name = self.expect_ident()?;
        match name.as_str() {
            "events" => Ok(Root::Events),
            "metadata" => Ok(Root::Metadata),
            "cp" => Ok(Root::Cp),
            "chunks" => Ok(Root::Chunks),
            other => Err(self.err(format!(
                "unknown root '{other}' (expected events, metadata, cp, or chunks)"
            ))),
        }
    }

    fn parse_segment(&mut self) -> Result<Segment, ParseError> {
        match self.advance().token {
            Token::Ident(name) => Ok(Segment::Field(name)),
            Token::Int(i) => Ok(Segment::Index(i)),
            other => Err(ParseError::new(
                self.current().pos,
                format!("expected path segment, found {other:?}"),
            )),
        }
    }

    fn parse_path_step(&mut self) -> Result<PathStep, ParseError> {
        let segment = self.parse_segment()?;
        let mut step = PathStep {
            segment,
            predicates: Vec::new(),
        };
        while *self.peek_token() == Token::LBracket {
            step.predicates.push(self.parse_predicate()?);
        }
        Ok(step)
    }

    /// `path := segment ('/' segment)*`, each segment carrying its own
    /// bracket predicates. Shared between the top-level query path and any
    /// `PathRef` appearing inside a predicate body or pipeline argument.
    fn parse_path_ref(&mut self) -> Result<PathRef, ParseError> {
        let mut steps = vec![self.parse_path_step()?];
        while self.eat(&Token::Slash) {
            steps.push(self.parse_path_step()?);
        }
        Ok(PathRef::new(steps))
    }

    // ------------------------------------------------------------------
    // predicate := '[' (listMode ':')? boolExpr ']'
    // ------------------------------------------------------------------

    fn parse_predicate(&mut self) -> Result<Predicate, ParseError> {
        self.expect(&Token::LBracket)?;

        let mode = self.try_parse_list_mode()?;
        let expr = self.parse_or_expr()?;

        self.expect(&Token::RBracket)?;
        Ok(Predicate { mode, expr })
    }

    fn try_parse_list_mode(&mut self) -> Result<Option<ListMatchMode>, ParseError> {
        // `any:` / `all:` / `none:` only counts as a mode prefix when
        // followed by a colon; otherwise it's the start of a boolExpr
        // (e.g. a field literally named `any`).
        if let Token::Ident(name) = self.peek_token().clone() {
            let mode = match name.as_str() {
                "any" => Some(ListMatchMode::Any),
                "all" => Some(ListMatchMode::All),
                "none" => Some(ListMatchMode::None),
                _ => None,
            };
            if let Some(mode) = mode {
                let save = self.pos;
                self.advance();
                if self.eat(&Token::Colon) {
                    return Ok(Some(mode));
                }
                self.pos = save;
            }
        }
        Ok(None)
    }

    // orExpr := andExpr (('||' | 'or') andExpr)*
    fn parse_or_expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.parse_and_expr()?;
        loop {
            if self.eat(&Token::OrOr) || self.eat_keyword("or") {
                let rhs = self.parse_and_expr()?;
                lhs = BoolExpr::Or(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    // andExpr := notExpr (('&&' | 'and') notExpr)*
    fn parse_and_expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.parse_not_expr()?;
        loop {
            if self.eat(&Token::AndAnd) || self.eat_keyword("and") {
                let rhs = self.parse_not_expr()?;
                lhs = BoolExpr::And(Box::new(lhs), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    // notExpr := ('!' | 'not') notExpr | cmp
    fn parse_not_expr(&mut self) -> Result<BoolExpr, ParseError> {
        if self.eat(&Token::Bang) || self.eat_keyword("not") {
            return Ok(BoolExpr::Not(Box::new(self.parse_not_expr()?)));
        }
        self.parse_cmp()
    }

    /// `cmp := path op (literal | path) | fnCall`
    fn parse_cmp(&mut self) -> Result<BoolExpr, ParseError> {
        if self.peek_is_fn_call() {
            return Ok(BoolExpr::Call(self.parse_fn_call()?));
        }

        let path = self.parse_path_ref()?;
        if let Some(op) = self.try_parse_comparison_op() {
            let rhs = if self.peek_is_literal() {
                CompareRhs::Literal(self.parse_literal()?)
            } else {
                CompareRhs::Path(self.parse_path_ref()?)
            };
            Ok(BoolExpr::Compare { path, op, rhs })
        } else {
            Ok(BoolExpr::Path(path))
        }
    }

    fn peek_is_fn_call(&self) -> bool {
        matches!(self.peek_token(), Token::Ident(name) if BuiltinFn::from_name(name).is_some())
            && self.tokens.get(self.pos + 1).map(|t| &t.token) == Some(&Token::LParen)
    }

    fn parse_fn_call(&mut self) -> Result<FnCall, ParseError> {
        let name_str = self.expect_ident()?;
        let name = BuiltinFn::from_name(&name_str)
            .ok_or_else(|| self.err(format!("unknown predicate function '{name_str}'")))?;
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if *self.peek_token() != Token::RParen {
            loop {
                args.push(self.parse_fn_arg()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(FnCall { name, args })
    }

    fn parse_fn_arg(&mut self) -> Result<FnArg, ParseError> {
        if self.peek_is_literal() {
            Ok(FnArg::Literal(self.parse_literal()?))
        } else {
            Ok(FnArg::Path(self.parse_path_ref()?))
        }
    }

    fn peek_is_literal(&self) -> bool {
        matches!(
            self.peek_token(),
            Token::Int(_) | Token::Float(_) | Token::Str(_)
        ) || matches!(self.peek_token(), Token::Ident(name) if name == "true" || name == "false" || name == "null")
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        match self.advance().token {
            Token::Int(i) => Ok(Literal::Int(i)),
            Token::Float(f) => Ok(Literal::Float(f)),
            Token::Str(s) => Ok(Literal::Str(s)),
            Token::Ident(s) if s == "true" => Ok(Literal::Bool(true)),
            Token::Ident(s) if s == "false" => Ok(Literal::Bool(false)),
            Token::Ident(s) if s == "null" => Ok(Literal::Null),
            other => Err(ParseError::new(
                self.current().pos,
                format!("expected literal, found {other:?}"),
            )),
        }
    }

    fn try_parse_comparison_op(&mut self) -> Option<ComparisonOp> {
        let op = match self.peek_token() {
            Token::Eq => ComparisonOp::Eq,
            Token::Ne => ComparisonOp::Ne,
            Token::Gt => ComparisonOp::Gt,
            Token::Ge => ComparisonOp::Ge,
            Token::Lt => ComparisonOp::Lt,
            Token::Le => ComparisonOp::Le,
            Token::Tilde => ComparisonOp::Match,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek_token(), Token::Ident(s) if s == kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Pipeline operators
    // ------------------------------------------------------------------

    fn parse_pipe_op(&mut self) -> Result<PipelineOp, ParseError> {
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let op = match name.as_str() {
            "count" => PipelineOp::Count,
            "sum" => PipelineOp::Sum {
                path: self.parse_optional_path_arg()?,
            },
            "stats" => PipelineOp::Stats {
                path: self.parse_optional_path_arg()?,
            },
            "quantiles" => self.parse_quantiles_op()?,
            "sketch" => PipelineOp::Sketch {
                path: self.parse_optional_path_arg()?,
            },
            "groupBy" => self.parse_group_by_op()?,
            "top" => self.parse_top_op()?,
            "select" => self.parse_select_op()?,
            "toMap" => self.parse_to_map_op()?,
            other => {
                if let Some(kind) = TransformKind::from_name(other) {
                    self.parse_value_transform_op(kind)?
                } else {
                    return Err(self.err(format!("unknown pipeline operator '{other}'")));
                }
            }
        };
        self.expect(&Token::RParen)?;
        Ok(op)
    }

    fn parse_optional_path_arg(&mut self) -> Result<Option<PathRef>, ParseError> {
        if *self.peek_token() == Token::RParen {
            Ok(None)
        } else {
            Ok(Some(self.parse_path_ref()?))
        }
    }

    fn parse_quantiles_op(&mut self) -> Result<PipelineOp, ParseError> {
        let mut quantiles = Vec::new();
        let mut path = None;
        loop {
            if *self.peek_token() == Token::RParen {
                break;
            }
            if self.peek_named_arg("path") {
                self.expect_ident()?; // "path"
                self.expect(&Token::Eq)?;
                path = Some(self.parse_path_ref()?);
            } else {
                quantiles.push(self.parse_number_arg()?);
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if quantiles.is_empty() {
            return Err(self.err("quantiles() requires at least one quantile argument"));
        }
        Ok(PipelineOp::Quantiles { quantiles, path })
    }

    fn parse_number_arg(&mut self) -> Result<f64, ParseError> {
        match self.advance().token {
            Token::Int(i) => Ok(i as f64),
            Token::Float(f) => Ok(f),
            other => Err(ParseError::new(
                self.current().pos,
                format!("expected number, found {other:?}"),
            )),
        }
    }

    fn peek_named_arg(&self, name: &str) -> bool {
        matches!(self.peek_token(), Token::Ident(n) if n == name)
            && self.tokens.get(self.pos + 1).map(|t| &t.token) == Some(&Token::Eq)
    }

    fn parse_group_by_op(&mut self) -> Result<PipelineOp, ParseError> {
        let key = self.parse_path_ref()?;
        let mut agg = AggKind::Count;
        let mut value = None;
        let mut sort_by = SortBy::Key;
        let mut ascending = true;

        while self.eat(&Token::Comma) {
            let name = self.expect_ident()?;
            self.expect(&Token::Eq)?;
            match name.as_str() {
                "agg" => {
                    let v = self.expect_ident()?;
                    agg = AggKind::from_name(&v)
                        .ok_or_else(|| self.err(format!("unknown aggregate '{v}'")))?;
                }
                "value" => value = Some(self.parse_path_ref()?),
                "sortBy" => {
                    let v = self.expect_ident()?;
                    sort_by = match v.as_str() {
                        "key" => SortBy::Key,
                        "value" => SortBy::Value,
                        other => {
                            return Err(self.err(format!("unknown sortBy '{other}'")));
                        }
                    };
                }
                "asc" => ascending = self.parse_bool_arg()?,
                other => return Err(self.err(format!("unknown groupBy argument '{other}'"))),
            }
        }

        Ok(PipelineOp::GroupBy {
            key,
            agg,
            value,
            sort_by,
            ascending,
        })
    }

    fn parse_bool_arg(&mut self) -> Result<bool, ParseError> {
        let name = self.expect_ident()?;
        match name.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.err(format!("expected true/false, found '{other}'"))),
        }
    }

    fn parse_top_op(&mut self) -> Result<PipelineOp, ParseError> {
        let n = match self.advance().token {
            Token::Int(i) if i >= 0 => i as usize,
            other => {
                return Err(ParseError::new(
                    self.current().pos,
                    format!("expected non-negative integer for top(n), found {other:?}"),
                ))
            }
        };
        let mut by = None;
        let mut ascending = false;
        while self.eat(&Token::Comma) {
            let name = self.expect_ident()?;
            self.expect(&Token::Eq)?;
            match name.as_str() {
                "by" => by = Some(self.parse_path_ref()?),
                "asc" => ascending = self.parse_bool_arg()?,
                other => return Err(self.err(format!("unknown top() argument '{other}'"))),
            }
        }
        Ok(PipelineOp::TopN { n, by, ascending })
    }

    fn parse_select_op(&mut self) -> Result<PipelineOp, ParseError> {
        let mut items = Vec::new();
        if *self.peek_token() != Token::RParen {
            loop {
                items.push(self.parse_select_item()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        Ok(PipelineOp::Select { items })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, ParseError> {
        // Find the source span of one select argument (up to the next
        // top-level comma or closing paren) and hand the *raw text* to the
        // expression parser, which lexes and parses it with its own
        // grammar entirely — `/` must mean division there and path-separator
        // here, so the two must never share a parser.
        let start_pos = self.current().pos;
        let start_tok = self.pos;
        let mut depth = 0i32;
        loop {
            match self.peek_token() {
                Token::LParen => {
                    depth += 1;
                    self.advance();
                }
                Token::RParen if depth > 0 => {
                    depth -= 1;
                    self.advance();
                }
                Token::RParen | Token::Comma if depth == 0 => break,
                Token::Eof => return Err(self.err("unexpected end of input in select()")),
                _ => {
                    self.advance();
                }
            }
        }
        if self.pos == start_tok {
            return Err(self.err("expected an expression in select()"));
        }
        let end_pos = self.current().pos;
        let raw = self.source[start_pos..end_pos].trim_end();
        let (expr_src, alias) = split_trailing_as_alias(raw)?;
        let expr = crate::expr::parse(expr_src).map_err(|e| {
            ParseError::new(start_pos + e.position, format!("in select(): {}", e.message))
        })?;
        Ok(SelectItem { expr, alias })
    }

    fn parse_to_map_op(&mut self) -> Result<PipelineOp, ParseError> {
        let key_field = self.expect_ident()?;
        self.expect(&Token::Comma)?;
        let value_field = self.expect_ident()?;
        Ok(PipelineOp::ToMap {
            key_field,
            value_field,
        })
    }

    fn parse_value_transform_op(&mut self, kind: TransformKind) -> Result<PipelineOp, ParseError> {
        let path = if *self.peek_token() == Token::RParen || self.peek_is_literal() {
            None
        } else {
            Some(self.parse_path_ref()?)
        };
        let mut args = Vec::new();
        while self.eat(&Token::Comma) {
            args.push(self.parse_literal()?);
        }
        Ok(PipelineOp::ValueTransform { kind, path, args })
    }
}

/// Splits a raw select-argument source string on a trailing ` as alias`,
/// since the expression grammar has no `as` keyword of its own. Scans
/// for the last top-level (paren-depth 0, outside string literals) ` as `
/// so nested calls and string contents can't confuse the split.
fn split_trailing_as_alias(raw: &str) -> Result<(&str, Option<String>), ParseError> {
    let bytes = raw.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut as_byte_pos = None;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'(' if !in_string => depth += 1,
            b')' if !in_string => depth -= 1,
            b'a' if !in_string && depth == 0 && raw[i..].starts_with("as") => {
                let before_ok = i == 0 || bytes[i - 1].is_ascii_whitespace();
                let after = i + 2;
                let after_ok = after == bytes.len() || bytes[after].is_ascii_whitespace();
                if before_ok && after_ok {
                    as_byte_pos = Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    if let Some(pos) = as_byte_pos {
        let expr_part = raw[..pos].trim_end();
        let alias_part = raw[pos + 2..].trim();
        if alias_part.is_empty() || !alias_part.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ParseError::new(pos, "expected a single identifier after 'as'"));
        }
        Ok((expr_part, Some(alias_part.to_string())))
    } else {
        Ok((raw, None))
    }
}
