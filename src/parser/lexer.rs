//! JfrPath Lexer
//!
//! A hand-rolled, character-level lexer (`Peekable<Chars>` state machine),
//! favoring hand-written lexing/parsing over a parser-combinator crate.
//!
//! Identifiers may contain `.` (Java-qualified type names like
//! `jdk.FileRead` are a single token); `/` is a dedicated path-separator
//! token, never part of an identifier.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Slash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Pipe,
    Colon,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Tilde,
    AndAnd,
    OrOr,
    Bang,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: usize,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            pos: 0,
        }
    }

    pub fn tokenize(source: &'a str) -> Result<Vec<SpannedToken>, crate::error::ParseError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let spanned = lexer.next_token()?;
            let is_eof = spanned.token == Token::Eof;
            tokens.push(spanned);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<SpannedToken, crate::error::ParseError> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(c) = self.peek() else {
            return Ok(SpannedToken {
                token: Token::Eof,
                pos: start,
            });
        };

        let token = match c {
            '/' => {
                self.bump();
                Token::Slash
            }
            '[' => {
                self.bump();
                Token::LBracket
            }
            ']' => {
                self.bump();
                Token::RBracket
            }
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '|' => {
                self.bump();
                if self.peek() == Some('|') {
                    self.bump();
                    Token::OrOr
                } else {
                    Token::Pipe
                }
            }
            ':' => {
                self.bump();
                Token::Colon
            }
            '~' => {
                self.bump();
                Token::Tilde
            }
            '=' => {
                self.bump();
                Token::Eq
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '&' => {
                self.bump();
                if self.peek() == Some('&') {
                    self.bump();
                    Token::AndAnd
                } else {
                    return Err(crate::error::ParseError::new(
                        start,
                        "unexpected '&' (did you mean '&&'?)",
                    ));
                }
            }
            '"' => self.lex_string(start)?,
            c if c.is_ascii_digit() => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => self.lex_ident(),
            other => {
                return Err(crate::error::ParseError::new(
                    start,
                    format!("unexpected character '{other}'"),
                ))
            }
        };

        Ok(SpannedToken { token, pos: start })
    }

    fn lex_ident(&mut self) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Ident(s)
    }

    fn lex_number(&mut self) -> Token {
        let mut s = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.bump();
            } else if c == '.' && !is_float {
                // Only consume the dot as a decimal point if followed by a
                // digit; a bare trailing dot belongs to whatever comes next.
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.next().is_some_and(|d| d.is_ascii_digit()) {
                    is_float = true;
                    s.push(c);
                    self.bump();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
        if is_float {
            Token::Float(s.parse().unwrap_or(0.0))
        } else {
            Token::Int(s.parse().unwrap_or(0))
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, crate::error::ParseError> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(crate::error::ParseError::new(
                        start,
                        "unterminated string literal",
                    ))
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some('$') => s.push('$'),
                    Some(other) => s.push(other),
                    None => {
                        return Err(crate::error::ParseError::new(
                            start,
                            "unterminated escape sequence",
                        ))
                    }
                },
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }
}
