//! Expression Sub-language Lexer
//!
//! Deliberately separate from [`crate::parser::lexer`]: here `/` lexes as
//! division and `.` is the field-access separator, the mirror image of the
//! path grammar's `/`-separated, dot-free identifiers. Keeping two small
//! lexers avoids an operator-precedence bug: merging the grammars would
//! make `/` ambiguous between path-separator and division.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Dot,
    Comma,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
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
            '.' => {
                self.bump();
                Token::Dot
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '+' => {
                self.bump();
                Token::Plus
            }
            '-' => {
                self.bump();
                Token::Minus
            }
            '*' => {
                self.bump();
                Token::Star
            }
            '/' => {
                self.bump();
                Token::Slash
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
            '&' if self.second_peek() == Some('&') => {
                self.bump();
                self.bump();
                Token::AndAnd
            }
            '|' if self.second_peek() == Some('|') => {
                self.bump();
                self.bump();
                Token::OrOr
            }
            '"' => self.lex_string(start)?,
            c if c.is_ascii_digit() => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => self.lex_ident(),
            other => {
                return Err(crate::error::ParseError::new(
                    start,
                    format!("unexpected character '{other}' in expression"),
                ))
            }
        };

        Ok(SpannedToken { token, pos: start })
    }

    fn second_peek(&self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn lex_ident(&mut self) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
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
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(crate::error::ParseError::new(start, "unterminated string literal"))
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
