//! Hand-written lexical scanner.
//!
//! The scanner is an external collaborator to the core (type resolver,
//! emitter, VM) per the specification: its job is only to turn source text
//! into a token stream. Grounded in the same ad hoc, regex-assisted,
//! one-pass style the teacher uses for its own bytecode text format in
//! `vm.rs::decode_word` (a `lazy_static` regex for escaped string bodies,
//! a keyword/operator lookup table, one character of lookahead).

use lazy_static::lazy_static;
use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::token::{Token, TokenKind, KEYWORDS};

lazy_static! {
    static ref ESCAPE: Regex = Regex::new(r#"\\[bnrt'\\"]"#).unwrap();
}

pub struct Scanner<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
    line: u32,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner { source: source.as_bytes(), start: 0, current: 0, line: 1 }
    }

    pub fn scan(mut self, diagnostics: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia(diagnostics);
            self.start = self.current;
            if self.is_at_end() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line));
                break;
            }
            match self.scan_one(diagnostics) {
                Some(token) => tokens.push(token),
                None => continue,
            }
        }
        tokens
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> u8 {
        *self.source.get(self.current).unwrap_or(&0)
    }

    fn peek_next(&self) -> u8 {
        *self.source.get(self.current + 1).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        if c == b'\n' {
            self.line += 1;
        }
        c
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> &str {
        std::str::from_utf8(&self.source[self.start..self.current]).unwrap_or("")
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.lexeme(), self.line)
    }

    fn skip_trivia(&mut self, diagnostics: &mut Diagnostics) {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_next() == b'/' => {
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek_next() == b'*' => {
                    self.advance();
                    self.advance();
                    let mut depth = 1usize;
                    while depth > 0 {
                        if self.is_at_end() {
                            diagnostics.parse_error("unterminated block comment", self.line);
                            return;
                        }
                        if self.peek() == b'/' && self.peek_next() == b'*' {
                            self.advance();
                            self.advance();
                            depth += 1;
                        } else if self.peek() == b'*' && self.peek_next() == b'/' {
                            self.advance();
                            self.advance();
                            depth -= 1;
                        } else {
                            self.advance();
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn scan_one(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let c = self.advance();
        use TokenKind::*;
        let kind = match c {
            b'(' => LeftParen,
            b')' => RightParen,
            b'{' => LeftBrace,
            b'}' => RightBrace,
            b'[' => LeftBracket,
            b']' => RightBracket,
            b',' => Comma,
            b';' => Semicolon,
            b'~' => Tilde,
            b'?' => Question,
            b':' => if self.matches(b':') { ColonColon } else { Colon },
            b'.' => {
                if self.matches(b'.') {
                    if self.matches(b'=') { DotDotEq } else { DotDot }
                } else {
                    Dot
                }
            }
            b'+' => {
                if self.matches(b'+') { PlusPlus } else if self.matches(b'=') { PlusEqual } else { Plus }
            }
            b'-' => {
                if self.matches(b'-') { MinusMinus }
                else if self.matches(b'=') { MinusEqual }
                else if self.matches(b'>') { Arrow }
                else { Minus }
            }
            b'*' => if self.matches(b'=') { StarEqual } else { Star },
            b'/' => if self.matches(b'=') { SlashEqual } else { Slash },
            b'%' => Percent,
            b'=' => if self.matches(b'=') { EqualEqual } else { Equal },
            b'!' => if self.matches(b'=') { BangEqual } else { Bang },
            b'>' => if self.matches(b'=') { GreaterEqual } else { Greater },
            b'<' => if self.matches(b'=') { LessEqual } else { Less },
            b'&' if self.matches(b'&') => AndAnd,
            b'|' if self.matches(b'|') => OrOr,
            b'"' => return self.string(diagnostics),
            _ if c.is_ascii_digit() => return Some(self.number()),
            _ if c.is_ascii_alphabetic() || c == b'_' => return Some(self.identifier()),
            other => {
                diagnostics.parse_error(
                    &format!("unexpected character '{}'", other as char),
                    self.line,
                );
                return None;
            }
        };
        Some(self.token(kind))
    }

    fn string(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let mut value = String::new();
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\\' {
                let rest = std::str::from_utf8(&self.source[self.current..]).unwrap_or("");
                if let Some(m) = ESCAPE.find(rest) {
                    if m.start() == 0 {
                        let escaped = match self.source[self.current + 1] {
                            b'b' => '\u{8}',
                            b'n' => '\n',
                            b'r' => '\r',
                            b't' => '\t',
                            b'\'' => '\'',
                            b'"' => '"',
                            b'\\' => '\\',
                            _ => unreachable!(),
                        };
                        value.push(escaped);
                        self.advance();
                        self.advance();
                        continue;
                    }
                }
                diagnostics.parse_error("invalid escape sequence", self.line);
                self.advance();
                continue;
            }
            value.push(self.advance() as char);
        }
        if self.is_at_end() {
            diagnostics.parse_error("unterminated string literal", self.line);
            return None;
        }
        self.advance(); // closing quote
        Some(Token::new(TokenKind::String, value, self.line))
    }

    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.token(if is_float { TokenKind::Float } else { TokenKind::Int })
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = self.lexeme();
        let kind = KEYWORDS.get(text).copied().unwrap_or(TokenKind::Identifier);
        self.token(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        Scanner::new(src).scan(&mut diagnostics).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_arithmetic() {
        assert_eq!(
            kinds("1 + 2 * 3"),
            vec![
                TokenKind::Int,
                TokenKind::Plus,
                TokenKind::Int,
                TokenKind::Star,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn scans_string_escape() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("\"a\\nb\"").scan(&mut diagnostics);
        assert_eq!(tokens[0].lexeme, "a\nb");
    }

    #[test]
    fn scans_range_operators() {
        assert_eq!(
            kinds("0 ..= 2"),
            vec![TokenKind::Int, TokenKind::DotDotEq, TokenKind::Int, TokenKind::Eof]
        );
    }
}
