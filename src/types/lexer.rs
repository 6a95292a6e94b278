//! # Type-String Lexer
//!
//! Zero-copy tokenizer for ClickHouse type signatures such as
//! `Map(LowCardinality(String), Array(Nullable(Decimal64(4))))`.
//!
//! ## Token Types
//!
//! - **Identifiers**: `UInt8`, `max_dynamic_paths`, `a.b.c` (dots allowed
//!   after the first character so JSON paths lex as one token)
//! - **Quoted identifiers**: `` `my col` `` and `"my col"`
//! - **Strings**: `'Europe/Berlin'`, with `\'`, `\\` and `''` escapes
//! - **Numbers**: `18`, `-128`, `0.5`, `1e-3`
//! - **Punctuation**: `(`, `)`, `,`, `=`
//!
//! String and quoted-identifier tokens borrow the raw text between the
//! quotes; [`unescape`] produces the owned value when the parser needs it.
//!
//! ## Error Handling
//!
//! Invalid input produces `Token::Error` with a static message; the parser
//! turns it into `DecodeError::MalformedTypeString` with the byte position.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Ident(&'a str),
    QuotedIdent(&'a str),
    String(&'a str),
    Number(&'a str),
    LParen,
    RParen,
    Comma,
    Eq,
    Eof,
    Error(&'static str),
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    token_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            token_start: 0,
        }
    }

    /// Byte offset where the most recent token started.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        self.token_start = self.pos;

        if self.is_eof() {
            return Token::Eof;
        }

        let ch = self.current();
        if ch.is_ascii_alphabetic() || ch == b'_' {
            return self.scan_identifier();
        }
        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        match ch {
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b',' => self.single(Token::Comma),
            b'=' => self.single(Token::Eq),
            b'-' | b'+' => {
                if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    self.scan_number()
                } else {
                    self.advance();
                    Token::Error("sign not followed by a digit")
                }
            }
            b'\'' => match self.scan_quoted(b'\'') {
                Some(raw) => Token::String(raw),
                None => Token::Error("unterminated string literal"),
            },
            b'`' | b'"' => match self.scan_quoted(ch) {
                Some(raw) => Token::QuotedIdent(raw),
                None => Token::Error("unterminated quoted identifier"),
            },
            _ => {
                self.advance_char();
                Token::Error("unexpected character")
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_char(&mut self) {
        let width = self.input[self.pos..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        self.pos += width;
    }

    fn single(&mut self, token: Token<'a>) -> Token<'a> {
        self.advance();
        token
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() {
            match self.current() {
                b' ' | b'\t' | b'\r' | b'\n' => self.advance(),
                _ => break,
            }
        }
    }

    fn scan_identifier(&mut self) -> Token<'a> {
        let start = self.pos;
        while !self.is_eof()
            && (self.current().is_ascii_alphanumeric()
                || self.current() == b'_'
                || self.current() == b'.')
        {
            self.advance();
        }
        Token::Ident(&self.input[start..self.pos])
    }

    fn scan_number(&mut self) -> Token<'a> {
        let start = self.pos;
        if matches!(self.current(), b'-' | b'+') {
            self.advance();
        }
        while !self.is_eof() && self.current().is_ascii_digit() {
            self.advance();
        }
        if !self.is_eof() && self.current() == b'.' {
            self.advance();
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
        }
        if !self.is_eof() && (self.current() == b'e' || self.current() == b'E') {
            self.advance();
            if !self.is_eof() && (self.current() == b'+' || self.current() == b'-') {
                self.advance();
            }
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
        }
        Token::Number(&self.input[start..self.pos])
    }

    /// Scans a `quote`-delimited run and returns the raw text inside it.
    fn scan_quoted(&mut self, quote: u8) -> Option<&'a str> {
        self.advance();
        let start = self.pos;
        loop {
            if self.is_eof() {
                return None;
            }
            let ch = self.current();
            if ch == b'\\' {
                self.advance();
                if self.is_eof() {
                    return None;
                }
                self.advance_char();
            } else if ch == quote {
                if self.peek_char() == Some(quote) {
                    self.advance();
                    self.advance();
                } else {
                    let end = self.pos;
                    self.advance();
                    return Some(&self.input[start..end]);
                }
            } else {
                self.advance_char();
            }
        }
    }
}

/// Resolves backslash escapes and doubled quotes in a raw quoted token.
pub fn unescape(raw: &str, quote: char) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            c if c == quote && chars.peek() == Some(&quote) => {
                chars.next();
                out.push(quote);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            out.push(token);
            if matches!(token, Token::Eof | Token::Error(_)) {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_nested_signature() {
        assert_eq!(
            tokens("Array(Nullable(String))"),
            vec![
                Token::Ident("Array"),
                Token::LParen,
                Token::Ident("Nullable"),
                Token::LParen,
                Token::Ident("String"),
                Token::RParen,
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn lexes_enum_entries_with_negative_values() {
        assert_eq!(
            tokens("Enum8('a' = -128, 'b'=1)"),
            vec![
                Token::Ident("Enum8"),
                Token::LParen,
                Token::String("a"),
                Token::Eq,
                Token::Number("-128"),
                Token::Comma,
                Token::String("b"),
                Token::Eq,
                Token::Number("1"),
                Token::RParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn dotted_path_is_one_identifier() {
        assert_eq!(tokens("a.b.c UInt32")[0], Token::Ident("a.b.c"));
    }

    #[test]
    fn quoted_identifier_keeps_raw_text() {
        assert_eq!(tokens("`my col`")[0], Token::QuotedIdent("my col"));
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let toks = tokens(r"'it\'s'");
        assert_eq!(toks[0], Token::String(r"it\'s"));
        assert_eq!(unescape(r"it\'s", '\''), "it's");
        assert_eq!(unescape("it''s", '\''), "it's");
    }

    #[test]
    fn unterminated_string_is_error() {
        assert!(matches!(tokens("'abc").last(), Some(Token::Error(_))));
    }

    #[test]
    fn decimal_number_literal() {
        assert_eq!(tokens("0.5")[0], Token::Number("0.5"));
    }
}
