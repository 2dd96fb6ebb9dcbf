//! Streaming lexer.
//!
//! [`Scanner`] walks the UTF‑8 bytes of a source string and yields one
//! `Result<Token>` per lexeme, finishing with exactly one `EOF` token.  A
//! lexical error is yielded in place of the offending lexeme and scanning
//! resumes right after it, so a single pass reports every bad character and
//! unterminated string in the file.
//!
//! Whitespace and `//` comments never produce tokens; newlines (including
//! those inside string literals) advance the line counter.
//!
//! ```rust
//! use rox::scanner::Scanner;
//!
//! let kinds: Vec<String> = Scanner::new("var x = 1; // note")
//!     .filter_map(|r| r.ok())
//!     .map(|t| t.token_type.name().to_string())
//!     .collect();
//!
//! assert_eq!(kinds, ["VAR", "IDENTIFIER", "EQUAL", "NUMBER", "SEMICOLON", "EOF"]);
//! ```

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::AND,
    "break"  => TokenType::BREAK,
    "class"  => TokenType::CLASS,
    "else"   => TokenType::ELSE,
    "false"  => TokenType::FALSE,
    "fun"    => TokenType::FUN,
    "for"    => TokenType::FOR,
    "if"     => TokenType::IF,
    "nil"    => TokenType::NIL,
    "or"     => TokenType::OR,
    "print"  => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super"  => TokenType::SUPER,
    "this"   => TokenType::THIS,
    "true"   => TokenType::TRUE,
    "var"    => TokenType::VAR,
    "while"  => TokenType::WHILE,
};

/// Lexer over one source string.  Lexeme boundaries always fall on ASCII
/// bytes, so every lexeme is a valid `&str` slice of the input.
pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    /// First byte of the lexeme being scanned.
    start: usize,
    /// Next byte to examine.
    pos: usize,
    line: usize,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        info!("Scanner created over {} bytes", text.len());

        Self {
            text,
            bytes: text.as_bytes(),
            start: 0,
            pos: 0,
            line: 1,
            finished: false,
        }
    }

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Byte `offset` positions ahead, or `0` past the end.
    #[inline(always)]
    fn look(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b = self.look(0);
        self.pos += 1;
        b
    }

    /// `two` if the next byte is `=` (consuming it), otherwise `one`.
    fn with_equals(&mut self, two: TokenType, one: TokenType) -> TokenType {
        if self.look(0) == b'=' {
            self.pos += 1;
            two
        } else {
            one
        }
    }

    #[inline(always)]
    fn lexeme(&self) -> &'a str {
        self.text.get(self.start..self.pos).unwrap_or_default()
    }

    /// Scan from `self.start`.  `Ok(None)` means the bytes were insignificant
    /// (whitespace or a comment).
    fn scan_token(&mut self) -> Result<Option<TokenType>> {
        let kind = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => self.with_equals(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equals(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equals(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equals(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' if self.look(0) == b'/' => {
                self.skip_comment();
                return Ok(None);
            }
            b'/' => TokenType::SLASH,

            b' ' | b'\r' | b'\t' => return Ok(None),
            b'\n' => {
                self.line += 1;
                return Ok(None);
            }

            b'"' => self.string()?,
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Keep the next lexeme on a char boundary.
                while !self.at_end() && (self.look(0) & 0b1100_0000) == 0b1000_0000 {
                    self.pos += 1;
                }

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", self.lexeme()),
                ));
            }
        };

        Ok(Some(kind))
    }

    fn skip_comment(&mut self) {
        self.pos = match memchr(b'\n', &self.bytes[self.pos..]) {
            Some(offset) => self.pos + offset,
            None => self.bytes.len(),
        };
    }

    fn string(&mut self) -> Result<TokenType> {
        let opening_line = self.line;

        loop {
            if self.at_end() {
                debug!("String opened on line {} never closed", opening_line);
                return Err(LoxError::lex(self.line, "Unterminated string."));
            }

            match self.bump() {
                b'"' => break,
                b'\n' => self.line += 1,
                _ => {}
            }
        }

        let body = self
            .text
            .get(self.start + 1..self.pos - 1)
            .unwrap_or_default();

        Ok(TokenType::STRING(body.to_owned()))
    }

    fn number(&mut self) -> TokenType {
        while self.look(0).is_ascii_digit() {
            self.pos += 1;
        }

        if self.look(0) == b'.' && self.look(1).is_ascii_digit() {
            self.pos += 1;

            while self.look(0).is_ascii_digit() {
                self.pos += 1;
            }
        }

        // Only ASCII digits and at most one interior '.' were consumed.
        TokenType::NUMBER(self.lexeme().parse().unwrap_or(0.0))
    }

    fn identifier(&mut self) -> TokenType {
        while matches!(self.look(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }

        KEYWORDS
            .get(self.lexeme())
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        while !self.at_end() {
            self.start = self.pos;

            match self.scan_token() {
                Ok(Some(kind)) => {
                    debug!("Scanned {} on line {}", kind.name(), self.line);
                    return Some(Ok(Token::new(kind, self.lexeme(), self.line)));
                }
                Ok(None) => {}
                Err(e) => return Some(Err(e)),
            }
        }

        self.finished = true;
        Some(Ok(Token::new(TokenType::EOF, "", self.line)))
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
