//! Hand-rolled tokenizer, in the style of `cranelift-reader`'s lexer: a flat
//! token stream plus the line/column each token started at, with no
//! lookahead beyond one token held in the parser.

use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(i32),
    Str(Vec<u8>),
    /// Punctuation and keywords are both represented by their literal text;
    /// the parser decides which identifiers are keywords from context.
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    pub file: Arc<str>,
}

const PUNCT: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "->", "(", ")", "{", "}", "[", "]", ",", ";", ":", "=",
    "+", "-", "*", "/", "<", ">", ".", "!",
];

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, file: impl Into<Arc<str>>) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            line: 0,
            col: 0,
            file: file.into(),
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, String> {
        self.skip_trivia();
        let (line, col) = (self.line, self.col);
        let kind = match self.peek_byte() {
            None => TokenKind::Eof,
            Some(b'"') => self.lex_string()?,
            Some(b) if b.is_ascii_digit() || (b == b'-' && self.peek_is_digit_after_minus()) => {
                self.lex_number()
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.lex_ident(),
            _ => self.lex_punct(line, col)?,
        };
        Ok(Token { kind, line, column: col })
    }

    fn peek_is_digit_after_minus(&self) -> bool {
        self.src
            .get(self.pos + 1)
            .is_some_and(|b| b.is_ascii_digit())
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    fn lex_number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek_byte() == Some(b'-') {
            self.bump();
        }
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        TokenKind::Int(text.parse().unwrap_or(0))
    }

    fn lex_string(&mut self) -> Result<TokenKind, String> {
        self.bump();
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string literal".to_string()),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'"') => out.push(b'"'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(other) => out.push(other),
                    None => return Err("unterminated escape in string literal".to_string()),
                },
                Some(b) => out.push(b),
            }
        }
        Ok(TokenKind::Str(out))
    }

    fn lex_punct(&mut self, line: u32, col: u32) -> Result<TokenKind, String> {
        for &p in PUNCT {
            if self.src[self.pos..].starts_with(p.as_bytes()) {
                for _ in 0..p.len() {
                    self.bump();
                }
                return Ok(TokenKind::Punct(p));
            }
        }
        Err(format!(
            "unexpected character {:?} at {}:{}",
            self.peek_byte().map(|b| b as char),
            line + 1,
            col + 1
        ))
    }
}
