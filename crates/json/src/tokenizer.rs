//! Streaming JSON tokenizer with a bounded nesting stack.
//!
//! [`Tokenizer`] is a pull-style iterator over the token events of exactly
//! one JSON value at the start of a buffer. Events carry byte offsets into
//! the input buffer; nothing is copied or decoded. [`scan`] drives the
//! iterator with a callback that may stop the walk early.

use std::ops::ControlFlow;

use thiserror::Error;

/// Maximum number of nested objects/arrays.
pub const MAX_DEPTH: usize = 20;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JsonError {
    #[error("invalid JSON input at offset {offset}")]
    InvalidInput { offset: usize },
    #[error("JSON nested deeper than {MAX_DEPTH} levels at offset {offset}")]
    TooDeep { offset: usize },
}

/// Kind of a JSON value (or object key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Key,
    String,
    Number,
    True,
    False,
    Null,
    Array,
    Object,
}

/// A single lexical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    Colon,
    Comma,
    Key,
    String,
    Number,
    True,
    False,
    Null,
}

impl Token {
    /// Value kind carried by a scalar or key token.
    ///
    /// Composite kinds are only known once the closing event arrives, so
    /// both open and close tokens map to their container kind.
    pub fn kind(self) -> Option<Kind> {
        match self {
            Token::Key => Some(Kind::Key),
            Token::String => Some(Kind::String),
            Token::Number => Some(Kind::Number),
            Token::True => Some(Kind::True),
            Token::False => Some(Kind::False),
            Token::Null => Some(Kind::Null),
            Token::ObjectStart | Token::ObjectEnd => Some(Kind::Object),
            Token::ArrayStart | Token::ArrayEnd => Some(Kind::Array),
            Token::Colon | Token::Comma => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Token::String | Token::Number | Token::True | Token::False | Token::Null
        )
    }
}

/// A token with its byte span in the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEvent {
    pub token: Token,
    pub start: usize,
    pub len: usize,
}

impl TokenEvent {
    /// The bytes of this token within `buf`.
    pub fn bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.start + self.len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    Key,
    Colon,
    CommaOrEnd,
    Done,
}

/// Pull tokenizer over one JSON value.
///
/// Once the value completes, or after the first error, the iterator is
/// exhausted. Restarting means constructing a new tokenizer.
pub struct Tokenizer<'a> {
    buf: &'a [u8],
    pos: usize,
    expect: Expect,
    stack: [u8; MAX_DEPTH],
    depth: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            expect: Expect::Value,
            stack: [0; MAX_DEPTH],
            depth: 0,
        }
    }

    /// Number of bytes consumed so far. After the value completes this is
    /// the length of the value including leading whitespace.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// True once a complete top-level value has been read.
    pub fn is_complete(&self) -> bool {
        self.expect == Expect::Done && self.depth == 0
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek() {
            self.pos += 1;
        }
    }

    fn invalid(&self) -> JsonError {
        JsonError::InvalidInput { offset: self.pos }
    }

    fn emit(&mut self, token: Token, start: usize, len: usize) -> TokenEvent {
        self.pos = start + len;
        TokenEvent { token, start, len }
    }

    fn value_done(&mut self) {
        self.expect = if self.depth == 0 {
            Expect::Done
        } else {
            Expect::CommaOrEnd
        };
    }

    fn step(&mut self) -> Result<TokenEvent, JsonError> {
        self.skip_whitespace();
        let start = self.pos;
        let c = self.peek().ok_or_else(|| self.invalid())?;
        match self.expect {
            Expect::Value => match c {
                b'{' | b'[' => self.open(c),
                b']' => self.close(c),
                b'"' => {
                    let len = self.string_len()?;
                    self.value_done();
                    Ok(self.emit(Token::String, start, len))
                }
                b't' => self.literal(b"true", Token::True),
                b'f' => self.literal(b"false", Token::False),
                b'n' => self.literal(b"null", Token::Null),
                b'-' | b'0'..=b'9' => {
                    let len = self.number_len()?;
                    self.value_done();
                    Ok(self.emit(Token::Number, start, len))
                }
                _ => Err(self.invalid()),
            },
            Expect::Key => match c {
                b'"' => {
                    let len = self.string_len()?;
                    self.expect = Expect::Colon;
                    Ok(self.emit(Token::Key, start, len))
                }
                b'}' => self.close(c),
                _ => Err(self.invalid()),
            },
            Expect::Colon => match c {
                b':' => {
                    self.expect = Expect::Value;
                    Ok(self.emit(Token::Colon, start, 1))
                }
                _ => Err(self.invalid()),
            },
            Expect::CommaOrEnd => match c {
                b',' => {
                    self.expect = if self.stack[self.depth - 1] == b'{' {
                        Expect::Key
                    } else {
                        Expect::Value
                    };
                    Ok(self.emit(Token::Comma, start, 1))
                }
                b'}' | b']' => self.close(c),
                _ => Err(self.invalid()),
            },
            Expect::Done => Err(self.invalid()),
        }
    }

    fn open(&mut self, c: u8) -> Result<TokenEvent, JsonError> {
        if self.depth >= MAX_DEPTH {
            return Err(JsonError::TooDeep { offset: self.pos });
        }
        self.stack[self.depth] = c;
        self.depth += 1;
        let token = if c == b'{' {
            self.expect = Expect::Key;
            Token::ObjectStart
        } else {
            self.expect = Expect::Value;
            Token::ArrayStart
        };
        Ok(self.emit(token, self.pos, 1))
    }

    fn close(&mut self, c: u8) -> Result<TokenEvent, JsonError> {
        // '}' is 2 past '{' and ']' is 2 past '['.
        if self.depth == 0 || self.stack[self.depth - 1] + 2 != c {
            return Err(self.invalid());
        }
        self.depth -= 1;
        self.value_done();
        let token = if c == b'}' {
            Token::ObjectEnd
        } else {
            Token::ArrayEnd
        };
        Ok(self.emit(token, self.pos, 1))
    }

    fn literal(&mut self, text: &[u8], token: Token) -> Result<TokenEvent, JsonError> {
        if !self.buf[self.pos..].starts_with(text) {
            return Err(self.invalid());
        }
        self.value_done();
        Ok(self.emit(token, self.pos, text.len()))
    }

    /// Length of the string token at `pos`, quotes included.
    fn string_len(&self) -> Result<usize, JsonError> {
        let mut i = self.pos + 1;
        loop {
            match self.buf.get(i) {
                None | Some(0) => return Err(JsonError::InvalidInput { offset: i }),
                Some(b'\\') => {
                    if i + 1 >= self.buf.len() {
                        return Err(JsonError::InvalidInput { offset: i });
                    }
                    i += 2;
                }
                Some(b'"') => return Ok(i + 1 - self.pos),
                Some(_) => i += 1,
            }
        }
    }

    /// Greedy number munch, validated by the float parser.
    fn number_len(&self) -> Result<usize, JsonError> {
        let rest = &self.buf[self.pos..];
        let len = rest
            .iter()
            .take_while(|b| matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E'))
            .count();
        std::str::from_utf8(&rest[..len])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .map(|_| len)
            .ok_or_else(|| self.invalid())
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<TokenEvent, JsonError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.expect == Expect::Done {
            return None;
        }
        let result = self.step();
        if result.is_err() {
            self.expect = Expect::Done;
        }
        Some(result)
    }
}

/// Scans one JSON value, invoking `callback` for every token.
///
/// Returns the number of bytes consumed. When the callback breaks, the scan
/// stops and the bytes consumed up to that token are returned.
///
/// # Example
///
/// ```
/// use std::ops::ControlFlow;
/// use freshen_json::{scan, Token};
///
/// let mut tokens = Vec::new();
/// let n = scan(b"[1, true] trailing", |ev| {
///     tokens.push(ev.token);
///     ControlFlow::Continue(())
/// })
/// .unwrap();
/// assert_eq!(n, 9);
/// assert_eq!(
///     tokens,
///     [Token::ArrayStart, Token::Number, Token::Comma, Token::True, Token::ArrayEnd]
/// );
/// ```
pub fn scan<F>(buf: &[u8], mut callback: F) -> Result<usize, JsonError>
where
    F: FnMut(&TokenEvent) -> ControlFlow<()>,
{
    let mut tokens = Tokenizer::new(buf);
    while let Some(event) = tokens.next() {
        if callback(&event?).is_break() {
            break;
        }
    }
    Ok(tokens.consumed())
}
