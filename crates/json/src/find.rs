//! Single-pass JSON path lookup.
//!
//! Paths are `$` followed by any number of `.key` and `[N]` segments. The
//! lookup runs the tokenizer once and tracks two depths: the current
//! traversal depth and the depth down to which the path has been consumed.
//! A value is reported when the whole path is consumed and the depths agree.
//! Once the value of a consumed segment ends without completing the path,
//! the lookup stops: the target cannot appear later in the document.

use std::ops::{ControlFlow, Range};

use crate::tokenizer::{JsonError, Kind, Token, TokenEvent, Tokenizer};

/// Location of a matched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub kind: Kind,
    pub start: usize,
    pub len: usize,
}

impl Found {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// The matched value's text within `buf`.
    pub fn bytes<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.range()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'p> {
    Key(&'p [u8]),
    Index(usize),
}

/// Parses the segment starting at `pos`, returning it and the next position.
fn segment_at(path: &[u8], pos: usize) -> Option<(Segment<'_>, usize)> {
    match path.get(pos)? {
        b'.' => {
            let start = pos + 1;
            let end = path[start..]
                .iter()
                .position(|&b| b == b'.' || b == b'[')
                .map_or(path.len(), |n| start + n);
            if end == start {
                return None;
            }
            Some((Segment::Key(&path[start..end]), end))
        }
        b'[' => {
            let start = pos + 1;
            let digits = path[start..].iter().take_while(|b| b.is_ascii_digit()).count();
            let end = start + digits;
            if digits == 0 || path.get(end) != Some(&b']') {
                return None;
            }
            let index = std::str::from_utf8(&path[start..end]).ok()?.parse().ok()?;
            Some((Segment::Index(index), end + 1))
        }
        _ => None,
    }
}

fn is_valid_path(path: &[u8]) -> bool {
    if path.first() != Some(&b'$') {
        return false;
    }
    let mut pos = 1;
    while pos < path.len() {
        match segment_at(path, pos) {
            Some((_, next)) => pos = next,
            None => return false,
        }
    }
    true
}

#[derive(Debug, Clone, Copy)]
struct ArrayCursor {
    current: usize,
    target: usize,
}

struct Query<'p> {
    path: &'p [u8],
    pos: usize,
    /// Traversal depth.
    d1: usize,
    /// Depth down to which the path is consumed.
    d2: usize,
    index: Option<ArrayCursor>,
    /// Start of a composite that matches once it closes.
    composite: Option<usize>,
}

impl<'p> Query<'p> {
    fn new(path: &'p str) -> Option<Self> {
        let path = path.as_bytes();
        if !is_valid_path(path) {
            return None;
        }
        Some(Self {
            path,
            pos: 1,
            d1: 0,
            d2: 0,
            index: None,
            composite: None,
        })
    }

    fn consumed(&self) -> bool {
        self.pos == self.path.len()
    }

    fn segment(&self) -> Option<(Segment<'p>, usize)> {
        segment_at(self.path, self.pos)
    }

    fn advance(&mut self, next: usize) {
        self.pos = next;
        self.d2 += 1;
    }

    fn on_event(&mut self, buf: &[u8], ev: &TokenEvent) -> ControlFlow<Option<Found>> {
        match ev.token {
            Token::ObjectStart | Token::ArrayStart => {
                if self.d1 == self.d2 {
                    if self.consumed() {
                        self.composite = Some(ev.start);
                    } else if ev.token == Token::ArrayStart {
                        if let Some((Segment::Index(target), next)) = self.segment() {
                            if target == 0 {
                                self.advance(next);
                            } else {
                                self.index = Some(ArrayCursor { current: 0, target });
                            }
                        }
                    }
                }
                self.d1 += 1;
            }
            Token::ObjectEnd | Token::ArrayEnd => {
                self.d1 -= 1;
                if self.d1 <= self.d2 {
                    let found = match self.composite {
                        Some(start) if self.d1 == self.d2 && self.consumed() => Some(Found {
                            kind: if ev.token == Token::ObjectEnd {
                                Kind::Object
                            } else {
                                Kind::Array
                            },
                            start,
                            len: ev.start + 1 - start,
                        }),
                        _ => None,
                    };
                    return ControlFlow::Break(found);
                }
            }
            Token::Comma => {
                if self.d1 == self.d2 + 1 {
                    if let Some(cursor) = self.index.as_mut() {
                        cursor.current += 1;
                        if cursor.current == cursor.target {
                            self.index = None;
                            if let Some((_, next)) = self.segment() {
                                self.advance(next);
                            }
                        }
                    }
                }
            }
            Token::Key => {
                if self.d1 == self.d2 + 1 {
                    if let Some((Segment::Key(key), next)) = self.segment() {
                        if &buf[ev.start + 1..ev.start + ev.len - 1] == key {
                            self.advance(next);
                        }
                    }
                }
            }
            Token::Colon => {}
            Token::String | Token::Number | Token::True | Token::False | Token::Null => {
                if self.d1 == self.d2 {
                    let found = self.consumed().then(|| Found {
                        kind: ev.token.kind().unwrap_or(Kind::Null),
                        start: ev.start,
                        len: ev.len,
                    });
                    return ControlFlow::Break(found);
                }
            }
        }
        ControlFlow::Continue(())
    }
}

/// Looks up `path` in `buf`, surfacing tokenizer errors met before the
/// lookup could decide.
///
/// A malformed path yields `Ok(None)` without scanning.
pub fn try_find(buf: &[u8], path: &str) -> Result<Option<Found>, JsonError> {
    let Some(mut query) = Query::new(path) else {
        return Ok(None);
    };
    for event in Tokenizer::new(buf) {
        if let ControlFlow::Break(found) = query.on_event(buf, &event?) {
            return Ok(found);
        }
    }
    Ok(None)
}

/// Looks up `path` in `buf`. Malformed documents and paths are reported as
/// not found.
///
/// # Example
///
/// ```
/// use freshen_json::{find, Kind};
///
/// let doc = br#"{"list":[{"x":1},{"x":2}]}"#;
/// let found = find(doc, "$.list[1]").unwrap();
/// assert_eq!(found.kind, Kind::Object);
/// assert_eq!(found.bytes(doc), br#"{"x":2}"#);
/// assert!(find(doc, "$.list[2]").is_none());
/// assert!(find(doc, "list").is_none());
/// ```
pub fn find(buf: &[u8], path: &str) -> Option<Found> {
    try_find(buf, path).ok().flatten()
}

/// Byte range of the value at `path`.
pub fn find_range(buf: &[u8], path: &str) -> Option<Range<usize>> {
    find(buf, path).map(|f| f.range())
}
