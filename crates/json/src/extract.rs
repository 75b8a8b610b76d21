//! Typed lookups built on [`find`](crate::find()).
//!
//! Each extractor either yields a typed value or falls back to a caller
//! default (numbers, booleans) or zero/`None` (strings, base64).

use crate::escape::{unescape, unescape_to_vec};
use crate::find::{find, Found};
use crate::tokenizer::Kind;

fn find_kind(buf: &[u8], path: &str, kind: Kind) -> Option<Found> {
    find(buf, path).filter(|f| f.kind == kind)
}

/// Inner bytes of the string at `path`, quotes removed.
fn string_body<'a>(buf: &'a [u8], path: &str) -> Option<&'a [u8]> {
    let f = find_kind(buf, path, Kind::String)?;
    Some(&buf[f.start + 1..f.start + f.len - 1])
}

/// Number at `path`, or `default` when absent or not a number.
pub fn find_number(buf: &[u8], path: &str, default: f64) -> f64 {
    find_kind(buf, path, Kind::Number)
        .and_then(|f| std::str::from_utf8(f.bytes(buf)).ok()?.parse().ok())
        .unwrap_or(default)
}

/// Boolean at `path`, or `default` when absent or not a boolean.
pub fn find_bool(buf: &[u8], path: &str, default: bool) -> bool {
    match find(buf, path).map(|f| f.kind) {
        Some(Kind::True) => true,
        Some(Kind::False) => false,
        _ => default,
    }
}

/// Decodes the string at `path` into `dst`.
///
/// Returns the decoded length, or 0 when the path is absent, is not a
/// string, holds an unsupported escape, or does not fit.
pub fn find_string_into(buf: &[u8], path: &str, dst: &mut [u8]) -> usize {
    string_body(buf, path)
        .and_then(|body| unescape(body, dst))
        .unwrap_or(0)
}

/// Decoded string at `path`.
///
/// # Example
///
/// ```
/// use freshen_json::find_string;
///
/// let doc = br#"{"name":"a\"b"}"#;
/// assert_eq!(find_string(doc, "$.name").as_deref(), Some("a\"b"));
/// assert_eq!(find_string(doc, "$.other"), None);
/// ```
pub fn find_string(buf: &[u8], path: &str) -> Option<String> {
    let bytes = unescape_to_vec(string_body(buf, path)?)?;
    String::from_utf8(bytes).ok()
}

/// Base64-decodes the string at `path` into `dst`, returning the decoded
/// length (0 when absent).
pub fn find_base64_into(buf: &[u8], path: &str, dst: &mut [u8]) -> usize {
    string_body(buf, path)
        .map(|body| freshen_base64::decode_into(body, dst))
        .unwrap_or(0)
}

/// Base64-decoded bytes of the string at `path`.
pub fn find_base64(buf: &[u8], path: &str) -> Option<Vec<u8>> {
    let body = string_body(buf, path)?;
    let mut dst = vec![0u8; freshen_base64::decoded_len(body.len())];
    let n = freshen_base64::decode_into(body, &mut dst);
    dst.truncate(n);
    Some(dst)
}
