//! JSON string escaping.
//!
//! The supported escape set is `\" \\ \/ \b \f \n \r \t`. Other control
//! bytes are written as `\u00XX` so output is always valid JSON, but
//! `\uXXXX` sequences are not decoded.

/// Raw byte and the letter that follows the backslash.
const ESCAPES: [(u8, u8); 8] = [
    (0x08, b'b'),
    (0x0c, b'f'),
    (b'\n', b'n'),
    (b'\r', b'r'),
    (b'\t', b't'),
    (b'\\', b'\\'),
    (b'"', b'"'),
    (b'/', b'/'),
];

const HEX: &[u8; 16] = b"0123456789abcdef";

fn short_escape(raw: u8) -> Option<u8> {
    ESCAPES.iter().find(|(r, _)| *r == raw).map(|(_, e)| *e)
}

fn unescape_letter(letter: u8) -> Option<u8> {
    ESCAPES.iter().find(|(_, e)| *e == letter).map(|(r, _)| *r)
}

/// Feeds the escaped form of `s` to `emit` in runs. Returns total length.
pub(crate) fn write_escaped<F>(s: &[u8], mut emit: F) -> usize
where
    F: FnMut(&[u8]) -> usize,
{
    let mut n = 0;
    let mut last = 0;
    for (i, &b) in s.iter().enumerate() {
        let mut buf = [b'\\', 0, b'0', b'0', 0, 0];
        let seq: &[u8] = match short_escape(b) {
            // '/' is accepted on input but never needs escaping.
            Some(_) if b == b'/' => continue,
            Some(letter) => {
                buf[1] = letter;
                &buf[..2]
            }
            None if b < 0x20 => {
                buf[1] = b'u';
                buf[4] = HEX[(b >> 4) as usize];
                buf[5] = HEX[(b & 0xf) as usize];
                &buf[..]
            }
            None => continue,
        };
        n += emit(&s[last..i]);
        n += emit(seq);
        last = i + 1;
    }
    n + emit(&s[last..])
}

/// Escapes `s` for embedding in a JSON string literal (without quotes).
///
/// # Example
///
/// ```
/// use freshen_json::escape;
///
/// assert_eq!(escape("say \"hi\"\n"), "say \\\"hi\\\"\\n");
/// ```
pub fn escape(s: &str) -> String {
    let mut out = Vec::with_capacity(s.len());
    write_escaped(s.as_bytes(), |run| {
        out.extend_from_slice(run);
        run.len()
    });
    // Escaping only inserts ASCII around whole UTF-8 sequences.
    String::from_utf8(out).unwrap_or_default()
}

/// Decodes the escapes in `src` (a string literal without its quotes) into
/// `dst`, returning the decoded length.
///
/// Returns `None` for an unsupported escape (including `\u`), a dangling
/// backslash, or when `dst` is too small.
pub fn unescape(src: &[u8], dst: &mut [u8]) -> Option<usize> {
    let mut j = 0;
    let mut i = 0;
    while i < src.len() {
        let b = if src[i] == b'\\' {
            i += 1;
            unescape_letter(*src.get(i)?)?
        } else {
            src[i]
        };
        *dst.get_mut(j)? = b;
        j += 1;
        i += 1;
    }
    Some(j)
}

/// Allocating variant of [`unescape`].
pub fn unescape_to_vec(src: &[u8]) -> Option<Vec<u8>> {
    let mut dst = vec![0u8; src.len()];
    let n = unescape(src, &mut dst)?;
    dst.truncate(n);
    Some(dst)
}
