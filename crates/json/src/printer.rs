//! Printers and the printf-style format language.
//!
//! Directives understood by [`printf`]:
//!
//! | directive       | argument                | output                       |
//! |-----------------|-------------------------|------------------------------|
//! | `%Q`, `%.*Q`    | `Str`, `Bytes`          | quoted, escaped JSON string  |
//! | `%s`, `%.*s`    | `Str`, `Bytes`          | bytes verbatim               |
//! | `%d`            | `Int`                   | decimal integer              |
//! | `%B`            | `Bool`                  | `true` / `false`             |
//! | `%f`, `%g`      | `Float`, `Int`          | `%g`-style number            |
//! | `%V`            | `Bytes`, `Str`          | quoted base64                |
//! | `%M`            | `Fmt`                   | whatever the callback prints |
//! | `%%`            |                         | `%`                          |
//!
//! Slices carry their own length, so `%.*Q` and `%.*s` take a single
//! argument, just like `%Q` and `%s`.

use std::fmt;

use thiserror::Error;

use crate::escape::write_escaped;
use crate::out::Output;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown format directive {0:?}")]
    UnknownDirective(String),
    #[error("missing argument {index}")]
    MissingArgument { index: usize },
    #[error("argument {index} does not fit directive %{directive}")]
    ArgumentMismatch { directive: char, index: usize },
}

/// A [`printf`] argument.
#[derive(Clone, Copy)]
pub enum Arg<'a> {
    Str(&'a str),
    Bytes(&'a [u8]),
    Int(i64),
    Bool(bool),
    Float(f64),
    Fmt(&'a dyn Fn(&mut dyn Output) -> usize),
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Arg::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Arg::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Arg::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Arg::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Arg::Fmt(_) => f.write_str("Fmt(..)"),
        }
    }
}

impl<'a> Arg<'a> {
    fn as_bytes(&self) -> Option<&'a [u8]> {
        match *self {
            Arg::Str(s) => Some(s.as_bytes()),
            Arg::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

pub fn print_buf(out: &mut dyn Output, bytes: &[u8]) -> usize {
    out.append(bytes)
}

pub fn print_int(out: &mut dyn Output, value: i64) -> usize {
    out.append(value.to_string().as_bytes())
}

/// Formats like C's `%g`: six significant digits, trailing zeros removed,
/// exponent form for very small or large magnitudes. Non-finite values are
/// printed as `null`.
pub fn print_dbl(out: &mut dyn Output, value: f64) -> usize {
    out.append(format_g(value).as_bytes())
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;
    if !value.is_finite() {
        return "null".to_string();
    }
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

/// Prints `s` as a quoted JSON string.
pub fn print_str(out: &mut dyn Output, s: &[u8]) -> usize {
    let mut n = out.append(b"\"");
    n += write_escaped(s, |run| out.append(run));
    n + out.append(b"\"")
}

/// Prints `data` as a quoted base64 string.
pub fn print_b64(out: &mut dyn Output, data: &[u8]) -> usize {
    let mut encoded = Vec::with_capacity(freshen_base64::encoded_len(data.len()) + 2);
    encoded.push(b'"');
    freshen_base64::write_base64(data, &mut encoded);
    encoded.push(b'"');
    out.append(&encoded)
}

/// Formats `args` according to `fmt`, returning the bytes written.
///
/// # Example
///
/// ```
/// use freshen_json::{printf, Arg, DynamicBuf, Output, print_buf};
///
/// let inner = |out: &mut dyn Output| print_buf(out, b"[1,2]");
/// let mut out = DynamicBuf::new();
/// printf(
///     &mut out,
///     "{%Q:%B,%Q:%V,%Q:%M}",
///     &[
///         Arg::Str("ok"),
///         Arg::Bool(true),
///         Arg::Str("data"),
///         Arg::Bytes(b"hi"),
///         Arg::Str("list"),
///         Arg::Fmt(&inner),
///     ],
/// )
/// .unwrap();
/// assert_eq!(out.as_bytes(), br#"{"ok":true,"data":"aGk=","list":[1,2]}"#);
/// ```
pub fn printf(out: &mut dyn Output, fmt: &str, args: &[Arg<'_>]) -> Result<usize, FormatError> {
    let fmt = fmt.as_bytes();
    let mut n = 0;
    let mut next_arg = 0;
    let mut i = 0;
    let mut literal = 0;

    while i < fmt.len() {
        if fmt[i] != b'%' {
            i += 1;
            continue;
        }
        n += out.append(&fmt[literal..i]);
        let directive_start = i;
        i += 1;
        if fmt[i..].starts_with(b".*") {
            i += 2;
        }
        let Some(&directive) = fmt.get(i) else {
            return Err(FormatError::UnknownDirective(
                String::from_utf8_lossy(&fmt[directive_start..]).into_owned(),
            ));
        };
        i += 1;
        literal = i;

        if directive == b'%' {
            n += out.append(b"%");
            continue;
        }
        let index = next_arg;
        let arg = args
            .get(index)
            .ok_or(FormatError::MissingArgument { index })?;
        next_arg += 1;
        let mismatch = FormatError::ArgumentMismatch {
            directive: directive as char,
            index,
        };

        n += match (directive, arg) {
            (b'Q', a) => print_str(out, a.as_bytes().ok_or(mismatch)?),
            (b's', a) => print_buf(out, a.as_bytes().ok_or(mismatch)?),
            (b'V', a) => print_b64(out, a.as_bytes().ok_or(mismatch)?),
            (b'd', Arg::Int(v)) => print_int(out, *v),
            (b'B', Arg::Bool(v)) => print_buf(out, if *v { b"true" } else { b"false" }),
            (b'f' | b'g', Arg::Float(v)) => print_dbl(out, *v),
            (b'f' | b'g', Arg::Int(v)) => print_dbl(out, *v as f64),
            (b'M', Arg::Fmt(f)) => f(out),
            (b'd' | b'B' | b'f' | b'g' | b'M', _) => return Err(mismatch),
            _ => {
                return Err(FormatError::UnknownDirective(
                    String::from_utf8_lossy(&fmt[directive_start..i]).into_owned(),
                ))
            }
        };
    }
    Ok(n + out.append(&fmt[literal..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::out::{DynamicBuf, FixedBuf};

    fn render(fmt: &str, args: &[Arg<'_>]) -> String {
        let mut out = DynamicBuf::new();
        let n = printf(&mut out, fmt, args).unwrap();
        assert_eq!(n, out.len());
        String::from_utf8(out.into_vec()).unwrap()
    }

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.5), "1.5");
        assert_eq!(format_g(-2.5), "-2.5");
        assert_eq!(format_g(100000.0), "100000");
        assert_eq!(format_g(1e6), "1e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(3.14159265), "3.14159");
        assert_eq!(format_g(1.23e-10), "1.23e-10");
        assert_eq!(format_g(f64::NAN), "null");
    }

    #[test]
    fn test_directives() {
        assert_eq!(render("%d", &[Arg::Int(-42)]), "-42");
        assert_eq!(render("%B,%B", &[Arg::Bool(true), Arg::Bool(false)]), "true,false");
        assert_eq!(render("%Q", &[Arg::Str("a\"b")]), r#""a\"b""#);
        assert_eq!(render("%.*Q", &[Arg::Bytes(b"xy")]), r#""xy""#);
        assert_eq!(render("[%s]", &[Arg::Str("raw")]), "[raw]");
        assert_eq!(render("%.*s", &[Arg::Bytes(b"{}")]), "{}");
        assert_eq!(render("%f", &[Arg::Float(0.5)]), "0.5");
        assert_eq!(render("%g", &[Arg::Int(3)]), "3");
        assert_eq!(render("%V", &[Arg::Bytes(b"foo")]), r#""Zm9v""#);
        assert_eq!(render("100%%", &[]), "100%");
    }

    #[test]
    fn test_nested_formatter() {
        let inner = |out: &mut dyn Output| {
            printf(out, "{%Q:%d}", &[Arg::Str("x"), Arg::Int(1)]).unwrap_or(0)
        };
        assert_eq!(render("[%M,%M]", &[Arg::Fmt(&inner), Arg::Fmt(&inner)]), r#"[{"x":1},{"x":1}]"#);
    }

    #[test]
    fn test_errors() {
        let mut out = DynamicBuf::new();
        assert_eq!(
            printf(&mut out, "%d", &[]),
            Err(FormatError::MissingArgument { index: 0 })
        );
        assert_eq!(
            printf(&mut out, "%d", &[Arg::Str("1")]),
            Err(FormatError::ArgumentMismatch { directive: 'd', index: 0 })
        );
        assert_eq!(
            printf(&mut out, "%Q", &[Arg::Int(1)]),
            Err(FormatError::ArgumentMismatch { directive: 'Q', index: 0 })
        );
        assert!(matches!(
            printf(&mut out, "%x", &[Arg::Int(1)]),
            Err(FormatError::UnknownDirective(_))
        ));
        assert!(matches!(printf(&mut out, "%", &[]), Err(FormatError::UnknownDirective(_))));
    }

    #[test]
    fn test_fixed_sink_truncates() {
        let mut storage = [0u8; 8];
        let mut out = FixedBuf::new(&mut storage);
        let n = printf(&mut out, "{%Q:%Q}", &[Arg::Str("key"), Arg::Str("value")]).unwrap();
        assert_eq!(n, 8);
        assert!(out.overflowed());
        assert_eq!(out.as_bytes(), br#"{"key":""#);
    }
}
