//! freshen-json - JSON scanning, querying and printing over byte buffers.
//!
//! Nothing here builds a document tree. The [`Tokenizer`] walks a buffer and
//! yields token events that point back into it; [`find`] runs one pass of the
//! tokenizer to locate a single value by a restricted JSON path (`$`, `.key`,
//! `[N]`); the typed extractors wrap `find` for numbers, booleans, strings and
//! base64 payloads. On the output side, every printer funnels through the
//! single [`Output::append`] primitive, and [`printf`] composes them with a
//! small format language.
//!
//! # Example
//!
//! ```
//! use freshen_json::{find, find_number, printf, Arg, DynamicBuf, Kind};
//!
//! let doc = br#"{"a":{"b":[10,20,30]}}"#;
//! let found = find(doc, "$.a.b[1]").unwrap();
//! assert_eq!(found.kind, Kind::Number);
//! assert_eq!(found.bytes(doc), b"20");
//! assert_eq!(find_number(doc, "$.a.b[2]", 0.0), 30.0);
//!
//! let mut out = DynamicBuf::new();
//! printf(&mut out, "{%Q:%d}", &[Arg::Str("n"), Arg::Int(5)]).unwrap();
//! assert_eq!(out.as_bytes(), br#"{"n":5}"#);
//! ```

pub mod escape;
pub mod extract;
pub mod find;
pub mod out;
pub mod printer;
pub mod tokenizer;

pub use escape::{escape, unescape, unescape_to_vec};
pub use extract::{
    find_base64, find_base64_into, find_bool, find_number, find_string, find_string_into,
};
pub use find::{find, find_range, try_find, Found};
pub use out::{DynamicBuf, FixedBuf, Output, StreamOut};
pub use printer::{print_b64, print_buf, print_dbl, print_int, print_str, printf, Arg, FormatError};
pub use tokenizer::{scan, JsonError, Kind, Token, TokenEvent, Tokenizer, MAX_DEPTH};
