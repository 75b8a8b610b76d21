//! Base64 encoding and decoding utilities.
//!
//! This crate provides the standard-alphabet (RFC 4648, `=` padded) codec
//! used by the freshen printer and RPC methods:
//! - Encoding to a `String` or appending to a byte buffer
//! - Lenient decoding compatible with device firmware, including in-place
//!   decoding of a mutable buffer
//!
//! # Example
//!
//! ```
//! use freshen_base64::{decode_in_place, to_base64};
//!
//! let data = b"hello world";
//! let mut buf = to_base64(data).into_bytes();
//! let n = decode_in_place(&mut buf);
//! assert_eq!(&buf[..n], data);
//! ```

mod constants;
mod decode_lenient;
mod to_base64;

pub use constants::{ALPHABET, ALPHABET_BYTES, PAD};
pub use decode_lenient::{decode_in_place, decode_into, decoded_len};
pub use to_base64::{encoded_len, to_base64, write_base64};

