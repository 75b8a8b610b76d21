//! Lenient base64 decoding, compatible with device firmware.
//!
//! Input is consumed in complete groups of four characters. Bytes outside
//! the alphabet are not rejected; they decode as garbage bits. A `=` in the
//! third or fourth position of a group ends the output for that group. A
//! trailing partial group is ignored.

use crate::constants::{DECODE_TABLE, PAD};

/// Decodes one group, returning the output bytes and how many are valid.
fn decode_group(group: [u8; 4]) -> ([u8; 3], usize) {
    let [a, b, c, d] = group.map(|x| DECODE_TABLE[x as usize]);
    let out = [(a << 2) | (b >> 4), (b << 4) | (c >> 2), (c << 6) | d];
    let n = if group[2] == PAD {
        1
    } else if group[3] == PAD {
        2
    } else {
        3
    };
    (out, n)
}

/// Upper bound on the decoded size of `n` encoded bytes.
pub fn decoded_len(n: usize) -> usize {
    n / 4 * 3
}

/// Decodes `src` into `dst`, returning the number of bytes written.
///
/// Decoding stops early when `dst` cannot hold the next group.
///
/// # Example
///
/// ```
/// use freshen_base64::decode_into;
///
/// let mut dst = [0u8; 8];
/// let n = decode_into(b"aGk=", &mut dst);
/// assert_eq!(&dst[..n], b"hi");
/// ```
pub fn decode_into(src: &[u8], dst: &mut [u8]) -> usize {
    let mut len = 0;
    for chunk in src.chunks_exact(4) {
        let (out, n) = decode_group([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if len + n > dst.len() {
            break;
        }
        dst[len..len + n].copy_from_slice(&out[..n]);
        len += n;
        if n < 3 {
            break;
        }
    }
    len
}

/// Decodes `buf` in place; the decoded bytes occupy `buf[..returned]`.
///
/// Each group of four is read before its three output bytes are written,
/// and output never overtakes input.
pub fn decode_in_place(buf: &mut [u8]) -> usize {
    let groups = buf.len() / 4;
    let mut len = 0;
    for g in 0..groups {
        let i = g * 4;
        let (out, n) = decode_group([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        buf[len..len + n].copy_from_slice(&out[..n]);
        len += n;
        if n < 3 {
            break;
        }
    }
    len
}
