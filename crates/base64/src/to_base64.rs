//! Standard base64 encoding functions.

use crate::constants::{ALPHABET_BYTES, PAD};

/// Pre-computed two-character lookup table for base64 encoding.
/// Each entry is two bytes (big-endian) representing two base64 characters.
static TABLE2: [[u8; 2]; 4096] = {
    let mut table = [[0u8; 2]; 4096];
    let mut i = 0;
    while i < 64 {
        let mut j = 0;
        while j < 64 {
            let idx = i * 64 + j;
            table[idx][0] = ALPHABET_BYTES[i];
            table[idx][1] = ALPHABET_BYTES[j];
            j += 1;
        }
        i += 1;
    }
    table
};

/// Length of the padded encoding of `n` input bytes.
pub fn encoded_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}

/// Encodes `input` and appends the padded base64 text to `out`.
///
/// Returns the number of bytes appended.
pub fn write_base64(input: &[u8], out: &mut Vec<u8>) -> usize {
    let start = out.len();
    out.reserve(encoded_len(input.len()));

    let mut chunks = input.chunks_exact(3);
    for chunk in &mut chunks {
        let v1 = ((chunk[0] as usize) << 4) | ((chunk[1] as usize) >> 4);
        let v2 = (((chunk[1] & 0b1111) as usize) << 8) | (chunk[2] as usize);
        out.extend_from_slice(&TABLE2[v1]);
        out.extend_from_slice(&TABLE2[v2]);
    }

    match *chunks.remainder() {
        [o1] => {
            let v1 = (o1 as usize) << 4;
            out.extend_from_slice(&TABLE2[v1]);
            out.extend_from_slice(&[PAD, PAD]);
        }
        [o1, o2] => {
            let v1 = ((o1 as usize) << 4) | ((o2 as usize) >> 4);
            let v2 = ((o2 & 0b1111) as usize) << 2;
            out.extend_from_slice(&TABLE2[v1]);
            out.push(ALPHABET_BYTES[v2]);
            out.push(PAD);
        }
        _ => {}
    }

    out.len() - start
}

/// Encodes a byte slice to a standard base64 string.
///
/// # Example
///
/// ```
/// use freshen_base64::to_base64;
///
/// let encoded = to_base64(b"hello world");
/// assert_eq!(encoded, "aGVsbG8gd29ybGQ=");
/// ```
pub fn to_base64(input: &[u8]) -> String {
    let mut out = Vec::with_capacity(encoded_len(input.len()));
    write_base64(input, &mut out);
    // The alphabet and padding are ASCII.
    out.into_iter().map(char::from).collect()
}
