//! WebSocket frame decoder (RFC 6455).

use super::frames::{WsFrameHeader, WsFrameOpcode};

/// Error type for WebSocket frame decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WsFrameDecodingError {
    #[error("reserved opcode {0:#x}")]
    UnknownOpcode(u8),
    #[error("control frame is fragmented or longer than 125 bytes")]
    InvalidControlFrame,
    #[error("frame length {0} is not addressable")]
    TooLong(u64),
}

/// Parses the frame header at the start of `buf`.
///
/// Returns `Ok(None)` until the whole header (including the masking key)
/// is buffered. The payload is not required to be present.
pub fn read_frame_header(buf: &[u8]) -> Result<Option<WsFrameHeader>, WsFrameDecodingError> {
    let [b0, b1, rest @ ..] = buf else {
        return Ok(None);
    };
    let fin = b0 & 0x80 != 0;
    let opcode = WsFrameOpcode::from_u8(b0 & 0x0f)
        .ok_or(WsFrameDecodingError::UnknownOpcode(b0 & 0x0f))?;
    let masked = b1 & 0x80 != 0;

    let (length, ext_len) = match b1 & 0x7f {
        126 => match rest {
            [hi, lo, ..] => (u64::from(u16::from_be_bytes([*hi, *lo])), 2),
            _ => return Ok(None),
        },
        127 => match rest.get(..8) {
            Some(bytes) => {
                let mut be = [0u8; 8];
                be.copy_from_slice(bytes);
                (u64::from_be_bytes(be), 8)
            }
            None => return Ok(None),
        },
        n => (u64::from(n), 0),
    };

    if opcode.is_control() && (!fin || length > 125) {
        return Err(WsFrameDecodingError::InvalidControlFrame);
    }
    let header_len = 2 + ext_len + if masked { 4 } else { 0 };
    let length = usize::try_from(length)
        .ok()
        .filter(|n| n.checked_add(header_len).is_some())
        .ok_or(WsFrameDecodingError::TooLong(length))?;

    let mask = if masked {
        match rest.get(ext_len..ext_len + 4) {
            Some(key) => Some([key[0], key[1], key[2], key[3]]),
            None => return Ok(None),
        }
    } else {
        None
    };

    Ok(Some(WsFrameHeader {
        fin,
        opcode,
        length,
        mask,
        header_len,
    }))
}

/// XORs `payload` with `mask` in place. A no-op for unmasked frames.
pub fn unmask(mask: Option<[u8; 4]>, payload: &mut [u8]) {
    if let Some(key) = mask {
        for (i, b) in payload.iter_mut().enumerate() {
            *b ^= key[i & 3];
        }
    }
}
