//! WebSocket frame header and opcodes.

use std::ops::Range;

/// Frame opcodes (RFC 6455 §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WsFrameOpcode {
    Continue = 0,
    Text = 1,
    Binary = 2,
    Close = 8,
    Ping = 9,
    Pong = 10,
}

impl WsFrameOpcode {
    /// Opcodes at or above this value are control frames.
    pub const MIN_CONTROL_OPCODE: u8 = 8;

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Continue,
            1 => Self::Text,
            2 => Self::Binary,
            8 => Self::Close,
            9 => Self::Ping,
            10 => Self::Pong,
            _ => return None,
        })
    }

    pub fn is_control(self) -> bool {
        self as u8 >= Self::MIN_CONTROL_OPCODE
    }
}

/// WebSocket frame header (RFC 6455 §5.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsFrameHeader {
    pub fin: bool,
    pub opcode: WsFrameOpcode,
    /// Payload length.
    pub length: usize,
    /// Masking key, if the mask bit was set.
    pub mask: Option<[u8; 4]>,
    /// Encoded header size, including the masking key.
    pub header_len: usize,
}

impl WsFrameHeader {
    /// Header plus payload.
    pub fn frame_len(&self) -> usize {
        self.header_len + self.length
    }

    /// Payload position relative to the start of the frame.
    pub fn payload_range(&self) -> Range<usize> {
        self.header_len..self.frame_len()
    }
}
