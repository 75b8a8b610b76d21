//! WebSocket frame encoder (RFC 6455).

use super::frames::WsFrameOpcode;

/// Masking key applied to every outbound frame.
pub const CLIENT_MASK: [u8; 4] = [0x71, 0x3e, 0x5a, 0xcc];

/// WebSocket frame encoder.
///
/// `write_*` methods accumulate into [`writer`](Self::writer); `encode_*`
/// methods return the finished frame.
pub struct WsFrameEncoder {
    pub writer: Vec<u8>,
    mask: [u8; 4],
}

impl Default for WsFrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl WsFrameEncoder {
    pub fn new() -> Self {
        Self::with_mask(CLIENT_MASK)
    }

    pub fn with_mask(mask: [u8; 4]) -> Self {
        Self {
            writer: Vec::new(),
            mask,
        }
    }

    /// Takes the accumulated bytes.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.writer)
    }

    /// Encodes a single-frame Text message.
    pub fn encode_text(&mut self, data: &[u8]) -> Vec<u8> {
        self.write_frame(WsFrameOpcode::Text, data);
        self.flush()
    }

    /// Encodes a Pong echoing `data`.
    pub fn encode_pong(&mut self, data: &[u8]) -> Vec<u8> {
        self.write_frame(WsFrameOpcode::Pong, data);
        self.flush()
    }

    /// Encodes a Close frame. `code == 0` with no reason yields an empty
    /// payload.
    pub fn encode_close(&mut self, reason: &str, code: u16) -> Vec<u8> {
        if code == 0 && reason.is_empty() {
            self.write_frame(WsFrameOpcode::Close, &[]);
        } else {
            let mut payload = Vec::with_capacity(2 + reason.len());
            payload.extend_from_slice(&code.to_be_bytes());
            payload.extend_from_slice(reason.as_bytes());
            self.write_frame(WsFrameOpcode::Close, &payload);
        }
        self.flush()
    }

    /// Writes a final, masked frame.
    pub fn write_frame(&mut self, opcode: WsFrameOpcode, data: &[u8]) {
        self.write_hdr(true, opcode, data.len(), self.mask);
        self.write_buf_xor(data, self.mask);
    }

    /// Writes a masked frame header.
    ///
    /// - `length < 126`: 2-byte header
    /// - `length < 65536`: 4-byte header with 16-bit extended length
    /// - otherwise: 10-byte header with 64-bit extended length
    pub fn write_hdr(&mut self, fin: bool, opcode: WsFrameOpcode, length: usize, mask: [u8; 4]) {
        const MASK_BIT: u8 = 0x80;
        let octet1 = ((fin as u8) << 7) | opcode as u8;
        let writer = &mut self.writer;
        writer.push(octet1);
        if length < 126 {
            writer.push(MASK_BIT | length as u8);
        } else if length < 0x1_0000 {
            writer.push(MASK_BIT | 126);
            writer.extend_from_slice(&(length as u16).to_be_bytes());
        } else {
            writer.push(MASK_BIT | 127);
            writer.extend_from_slice(&(length as u64).to_be_bytes());
        }
        writer.extend_from_slice(&mask);
    }

    /// Writes `buf` XOR-masked with `mask`.
    pub fn write_buf_xor(&mut self, buf: &[u8], mask: [u8; 4]) {
        self.writer
            .extend(buf.iter().enumerate().map(|(i, &b)| b ^ mask[i & 3]));
    }
}
