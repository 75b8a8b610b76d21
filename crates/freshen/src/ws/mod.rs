//! WebSocket framing (RFC 6455), client side.
//!
//! The decoder works on a borrowed input buffer and unmasks payloads in
//! place; the encoder always masks, as clients must.

mod decoder;
mod encoder;
mod frames;

pub use decoder::{read_frame_header, unmask, WsFrameDecodingError};
pub use encoder::{WsFrameEncoder, CLIENT_MASK};
pub use frames::{WsFrameHeader, WsFrameOpcode};
