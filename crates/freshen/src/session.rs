//! Poll-driven WebSocket session carrying RPC frames.
//!
//! Each [`Session::poll`] performs one bounded step: connect (subject to a
//! reconnect cooldown), send the upgrade request, buffer the HTTP response,
//! then decode and dispatch every complete frame. Any transport failure
//! tears the connection down; the next poll after the cooldown reconnects.

use std::time::{Duration, Instant};

use freshen_rpc::RpcContext;
use tracing::{debug, info, warn};

use crate::transport::{Connection, Connector, Endpoint, TransportError};
use crate::ws::{read_frame_header, unmask, WsFrameEncoder, WsFrameOpcode};

/// Capacity of the input buffer. Frames must fit in it whole.
pub const IN_BUF_SIZE: usize = 4096;
pub const DEFAULT_RECONNECT_COOLDOWN: Duration = Duration::from_secs(3);

const WS_KEY: &str = "p0EAAPE61hDZrLdgKgy1Og==";
const WS_PROTOCOL: &str = "dash.freshen.cc";
const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    /// Sent as `Authorization: Bearer`.
    pub token: String,
    pub reconnect_cooldown: Duration,
}

impl SessionConfig {
    pub fn new(endpoint: Endpoint, token: impl Into<String>) -> Self {
        Self {
            endpoint,
            token: token.into(),
            reconnect_cooldown: DEFAULT_RECONNECT_COOLDOWN,
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Waiting out the reconnect cooldown.
    Backoff,
    /// Not connected: the connect attempt failed or the connection was torn
    /// down during this poll.
    Disconnected,
    /// Connected, upgrade response not complete yet.
    Pending,
    /// Established, no complete frame this time.
    Idle,
    /// Established, this many frames were processed.
    Exchanged(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    /// The first frame on a fresh connection was processed.
    FirstExchange,
    Disconnected,
}

/// The HTTP upgrade request sent right after connecting.
pub fn handshake_request(endpoint: &Endpoint, token: &str) -> String {
    format!(
        "GET {uri} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Authorization: Bearer {token}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: {WS_KEY}\r\n\
         Sec-WebSocket-Protocol: {WS_PROTOCOL}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Origin: http://{host}\r\n\
         \r\n",
        uri = endpoint.uri,
        host = endpoint.host,
        port = endpoint.port,
    )
}

pub struct Session {
    config: SessionConfig,
    connector: Box<dyn Connector>,
    conn: Option<Box<dyn Connection>>,
    buf: Vec<u8>,
    len: usize,
    is_ws: bool,
    exchanged: bool,
    disconnected_at: Option<Instant>,
    encoder: WsFrameEncoder,
}

impl Session {
    pub fn new(config: SessionConfig, connector: Box<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            conn: None,
            buf: vec![0; IN_BUF_SIZE],
            len: 0,
            is_ws: false,
            exchanged: false,
            disconnected_at: None,
            encoder: WsFrameEncoder::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Connected and past the HTTP upgrade.
    pub fn is_established(&self) -> bool {
        self.conn.is_some() && self.is_ws
    }

    /// Runs one step, reporting state changes through `on_event`.
    pub fn poll(
        &mut self,
        rpc: &mut RpcContext,
        on_event: &mut dyn FnMut(SessionEvent),
    ) -> PollOutcome {
        if self.conn.is_none() {
            return self.connect(on_event);
        }
        match self.step(rpc, on_event) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.teardown(&e);
                on_event(SessionEvent::Disconnected);
                PollOutcome::Disconnected
            }
        }
    }

    /// Sends a device-initiated frame, returning the payload length sent.
    ///
    /// Returns `Ok(0)` while the session is not established. A send failure
    /// tears the connection down.
    pub fn notify(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        if !self.is_established() {
            debug!(len = frame.len(), "notification dropped, not connected");
            return Ok(0);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Ok(0);
        };
        debug!(frame = %String::from_utf8_lossy(frame), "ws out");
        match conn.send(&self.encoder.encode_text(frame)) {
            Ok(_) => Ok(frame.len()),
            Err(e) => {
                self.teardown(&e);
                Err(e)
            }
        }
    }

    /// Sends a normal-closure Close frame, if established, and drops the
    /// connection.
    pub fn close(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if self.is_ws {
            if let Err(e) = conn.send(&self.encoder.encode_close("", CLOSE_NORMAL)) {
                debug!(error = %e, "close frame not sent");
            }
        }
        info!(endpoint = %self.config.endpoint, "connection closed");
        conn.close();
        self.len = 0;
        self.is_ws = false;
        self.disconnected_at = Some(Instant::now());
    }

    fn connect(&mut self, on_event: &mut dyn FnMut(SessionEvent)) -> PollOutcome {
        if let Some(at) = self.disconnected_at {
            if at.elapsed() < self.config.reconnect_cooldown {
                return PollOutcome::Backoff;
            }
        }
        let endpoint = &self.config.endpoint;
        info!(%endpoint, "connecting");
        let mut conn = match self.connector.connect(endpoint) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(%endpoint, error = %e, "connect failed");
                self.disconnected_at = Some(Instant::now());
                return PollOutcome::Disconnected;
            }
        };
        let request = handshake_request(endpoint, &self.config.token);
        if let Err(e) = conn.send(request.as_bytes()) {
            warn!(%endpoint, error = %e, "sending upgrade request failed");
            conn.close();
            self.disconnected_at = Some(Instant::now());
            return PollOutcome::Disconnected;
        }
        debug!(%endpoint, "upgrade request sent");
        self.conn = Some(conn);
        self.len = 0;
        self.is_ws = false;
        self.exchanged = false;
        on_event(SessionEvent::Connected);
        PollOutcome::Pending
    }

    fn step(
        &mut self,
        rpc: &mut RpcContext,
        on_event: &mut dyn FnMut(SessionEvent),
    ) -> Result<PollOutcome, TransportError> {
        if self.len == self.buf.len() {
            return Err(TransportError::BufferFull);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Ok(PollOutcome::Disconnected);
        };
        let n = conn.recv(&mut self.buf[self.len..])?;
        self.len += n;

        if !self.is_ws {
            let Some(end) = find_terminator(&self.buf[..self.len]) else {
                if self.len == self.buf.len() {
                    return Err(TransportError::BufferFull);
                }
                return Ok(PollOutcome::Pending);
            };
            let status = self.buf[..end].split(|&b| b == b'\r').next().unwrap_or_default();
            info!(status = %String::from_utf8_lossy(status), "websocket established");
            self.consume(end + 4);
            self.is_ws = true;
        }

        let frames = self.process_frames(rpc)?;
        if frames == 0 {
            return Ok(PollOutcome::Idle);
        }
        if !self.exchanged {
            self.exchanged = true;
            on_event(SessionEvent::FirstExchange);
        }
        Ok(PollOutcome::Exchanged(frames))
    }

    /// Handles every complete frame in the buffer and shifts them out.
    fn process_frames(&mut self, rpc: &mut RpcContext) -> Result<usize, TransportError> {
        let Self {
            conn,
            buf,
            len,
            encoder,
            ..
        } = self;
        let Some(conn) = conn.as_mut() else {
            return Ok(0);
        };

        let mut pos = 0;
        let mut count = 0;
        while let Some(header) = read_frame_header(&buf[pos..*len])? {
            if header.frame_len() > buf.len() {
                return Err(TransportError::BufferFull);
            }
            if pos + header.frame_len() > *len {
                break;
            }
            let frame = &mut buf[pos..pos + header.frame_len()];
            let payload = &mut frame[header.payload_range()];
            unmask(header.mask, payload);
            pos += header.frame_len();
            count += 1;

            match header.opcode {
                WsFrameOpcode::Ping => {
                    debug!(len = payload.len(), "ping");
                    conn.send(&encoder.encode_pong(payload))?;
                }
                WsFrameOpcode::Close => return Err(TransportError::CloseReceived),
                WsFrameOpcode::Text | WsFrameOpcode::Binary => {
                    let end = payload.iter().rposition(|&b| b == b'}').map_or(0, |i| i + 1);
                    let request = &mut payload[..end];
                    debug!(frame = %String::from_utf8_lossy(request), "ws in");

                    let mut send_error = None;
                    let mut sender = |reply: &[u8]| {
                        debug!(frame = %String::from_utf8_lossy(reply), "ws out");
                        match conn.send(&encoder.encode_text(reply)) {
                            Ok(_) => reply.len(),
                            Err(e) => {
                                send_error = Some(e);
                                0
                            }
                        }
                    };
                    if let Err(e) = rpc.process(request, &mut sender) {
                        debug!(error = %e, "request dropped");
                    }
                    if let Some(e) = send_error {
                        return Err(e);
                    }
                }
                WsFrameOpcode::Pong | WsFrameOpcode::Continue => {
                    debug!(opcode = ?header.opcode, "frame ignored");
                }
            }
        }

        buf.copy_within(pos..*len, 0);
        *len -= pos;
        Ok(count)
    }

    fn consume(&mut self, n: usize) {
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    fn teardown(&mut self, reason: &TransportError) {
        warn!(endpoint = %self.config.endpoint, error = %reason, "connection closed");
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.len = 0;
        self.is_ws = false;
        self.disconnected_at = Some(Instant::now());
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_request_bytes() {
        let endpoint = Endpoint::parse("wss://dash.freshen.cc/api/v2/rpc").unwrap();
        assert_eq!(
            handshake_request(&endpoint, "secret"),
            "GET /api/v2/rpc HTTP/1.1\r\n\
             Host: dash.freshen.cc:443\r\n\
             Authorization: Bearer secret\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Sec-WebSocket-Key: p0EAAPE61hDZrLdgKgy1Og==\r\n\
             Sec-WebSocket-Protocol: dash.freshen.cc\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Origin: http://dash.freshen.cc\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_find_terminator() {
        assert_eq!(find_terminator(b"HTTP/1.1 101\r\n\r\nrest"), Some(12));
        assert_eq!(find_terminator(b"HTTP/1.1 101\r\n\r"), None);
        assert_eq!(find_terminator(b""), None);
    }
}
