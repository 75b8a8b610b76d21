//! Method registry and request processing.

use freshen_json::{find_range, find_string, print_buf, printf, Arg, DynamicBuf, Output};
use tracing::{debug, warn};

use crate::error::{codes, RpcError, Status};

/// Handler outcome: `Err(code)` becomes an error envelope with that code.
pub type MethodResult = Result<(), i32>;

pub type Handler = dyn FnMut(&mut Request<'_>) -> MethodResult;

/// One call as seen by a handler.
pub struct Request<'a> {
    /// Raw `params` value (empty when absent). Handlers may rewrite it in
    /// place, e.g. to decode base64 payloads.
    pub params: &'a mut [u8],
    /// Sink for the result value, or the error message on failure.
    pub out: &'a mut dyn Output,
    methods: &'a [String],
}

impl<'a> Request<'a> {
    /// Names of all registered methods, in registration order.
    pub fn methods(&self) -> &'a [String] {
        self.methods
    }
}

/// Capability to flush one encoded response frame to the transport.
pub trait FrameSender {
    /// Sends `frame`, returning the number of bytes accepted.
    fn send_frame(&mut self, frame: &[u8]) -> usize;
}

impl<F: FnMut(&[u8]) -> usize> FrameSender for F {
    fn send_frame(&mut self, frame: &[u8]) -> usize {
        self(frame)
    }
}

/// Registry of named methods.
///
/// Names are unique; lookup is a linear scan in registration order.
#[derive(Default)]
pub struct RpcContext {
    names: Vec<String>,
    handlers: Vec<Box<Handler>>,
}

impl RpcContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, handler: F) -> Result<(), RpcError>
    where
        F: FnMut(&mut Request<'_>) -> MethodResult + 'static,
    {
        if self.names.iter().any(|n| n == name) {
            return Err(RpcError::DuplicateMethod(name.to_string()));
        }
        self.names.push(name.to_string());
        self.handlers.push(Box::new(handler));
        Ok(())
    }

    pub fn methods(&self) -> &[String] {
        &self.names
    }

    /// Processes one request object held in `request`.
    ///
    /// `params` are passed to the handler as a mutable slice of `request`.
    /// A response frame is handed to `sender` only when the request carries
    /// an `id`.
    pub fn process(
        &mut self,
        request: &mut [u8],
        sender: &mut dyn FrameSender,
    ) -> Result<Status, RpcError> {
        let method = find_string(request, "$.method")
            .filter(|m| !m.is_empty())
            .ok_or(RpcError::InvalidInput)?;
        let id = find_range(request, "$.id");
        let params = find_range(request, "$.params");

        let Some(index) = self.names.iter().position(|n| *n == method) else {
            debug!(%method, "method not found");
            if let Some(id) = id {
                let mut frame = DynamicBuf::new();
                write_error(&mut frame, &request[id], codes::NOT_FOUND, b"\"method not found\"")?;
                send(sender, &frame);
            }
            return Ok(Status::NotFound);
        };

        let mut result = DynamicBuf::new();
        let mut no_params = [0u8; 0];
        let outcome = {
            let params = match params {
                Some(range) => &mut request[range],
                None => &mut no_params[..],
            };
            let mut req = Request {
                params,
                out: &mut result,
                methods: &self.names,
            };
            let handler = &mut self.handlers[index];
            handler(&mut req)
        };
        let status = match outcome {
            Ok(()) => Status::Success,
            Err(code) => {
                warn!(%method, code, "method failed");
                Status::Failed(code)
            }
        };
        debug!(%method, ?status, notification = id.is_none(), "dispatched");

        let Some(id) = id else {
            return Ok(status);
        };
        let value = if result.is_empty() {
            &b"null"[..]
        } else {
            result.as_bytes()
        };
        let mut frame = DynamicBuf::new();
        match status {
            Status::Failed(code) => write_error(&mut frame, &request[id], code, value)?,
            _ => write_result(&mut frame, &request[id], value)?,
        };
        send(sender, &frame);
        Ok(status)
    }
}

fn send(sender: &mut dyn FrameSender, frame: &DynamicBuf) {
    let sent = sender.send_frame(frame.as_bytes());
    if sent < frame.len() {
        warn!(sent, len = frame.len(), "response frame truncated");
    }
}

fn write_result(out: &mut dyn Output, id: &[u8], value: &[u8]) -> Result<usize, RpcError> {
    let result = |out: &mut dyn Output| print_buf(out, value);
    Ok(printf(
        out,
        "{%Q:%.*s,%Q:%M}",
        &[Arg::Str("id"), Arg::Bytes(id), Arg::Str("result"), Arg::Fmt(&result)],
    )?)
}

fn write_error(
    out: &mut dyn Output,
    id: &[u8],
    code: i32,
    message: &[u8],
) -> Result<usize, RpcError> {
    Ok(printf(
        out,
        "{%Q:%.*s,%Q:{%Q:%d,%Q:%.*s}}",
        &[
            Arg::Str("id"),
            Arg::Bytes(id),
            Arg::Str("error"),
            Arg::Str("code"),
            Arg::Int(code.into()),
            Arg::Str("message"),
            Arg::Bytes(message),
        ],
    )?)
}
