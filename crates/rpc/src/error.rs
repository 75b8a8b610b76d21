//! RPC error codes and dispatch outcomes.

use freshen_json::FormatError;
use thiserror::Error;

/// Error codes carried in `error.code` of a response envelope.
pub mod codes {
    /// Malformed request.
    pub const INVALID: i32 = -32700;
    /// No method with the requested name.
    pub const NOT_FOUND: i32 = -32601;
    /// Parameters missing or of the wrong type.
    pub const BAD_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32603;
    /// Platform operation (file or OTA write) failed.
    pub const FAILED: i32 = 500;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The request has no usable `method` string. No response is sent.
    #[error("request has no valid method")]
    InvalidInput,
    #[error("method {0:?} is already registered")]
    DuplicateMethod(String),
    #[error("failed to encode response: {0}")]
    Format(#[from] FormatError),
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::InvalidInput => codes::INVALID,
            RpcError::DuplicateMethod(_) | RpcError::Format(_) => codes::INTERNAL,
        }
    }
}

/// Outcome of processing one well-formed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The handler failed with this code.
    Failed(i32),
    NotFound,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::Failed(code) => code,
            Status::NotFound => codes::NOT_FOUND,
        }
    }
}
