//! freshen-rpc - JSON-RPC dispatch for the freshen device agent.
//!
//! [`RpcContext`] parses a request buffer with `freshen-json`, runs the
//! matching handler and hands the encoded response envelope to a
//! [`FrameSender`]. The [`builtins`] module provides the standard method
//! set (`Sys.*`, `RPC.*`, `FS.*`, `OTA.*`) on top of the capability traits
//! in [`platform`].
//!
//! # Example
//!
//! ```
//! use freshen_json::print_int;
//! use freshen_rpc::{RpcContext, Status};
//!
//! let mut ctx = RpcContext::new();
//! ctx.register("Math.Answer", |req| {
//!     print_int(req.out, 42);
//!     Ok(())
//! })
//! .unwrap();
//!
//! let mut frames = Vec::new();
//! let mut sender = |frame: &[u8]| {
//!     frames.push(frame.to_vec());
//!     frame.len()
//! };
//! let mut request = br#"{"id":1,"method":"Math.Answer"}"#.to_vec();
//! let status = ctx.process(&mut request, &mut sender).unwrap();
//! assert_eq!(status, Status::Success);
//! assert_eq!(frames, [br#"{"id":1,"result":42}"#.to_vec()]);
//! ```

pub mod builtins;
pub mod context;
pub mod error;
pub mod memory;
pub mod ota;
pub mod platform;

pub use context::{FrameSender, Handler, MethodResult, Request, RpcContext};
pub use error::{codes, RpcError, Status};
pub use ota::{Ota, OtaError, SharedOta, ROLLBACK_KEY};
pub use platform::{FileSystem, ImageId, KvError, KvStore, OtaPlatform};
