//! Standard device methods.
//!
//! [`register_all`] installs, in order: `Sys.GetInfo`, `RPC.List`,
//! `FS.List`, `FS.Remove`, `FS.Rename`, `FS.Get`, `FS.Put`, `OTA.Begin`,
//! `OTA.Write` and `OTA.End`.

mod fs;
mod ota;
mod sys;

use std::cell::RefCell;
use std::rc::Rc;

use freshen_json::{print_str, Output};

use crate::context::{MethodResult, RpcContext};
use crate::error::RpcError;
use crate::ota::SharedOta;
use crate::platform::FileSystem;

pub use fs::{FILENAME_MAX, FS_GET_DEFAULT_LEN, FS_GET_MAX_LEN};
pub use sys::DeviceInfo;

pub fn register_all(
    ctx: &mut RpcContext,
    info: DeviceInfo,
    fs: Rc<RefCell<dyn FileSystem>>,
    ota: SharedOta,
) -> Result<(), RpcError> {
    sys::register(ctx, info)?;
    fs::register(ctx, fs)?;
    ota::register(ctx, ota)
}

/// Prints `message` as the error message and fails with `code`.
fn fail(out: &mut dyn Output, code: i32, message: &str) -> MethodResult {
    print_str(out, message.as_bytes());
    Err(code)
}
