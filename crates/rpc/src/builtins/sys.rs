use freshen_json::{print_buf, print_str, printf, Arg};

use crate::context::RpcContext;
use crate::error::{codes, RpcError};

/// Identity reported by `Sys.GetInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub fw_version: String,
    pub arch: String,
    pub fw_id: String,
    pub app: String,
}

impl DeviceInfo {
    /// Host defaults: the OS as architecture tag, the crate version as build
    /// id (overridable at build time with `FRESHEN_BUILD_ID`).
    pub fn new(fw_version: impl Into<String>) -> Self {
        let arch = match std::env::consts::OS {
            "macos" => "darwin",
            os => os,
        };
        Self {
            fw_version: fw_version.into(),
            arch: arch.to_string(),
            fw_id: option_env!("FRESHEN_BUILD_ID")
                .unwrap_or(env!("CARGO_PKG_VERSION"))
                .to_string(),
            app: "posix_device".to_string(),
        }
    }
}

pub(super) fn register(ctx: &mut RpcContext, info: DeviceInfo) -> Result<(), RpcError> {
    ctx.register("Sys.GetInfo", move |req| {
        printf(
            req.out,
            "{%Q:%Q,%Q:%Q,%Q:%Q,%Q:%Q}",
            &[
                Arg::Str("fw_version"),
                Arg::Str(&info.fw_version),
                Arg::Str("arch"),
                Arg::Str(&info.arch),
                Arg::Str("fw_id"),
                Arg::Str(&info.fw_id),
                Arg::Str("app"),
                Arg::Str(&info.app),
            ],
        )
        .map(|_| ())
        .map_err(|_| codes::INTERNAL)
    })?;

    ctx.register("RPC.List", |req| {
        print_buf(req.out, b"[");
        for (i, name) in req.methods().iter().enumerate() {
            if i > 0 {
                print_buf(req.out, b",");
            }
            print_str(req.out, name.as_bytes());
        }
        print_buf(req.out, b"]");
        Ok(())
    })
}
