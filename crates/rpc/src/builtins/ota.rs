use freshen_base64::decode_in_place;
use freshen_json::{find, find_number, print_buf, Kind};
use tracing::warn;

use super::fail;
use crate::context::RpcContext;
use crate::error::{codes, RpcError};
use crate::ota::SharedOta;

/// Reads `success` as a boolean, or as a number where non-zero is true.
fn success_param(params: &[u8]) -> Option<bool> {
    match find(params, "$.success")?.kind {
        Kind::True => Some(true),
        Kind::False => Some(false),
        Kind::Number => Some(find_number(params, "$.success", 0.0) != 0.0),
        _ => None,
    }
}

pub(super) fn register(ctx: &mut RpcContext, ota: SharedOta) -> Result<(), RpcError> {
    let ota_begin = ota.clone();
    ctx.register("OTA.Begin", move |req| match ota_begin.borrow_mut().begin() {
        Ok(()) => {
            print_buf(req.out, b"true");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "OTA.Begin failed");
            print_buf(req.out, b"false");
            Err(-1)
        }
    })?;

    let ota_write = ota.clone();
    ctx.register("OTA.Write", move |req| {
        let Some(data) = find(req.params, "$").filter(|f| f.kind == Kind::String) else {
            return fail(req.out, codes::BAD_PARAMS, "expecting base64 encoded data");
        };
        let encoded = &mut req.params[data.start + 1..data.start + data.len - 1];
        let n = decode_in_place(encoded);
        if let Err(e) = ota_write.borrow_mut().write(&encoded[..n]) {
            warn!(error = %e, "OTA.Write failed");
            return fail(req.out, codes::FAILED, "write failed");
        }
        print_buf(req.out, b"true");
        Ok(())
    })?;

    ctx.register("OTA.End", move |req| {
        let Some(success) = success_param(req.params) else {
            return fail(req.out, codes::BAD_PARAMS, "bad args");
        };
        if let Err(e) = ota.borrow_mut().end(success) {
            warn!(error = %e, success, "OTA.End failed");
            return fail(req.out, codes::FAILED, "failed");
        }
        print_buf(req.out, b"true");
        Ok(())
    })
}
