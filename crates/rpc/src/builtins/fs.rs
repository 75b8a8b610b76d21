use std::cell::RefCell;
use std::rc::Rc;

use freshen_base64::decode_in_place;
use freshen_json::{
    find, find_bool, find_number, find_string_into, print_buf, print_str, printf, Arg, Kind,
};
use tracing::debug;

use super::fail;
use crate::context::RpcContext;
use crate::error::{codes, RpcError};
use crate::platform::FileSystem;

/// File names longer than this are rejected.
pub const FILENAME_MAX: usize = 50;
/// Chunk size when `FS.Get` has no `len`.
pub const FS_GET_DEFAULT_LEN: usize = 512;
/// Largest chunk a single `FS.Get` returns.
pub const FS_GET_MAX_LEN: usize = 16 * 1024;

/// Decodes the string at `path` into `buf`, returning it as `&str`.
fn string_param<'b>(params: &[u8], path: &str, buf: &'b mut [u8; FILENAME_MAX]) -> Option<&'b str> {
    let n = find_string_into(params, path, buf);
    if n == 0 {
        return None;
    }
    std::str::from_utf8(&buf[..n]).ok()
}

fn usize_param(params: &[u8], path: &str, default: usize) -> usize {
    // Float to int casts saturate, so negatives become 0.
    find_number(params, path, default as f64) as usize
}

pub(super) fn register(ctx: &mut RpcContext, fs: Rc<RefCell<dyn FileSystem>>) -> Result<(), RpcError> {
    let fs_list = fs.clone();
    ctx.register("FS.List", move |req| {
        let names = match fs_list.borrow_mut().list() {
            Ok(names) => names,
            Err(e) => return fail(req.out, -1, &format!("list failed: {e}")),
        };
        print_buf(req.out, b"[");
        let mut first = true;
        for name in names.iter().filter(|n| *n != "." && *n != "..") {
            if !first {
                print_buf(req.out, b",");
            }
            print_str(req.out, name.as_bytes());
            first = false;
        }
        print_buf(req.out, b"]");
        Ok(())
    })?;

    let fs_remove = fs.clone();
    ctx.register("FS.Remove", move |req| {
        let mut name = [0u8; FILENAME_MAX];
        let Some(name) = string_param(req.params, "$.filename", &mut name) else {
            return fail(req.out, codes::BAD_PARAMS, "filename is required");
        };
        if let Err(e) = fs_remove.borrow_mut().remove(name) {
            debug!(name, error = %e, "FS.Remove failed");
            return fail(req.out, -1, "remove failed");
        }
        print_buf(req.out, b"true");
        Ok(())
    })?;

    let fs_rename = fs.clone();
    ctx.register("FS.Rename", move |req| {
        let (mut src, mut dst) = ([0u8; FILENAME_MAX], [0u8; FILENAME_MAX]);
        let (Some(src), Some(dst)) = (
            string_param(req.params, "$.src", &mut src),
            string_param(req.params, "$.dst", &mut dst),
        ) else {
            return fail(req.out, codes::BAD_PARAMS, "src and dst are required");
        };
        if let Err(e) = fs_rename.borrow_mut().rename(src, dst) {
            debug!(src, dst, error = %e, "FS.Rename failed");
            return fail(req.out, -1, "rename failed");
        }
        print_buf(req.out, b"true");
        Ok(())
    })?;

    let fs_get = fs.clone();
    ctx.register("FS.Get", move |req| {
        let mut name = [0u8; FILENAME_MAX];
        let Some(name) = string_param(req.params, "$.filename", &mut name) else {
            return fail(req.out, codes::BAD_PARAMS, "filename is required");
        };
        let offset = usize_param(req.params, "$.offset", 0);
        let len = usize_param(req.params, "$.len", FS_GET_DEFAULT_LEN).min(FS_GET_MAX_LEN);

        let mut chunk = vec![0u8; len];
        let (n, size) = match fs_get.borrow_mut().read_chunk(name, offset as u64, &mut chunk) {
            Ok(read) => read,
            Err(e) => {
                debug!(name, error = %e, "FS.Get failed");
                return fail(req.out, -2, "cannot open file");
            }
        };
        let left = size.saturating_sub(offset as u64 + n as u64);
        printf(
            req.out,
            "{%Q:%V,%Q:%d}",
            &[
                Arg::Str("data"),
                Arg::Bytes(&chunk[..n]),
                Arg::Str("left"),
                Arg::Int(i64::try_from(left).unwrap_or(i64::MAX)),
            ],
        )
        .map(|_| ())
        .map_err(|_| codes::INTERNAL)
    })?;

    ctx.register("FS.Put", move |req| {
        let mut name = [0u8; FILENAME_MAX];
        let name = string_param(req.params, "$.filename", &mut name);
        let data = find(req.params, "$.data").filter(|f| f.kind == Kind::String);
        let (Some(name), Some(data)) = (name, data) else {
            return fail(req.out, codes::BAD_PARAMS, "data and filename are required");
        };
        let append = find_bool(req.params, "$.append", false);

        let encoded = &mut req.params[data.start + 1..data.start + data.len - 1];
        let n = decode_in_place(encoded);
        match fs.borrow_mut().write_chunk(name, &encoded[..n], append) {
            Ok(written) => printf(req.out, "{%Q:%d}", &[Arg::Str("written"), Arg::Int(written as i64)])
                .map(|_| ())
                .map_err(|_| codes::INTERNAL),
            Err(e) => {
                debug!(name, error = %e, "FS.Put failed");
                fail(req.out, codes::FAILED, "write failed")
            }
        }
    })
}
