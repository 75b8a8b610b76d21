//! Capabilities backed by the host operating system.
//!
//! - [`DirFs`] serves one flat directory to the `FS.*` methods.
//! - [`JsonFileKv`] keeps key-value pairs in a JSON object file.
//! - [`HostOta`] stages a new executable and hands over to it.

mod fs;
mod kv;
mod ota;

pub use fs::DirFs;
pub use kv::JsonFileKv;
pub use ota::{HostOta, DEFAULT_COMMIT_TIMEOUT};
