//! Capabilities the built-in methods run on.
//!
//! Each trait is implemented once per platform. Shared single-threaded
//! handles (`Rc<RefCell<T>>`) forward to the inner implementation so a
//! test or the agent can keep a handle after moving one into the registry.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use thiserror::Error;

use crate::ota::OtaError;

/// Identifies a firmware image (partition label, executable path).
pub type ImageId = String;

#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("key-value store is corrupt: {0}")]
    Corrupt(String),
}

/// Persistent string key-value store.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key`; `None` removes the key.
    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), KvError>;
}

/// Flat file store served by the `FS.*` methods.
pub trait FileSystem {
    fn list(&mut self) -> io::Result<Vec<String>>;
    fn remove(&mut self, name: &str) -> io::Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;
    /// Reads up to `buf.len()` bytes starting at `offset`. Returns the bytes
    /// read and the total file size.
    fn read_chunk(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> io::Result<(usize, u64)>;
    /// Writes `data`, appending or truncating first. Returns bytes written.
    fn write_chunk(&mut self, name: &str, data: &[u8], append: bool) -> io::Result<usize>;
}

/// Firmware update mechanics.
pub trait OtaPlatform {
    fn running_image(&self) -> ImageId;
    /// Acquires an update target and opens its accumulator.
    fn begin(&mut self) -> Result<ImageId, OtaError>;
    fn write(&mut self, data: &[u8]) -> Result<(), OtaError>;
    /// Closes the accumulator. A failed update discards the target.
    fn finish(&mut self, target: &ImageId, success: bool) -> Result<(), OtaError>;
    /// Selects the image booted by the next restart.
    fn set_boot_image(&mut self, image: &ImageId) -> Result<(), OtaError>;
    /// Records that the running image works; it keeps booting from now on.
    fn mark_valid(&mut self) -> Result<(), OtaError> {
        let running = self.running_image();
        self.set_boot_image(&running)
    }
    /// Boots the selected image. Embedded platforms never return from a
    /// successful restart.
    fn restart(&mut self) -> Result<(), OtaError>;
}

impl<T: KvStore + ?Sized> KvStore for Rc<RefCell<T>> {
    fn get(&self, key: &str) -> Option<String> {
        self.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), KvError> {
        self.borrow_mut().set(key, value)
    }
}

impl<T: FileSystem + ?Sized> FileSystem for Rc<RefCell<T>> {
    fn list(&mut self) -> io::Result<Vec<String>> {
        self.borrow_mut().list()
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        self.borrow_mut().remove(name)
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        self.borrow_mut().rename(from, to)
    }

    fn read_chunk(&mut self, name: &str, offset: u64, buf: &mut [u8]) -> io::Result<(usize, u64)> {
        self.borrow_mut().read_chunk(name, offset, buf)
    }

    fn write_chunk(&mut self, name: &str, data: &[u8], append: bool) -> io::Result<usize> {
        self.borrow_mut().write_chunk(name, data, append)
    }
}

impl<T: OtaPlatform + ?Sized> OtaPlatform for Rc<RefCell<T>> {
    fn running_image(&self) -> ImageId {
        self.borrow().running_image()
    }

    fn begin(&mut self) -> Result<ImageId, OtaError> {
        self.borrow_mut().begin()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), OtaError> {
        self.borrow_mut().write(data)
    }

    fn finish(&mut self, target: &ImageId, success: bool) -> Result<(), OtaError> {
        self.borrow_mut().finish(target, success)
    }

    fn set_boot_image(&mut self, image: &ImageId) -> Result<(), OtaError> {
        self.borrow_mut().set_boot_image(image)
    }

    fn mark_valid(&mut self) -> Result<(), OtaError> {
        self.borrow_mut().mark_valid()
    }

    fn restart(&mut self) -> Result<(), OtaError> {
        self.borrow_mut().restart()
    }
}
