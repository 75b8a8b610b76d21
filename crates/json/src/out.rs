//! Output sinks.
//!
//! Every printer writes through [`Output::append`], which reports how many
//! bytes were actually stored. A short count means the sink is full (fixed
//! buffer), out of memory (growable buffer) or failed (stream).

use std::io::Write;

/// Append-only byte sink.
pub trait Output {
    /// Appends `bytes`, returning how many were written.
    fn append(&mut self, bytes: &[u8]) -> usize;
}

impl<O: Output + ?Sized> Output for &mut O {
    fn append(&mut self, bytes: &[u8]) -> usize {
        (**self).append(bytes)
    }
}

/// Sink over a caller-provided slice.
///
/// Writes past the end are truncated and set the overflow flag.
///
/// # Example
///
/// ```
/// use freshen_json::{FixedBuf, Output};
///
/// let mut storage = [0u8; 4];
/// let mut out = FixedBuf::new(&mut storage);
/// assert_eq!(out.append(b"abcdef"), 4);
/// assert!(out.overflowed());
/// assert_eq!(out.as_bytes(), b"abcd");
/// ```
pub struct FixedBuf<'a> {
    buf: &'a mut [u8],
    len: usize,
    overflow: bool,
}

impl<'a> FixedBuf<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            overflow: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Output for FixedBuf<'_> {
    fn append(&mut self, bytes: &[u8]) -> usize {
        let room = self.buf.len() - self.len;
        let n = bytes.len().min(room);
        if n < bytes.len() {
            self.overflow = true;
        }
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        n
    }
}

/// Growable in-memory sink.
///
/// An append that cannot allocate writes nothing and returns 0.
#[derive(Debug, Default, Clone)]
pub struct DynamicBuf {
    buf: Vec<u8>,
}

impl DynamicBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

impl Output for DynamicBuf {
    fn append(&mut self, bytes: &[u8]) -> usize {
        if self.buf.try_reserve(bytes.len()).is_err() {
            return 0;
        }
        self.buf.extend_from_slice(bytes);
        bytes.len()
    }
}

/// Sink over any [`Write`] implementation.
#[derive(Debug)]
pub struct StreamOut<W> {
    inner: W,
}

impl<W: Write> StreamOut<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Output for StreamOut<W> {
    fn append(&mut self, bytes: &[u8]) -> usize {
        match self.inner.write_all(bytes) {
            Ok(()) => bytes.len(),
            Err(_) => 0,
        }
    }
}
