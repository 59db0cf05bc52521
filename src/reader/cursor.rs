//! Sequential byte cursor with non-consuming lookahead.

use std::io::{self, Read};

/// A forward-only reader over any byte source with `peek` support and a
/// running byte offset.
///
/// Fixed fields are read through the [`Read`] impl (typically via
/// `byteorder::ReadBytesExt`); [`BufCursor::peek`] fills an internal
/// lookahead buffer without consuming, so the cursor works over purely
/// sequential sources that cannot seek.
pub struct BufCursor<R> {
    inner: R,
    lookahead: Vec<u8>,
    offset: u64,
}

impl<R: Read> BufCursor<R> {
    /// Wraps a byte source.
    pub fn new(inner: R) -> BufCursor<R> {
        BufCursor {
            inner,
            lookahead: Vec::new(),
            offset: 0,
        }
    }

    /// Number of bytes consumed so far. Peeked-but-unconsumed bytes do
    /// not count.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the next `n` bytes without consuming them.
    ///
    /// Fails with `UnexpectedEof` if the source ends before `n` bytes are
    /// available; the bytes already buffered remain readable either way.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let mut byte = [0u8; 1];
        while self.lookahead.len() < n {
            match self.inner.read(&mut byte) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(_) => self.lookahead.push(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(&self.lookahead[..n])
    }

    /// Unwraps the cursor, discarding any lookahead bytes.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for BufCursor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.lookahead.is_empty() {
            let n = buf.len().min(self.lookahead.len());
            buf[..n].copy_from_slice(&self.lookahead[..n]);
            self.lookahead.drain(..n);
            self.offset += n as u64;
            return Ok(n);
        }
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }
}
