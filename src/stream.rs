//! Seekable byte-stream interfaces consumed by the reader and writer.
//!
//! Anything implementing `Read + Seek` is an [`InputStream`] and anything
//! implementing `Write + Seek` is an [`OutputStream`]. [`ForwardOnly`] wraps a
//! plain `Write` sink that cannot seek; writers over it report
//! [`WavError::NotSeekable`] when they try to rewrite their header.

use crate::error::{Result, WavError};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A readable, seekable byte source.
pub trait InputStream {
    /// Reads until `buf` is full or the stream ends; returns the byte count.
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Current absolute offset.
    fn tell(&mut self) -> io::Result<u64>;

    /// Moves to an absolute offset. Offsets past the end are allowed.
    fn seek_to(&mut self, pos: u64) -> io::Result<()>;

    /// True once the current offset is at or beyond the end of the stream.
    fn is_exhausted(&mut self) -> io::Result<bool>;
}

impl<T: Read + Seek> InputStream for T {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    fn is_exhausted(&mut self) -> io::Result<bool> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if end != pos {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(pos >= end)
    }
}

/// A writable byte sink that may or may not support seeking.
pub trait OutputStream {
    /// Writes the whole buffer.
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Current absolute offset.
    fn tell(&mut self) -> io::Result<u64>;

    /// Moves to an absolute offset, or fails with [`WavError::NotSeekable`].
    fn seek_to(&mut self, pos: u64) -> Result<()>;

    /// Pushes buffered bytes down to the underlying sink.
    fn flush_bytes(&mut self) -> io::Result<()>;
}

impl<T: Write + Seek> OutputStream for T {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn flush_bytes(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// Adapts a non-seekable sink (pipe, socket, stdout) to [`OutputStream`].
///
/// Position is tracked by counting written bytes. Seeking to the current
/// position succeeds; any other target fails with [`WavError::NotSeekable`].
#[derive(Debug)]
pub struct ForwardOnly<W> {
    inner: W,
    position: u64,
}

impl<W: Write> ForwardOnly<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> OutputStream for ForwardOnly<W> {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos == self.position {
            Ok(())
        } else {
            Err(WavError::NotSeekable)
        }
    }

    fn flush_bytes(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
