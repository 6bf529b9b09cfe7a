//! Output sinks for extracted payload bytes.
//!
//! The extraction pipeline only appends: a sink never needs to seek. Two
//! strategies are provided; callers pick one based on where the image should
//! land (a stream such as a file or stdout, or a pre-sized buffer).

use std::io::{self, Write};

/// Write-only, append-only destination for decoded payload bytes.
pub trait PayloadSink {
    /// Append one decoded payload. Must write all bytes or fail.
    fn put(&mut self, payload: &[u8]) -> io::Result<()>;
}

/// Streaming sink over any [`io::Write`] (file, stdout, network pipe).
pub struct WriterSink<W: Write> {
    inner: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Flush and hand the writer back.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> PayloadSink for WriterSink<W> {
    fn put(&mut self, payload: &[u8]) -> io::Result<()> {
        self.inner.write_all(payload)
    }
}

/// Sink over a caller-pre-sized buffer (e.g. a mapped region).
///
/// The buffer is exclusively borrowed for the duration of the extraction;
/// the sink never grows it. Overflow is an I/O fault, not a panic.
pub struct SliceSink<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl<'a> SliceSink<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, written: 0 }
    }

    /// Bytes appended so far.
    pub fn bytes_written(&self) -> usize {
        self.written
    }
}

impl PayloadSink for SliceSink<'_> {
    fn put(&mut self, payload: &[u8]) -> io::Result<()> {
        let end = self.written + payload.len();
        if end > self.buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "payload exceeds pre-sized output buffer",
            ));
        }
        self.buf[self.written..end].copy_from_slice(payload);
        self.written = end;
        Ok(())
    }
}
