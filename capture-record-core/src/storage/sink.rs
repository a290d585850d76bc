//! Output destinations for the FLAC encoder.
//!
//! The encoder writes its header first, streams frames, and at finish
//! rewinds to patch STREAMINFO and the seek table. Any destination that can
//! `write`, `seek` and `tell` can receive a stream.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Minimal byte sink with absolute seeking.
pub trait StreamSink: Send {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Moves the write position to `offset` bytes from the start.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    fn tell(&mut self) -> io::Result<u64>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapter over a seekable writer that adds every byte extending the
/// stream to a shared counter.
///
/// Header patches rewrite bytes that were already counted, so only growth
/// past the furthest written position is added.
pub struct ByteCountingSink<W> {
    inner: W,
    counter: Arc<AtomicU64>,
    position: u64,
    end: u64,
}

impl<W: Write + Seek + Send> ByteCountingSink<W> {
    pub fn new(mut inner: W, counter: Arc<AtomicU64>) -> io::Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self {
            inner,
            counter,
            position,
            end: position,
        })
    }

    pub fn counter(&self) -> &Arc<AtomicU64> {
        &self.counter
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek + Send> StreamSink for ByteCountingSink<W> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let result = self.inner.write_all(bytes);
        if result.is_ok() {
            self.position += bytes.len() as u64;
        } else {
            // A failed write_all may have written a prefix of `bytes`.
            match self.inner.stream_position() {
                Ok(position) => self.position = position,
                Err(_) => return result,
            }
        }
        if self.position > self.end {
            self.counter
                .fetch_add(self.position - self.end, Ordering::Relaxed);
            self.end = self.position;
        }
        result
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Where an encoder sends its bytes.
pub enum OutputSink {
    /// A duplicate of a caller-owned file. The caller keeps and closes its
    /// own handle.
    File(File),
    /// A caller-provided stream.
    Stream(Box<dyn StreamSink>),
}

impl OutputSink {
    pub fn file(file: &File) -> io::Result<Self> {
        file.try_clone().map(Self::File)
    }

    pub fn stream(sink: impl StreamSink + 'static) -> Self {
        Self::Stream(Box::new(sink))
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Self::File(file) => file.write_all(bytes),
            Self::Stream(sink) => sink.write(bytes),
        }
    }

    pub(crate) fn seek(&mut self, offset: u64) -> io::Result<()> {
        match self {
            Self::File(file) => file.seek(SeekFrom::Start(offset)).map(|_| ()),
            Self::Stream(sink) => sink.seek(offset),
        }
    }

    pub(crate) fn tell(&mut self) -> io::Result<u64> {
        match self {
            Self::File(file) => file.stream_position(),
            Self::Stream(sink) => sink.tell(),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(file) => file.flush(),
            Self::Stream(sink) => sink.flush(),
        }
    }
}
