//! Single-producer/single-consumer byte ring shared between the capture
//! producer and one channel writer thread.
//!
//! Built on `rtrb`, whose cursors are monotonic and lock-free. The consumer
//! side only ever hands out complete runs: [`RingConsumer::read_ptr`]
//! returns exactly the requested number of bytes or nothing.

use rtrb::chunks::ReadChunk;
use rtrb::{Consumer, Producer, RingBuffer};

/// Creates a ring holding up to `capacity` bytes.
pub fn byte_ring(capacity: usize) -> (RingProducer, RingConsumer) {
    let (producer, consumer) = RingBuffer::<u8>::new(capacity);
    (
        RingProducer {
            inner: producer,
            capacity,
        },
        RingConsumer {
            inner: consumer,
            capacity,
        },
    )
}

/// Writing half of a byte ring.
pub struct RingProducer {
    inner: Producer<u8>,
    capacity: usize,
}

impl RingProducer {
    /// Appends `bytes` if they fit entirely; nothing is written otherwise.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        match self.inner.write_chunk_uninit(bytes.len()) {
            Ok(chunk) => {
                chunk.fill_from_iter(bytes.iter().copied());
                true
            }
            Err(_) => false,
        }
    }

    /// Bytes that can be written right now.
    pub fn free(&self) -> usize {
        self.inner.slots()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Reading half of a byte ring.
pub struct RingConsumer {
    inner: Consumer<u8>,
    capacity: usize,
}

impl RingConsumer {
    /// Bytes written by the producer and not yet consumed.
    pub fn available(&self) -> usize {
        self.inner.slots()
    }

    /// Borrows exactly `len` readable bytes, or `None` when fewer are
    /// available. Nothing is consumed until [`RingRead::read_finished`].
    pub fn read_ptr(&mut self, len: usize) -> Option<RingRead<'_>> {
        if len == 0 {
            return None;
        }
        self.inner.read_chunk(len).ok().map(|chunk| RingRead { chunk })
    }

    /// Drops everything currently readable. Returns the number of bytes
    /// discarded.
    pub fn discard_all(&mut self) -> usize {
        let available = self.available();
        match self.inner.read_chunk(available) {
            Ok(chunk) => {
                chunk.commit_all();
                available
            }
            Err(_) => 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A run of readable bytes, possibly split at the wrap point.
pub struct RingRead<'a> {
    chunk: ReadChunk<'a, u8>,
}

impl RingRead<'_> {
    pub fn len(&self) -> usize {
        self.chunk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk.is_empty()
    }

    /// The run as two slices; the second is empty unless the run wraps.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        self.chunk.as_slices()
    }

    /// Replaces the contents of `out` with the run.
    pub fn copy_to(&self, out: &mut Vec<u8>) {
        let (first, second) = self.chunk.as_slices();
        out.clear();
        out.reserve(first.len() + second.len());
        out.extend_from_slice(first);
        out.extend_from_slice(second);
    }

    /// Advances the read cursor past the run, releasing its space to the
    /// producer.
    pub fn read_finished(self) {
        self.chunk.commit_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(consumer: &mut RingConsumer, len: usize) -> Vec<u8> {
        let read = consumer.read_ptr(len).expect("bytes available");
        let mut out = Vec::new();
        read.copy_to(&mut out);
        read.read_finished();
        out
    }

    #[test]
    fn basic_write_read() {
        let (mut tx, mut rx) = byte_ring(16);
        assert!(tx.write(&[1, 2, 3]));

        assert_eq!(rx.available(), 3);
        assert_eq!(read_all(&mut rx, 3), vec![1, 2, 3]);
        assert_eq!(rx.available(), 0);
    }

    #[test]
    fn never_short_reads() {
        let (mut tx, mut rx) = byte_ring(16);
        tx.write(&[1, 2, 3]);

        assert!(rx.read_ptr(4).is_none());
        assert!(rx.read_ptr(0).is_none());
        assert_eq!(rx.available(), 3);
    }

    #[test]
    fn unfinished_read_consumes_nothing() {
        let (mut tx, mut rx) = byte_ring(16);
        tx.write(&[9, 8, 7, 6]);

        let read = rx.read_ptr(2).unwrap();
        assert_eq!(read.len(), 2);
        drop(read);

        assert_eq!(rx.available(), 4);
        assert_eq!(read_all(&mut rx, 4), vec![9, 8, 7, 6]);
    }

    #[test]
    fn full_ring_rejects_whole_write() {
        let (mut tx, mut rx) = byte_ring(4);
        assert!(tx.write(&[1, 2, 3]));
        assert!(!tx.write(&[4, 5]));
        assert_eq!(tx.free(), 1);

        assert_eq!(read_all(&mut rx, 3), vec![1, 2, 3]);
        assert!(tx.write(&[4, 5]));
    }

    #[test]
    fn wraparound_splits_slices() {
        let (mut tx, mut rx) = byte_ring(4);
        tx.write(&[1, 2, 3]);
        read_all(&mut rx, 2);
        tx.write(&[4, 5, 6]);

        let read = rx.read_ptr(4).unwrap();
        let (first, second) = read.as_slices();
        assert_eq!(first, &[3, 4]);
        assert_eq!(second, &[5, 6]);
        read.read_finished();
        assert_eq!(tx.free(), 4);
    }

    #[test]
    fn discard_all_empties_ring() {
        let (mut tx, mut rx) = byte_ring(8);
        tx.write(&[1, 2, 3, 4, 5]);

        assert_eq!(rx.discard_all(), 5);
        assert_eq!(rx.available(), 0);
        assert_eq!(rx.discard_all(), 0);
    }
}
