use std::fs::File;
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::shared::WriterShared;
use crate::models::channel::{Channel, SampleLayout};
use crate::models::error::RecordError;
use crate::processing::ring_buffer::RingConsumer;
use crate::processing::sample_format::decode_i32_le;
use crate::storage::encoder_bridge::FlacEncoder;

/// Where a writer thread puts drained blocks.
pub(crate) enum WriterTarget {
    /// Duplicate handle of the channel file; bytes are appended verbatim.
    Raw(File),
    Encoded(FlacEncoder),
}

/// Handed back to the controller when the thread is joined.
pub(crate) struct WriterOutput {
    pub ring: RingConsumer,
    pub target: WriterTarget,
    pub bytes_consumed: u64,
}

/// Thread body handed to a [`SpawnWriter`].
pub(crate) type WriterBody = Box<dyn FnOnce() -> Option<WriterOutput> + Send>;

/// Starts a writer thread from a configured builder.
pub(crate) type SpawnWriter = fn(thread::Builder, WriterBody) -> io::Result<JoinHandle<Option<WriterOutput>>>;

pub(crate) fn spawn_thread(
    builder: thread::Builder,
    body: WriterBody,
) -> io::Result<JoinHandle<Option<WriterOutput>>> {
    builder.spawn(body)
}

/// Running writer thread.
pub(crate) struct WriterHandle(JoinHandle<Option<WriterOutput>>);

impl WriterHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    /// Waits for the thread to exit. `None` if it panicked.
    pub fn join(self) -> Option<WriterOutput> {
        self.0.join().ok().flatten()
    }
}

/// Drains one channel ring in fixed-size blocks until recording stops.
///
/// ```text
/// loop:
///   full block available? → store it
///   stop requested?        → store remaining whole blocks,
///                            one partial drain, exit
///   otherwise              → sleep one poll interval
/// ```
pub(crate) struct ChannelWriter {
    channel: Channel,
    ring: RingConsumer,
    target: WriterTarget,
    layout: SampleLayout,
    block_samples: usize,
    poll_interval: Duration,
    shared: WriterShared,
    scratch: Vec<u8>,
    samples: Vec<i32>,
    bytes_consumed: u64,
}

impl ChannelWriter {
    pub fn new(
        channel: Channel,
        ring: RingConsumer,
        target: WriterTarget,
        layout: SampleLayout,
        block_samples: usize,
        poll_interval: Duration,
        shared: WriterShared,
    ) -> Self {
        Self {
            channel,
            ring,
            target,
            layout,
            block_samples,
            poll_interval,
            shared,
            scratch: Vec::new(),
            samples: Vec::new(),
            bytes_consumed: 0,
        }
    }

    /// Runs the writer on its own thread. If the thread cannot be started
    /// the writer comes back with the error, still owning its ring and
    /// target.
    pub fn spawn(self, spawn: SpawnWriter) -> Result<WriterHandle, (Self, RecordError)> {
        let channel = self.channel;
        let builder =
            thread::Builder::new().name(format!("record-writer-{}", channel.label().to_ascii_lowercase()));
        // The writer is sent only once the thread exists.
        let (handoff, receive) = mpsc::channel::<Self>();
        match spawn(builder, Box::new(move || receive.recv().ok().map(Self::run))) {
            Ok(handle) => match handoff.send(self) {
                Ok(()) => Ok(WriterHandle(handle)),
                Err(mpsc::SendError(writer)) => Err((
                    writer,
                    RecordError::Thread(format!("channel {channel} writer exited before its start")),
                )),
            },
            Err(e) => Err((
                self,
                RecordError::Thread(format!("failed to spawn channel {channel} writer: {e}")),
            )),
        }
    }

    /// Returns the ring and target of a writer that never ran.
    pub fn into_parts(self) -> (RingConsumer, WriterTarget) {
        (self.ring, self.target)
    }

    pub fn run(mut self) -> WriterOutput {
        let block_len = self.block_samples * self.layout.bytes_per_sample();
        log::info!(
            "[{}] writer started ({}, {}-bit, {} byte blocks)",
            self.channel,
            if self.layout.encoded { "FLAC" } else { "raw" },
            self.layout.bits_per_sample,
            block_len
        );

        loop {
            if self.drain(block_len) {
                continue;
            }
            if self.should_stop() {
                self.final_drain(block_len);
                break;
            }
            thread::sleep(self.poll_interval);
        }

        log::info!("[{}] writer exiting after {} bytes", self.channel, self.bytes_consumed);
        WriterOutput {
            ring: self.ring,
            target: self.target,
            bytes_consumed: self.bytes_consumed,
        }
    }

    fn should_stop(&self) -> bool {
        self.shared.shutdown.is_triggered() || !self.shared.gate.is_recording()
    }

    /// Stores the whole blocks present now, then one partial drain of what
    /// is left, rounded down to whole samples.
    fn final_drain(&mut self, block_len: usize) {
        let whole_blocks = self.ring.available() / block_len;
        for _ in 0..whole_blocks {
            self.drain(block_len);
        }
        let width = self.layout.bytes_per_sample();
        let remaining = self.ring.available().min(block_len - 1);
        let len = remaining - remaining % width;
        if len > 0 {
            self.drain(len);
        }
    }

    /// Stores exactly `len` bytes if available.
    fn drain(&mut self, len: usize) -> bool {
        let Some(read) = self.ring.read_ptr(len) else {
            return false;
        };
        read.copy_to(&mut self.scratch);
        read.read_finished();
        self.bytes_consumed += len as u64;
        self.store();
        true
    }

    fn store(&mut self) {
        let len = self.scratch.len() as u64;
        let counters = &self.shared.counters;
        match &mut self.target {
            WriterTarget::Raw(file) => match file.write_all(&self.scratch) {
                Ok(()) => {
                    counters.add_raw(self.channel, len);
                    counters.add_total(len);
                }
                Err(e) => {
                    log::error!("[{}] writing {} bytes failed: {}", self.channel, len, e);
                    self.shared
                        .status
                        .set(format!("Channel {} write failed: {}", self.channel, e));
                }
            },
            WriterTarget::Encoded(encoder) => {
                decode_i32_le(&self.scratch, &mut self.samples);
                if let Err(e) = encoder.process(&self.samples) {
                    log::error!("[{}] encoding {} samples failed: {}", self.channel, self.samples.len(), e);
                }
                counters.add_raw(self.channel, self.samples.len() as u64 * 2);
                counters.add_total(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::feed::RecordGate;
    use crate::processing::ring_buffer::byte_ring;
    use crate::session::shared::{RecordCounters, ShutdownSignal, StatusBoard};
    use std::sync::Arc;
    use std::time::Instant;

    fn shared(recording: bool) -> WriterShared {
        let gate = Arc::new(RecordGate::default());
        gate.set_recording(recording);
        WriterShared {
            gate,
            shutdown: ShutdownSignal::new(),
            counters: Arc::new(RecordCounters::default()),
            status: Arc::new(StatusBoard::default()),
        }
    }

    #[test]
    fn raw_writer_stores_blocks_and_remainder_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.raw");
        let file = File::create(&path).unwrap();
        let (mut tx, rx) = byte_ring(64);
        let input: Vec<u8> = (0..23).collect();
        assert!(tx.write(&input));

        // Recording already stopped: two 8-byte blocks plus a 7-byte tail,
        // rounded to whole 16-bit samples.
        let shared = shared(false);
        let writer = ChannelWriter::new(
            Channel::A,
            rx,
            WriterTarget::Raw(file),
            SampleLayout::raw(16),
            4,
            Duration::from_millis(1),
            shared.clone(),
        );
        let output = writer.run();
        drop(output.target);

        assert_eq!(output.bytes_consumed, 22);
        assert_eq!(std::fs::read(&path).unwrap(), input[..22].to_vec());
        assert_eq!(shared.counters.raw(Channel::A), 22);
        assert_eq!(shared.counters.total(), 22);
        assert_eq!(output.ring.available(), 1);
    }

    #[test]
    fn exits_promptly_on_shutdown_with_empty_ring() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("a.raw")).unwrap();
        let (_tx, rx) = byte_ring(64);
        let shared = shared(true);

        let writer = ChannelWriter::new(
            Channel::B,
            rx,
            WriterTarget::Raw(file),
            SampleLayout::raw(16),
            8,
            Duration::from_millis(1),
            shared.clone(),
        );
        let Ok(handle) = writer.spawn(spawn_thread) else {
            panic!("writer thread did not start");
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());

        let signalled = Instant::now();
        shared.shutdown.trigger();
        let output = handle.join().unwrap();
        assert!(signalled.elapsed() < Duration::from_millis(200));
        assert_eq!(output.bytes_consumed, 0);
        assert_eq!(shared.counters.total(), 0);
    }

    #[test]
    fn failed_spawn_hands_back_ring_and_target() {
        fn refuse(_: thread::Builder, _: WriterBody) -> io::Result<JoinHandle<Option<WriterOutput>>> {
            Err(io::Error::other("thread limit reached"))
        }

        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("a.raw")).unwrap();
        let (mut tx, rx) = byte_ring(64);
        assert!(tx.write(&[1, 2, 3, 4]));

        let writer = ChannelWriter::new(
            Channel::A,
            rx,
            WriterTarget::Raw(file),
            SampleLayout::raw(16),
            8,
            Duration::from_millis(1),
            shared(true),
        );
        let Err((writer, error)) = writer.spawn(refuse) else {
            panic!("spawn should have failed");
        };
        assert!(matches!(error, RecordError::Thread(_)));
        let (ring, target) = writer.into_parts();
        assert_eq!(ring.available(), 4);
        assert!(matches!(target, WriterTarget::Raw(_)));
    }
}
