//! Producer side of the recording pipeline.
//!
//! [`record_link`] creates the two channel rings together with the state the
//! producer and the recording controller share: the capture/recording gate,
//! the per-channel sample layout announcement and the backpressure counters.
//! The producer keeps the [`CaptureFeed`]; the controller takes the
//! [`RecordTaps`].

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::ring_buffer::{byte_ring, RingConsumer, RingProducer};
use super::sample_format::encode_samples;
use crate::models::channel::{Channel, SampleLayout};
use crate::models::stats::BackpressureSnapshot;

/// Ring capacity per channel: 32 blocks of 65536 encoded samples.
pub const DEFAULT_RING_CAPACITY: usize = 8 * 1024 * 1024;

/// Flags shared between the producer, the controller and writer threads.
#[derive(Debug, Default)]
pub struct RecordGate {
    capturing: AtomicBool,
    recording: AtomicBool,
    layouts: [AtomicU8; 2],
}

impl RecordGate {
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::Release);
    }

    /// Whether samples should enter the rings. Writer threads drain and
    /// exit once this clears.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub(crate) fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
    }

    /// Layout the producer must use for `channel`, `None` while the channel
    /// is not being recorded.
    pub fn layout(&self, channel: Channel) -> Option<SampleLayout> {
        SampleLayout::from_bits(self.layouts[channel.index()].load(Ordering::Acquire))
    }

    pub(crate) fn announce(&self, channel: Channel, layout: Option<SampleLayout>) {
        let bits = layout.map_or(0, SampleLayout::to_bits);
        self.layouts[channel.index()].store(bits, Ordering::Release);
    }
}

/// Producer-side counters for a ring that could not accept data in time.
#[derive(Debug, Default)]
pub struct BackpressureCounters {
    waits: AtomicU64,
    drops: AtomicU64,
}

impl BackpressureCounters {
    pub fn snapshot(&self) -> BackpressureSnapshot {
        BackpressureSnapshot {
            waits: self.waits.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }

    pub fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.drops.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer halves and shared state handed to the recording controller.
pub struct RecordTaps {
    pub(crate) gate: Arc<RecordGate>,
    pub(crate) backpressure: Arc<BackpressureCounters>,
    pub(crate) rings: [RingConsumer; 2],
}

impl RecordTaps {
    pub fn gate(&self) -> &Arc<RecordGate> {
        &self.gate
    }

    pub fn backpressure(&self) -> &Arc<BackpressureCounters> {
        &self.backpressure
    }
}

/// Creates a feed/taps pair connected by one ring of `ring_capacity` bytes
/// per channel.
pub fn record_link(ring_capacity: usize) -> (CaptureFeed, RecordTaps) {
    let gate = Arc::new(RecordGate::default());
    let backpressure = Arc::new(BackpressureCounters::default());
    let (tx_a, rx_a) = byte_ring(ring_capacity);
    let (tx_b, rx_b) = byte_ring(ring_capacity);

    let feed = CaptureFeed {
        gate: Arc::clone(&gate),
        backpressure: Arc::clone(&backpressure),
        rings: [tx_a, tx_b],
        scratch: Vec::new(),
        wait_slice: Duration::from_millis(1),
        wait_attempts: 10,
    };
    let taps = RecordTaps {
        gate,
        backpressure,
        rings: [rx_a, rx_b],
    };
    (feed, taps)
}

/// What happened to one push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Not recording, or the channel is not part of the recording.
    Skipped,
    Written,
    /// The ring stayed full for the whole wait budget.
    Dropped,
}

/// Capture-thread handle that pushes samples into the channel rings.
pub struct CaptureFeed {
    gate: Arc<RecordGate>,
    backpressure: Arc<BackpressureCounters>,
    rings: [RingProducer; 2],
    scratch: Vec<u8>,
    wait_slice: Duration,
    wait_attempts: u32,
}

impl CaptureFeed {
    /// Sets how long a push may wait for ring space before dropping:
    /// `attempts` retries, `slice` apart.
    pub fn with_wait(mut self, slice: Duration, attempts: u32) -> Self {
        self.wait_slice = slice;
        self.wait_attempts = attempts;
        self
    }

    pub fn gate(&self) -> &Arc<RecordGate> {
        &self.gate
    }

    /// Marks the capture device as running. Recording can only start while
    /// this is set.
    pub fn set_capturing(&self, capturing: bool) {
        self.gate.set_capturing(capturing);
    }

    pub fn is_recording(&self) -> bool {
        self.gate.is_recording()
    }

    pub fn free(&self, channel: Channel) -> usize {
        self.rings[channel.index()].free()
    }

    /// Converts 12-bit captured samples to the announced layout of
    /// `channel` and pushes them.
    pub fn push(&mut self, channel: Channel, samples: &[i16]) -> PushOutcome {
        if !self.gate.is_recording() {
            return PushOutcome::Skipped;
        }
        let Some(layout) = self.gate.layout(channel) else {
            return PushOutcome::Skipped;
        };
        self.scratch.clear();
        encode_samples(samples, layout, &mut self.scratch);
        write_with_backpressure(
            &mut self.rings[channel.index()],
            &self.scratch,
            &self.backpressure,
            self.wait_slice,
            self.wait_attempts,
        )
    }

    /// Pushes bytes already in the announced layout of `channel`.
    pub fn push_bytes(&mut self, channel: Channel, bytes: &[u8]) -> PushOutcome {
        if !self.gate.is_recording() || self.gate.layout(channel).is_none() {
            return PushOutcome::Skipped;
        }
        write_with_backpressure(
            &mut self.rings[channel.index()],
            bytes,
            &self.backpressure,
            self.wait_slice,
            self.wait_attempts,
        )
    }
}

fn write_with_backpressure(
    ring: &mut RingProducer,
    bytes: &[u8],
    counters: &BackpressureCounters,
    slice: Duration,
    attempts: u32,
) -> PushOutcome {
    if ring.write(bytes) {
        return PushOutcome::Written;
    }
    counters.record_wait();
    for _ in 0..attempts {
        thread::sleep(slice);
        if ring.write(bytes) {
            return PushOutcome::Written;
        }
    }
    counters.record_drop();
    log::debug!(
        "ring full ({} free, {} needed), dropped {} bytes",
        ring.free(),
        bytes.len(),
        bytes.len()
    );
    PushOutcome::Dropped
}
