//! State shared between the controller and its writer threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::channel::Channel;
use crate::models::error::EncoderError;
use crate::processing::feed::RecordGate;
use crate::traits::observer::{EncoderObserver, RecordObserver};

/// Application-wide request for writer threads to drain and exit, outside
/// an explicit stop. Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Byte counters of the current recording, updated by writer threads.
#[derive(Debug, Default)]
pub(crate) struct RecordCounters {
    total: AtomicU64,
    raw: [AtomicU64; 2],
    compressed: [Arc<AtomicU64>; 2],
}

impl RecordCounters {
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        for channel in Channel::ALL {
            self.raw[channel.index()].store(0, Ordering::Relaxed);
            self.compressed[channel.index()].store(0, Ordering::Relaxed);
        }
    }

    pub fn add_total(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_raw(&self, channel: Channel, bytes: u64) {
        self.raw[channel.index()].fetch_add(bytes, Ordering::Relaxed);
    }

    /// Counter handed to the channel's byte-counting sink.
    pub fn compressed_counter(&self, channel: Channel) -> Arc<AtomicU64> {
        Arc::clone(&self.compressed[channel.index()])
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn raw(&self, channel: Channel) -> u64 {
        self.raw[channel.index()].load(Ordering::Relaxed)
    }

    pub fn compressed(&self, channel: Channel) -> u64 {
        self.compressed[channel.index()].load(Ordering::Relaxed)
    }
}

/// Most recent human-readable status, plus the observer to tell about it.
#[derive(Default)]
pub(crate) struct StatusBoard {
    message: Mutex<String>,
    observer: Mutex<Option<Arc<dyn RecordObserver>>>,
}

impl StatusBoard {
    pub fn set(&self, message: impl Into<String>) {
        let message = message.into();
        *self.message.lock() = message.clone();
        if let Some(observer) = self.observer() {
            observer.on_status(&message);
        }
    }

    pub fn message(&self) -> String {
        self.message.lock().clone()
    }

    pub fn observer(&self) -> Option<Arc<dyn RecordObserver>> {
        self.observer.lock().clone()
    }

    pub fn set_observer(&self, observer: Option<Arc<dyn RecordObserver>>) {
        *self.observer.lock() = observer;
    }
}

/// Routes one channel's encoder errors to the status board and the
/// session observer.
pub(crate) struct ChannelEncoderObserver {
    pub channel: Channel,
    pub status: Arc<StatusBoard>,
}

impl EncoderObserver for ChannelEncoderObserver {
    fn on_error(&self, error: &EncoderError) {
        self.status.set(format!("Channel {} encoder: {error}", self.channel));
        if let Some(observer) = self.status.observer() {
            observer.on_encoder_error(self.channel, error);
        }
    }
}

/// Everything a writer thread needs besides its ring and destination.
#[derive(Clone)]
pub(crate) struct WriterShared {
    pub gate: Arc<RecordGate>,
    pub shutdown: ShutdownSignal,
    pub counters: Arc<RecordCounters>,
    pub status: Arc<StatusBoard>,
}
