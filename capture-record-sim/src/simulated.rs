//! Simulated capture device.
//!
//! Runs a capture thread that produces one period of samples per channel at
//! a time and pushes it through the [`CaptureFeed`], paced to the configured
//! sample rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use capture_record_core::models::error::RecordError;
use capture_record_core::{CaptureFeed, Channel, PushOutcome};

use crate::tone::ToneGenerator;

const PERIOD: Duration = Duration::from_millis(10);

/// Two-channel simulated capture.
///
/// Channel A carries a 440 Hz tone and channel B a 1 kHz tone, both near
/// 12-bit full scale.
pub struct SimulatedCapture {
    sample_rate: u32,
    running: Arc<AtomicBool>,
    capture_handle: Mutex<Option<thread::JoinHandle<CaptureFeed>>>,
}

impl SimulatedCapture {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Marks the feed as capturing and starts pushing samples into it.
    pub fn start(&mut self, feed: CaptureFeed) -> Result<(), RecordError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RecordError::InvalidState("capture already running".into()));
        }

        feed.set_capturing(true);
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let sample_rate = self.sample_rate;

        let handle = thread::Builder::new()
            .name("simulated-capture".into())
            .spawn(move || capture_loop(running, sample_rate, feed))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                RecordError::Thread(format!("failed to spawn capture thread: {}", e))
            })?;

        *self.capture_handle.lock() = Some(handle);
        log::info!("simulated capture started at {} Hz", sample_rate);
        Ok(())
    }

    /// Stops the capture thread and hands the feed back, no longer marked
    /// as capturing.
    pub fn stop(&mut self) -> Option<CaptureFeed> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.capture_handle.lock().take()?;
        match handle.join() {
            Ok(feed) => {
                log::info!("simulated capture stopped");
                Some(feed)
            }
            Err(_) => {
                log::error!("capture thread panicked");
                None
            }
        }
    }
}

impl Drop for SimulatedCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(running: Arc<AtomicBool>, sample_rate: u32, mut feed: CaptureFeed) -> CaptureFeed {
    let period_samples = (u64::from(sample_rate) * PERIOD.as_millis() as u64 / 1000).max(1) as usize;
    let mut tone_a = ToneGenerator::new(440.0, 1900, sample_rate);
    let mut tone_b = ToneGenerator::new(1000.0, 1200, sample_rate);
    let mut samples = Vec::with_capacity(period_samples);
    let mut dropped = 0u64;
    let mut next = Instant::now();

    while running.load(Ordering::SeqCst) {
        for (channel, tone) in [(Channel::A, &mut tone_a), (Channel::B, &mut tone_b)] {
            tone.fill(period_samples, &mut samples);
            if feed.push(channel, &samples) == PushOutcome::Dropped {
                dropped += 1;
            }
        }

        next += PERIOD;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            // Fell behind; resync instead of bursting.
            next = now;
        }
    }

    if dropped > 0 {
        log::warn!("simulated capture dropped {} periods", dropped);
    }
    feed.set_capturing(false);
    feed
}
