use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::channel::Channel;

/// Producer backpressure counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpressureSnapshot {
    /// Pushes that found the ring full and had to wait.
    pub waits: u64,
    /// Pushes discarded after waiting did not free enough space.
    pub drops: u64,
}

impl BackpressureSnapshot {
    pub fn delta_since(&self, start: &Self) -> Self {
        Self {
            waits: self.waits.saturating_sub(start.waits),
            drops: self.drops.saturating_sub(start.drops),
        }
    }
}

/// Live counters of the current recording.
///
/// Values are read from relaxed atomics and may be slightly stale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingStats {
    pub elapsed: Duration,
    /// Bytes consumed from all ring buffers.
    pub total_bytes: u64,
    /// Bytes written (raw) or raw-equivalent bytes encoded (FLAC), per channel.
    pub raw_bytes: [u64; 2],
    /// Bytes the FLAC encoder has written, per channel.
    pub compressed_bytes: [u64; 2],
    /// Backpressure since the recording started.
    pub backpressure: BackpressureSnapshot,
}

impl RecordingStats {
    pub fn raw_bytes(&self, channel: Channel) -> u64 {
        self.raw_bytes[channel.index()]
    }

    pub fn compressed_bytes(&self, channel: Channel) -> u64 {
        self.compressed_bytes[channel.index()]
    }

    /// Compressed size relative to raw-equivalent size, once both are known.
    pub fn compression_ratio(&self, channel: Channel) -> Option<f64> {
        let raw = self.raw_bytes(channel);
        let compressed = self.compressed_bytes(channel);
        if raw == 0 || compressed == 0 {
            return None;
        }
        Some(compressed as f64 / raw as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn delta_ignores_earlier_counts() {
        let start = BackpressureSnapshot { waits: 7, drops: 3 };
        let end = BackpressureSnapshot { waits: 10, drops: 3 };
        assert_eq!(end.delta_since(&start), BackpressureSnapshot { waits: 3, drops: 0 });
    }

    #[test]
    fn compression_ratio() {
        let stats = RecordingStats {
            raw_bytes: [2000, 0],
            compressed_bytes: [500, 0],
            ..Default::default()
        };
        assert_relative_eq!(stats.compression_ratio(Channel::A).unwrap(), 0.25);
        assert_eq!(stats.compression_ratio(Channel::B), None);
    }
}
