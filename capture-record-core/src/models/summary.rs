use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::config::OutputFormat;
use super::stats::BackpressureSnapshot;

/// Result for one channel of a finished recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    pub path: PathBuf,
    pub format: OutputFormat,
    pub bits_per_sample: u8,
    pub raw_bytes: u64,
    /// Bytes the encoder wrote; `None` for raw files.
    pub compressed_bytes: Option<u64>,
    /// Samples committed to the file.
    pub samples: u64,
    /// Hex SHA-256 of the finished file, when requested.
    pub checksum: Option<String>,
}

/// Returned by the controller when a recording stops.
///
/// Serializable as the JSON summary sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub id: String,
    /// RFC 3339 start time.
    pub started_at: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub total_bytes: u64,
    pub backpressure: BackpressureSnapshot,
    pub channels: Vec<ChannelSummary>,
}

impl RecordingSummary {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelSummary> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}
