use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::channel::{Channel, SampleLayout};
use super::error::{EncoderError, RecordError};

pub const DEFAULT_SAMPLE_RATE: u32 = 40_000;
/// Samples drained from a ring buffer per write.
pub const DEFAULT_BLOCK_SAMPLES: usize = 65_536;
pub const DEFAULT_SEEK_SPACING: u32 = 1 << 18;
/// Seek table horizon in samples, about 1.7 years at 40 kHz.
pub const DEFAULT_SEEK_HORIZON: u64 = 1 << 41;
pub const MAX_COMPRESSION_LEVEL: u8 = 8;
pub const MAX_ENCODER_THREADS: u32 = 64;
/// Largest rate representable in STREAMINFO (20 bits).
pub const MAX_SAMPLE_RATE: u32 = (1 << 20) - 1;

/// On-disk representation of a channel recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Headerless little-endian samples.
    Raw,
    /// Mono FLAC stream.
    Flac,
}

/// Per-channel output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelOutput {
    pub enabled: bool,
    /// File name inside the session output directory.
    pub filename: String,
    /// Store 8-bit samples for this channel. Takes precedence over
    /// [`SessionConfig::flac_12bit`].
    pub reduce_8bit: bool,
}

impl ChannelOutput {
    fn named(filename: &str) -> Self {
        Self {
            enabled: true,
            filename: filename.to_string(),
            reduce_8bit: false,
        }
    }
}

impl Default for ChannelOutput {
    fn default() -> Self {
        Self::named("capture.flac")
    }
}

/// Configuration for a recording session.
///
/// Deserialization fills every missing field from [`Default`], so a JSON
/// document only needs the settings it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub channel_a: ChannelOutput,
    pub channel_b: ChannelOutput,

    /// Directory where recording files are written.
    pub output_directory: PathBuf,

    pub format: OutputFormat,

    /// Capture sample rate in Hz (default: 40000).
    pub sample_rate: u32,

    /// FLAC compression level, 0 (fastest) to 8 (smallest). Default: 1.
    pub compression_level: u8,

    /// Store FLAC channels at 12 bits unless a channel asks for 8.
    pub flac_12bit: bool,

    /// Decode every encoded frame back and compare with the input.
    pub verify: bool,

    /// Encoder worker threads: 0 = one per CPU, 1 = single threaded.
    pub encoder_threads: u32,

    pub seek_table: bool,
    pub seek_point_spacing: u32,

    /// Samples per ring buffer drain.
    pub block_samples: usize,

    /// Writer sleep when a full block is not yet available.
    pub poll_interval_ms: u64,

    /// Replace existing files without asking for confirmation.
    pub overwrite: bool,

    /// Compute a SHA-256 of each file when recording stops.
    pub checksum: bool,

    /// Write `<file>.summary.json` next to each recording.
    pub write_summary: bool,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), RecordError> {
        let enabled = self.enabled_channels();
        if enabled.is_empty() {
            return Err(RecordError::Configuration("no channel enabled".into()));
        }
        for channel in enabled {
            if self.channel(channel).filename.trim().is_empty() {
                return Err(RecordError::Configuration(format!(
                    "channel {channel} has no file name"
                )));
            }
        }
        if self.enabled_channels().len() == 2
            && self.channel_a.filename == self.channel_b.filename
        {
            return Err(RecordError::Configuration(
                "channels A and B share a file name".into(),
            ));
        }
        if self.block_samples == 0 {
            return Err(RecordError::Configuration("block size must be positive".into()));
        }
        if self.format == OutputFormat::Flac {
            for channel in self.enabled_channels() {
                self.encoder_config(channel)
                    .validate()
                    .map_err(|e| RecordError::Configuration(e.to_string()))?;
            }
        } else if self.sample_rate == 0 {
            return Err(RecordError::Configuration("sample rate must be positive".into()));
        }
        Ok(())
    }

    pub fn channel(&self, channel: Channel) -> &ChannelOutput {
        match channel {
            Channel::A => &self.channel_a,
            Channel::B => &self.channel_b,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelOutput {
        match channel {
            Channel::A => &mut self.channel_a,
            Channel::B => &mut self.channel_b,
        }
    }

    pub fn enabled_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|&ch| self.channel(ch).enabled)
            .collect()
    }

    pub fn output_path(&self, channel: Channel) -> PathBuf {
        self.output_directory.join(&self.channel(channel).filename)
    }

    /// Bit depth for `channel`: per-channel 8-bit reduction wins over the
    /// global 12-bit FLAC flag, otherwise 16 bits.
    pub fn bits_per_sample(&self, channel: Channel) -> u8 {
        if self.channel(channel).reduce_8bit {
            8
        } else if self.format == OutputFormat::Flac && self.flac_12bit {
            12
        } else {
            16
        }
    }

    pub fn sample_layout(&self, channel: Channel) -> SampleLayout {
        let bits = self.bits_per_sample(channel);
        match self.format {
            OutputFormat::Raw => SampleLayout::raw(bits),
            OutputFormat::Flac => SampleLayout::encoded(bits),
        }
    }

    pub fn encoder_config(&self, channel: Channel) -> EncoderConfig {
        EncoderConfig {
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample(channel),
            compression_level: self.compression_level,
            verify: self.verify,
            num_threads: self.encoder_threads,
            enable_seek_table: self.seek_table,
            seek_point_spacing: self.seek_point_spacing,
            seek_horizon_samples: DEFAULT_SEEK_HORIZON,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_a: ChannelOutput::named("capture_a.flac"),
            channel_b: ChannelOutput::named("capture_b.flac"),
            output_directory: PathBuf::from("."),
            format: OutputFormat::Flac,
            sample_rate: DEFAULT_SAMPLE_RATE,
            compression_level: 1,
            flac_12bit: false,
            verify: false,
            encoder_threads: 0,
            seek_table: true,
            seek_point_spacing: DEFAULT_SEEK_SPACING,
            block_samples: DEFAULT_BLOCK_SAMPLES,
            poll_interval_ms: 1,
            overwrite: false,
            checksum: false,
            write_summary: false,
        }
    }
}

/// Reads a JSON session configuration and validates it.
pub fn load_config(path: &Path) -> Result<SessionConfig, RecordError> {
    let text = fs::read_to_string(path)
        .map_err(|e| RecordError::Filesystem(format!("failed to read {}: {e}", path.display())))?;
    let config: SessionConfig = serde_json::from_str(&text)
        .map_err(|e| RecordError::Configuration(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &SessionConfig, path: &Path) -> Result<(), RecordError> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| RecordError::Configuration(e.to_string()))?;
    fs::write(path, json)
        .map_err(|e| RecordError::Filesystem(format!("failed to write {}: {e}", path.display())))
}

/// Settings snapshot for one FLAC encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    /// 8, 12 or 16.
    pub bits_per_sample: u8,
    /// 0 to 8.
    pub compression_level: u8,
    pub verify: bool,
    /// 0 = one per CPU, 1 = single threaded, 2..=64 explicit.
    pub num_threads: u32,
    pub enable_seek_table: bool,
    pub seek_point_spacing: u32,
    /// Stream length the seek table template covers.
    pub seek_horizon_samples: u64,
}

impl EncoderConfig {
    /// Rejects out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<(), EncoderError> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(EncoderError::Configuration(format!(
                "sample rate {} out of range 1..={MAX_SAMPLE_RATE}",
                self.sample_rate
            )));
        }
        if ![8, 12, 16].contains(&self.bits_per_sample) {
            return Err(EncoderError::Configuration(format!(
                "unsupported bit depth: {}",
                self.bits_per_sample
            )));
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(EncoderError::Configuration(format!(
                "compression level {} out of range 0..={MAX_COMPRESSION_LEVEL}",
                self.compression_level
            )));
        }
        if self.enable_seek_table && (self.seek_point_spacing == 0 || self.seek_horizon_samples == 0)
        {
            return Err(EncoderError::Configuration(
                "seek point spacing and horizon must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: 16,
            compression_level: 1,
            verify: false,
            num_threads: 0,
            enable_seek_table: true,
            seek_point_spacing: DEFAULT_SEEK_SPACING,
            seek_horizon_samples: DEFAULT_SEEK_HORIZON,
        }
    }
}
