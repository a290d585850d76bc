use thiserror::Error;

use super::channel::Channel;

/// Errors raised by the FLAC encoder bridge.
///
/// `ThreadCount` and `Process` are diagnostics: the encoder stays usable
/// after reporting them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncoderError {
    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("invalid encoder configuration: {0}")]
    Configuration(String),

    #[error("thread count rejected: {0}")]
    ThreadCount(String),

    #[error("seek table allocation failed: {0}")]
    SeekTable(String),

    #[error("encoder initialization failed: {0}")]
    Initialization(String),

    #[error("encoding failed: {0}")]
    Process(String),

    #[error("finalizing stream failed: {0}")]
    Finish(String),

    #[error("FLAC support not compiled in")]
    Disabled,
}

impl EncoderError {
    /// Short name of the failure class, used as a log and status prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Allocation(_) => "allocation",
            Self::Configuration(_) => "configuration",
            Self::ThreadCount(_) => "thread-count",
            Self::SeekTable(_) => "seek-table",
            Self::Initialization(_) => "initialization",
            Self::Process(_) => "process",
            Self::Finish(_) => "finish",
            Self::Disabled => "disabled",
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ThreadCount(_) | Self::Process(_))
    }
}

/// Errors surfaced by the recording session controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("start capture first")]
    NotCapturing,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    Configuration(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("channel {channel} encoder: {source}")]
    Encoder {
        channel: Channel,
        #[source]
        source: EncoderError,
    },

    #[error("thread error: {0}")]
    Thread(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_are_not_fatal() {
        assert!(!EncoderError::ThreadCount("65".into()).is_fatal());
        assert!(!EncoderError::Process("short write".into()).is_fatal());
        assert!(EncoderError::Disabled.is_fatal());
        assert!(EncoderError::SeekTable("oom".into()).is_fatal());
    }

    #[test]
    fn encoder_error_names_channel() {
        let err = RecordError::Encoder {
            channel: Channel::B,
            source: EncoderError::Configuration("compression level 9 out of range".into()),
        };
        assert_eq!(
            err.to_string(),
            "channel B encoder: invalid encoder configuration: compression level 9 out of range"
        );
    }
}
