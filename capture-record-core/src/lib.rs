//! # capture-record-core
//!
//! Capture-to-storage pipeline for a two-channel sampler.
//!
//! A capture thread pushes samples into one lock-free ring per channel
//! through [`CaptureFeed`]. While a recording is active, a writer thread per
//! enabled channel drains its ring in fixed-size blocks and stores them as
//! raw little-endian samples or as a FLAC stream with a seek table. The
//! [`RecordingController`] owns the state machine, the files and the
//! writer threads.
//!
//! ## Architecture
//!
//! ```text
//! capture-record-core (this crate)
//! ├── codec/        ← FLAC metadata layout, flacenc frame coding
//! ├── models/       ← RecordError, EncoderError, SessionConfig, RecordState, stats, summary
//! ├── processing/   ← byte ring (rtrb), CaptureFeed/RecordTaps, sample conversion
//! ├── session/      ← RecordingController, per-channel writer threads
//! ├── storage/      ← FlacEncoder, output sinks, summary sidecar
//! └── traits/       ← RecordObserver, EncoderObserver, ConfirmationPrompt
//! ```

pub mod codec;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::channel::{Channel, SampleLayout};
pub use models::config::{load_config, save_config, EncoderConfig, OutputFormat, SessionConfig};
pub use models::error::{EncoderError, RecordError};
pub use models::state::RecordState;
pub use models::stats::{BackpressureSnapshot, RecordingStats};
pub use models::summary::{ChannelSummary, RecordingSummary};
pub use processing::feed::{record_link, CaptureFeed, PushOutcome, RecordGate, RecordTaps};
pub use session::controller::{RecordingController, StartOutcome};
pub use session::shared::ShutdownSignal;
pub use storage::encoder_bridge::{EncoderStats, FlacEncoder};
pub use storage::sink::{ByteCountingSink, OutputSink, StreamSink};
pub use traits::confirmation::{ConfirmationPrompt, ConfirmationResult, FixedAnswer, QueuedPrompt};
pub use traits::observer::{EncoderObserver, RecordObserver};
