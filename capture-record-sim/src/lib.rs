//! # capture-record-sim
//!
//! Simulated capture backend for capture-record-core.
//!
//! Provides:
//! - `SimulatedCapture`: capture thread pushing two 12-bit test tones
//!   through a `CaptureFeed` in real time
//! - `ToneGenerator`: the sine source behind each channel
//!
//! ## Usage
//! ```no_run
//! use capture_record_core::{record_link, FixedAnswer, RecordingController};
//! use capture_record_sim::SimulatedCapture;
//!
//! let (feed, taps) = record_link(1 << 20);
//! let mut capture = SimulatedCapture::new(40_000);
//! capture.start(feed).unwrap();
//! let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
//! controller.start().unwrap();
//! ```

pub mod simulated;
pub mod tone;

pub use simulated::SimulatedCapture;
pub use tone::ToneGenerator;
