//! Demo recorder: captures two simulated channels for a few seconds and
//! prints the recording summary.
//!
//! ```text
//! capture-record [config.json] [seconds]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use capture_record_core::processing::feed::DEFAULT_RING_CAPACITY;
use capture_record_core::{
    load_config, record_link, Channel, EncoderError, FixedAnswer, RecordError, RecordObserver,
    RecordState, RecordingController, RecordingSummary, SessionConfig, StartOutcome,
};
use capture_record_sim::SimulatedCapture;

const DEFAULT_SECONDS: f64 = 3.0;

struct LogObserver;

impl RecordObserver for LogObserver {
    fn on_state_changed(&self, state: RecordState) {
        log::info!("state: {}", state.label());
    }

    fn on_status(&self, message: &str) {
        log::info!("status: {message}");
    }

    fn on_encoder_error(&self, channel: Channel, error: &EncoderError) {
        log::warn!("channel {channel} encoder reported: {error}");
    }

    fn on_recording_finished(&self, summary: &RecordingSummary) {
        log::info!("recording {} finished", summary.id);
    }
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), RecordError> {
    let mut args = std::env::args_os().skip(1);
    let config = match args.next() {
        Some(path) => load_config(&PathBuf::from(path))?,
        None => SessionConfig::default(),
    };
    let seconds = match args.next() {
        Some(arg) => arg
            .to_string_lossy()
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s > 0.0)
            .ok_or_else(|| RecordError::Configuration(format!("invalid duration: {}", arg.to_string_lossy())))?,
        None => DEFAULT_SECONDS,
    };

    let (feed, taps) = record_link(DEFAULT_RING_CAPACITY);
    let mut capture = SimulatedCapture::new(config.sample_rate);
    let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
    controller.set_observer(Arc::new(LogObserver));
    controller.configure(config)?;
    capture.start(feed)?;

    let mut outcome = controller.start()?;
    while outcome == StartOutcome::PendingConfirmation {
        thread::sleep(Duration::from_millis(10));
        if let Some(answer) = controller.poll_confirmation()? {
            outcome = answer;
        }
    }
    if outcome == StartOutcome::Cancelled {
        capture.stop();
        return Ok(());
    }

    let deadline = Instant::now() + Duration::from_secs_f64(seconds);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(500));
        let stats = controller.stats();
        log::info!(
            "{:.1}s: {} bytes, A {} / B {} raw, backpressure {} waits {} drops",
            stats.elapsed.as_secs_f64(),
            stats.total_bytes,
            stats.raw_bytes(Channel::A),
            stats.raw_bytes(Channel::B),
            stats.backpressure.waits,
            stats.backpressure.drops
        );
    }

    let summary = controller.stop();
    capture.stop();

    if let Some(summary) = summary {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| RecordError::Storage(format!("failed to serialize summary: {e}")))?;
        println!("{json}");
    }
    Ok(())
}
