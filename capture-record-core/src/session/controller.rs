use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use super::channel_writer::{spawn_thread, ChannelWriter, SpawnWriter, WriterHandle, WriterTarget};
use super::shared::{ChannelEncoderObserver, RecordCounters, ShutdownSignal, StatusBoard, WriterShared};
use crate::models::channel::{Channel, SampleLayout};
use crate::models::config::{OutputFormat, SessionConfig};
use crate::models::error::RecordError;
use crate::models::state::RecordState;
use crate::models::stats::{BackpressureSnapshot, RecordingStats};
use crate::models::summary::{ChannelSummary, RecordingSummary};
use crate::processing::feed::{BackpressureCounters, RecordGate, RecordTaps};
use crate::processing::ring_buffer::RingConsumer;
use crate::storage::encoder_bridge::FlacEncoder;
use crate::storage::metadata;
use crate::storage::sink::{ByteCountingSink, OutputSink};
use crate::traits::confirmation::{ConfirmationPrompt, ConfirmationResult};
use crate::traits::observer::{EncoderObserver, RecordObserver};

/// Result of [`RecordingController::start`] and
/// [`RecordingController::poll_confirmation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Files are open and writer threads are running.
    Started,
    /// A recording was already active; nothing changed.
    AlreadyActive,
    /// Waiting for the user to confirm overwriting existing files.
    PendingConfirmation,
    /// The user declined to overwrite.
    Cancelled,
}

/// Channel whose file is open but whose writer is not running yet.
struct PreparedChannel {
    channel: Channel,
    path: PathBuf,
    layout: SampleLayout,
    file: File,
    target: WriterTarget,
}

impl PreparedChannel {
    /// Releases the encoder and removes the file created for this attempt.
    fn discard(self) {
        if let WriterTarget::Encoded(encoder) = self.target {
            encoder.abort();
        }
        drop(self.file);
        remove_created(&self.path);
    }
}

struct ActiveChannel {
    channel: Channel,
    path: PathBuf,
    layout: SampleLayout,
    file: File,
    handle: Option<WriterHandle>,
}

struct ActiveRecording {
    id: Uuid,
    started_at: chrono::DateTime<Utc>,
    started: Instant,
    backpressure_start: BackpressureSnapshot,
    channels: Vec<ActiveChannel>,
}

/// Recording session controller.
///
/// Owns the consumer side of both channel rings. While a recording is
/// active each enabled channel has a writer thread draining its ring into
/// a raw file or a FLAC encoder:
///
/// ```text
/// [CaptureFeed] → [ring A] → [writer A] → raw file | FlacEncoder → file
///               → [ring B] → [writer B] → raw file | FlacEncoder → file
/// ```
///
/// State machine: `Idle → (PendingConfirmation) → Active → Stopping → Idle`.
/// All methods are called from one control thread.
pub struct RecordingController {
    config: SessionConfig,
    state: RecordState,
    gate: Arc<RecordGate>,
    backpressure: Arc<BackpressureCounters>,
    // A ring is moved into its writer thread while recording.
    rings: [Option<RingConsumer>; 2],
    prompt: Box<dyn ConfirmationPrompt>,
    shutdown: ShutdownSignal,
    counters: Arc<RecordCounters>,
    status: Arc<StatusBoard>,
    active: Option<ActiveRecording>,
    spawn: SpawnWriter,
}

impl RecordingController {
    pub fn new(taps: RecordTaps, prompt: Box<dyn ConfirmationPrompt>) -> Self {
        let RecordTaps { gate, backpressure, rings } = taps;
        let [ring_a, ring_b] = rings;
        Self {
            config: SessionConfig::default(),
            state: RecordState::Idle,
            gate,
            backpressure,
            rings: [Some(ring_a), Some(ring_b)],
            prompt,
            shutdown: ShutdownSignal::new(),
            counters: Arc::new(RecordCounters::default()),
            status: Arc::new(StatusBoard::default()),
            active: None,
            spawn: spawn_thread,
        }
    }

    /// Shares an application-wide shutdown flag with the writer threads.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn set_observer(&mut self, observer: Arc<dyn RecordObserver>) {
        self.status.set_observer(Some(observer));
    }

    /// Replaces the session configuration. Only allowed while idle.
    pub fn configure(&mut self, config: SessionConfig) -> Result<(), RecordError> {
        if !self.state.is_idle() {
            return Err(RecordError::InvalidState(format!(
                "cannot configure while {}",
                self.state.label()
            )));
        }
        config.validate()?;
        self.check_block_fits(&config)?;
        self.config = config;
        Ok(())
    }

    /// A writer only ever drains whole blocks, so each must fit its ring.
    fn check_block_fits(&self, config: &SessionConfig) -> Result<(), RecordError> {
        for channel in config.enabled_channels() {
            let block_len = config.block_samples * config.sample_layout(channel).bytes_per_sample();
            let capacity = self.rings[channel.index()].as_ref().map_or(0, |r| r.capacity());
            if block_len > capacity {
                return Err(RecordError::Configuration(format!(
                    "channel {channel} block of {block_len} bytes exceeds the {capacity} byte ring"
                )));
            }
        }
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn status_message(&self) -> String {
        self.status.message()
    }

    pub fn is_recording(&self) -> bool {
        self.gate.is_recording()
    }

    /// Writer threads that have not exited yet.
    pub fn running_writers(&self) -> usize {
        self.active.as_ref().map_or(0, |active| {
            active
                .channels
                .iter()
                .filter(|c| c.handle.as_ref().is_some_and(|h| !h.is_finished()))
                .count()
        })
    }

    /// Starts recording the enabled channels.
    ///
    /// If an output file already exists and `overwrite` is off, a
    /// confirmation is requested and the session waits in
    /// `PendingConfirmation` until [`poll_confirmation`](Self::poll_confirmation)
    /// sees an answer.
    pub fn start(&mut self) -> Result<StartOutcome, RecordError> {
        if !self.gate.is_capturing() {
            self.status.set("Start capture first");
            return Err(RecordError::NotCapturing);
        }
        if self.shutdown.is_triggered() {
            self.status.set("Shutting down");
            return Err(RecordError::InvalidState("shutdown requested".into()));
        }
        match self.state {
            RecordState::Active => return Ok(StartOutcome::AlreadyActive),
            RecordState::PendingConfirmation => return Ok(StartOutcome::PendingConfirmation),
            RecordState::Stopping => {
                return Err(RecordError::InvalidState("recording is stopping".into()));
            }
            RecordState::Idle => {}
        }
        if let Err(e) = self.check_block_fits(&self.config) {
            return Err(self.abort_start(Vec::new(), e));
        }

        let existing: Vec<PathBuf> = self
            .config
            .enabled_channels()
            .into_iter()
            .map(|channel| self.config.output_path(channel))
            .filter(|path| path.exists())
            .collect();

        if !existing.is_empty() && !self.config.overwrite {
            let names = existing
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            self.prompt.request_confirmation(
                "Overwrite files?",
                &format!("These files already exist:\n{names}\n\nOverwrite them?"),
                "Overwrite",
                "Cancel",
            );
            self.set_state(RecordState::PendingConfirmation);
            self.status.set("Waiting for overwrite confirmation");
            return Ok(StartOutcome::PendingConfirmation);
        }

        self.activate()?;
        Ok(StartOutcome::Started)
    }

    /// Checks for an answer to a pending overwrite confirmation. Call once
    /// per control tick; returns `None` while nothing changed.
    pub fn poll_confirmation(&mut self) -> Result<Option<StartOutcome>, RecordError> {
        if !self.state.is_pending() {
            return Ok(None);
        }
        match self.prompt.poll_result() {
            ConfirmationResult::None => Ok(None),
            ConfirmationResult::No => {
                self.set_state(RecordState::Idle);
                self.status.set("Recording cancelled");
                Ok(Some(StartOutcome::Cancelled))
            }
            ConfirmationResult::Yes => {
                self.activate()?;
                Ok(Some(StartOutcome::Started))
            }
        }
    }

    fn activate(&mut self) -> Result<(), RecordError> {
        if !self.gate.is_capturing() {
            return Err(self.abort_start(Vec::new(), RecordError::NotCapturing));
        }
        if self.shutdown.is_triggered() {
            let error = RecordError::InvalidState("shutdown requested".into());
            return Err(self.abort_start(Vec::new(), error));
        }
        let channels = self.config.enabled_channels();
        if let Some(channel) = channels.iter().find(|c| self.rings[c.index()].is_none()) {
            let error = RecordError::Storage(format!("channel {channel} ring buffer is unavailable"));
            return Err(self.abort_start(Vec::new(), error));
        }
        if let Err(e) = self.check_block_fits(&self.config) {
            return Err(self.abort_start(Vec::new(), e));
        }

        self.counters.reset();
        let mut prepared = Vec::with_capacity(channels.len());
        for channel in channels {
            match self.prepare_channel(channel) {
                Ok(p) => prepared.push(p),
                Err(e) => return Err(self.abort_start(prepared, e)),
            }
        }

        // Nothing captured before this point belongs to the recording.
        let backpressure_start = self.backpressure.snapshot();
        for p in &prepared {
            if let Some(ring) = self.rings[p.channel.index()].as_mut() {
                let stale = ring.discard_all();
                if stale > 0 {
                    log::debug!("[{}] discarded {} stale bytes", p.channel, stale);
                }
            }
            self.gate.announce(p.channel, Some(p.layout));
        }
        self.gate.set_recording(true);

        let shared = WriterShared {
            gate: Arc::clone(&self.gate),
            shutdown: self.shutdown.clone(),
            counters: Arc::clone(&self.counters),
            status: Arc::clone(&self.status),
        };
        let mut running = Vec::with_capacity(prepared.len());
        let mut pending = prepared.into_iter();
        while let Some(p) = pending.next() {
            let Some(ring) = self.rings[p.channel.index()].take() else {
                continue;
            };
            let writer = ChannelWriter::new(
                p.channel,
                ring,
                p.target,
                p.layout,
                self.config.block_samples,
                self.config.poll_interval(),
                shared.clone(),
            );
            match writer.spawn(self.spawn) {
                Ok(handle) => running.push(ActiveChannel {
                    channel: p.channel,
                    path: p.path,
                    layout: p.layout,
                    file: p.file,
                    handle: Some(handle),
                }),
                Err((writer, e)) => {
                    let (ring, target) = writer.into_parts();
                    self.rings[p.channel.index()] = Some(ring);
                    let mut unstarted = vec![PreparedChannel { target, ..p }];
                    unstarted.extend(pending);
                    self.rollback(running);
                    return Err(self.abort_start(unstarted, e));
                }
            }
        }

        let active = ActiveRecording {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            started: Instant::now(),
            backpressure_start,
            channels: running,
        };
        log::info!(
            "recording {} started: {} channel(s), {:?}",
            active.id,
            active.channels.len(),
            self.config.format
        );
        self.active = Some(active);
        self.set_state(RecordState::Active);
        self.status.set(match self.config.format {
            OutputFormat::Raw => "Recording (raw)...",
            OutputFormat::Flac => "Recording (FLAC)...",
        });
        Ok(())
    }

    fn prepare_channel(&self, channel: Channel) -> Result<PreparedChannel, RecordError> {
        let path = self.config.output_path(channel);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                RecordError::Filesystem(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let file = File::create(&path)
            .map_err(|e| RecordError::Filesystem(format!("failed to open {}: {e}", path.display())))?;

        match self.build_target(channel, &file) {
            Ok(target) => Ok(PreparedChannel {
                channel,
                layout: self.config.sample_layout(channel),
                path,
                file,
                target,
            }),
            Err(e) => {
                drop(file);
                remove_created(&path);
                Err(e)
            }
        }
    }

    fn build_target(&self, channel: Channel, file: &File) -> Result<WriterTarget, RecordError> {
        let duplicate = file
            .try_clone()
            .map_err(|e| RecordError::Filesystem(format!("failed to duplicate file handle: {e}")))?;
        match self.config.format {
            OutputFormat::Raw => Ok(WriterTarget::Raw(duplicate)),
            OutputFormat::Flac => {
                let sink = ByteCountingSink::new(duplicate, self.counters.compressed_counter(channel))
                    .map_err(|e| RecordError::Filesystem(e.to_string()))?;
                let observer: Arc<dyn EncoderObserver> = Arc::new(ChannelEncoderObserver {
                    channel,
                    status: Arc::clone(&self.status),
                });
                FlacEncoder::new(
                    OutputSink::stream(sink),
                    self.config.encoder_config(channel),
                    Some(observer),
                )
                .map(WriterTarget::Encoded)
                .map_err(|source| RecordError::Encoder { channel, source })
            }
        }
    }

    /// Joins writers of a failed start and removes their files.
    fn rollback(&mut self, channels: Vec<ActiveChannel>) {
        self.gate.set_recording(false);
        for mut active in channels {
            if let Some(handle) = active.handle.take() {
                match handle.join() {
                    Some(output) => {
                        if let WriterTarget::Encoded(encoder) = output.target {
                            encoder.abort();
                        }
                        self.rings[active.channel.index()] = Some(output.ring);
                    }
                    None => log::error!("[{}] writer thread panicked", active.channel),
                }
            }
            drop(active.file);
            remove_created(&active.path);
        }
    }

    /// Undoes a partial start and reports `error` once.
    fn abort_start(&mut self, prepared: Vec<PreparedChannel>, error: RecordError) -> RecordError {
        for p in prepared {
            p.discard();
        }
        self.gate.set_recording(false);
        for channel in Channel::ALL {
            self.gate.announce(channel, None);
        }
        if !self.state.is_idle() {
            self.set_state(RecordState::Idle);
        }
        log::error!("failed to start recording: {error}");
        self.status.set(format!("Failed to start recording: {error}"));
        error
    }

    /// Stops the recording, drains every ring and closes the files.
    ///
    /// Returns `None` when no recording was active. A pending confirmation
    /// is cancelled.
    pub fn stop(&mut self) -> Option<RecordingSummary> {
        match self.state {
            RecordState::PendingConfirmation => {
                self.set_state(RecordState::Idle);
                self.status.set("Recording cancelled");
                return None;
            }
            RecordState::Active => {}
            RecordState::Idle | RecordState::Stopping => return None,
        }
        let Some(active) = self.active.take() else {
            self.set_state(RecordState::Idle);
            return None;
        };

        self.set_state(RecordState::Stopping);
        self.gate.set_recording(false);

        let mut failed = false;
        let mut channels = Vec::with_capacity(active.channels.len());
        for active_channel in active.channels {
            let (summary, ok) = self.close_channel(active_channel);
            failed |= !ok;
            channels.push(summary);
        }

        let backpressure = self.backpressure.snapshot().delta_since(&active.backpressure_start);
        let summary = RecordingSummary {
            id: active.id.to_string(),
            started_at: active.started_at.to_rfc3339(),
            duration_secs: active.started.elapsed().as_secs_f64(),
            sample_rate: self.config.sample_rate,
            total_bytes: self.counters.total(),
            backpressure,
            channels,
        };
        if backpressure.drops > 0 {
            log::warn!(
                "recording {} dropped {} pushes ({} waits)",
                summary.id,
                backpressure.drops,
                backpressure.waits
            );
        }

        if self.config.write_summary {
            for channel in &summary.channels {
                if let Err(e) = metadata::write_summary(&summary, &channel.path) {
                    log::warn!("[{}] {}", channel.channel, e);
                }
            }
        }

        log::info!(
            "recording {} stopped after {:.2}s, {} bytes",
            summary.id,
            summary.duration_secs,
            summary.total_bytes
        );
        self.set_state(RecordState::Idle);
        self.status.set(if failed {
            "Recording stopped with errors"
        } else {
            "Recording stopped"
        });
        if let Some(observer) = self.status.observer() {
            observer.on_recording_finished(&summary);
        }
        Some(summary)
    }

    /// Joins one writer, finalizes its output and closes the file.
    fn close_channel(&mut self, mut active: ActiveChannel) -> (ChannelSummary, bool) {
        let channel = active.channel;
        let mut ok = true;
        let mut samples = None;

        match active.handle.take().map(WriterHandle::join) {
            Some(Some(output)) => {
                log::debug!("[{channel}] writer consumed {} bytes", output.bytes_consumed);
                self.rings[channel.index()] = Some(output.ring);
                match output.target {
                    WriterTarget::Raw(file) => drop(file),
                    WriterTarget::Encoded(encoder) => {
                        let accepted = encoder.samples_written();
                        match encoder.finish() {
                            Ok(stats) => samples = Some(stats.samples),
                            Err(e) => {
                                ok = false;
                                log::error!("[{channel}] finishing the encoder failed: {e}");
                                self.status.set(format!("Channel {channel} encoder: {e}"));
                                samples = Some(accepted);
                            }
                        }
                    }
                }
            }
            Some(None) => {
                ok = false;
                log::error!("[{channel}] writer thread panicked");
                self.status.set(format!("Channel {channel} writer failed"));
            }
            None => {}
        }
        self.gate.announce(channel, None);

        if let Err(e) = active.file.sync_all() {
            log::warn!("[{channel}] sync failed: {e}");
        }
        drop(active.file);

        let raw_bytes = self.counters.raw(channel);
        let (format, compressed_bytes) = if active.layout.encoded {
            (OutputFormat::Flac, Some(self.counters.compressed(channel)))
        } else {
            (OutputFormat::Raw, None)
        };
        let samples = samples.unwrap_or(raw_bytes / active.layout.bytes_per_sample() as u64);

        let checksum = if self.config.checksum {
            match metadata::sha256_file(&active.path) {
                Ok(hex) => Some(hex),
                Err(e) => {
                    log::warn!("[{channel}] {e}");
                    None
                }
            }
        } else {
            None
        };

        let summary = ChannelSummary {
            channel,
            path: active.path,
            format,
            bits_per_sample: active.layout.bits_per_sample,
            raw_bytes,
            compressed_bytes,
            samples,
            checksum,
        };
        (summary, ok)
    }

    /// Live counters of the current recording.
    pub fn stats(&self) -> RecordingStats {
        let (elapsed, backpressure) = match &self.active {
            Some(active) => (
                active.started.elapsed(),
                self.backpressure.snapshot().delta_since(&active.backpressure_start),
            ),
            None => (Duration::ZERO, BackpressureSnapshot::default()),
        };
        RecordingStats {
            elapsed,
            total_bytes: self.counters.total(),
            raw_bytes: Channel::ALL.map(|c| self.counters.raw(c)),
            compressed_bytes: Channel::ALL.map(|c| self.counters.compressed(c)),
            backpressure,
        }
    }

    fn set_state(&mut self, state: RecordState) {
        if self.state == state {
            return;
        }
        log::debug!("record state {} -> {}", self.state.label(), state.label());
        self.state = state;
        if let Some(observer) = self.status.observer() {
            observer.on_state_changed(state);
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if self.state.is_active() {
            self.stop();
        }
    }
}

fn remove_created(path: &std::path::Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("failed to remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::feed::record_link;
    use crate::session::channel_writer::{WriterBody, WriterOutput};
    use crate::traits::confirmation::FixedAnswer;
    use std::cell::Cell;
    use std::io;
    use std::thread;

    fn raw_config(dir: &std::path::Path) -> SessionConfig {
        let mut config = SessionConfig {
            output_directory: dir.to_path_buf(),
            format: OutputFormat::Raw,
            block_samples: 16,
            ..SessionConfig::default()
        };
        config.channel_a.filename = "a.raw".into();
        config.channel_b.filename = "b.raw".into();
        config
    }

    #[test]
    fn configure_rejects_block_larger_than_ring() {
        let dir = tempfile::tempdir().unwrap();
        let (_feed, taps) = record_link(64);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        let mut config = raw_config(dir.path());
        config.block_samples = 64;
        assert!(matches!(
            controller.configure(config),
            Err(RecordError::Configuration(_))
        ));
    }

    #[test]
    fn stop_when_idle_returns_none() {
        let (_feed, taps) = record_link(1024);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        assert!(controller.stop().is_none());
        assert_eq!(controller.state(), RecordState::Idle);
    }

    #[test]
    fn failed_encoder_start_removes_created_files() {
        let dir = tempfile::tempdir().unwrap();
        let (feed, taps) = record_link(1 << 16);
        feed.set_capturing(true);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        let mut config = raw_config(dir.path());
        config.format = OutputFormat::Flac;
        config.channel_a.filename = "a.flac".into();
        config.channel_b.filename = "b.flac".into();
        config.seek_table = false;
        controller.configure(config).unwrap();

        // Sample rate checked at start time by the encoder.
        controller.config.sample_rate = 0;
        let err = controller.start().unwrap_err();
        assert!(matches!(err, RecordError::Encoder { channel: Channel::A, .. }));
        assert_eq!(controller.state(), RecordState::Idle);
        assert!(!controller.is_recording());
        assert!(!dir.path().join("a.flac").exists());
        assert!(!dir.path().join("b.flac").exists());
        assert!(controller.status_message().starts_with("Failed to start recording"));
    }

    #[test]
    fn configure_is_refused_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let (feed, taps) = record_link(1024);
        feed.set_capturing(true);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        controller.configure(raw_config(dir.path())).unwrap();
        assert_eq!(controller.start().unwrap(), StartOutcome::Started);

        let err = controller.configure(raw_config(dir.path())).unwrap_err();
        assert!(matches!(err, RecordError::InvalidState(_)));
        assert!(controller.stop().is_some());
    }

    #[test]
    fn start_is_refused_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (feed, taps) = record_link(1024);
        feed.set_capturing(true);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        controller.configure(raw_config(dir.path())).unwrap();
        controller.shutdown_signal().trigger();

        let err = controller.start().unwrap_err();
        assert!(matches!(err, RecordError::InvalidState(_)));
        assert_eq!(controller.state(), RecordState::Idle);
        assert!(!controller.is_recording());
        assert!(!dir.path().join("a.raw").exists());
        assert_eq!(controller.status_message(), "Shutting down");
    }

    #[test]
    fn default_block_is_checked_against_ring_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let (feed, taps) = record_link(64);
        feed.set_capturing(true);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        // Never configured: the default block is far larger than 64 bytes.
        controller.config.output_directory = dir.path().to_path_buf();

        let err = controller.start().unwrap_err();
        assert!(matches!(err, RecordError::Configuration(_)));
        assert_eq!(controller.state(), RecordState::Idle);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    thread_local! {
        static SPAWNS: Cell<usize> = const { Cell::new(0) };
    }

    /// Starts the first writer thread and refuses the second.
    fn refuse_second(
        builder: thread::Builder,
        body: WriterBody,
    ) -> io::Result<thread::JoinHandle<Option<WriterOutput>>> {
        let n = SPAWNS.with(|c| c.replace(c.get() + 1));
        if n == 1 {
            return Err(io::Error::other("thread limit reached"));
        }
        builder.spawn(body)
    }

    #[test]
    fn failed_writer_spawn_rolls_back_and_keeps_rings() {
        let dir = tempfile::tempdir().unwrap();
        let (feed, taps) = record_link(1024);
        feed.set_capturing(true);
        let mut controller = RecordingController::new(taps, Box::new(FixedAnswer(true)));
        controller.configure(raw_config(dir.path())).unwrap();
        controller.spawn = refuse_second;

        let err = controller.start().unwrap_err();
        assert!(matches!(err, RecordError::Thread(_)));
        assert_eq!(controller.state(), RecordState::Idle);
        assert!(!controller.is_recording());
        assert_eq!(controller.running_writers(), 0);
        assert!(controller.rings.iter().all(Option::is_some));
        assert!(!dir.path().join("a.raw").exists());
        assert!(!dir.path().join("b.raw").exists());

        controller.spawn = spawn_thread;
        assert_eq!(controller.start().unwrap(), StartOutcome::Started);
        let summary = controller.stop().unwrap();
        assert_eq!(summary.channels.len(), 2);
    }
}
