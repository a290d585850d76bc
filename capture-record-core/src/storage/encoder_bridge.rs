//! Streaming FLAC encoder for one channel.
//!
//! The stream length is unknown while recording, so the header is written
//! with placeholders (total samples 0, an all-placeholder seek table) and
//! patched in place by [`FlacEncoder::finish`] once the last frame is out.

use std::io;
use std::sync::Arc;
use std::thread;

use crate::codec::flac_format::{
    metadata_block_header, SeekTable, StreamInfo, BLOCK_TYPE_SEEKTABLE, BLOCK_TYPE_STREAMINFO,
    FLAC_MARKER, SEEK_TABLE_OFFSET, STREAMINFO_LEN, STREAMINFO_OFFSET,
};
use crate::codec::frame::{decode_frame, FrameCoder};
use crate::models::config::{EncoderConfig, MAX_ENCODER_THREADS};
use crate::models::error::EncoderError;
use crate::storage::sink::OutputSink;
use crate::traits::observer::EncoderObserver;

/// Seek points serialized per sink write.
const SEEK_POINTS_PER_WRITE: usize = 4096;

/// Whether FLAC support is compiled in.
pub fn available() -> bool {
    cfg!(feature = "flac")
}

/// Whether frames can be encoded on more than one core.
pub fn multithreading_available() -> bool {
    available() && thread::available_parallelism().map_or(false, |n| n.get() > 1)
}

pub fn version() -> &'static str {
    concat!("capture-record-core FLAC encoder ", env!("CARGO_PKG_VERSION"))
}

/// Totals reported by a finished encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderStats {
    pub samples: u64,
    pub frames: u64,
    /// Stream size in bytes, header included.
    pub bytes_written: u64,
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub seek_points: usize,
}

struct EncodedFrame {
    bytes: Result<Vec<u8>, String>,
    samples: usize,
    verify_error: Option<String>,
}

/// Mono FLAC encoder writing to an [`OutputSink`].
///
/// Consumed by [`finish`](Self::finish) or [`abort`](Self::abort).
pub struct FlacEncoder {
    sink: OutputSink,
    config: EncoderConfig,
    coder: FrameCoder,
    block_size: usize,
    threads: usize,
    seek_table: Option<SeekTable>,
    pending: Vec<i32>,
    conversion: Vec<i32>,
    stream_start: u64,
    /// Absolute offset of the first frame.
    audio_start: u64,
    frame_number: u64,
    samples_written: u64,
    samples_encoded: u64,
    bytes_written: u64,
    audio_bytes: u64,
    min_frame_size: u32,
    max_frame_size: u32,
    last_error: Option<EncoderError>,
    observer: Option<Arc<dyn EncoderObserver>>,
}

impl FlacEncoder {
    /// Validates `config`, reserves the seek table and writes the stream
    /// header to `sink`.
    ///
    /// An unsupported thread count never fails construction: it is reported
    /// as [`EncoderError::ThreadCount`] and the encoder runs single threaded.
    pub fn new(
        sink: OutputSink,
        config: EncoderConfig,
        observer: Option<Arc<dyn EncoderObserver>>,
    ) -> Result<Self, EncoderError> {
        if !available() {
            return Err(notify(observer.as_deref(), EncoderError::Disabled));
        }
        if let Err(e) = config.validate() {
            return Err(notify(observer.as_deref(), e));
        }

        let coder = match FrameCoder::new(
            config.sample_rate,
            config.bits_per_sample,
            config.compression_level,
        ) {
            Ok(coder) => coder,
            Err(e) => return Err(notify(observer.as_deref(), EncoderError::Initialization(e))),
        };
        let block_size = coder.block_size();
        let (threads, thread_warning) = resolve_threads(config.num_threads);

        let seek_table = if config.enable_seek_table {
            match SeekTable::template(
                u64::from(config.seek_point_spacing),
                config.seek_horizon_samples,
            ) {
                Ok(table) => Some(table),
                Err(e) => {
                    let err = EncoderError::SeekTable(format!("reserving seek points: {e}"));
                    return Err(notify(observer.as_deref(), err));
                }
            }
        } else {
            None
        };

        let mut pending = Vec::new();
        if let Err(e) = pending.try_reserve(block_size * threads) {
            let err = EncoderError::Allocation(format!("sample buffer: {e}"));
            return Err(notify(observer.as_deref(), err));
        }

        let mut encoder = Self {
            sink,
            config,
            coder,
            block_size,
            threads,
            seek_table,
            pending,
            conversion: Vec::new(),
            stream_start: 0,
            audio_start: 0,
            frame_number: 0,
            samples_written: 0,
            samples_encoded: 0,
            bytes_written: 0,
            audio_bytes: 0,
            min_frame_size: u32::MAX,
            max_frame_size: 0,
            last_error: None,
            observer,
        };

        if let Some(warning) = thread_warning {
            encoder.report(warning);
        }
        if let Err(e) = encoder.write_stream_header() {
            let err = EncoderError::Initialization(format!("writing stream header: {e}"));
            return Err(encoder.report(err));
        }

        log::debug!(
            "FLAC encoder ready: {} Hz, {}-bit, level {}, block {}, {} thread(s), {} seek points",
            encoder.config.sample_rate,
            encoder.config.bits_per_sample,
            encoder.config.compression_level,
            encoder.block_size,
            encoder.threads,
            encoder.seek_table.as_ref().map_or(0, SeekTable::len),
        );
        Ok(encoder)
    }

    /// Queues `samples` and writes every complete frame. Returns the number
    /// of samples accepted.
    ///
    /// Samples outside the stream bit depth reject the whole call.
    pub fn process(&mut self, samples: &[i32]) -> Result<usize, EncoderError> {
        if samples.is_empty() {
            return Ok(0);
        }
        let bits = self.config.bits_per_sample;
        let max = (1i32 << (bits - 1)) - 1;
        let min = -max - 1;
        if let Some(&bad) = samples.iter().find(|&&s| s < min || s > max) {
            let err = EncoderError::Process(format!("sample {bad} outside {bits}-bit range"));
            return Err(self.report(err));
        }
        if let Err(e) = self.pending.try_reserve(samples.len()) {
            let err = EncoderError::Allocation(format!("sample buffer: {e}"));
            return Err(self.report(err));
        }

        self.pending.extend_from_slice(samples);
        self.samples_written += samples.len() as u64;

        let frames = self.pending.len() / self.block_size;
        if frames > 0 {
            self.encode_pending(frames)?;
        }
        Ok(samples.len())
    }

    /// Sign-extends 16-bit samples and processes them.
    pub fn process_i16(&mut self, samples: &[i16]) -> Result<usize, EncoderError> {
        // The buffer keeps its capacity between calls.
        let mut converted = std::mem::take(&mut self.conversion);
        converted.clear();
        if let Err(e) = converted.try_reserve(samples.len()) {
            self.conversion = converted;
            let err = EncoderError::Allocation(format!("conversion buffer: {e}"));
            return Err(self.report(err));
        }
        converted.extend(samples.iter().map(|&s| i32::from(s)));
        let result = self.process(&converted);
        self.conversion = converted;
        result
    }

    /// Writes the final partial frame and patches STREAMINFO and the seek
    /// table. The encoder is released whatever the outcome.
    pub fn finish(mut self) -> Result<EncoderStats, EncoderError> {
        let mut failure = None;

        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            let frame = encode_block(&self.coder, self.frame_number, &tail, self.config.verify);
            if let Err(e) = self.commit_frames(vec![frame]) {
                failure = Some(e);
            }
        }

        if let Some(table) = self.seek_table.as_mut() {
            table.finalize();
        }
        if let Err(e) = self.rewrite_header() {
            failure.get_or_insert(EncoderError::Finish(format!("patching stream header: {e}")));
        }
        if let Err(e) = self.sink.flush() {
            failure.get_or_insert(EncoderError::Finish(format!("flushing output: {e}")));
        }

        let stats = self.stats();
        match failure {
            None => {
                log::info!(
                    "FLAC stream finished: {} samples in {} frames, {} bytes",
                    stats.samples,
                    stats.frames,
                    stats.bytes_written
                );
                Ok(stats)
            }
            Some(EncoderError::Finish(message)) => Err(self.report(EncoderError::Finish(message))),
            Some(other) => Err(self.report(EncoderError::Finish(other.to_string()))),
        }
    }

    /// Releases the encoder without writing pending samples or patching the
    /// header.
    pub fn abort(self) {
        log::warn!(
            "FLAC encoder aborted with {} samples accepted, {} unwritten",
            self.samples_written,
            self.pending.len()
        );
    }

    /// Samples accepted so far, including those waiting for a full frame.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn last_error(&self) -> Option<&EncoderError> {
        self.last_error.as_ref()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Worker threads used per batch of frames.
    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            samples: self.samples_encoded,
            frames: self.frame_number,
            bytes_written: self.bytes_written,
            min_frame_size: if self.frame_number == 0 { 0 } else { self.min_frame_size },
            max_frame_size: self.max_frame_size,
            seek_points: self
                .seek_table
                .as_ref()
                .map_or(0, |t| t.points().iter().filter(|p| !p.is_placeholder()).count()),
        }
    }

    fn report(&mut self, error: EncoderError) -> EncoderError {
        self.last_error = Some(error.clone());
        notify(self.observer.as_deref(), error)
    }

    fn stream_info(&self) -> StreamInfo {
        StreamInfo {
            min_block_size: self.block_size as u16,
            max_block_size: self.block_size as u16,
            min_frame_size: if self.frame_number == 0 { 0 } else { self.min_frame_size },
            max_frame_size: self.max_frame_size,
            sample_rate: self.config.sample_rate,
            channels: 1,
            bits_per_sample: self.config.bits_per_sample,
            total_samples: self.samples_encoded,
            md5: [0; 16],
        }
    }

    fn write_stream_header(&mut self) -> io::Result<()> {
        self.stream_start = self.sink.tell()?;

        let mut header = Vec::with_capacity(SEEK_TABLE_OFFSET as usize);
        header.extend_from_slice(FLAC_MARKER);
        header.extend_from_slice(&metadata_block_header(
            self.seek_table.is_none(),
            BLOCK_TYPE_STREAMINFO,
            STREAMINFO_LEN,
        ));
        header.extend_from_slice(&self.stream_info().to_bytes());
        if let Some(table) = &self.seek_table {
            header.extend_from_slice(&metadata_block_header(
                true,
                BLOCK_TYPE_SEEKTABLE,
                table.body_len(),
            ));
        }
        self.sink.write(&header)?;
        self.write_seek_points()?;

        self.bytes_written =
            header.len() as u64 + self.seek_table.as_ref().map_or(0, |t| t.body_len() as u64);
        self.audio_start = self.stream_start + self.bytes_written;
        Ok(())
    }

    fn write_seek_points(&mut self) -> io::Result<()> {
        let Some(table) = &self.seek_table else {
            return Ok(());
        };
        let mut start = 0;
        while start < table.len() {
            let end = (start + SEEK_POINTS_PER_WRITE).min(table.len());
            self.sink.write(&table.encode_range(start..end))?;
            start = end;
        }
        Ok(())
    }

    fn rewrite_header(&mut self) -> io::Result<()> {
        let end = self.sink.tell()?;
        let info = self.stream_info().to_bytes();
        self.sink.seek(self.stream_start + STREAMINFO_OFFSET)?;
        self.sink.write(&info)?;
        if self.seek_table.is_some() {
            self.sink.seek(self.stream_start + SEEK_TABLE_OFFSET)?;
            self.write_seek_points()?;
        }
        self.sink.seek(end)
    }

    /// Encodes the first `frames` full blocks of the pending buffer.
    fn encode_pending(&mut self, frames: usize) -> Result<(), EncoderError> {
        let len = frames * self.block_size;
        let result = self
            .encode_blocks(&self.pending[..len])
            .and_then(|encoded| self.commit_frames(encoded));
        self.pending.drain(..len);
        result.map_err(|e| self.report(e))
    }

    fn encode_blocks(&self, samples: &[i32]) -> Result<Vec<EncodedFrame>, EncoderError> {
        let blocks: Vec<&[i32]> = samples.chunks(self.block_size).collect();
        let coder = &self.coder;
        let first = self.frame_number;
        let verify = self.config.verify;
        let encode_group = move |offset: usize, group: &[&[i32]]| -> Vec<EncodedFrame> {
            group
                .iter()
                .enumerate()
                .map(|(i, block)| encode_block(coder, first + (offset + i) as u64, block, verify))
                .collect()
        };

        if self.threads <= 1 || blocks.len() < 2 {
            return Ok(encode_group(0, &blocks));
        }

        let per_worker = blocks.len().div_ceil(self.threads);
        thread::scope(|scope| {
            let mut workers = Vec::new();
            for (index, group) in blocks.chunks(per_worker).enumerate() {
                let offset = index * per_worker;
                let spawned = thread::Builder::new()
                    .name(format!("flac-frames-{index}"))
                    .spawn_scoped(scope, move || encode_group(offset, group));
                match spawned {
                    Ok(handle) => workers.push(Ok(handle)),
                    Err(e) => {
                        log::warn!("frame worker spawn failed ({e}), encoding inline");
                        workers.push(Err(encode_group(offset, group)));
                    }
                }
            }

            let mut frames = Vec::with_capacity(blocks.len());
            let mut panicked = false;
            for worker in workers {
                match worker {
                    Ok(handle) => match handle.join() {
                        Ok(mut part) => frames.append(&mut part),
                        Err(_) => panicked = true,
                    },
                    Err(mut part) => frames.append(&mut part),
                }
            }
            if panicked {
                return Err(EncoderError::Process("frame worker panicked".into()));
            }
            Ok(frames)
        })
    }

    /// Writes encoded frames in order. Every frame advances the stream
    /// position even when its encoding or write fails, so frame numbers stay
    /// aligned with sample positions.
    fn commit_frames(&mut self, frames: Vec<EncodedFrame>) -> Result<(), EncoderError> {
        let mut first_error = None;
        for frame in frames {
            if let Some(message) = frame.verify_error {
                log::error!("verify failed in frame {}: {message}", self.frame_number);
                first_error.get_or_insert(EncoderError::Process(format!(
                    "verify failed in frame {}: {message}",
                    self.frame_number
                )));
            }

            match frame.bytes.map(|bytes| (self.sink.write(&bytes), bytes)) {
                Ok((Ok(()), bytes)) => {
                    if let Some(table) = self.seek_table.as_mut() {
                        table.record_frame(self.samples_encoded, frame.samples, self.audio_bytes);
                    }
                    let len = bytes.len() as u64;
                    self.bytes_written += len;
                    self.audio_bytes += len;
                    let size = bytes.len() as u32;
                    self.min_frame_size = self.min_frame_size.min(size);
                    self.max_frame_size = self.max_frame_size.max(size);
                }
                Ok((Err(e), _)) => {
                    log::error!("writing frame {} failed: {e}", self.frame_number);
                    first_error.get_or_insert(EncoderError::Process(format!(
                        "writing frame {}: {e}",
                        self.frame_number
                    )));
                    self.resync_position();
                }
                Err(message) => {
                    log::error!("encoding frame {} failed: {message}", self.frame_number);
                    first_error.get_or_insert(EncoderError::Process(format!(
                        "encoding frame {}: {message}",
                        self.frame_number
                    )));
                }
            }
            self.frame_number += 1;
            self.samples_encoded += frame.samples as u64;
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Re-reads the sink position after a failed write, which may have left
    /// part of a frame behind, so later seek points carry real offsets.
    fn resync_position(&mut self) {
        match self.sink.tell() {
            Ok(pos) if pos >= self.audio_start => {
                self.audio_bytes = pos - self.audio_start;
                self.bytes_written = self.audio_start - self.stream_start + self.audio_bytes;
            }
            Ok(pos) => log::warn!("sink position {pos} is inside the stream header"),
            Err(e) => log::warn!("sink position unknown after failed write: {e}"),
        }
    }
}

fn encode_block(coder: &FrameCoder, number: u64, block: &[i32], verify: bool) -> EncodedFrame {
    let bytes = coder.encode(number, block);
    let verify_error = match &bytes {
        Ok(frame) if verify => match decode_frame(frame) {
            Ok(decoded) if decoded == block => None,
            Ok(_) => Some("decoded samples differ from input".to_string()),
            Err(e) => Some(e),
        },
        _ => None,
    };
    EncodedFrame {
        bytes,
        samples: block.len(),
        verify_error,
    }
}

/// Worker count for a thread hint, plus a diagnostic when the hint is
/// rejected.
fn resolve_threads(hint: u32) -> (usize, Option<EncoderError>) {
    match hint {
        0 => {
            let cores = thread::available_parallelism().map_or(1, |n| n.get());
            (cores.min(MAX_ENCODER_THREADS as usize), None)
        }
        n if n <= MAX_ENCODER_THREADS => (n as usize, None),
        n => (
            1,
            Some(EncoderError::ThreadCount(format!(
                "{n} threads requested, at most {MAX_ENCODER_THREADS} supported; using 1"
            ))),
        ),
    }
}

fn notify(observer: Option<&dyn EncoderObserver>, error: EncoderError) -> EncoderError {
    if error.is_fatal() {
        log::error!("FLAC encoder {} error: {error}", error.kind());
    } else {
        log::warn!("FLAC encoder {} error: {error}", error.kind());
    }
    if let Some(observer) = observer {
        observer.on_error(&error);
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::flac_format::{audio_offset, read_stream_header, PLACEHOLDER_SAMPLE};
    use crate::codec::frame::decode_stream;
    use crate::storage::sink::{ByteCountingSink, StreamSink};
    use parking_lot::Mutex;
    use std::fs::{self, File};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Collect(Mutex<Vec<EncoderError>>);

    impl EncoderObserver for Collect {
        fn on_error(&self, error: &EncoderError) {
            self.0.lock().push(error.clone());
        }
    }

    fn small_config() -> EncoderConfig {
        EncoderConfig {
            num_threads: 1,
            seek_point_spacing: 4096,
            seek_horizon_samples: 1 << 20,
            ..Default::default()
        }
    }

    fn ramp(len: usize) -> Vec<i32> {
        (0..len).map(|i| ((i * 37) % 4000) as i32 - 2000).collect()
    }

    #[test]
    fn header_is_written_at_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.flac");
        let file = File::create(&path).unwrap();

        let encoder = FlacEncoder::new(OutputSink::file(&file).unwrap(), small_config(), None).unwrap();
        assert_eq!(encoder.bytes_written(), 46 + 256 * 18);
        encoder.abort();

        let bytes = fs::read(&path).unwrap();
        let (info, points) = read_stream_header(&bytes).unwrap();
        assert_eq!(info.total_samples, 0);
        assert_eq!(info.sample_rate, 40_000);
        assert_eq!(points.len(), 256);
        assert!(points.iter().all(|p| p.sample_number == PLACEHOLDER_SAMPLE));
    }

    #[test]
    fn finish_patches_total_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.flac");
        let file = File::create(&path).unwrap();
        let input = ramp(10_000);

        let mut encoder = FlacEncoder::new(OutputSink::file(&file).unwrap(), small_config(), None).unwrap();
        assert_eq!(encoder.process(&input[..3000]), Ok(3000));
        assert_eq!(encoder.process(&input[3000..]), Ok(7000));
        assert_eq!(encoder.samples_written(), 10_000);
        let stats = encoder.finish().unwrap();
        assert_eq!(stats.samples, 10_000);
        // 8 frames of 1152 plus a tail of 784.
        assert_eq!(stats.frames, 9);

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, stats.bytes_written);
        let (info, decoded) = decode_stream(&bytes).unwrap();
        assert_eq!(info.total_samples, 10_000);
        assert_eq!(info.min_frame_size, stats.min_frame_size);
        assert_eq!(decoded, input);
    }

    #[test]
    fn seek_table_is_filled_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.flac");
        let file = File::create(&path).unwrap();

        let mut encoder = FlacEncoder::new(OutputSink::file(&file).unwrap(), small_config(), None).unwrap();
        encoder.process(&ramp(20_000)).unwrap();
        let stats = encoder.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        let (_, points) = read_stream_header(&bytes).unwrap();
        // Targets 0, 4096, ..., 16384 fall in distinct frames.
        assert_eq!(stats.seek_points, 5);
        assert_eq!(points[0].sample_number, 0);
        assert_eq!(points[0].stream_offset, 0);
        assert!(points.windows(2).all(|w| w[0].sample_number <= w[1].sample_number));
        assert!(points[5..].iter().all(|p| p.sample_number == PLACEHOLDER_SAMPLE));
        for point in &points[..5] {
            assert_eq!(point.sample_number % 1152, 0);
        }
    }

    #[test]
    fn rejects_level_nine() {
        let observer = Arc::new(Collect::default());
        let config = EncoderConfig {
            compression_level: 9,
            ..small_config()
        };
        let sink = OutputSink::stream(ByteCountingSink::new(std::io::Cursor::new(Vec::new()), Arc::default()).unwrap());

        let result = FlacEncoder::new(sink, config, Some(observer.clone()));
        assert!(matches!(result, Err(EncoderError::Configuration(_))));
        assert_eq!(observer.0.lock().len(), 1);
    }

    #[test]
    fn excessive_thread_hint_degrades() {
        let observer = Arc::new(Collect::default());
        let config = EncoderConfig {
            num_threads: 65,
            ..small_config()
        };
        let sink = OutputSink::stream(ByteCountingSink::new(std::io::Cursor::new(Vec::new()), Arc::default()).unwrap());

        let encoder = FlacEncoder::new(sink, config, Some(observer.clone())).unwrap();
        assert_eq!(encoder.threads(), 1);
        assert!(matches!(encoder.last_error(), Some(EncoderError::ThreadCount(_))));
        assert!(matches!(observer.0.lock()[0], EncoderError::ThreadCount(_)));
        encoder.finish().unwrap();
    }

    #[test]
    fn parallel_output_matches_single_thread() {
        let input = ramp(50_000);
        let mut outputs = Vec::new();
        for threads in [1, 4] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("a.flac");
            let file = File::create(&path).unwrap();
            let config = EncoderConfig {
                num_threads: threads,
                compression_level: 5,
                verify: true,
                ..small_config()
            };
            let mut encoder = FlacEncoder::new(OutputSink::file(&file).unwrap(), config, None).unwrap();
            encoder.process(&input).unwrap();
            assert!(encoder.last_error().is_none());
            encoder.finish().unwrap();
            outputs.push(fs::read(&path).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn out_of_range_sample_is_rejected_without_stopping() {
        let config = EncoderConfig {
            bits_per_sample: 12,
            ..small_config()
        };
        let sink = OutputSink::stream(ByteCountingSink::new(std::io::Cursor::new(Vec::new()), Arc::default()).unwrap());
        let mut encoder = FlacEncoder::new(sink, config, None).unwrap();

        assert!(matches!(encoder.process(&[0, 2048]), Err(EncoderError::Process(_))));
        assert_eq!(encoder.samples_written(), 0);
        assert_eq!(encoder.process(&[0, 2047, -2048]), Ok(3));
        assert_eq!(encoder.finish().unwrap().samples, 3);
    }

    #[test]
    fn process_i16_reuses_conversion_buffer() {
        let sink = OutputSink::stream(ByteCountingSink::new(std::io::Cursor::new(Vec::new()), Arc::default()).unwrap());
        let mut encoder = FlacEncoder::new(sink, small_config(), None).unwrap();

        assert_eq!(encoder.process_i16(&[-32768, 0, 32767]), Ok(3));
        let capacity = encoder.conversion.capacity();
        assert_eq!(encoder.process_i16(&[1]), Ok(1));
        assert!(encoder.conversion.capacity() >= capacity);
        assert_eq!(encoder.process(&[]), Ok(0));
        assert_eq!(encoder.finish().unwrap().samples, 4);
    }

    #[test]
    fn stream_sink_counts_final_file_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.flac");
        let file = File::create(&path).unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        let sink = ByteCountingSink::new(file.try_clone().unwrap(), Arc::clone(&counter)).unwrap();

        let mut encoder = FlacEncoder::new(OutputSink::stream(sink), small_config(), None).unwrap();
        encoder.process(&ramp(5000)).unwrap();
        let stats = encoder.finish().unwrap();
        drop(file);

        let len = fs::metadata(&path).unwrap().len();
        assert_eq!(counter.load(Ordering::Relaxed), len);
        assert_eq!(stats.bytes_written, len);
    }

    #[test]
    fn without_seek_table_streaminfo_is_last_block() {
        let config = EncoderConfig {
            enable_seek_table: false,
            ..small_config()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.flac");
        let file = File::create(&path).unwrap();

        let mut encoder = FlacEncoder::new(OutputSink::file(&file).unwrap(), config, None).unwrap();
        encoder.process(&ramp(100)).unwrap();
        encoder.finish().unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes[4], 0x80);
        let (info, decoded) = decode_stream(&bytes).unwrap();
        assert_eq!(info.total_samples, 100);
        assert_eq!(decoded, ramp(100));
    }

    /// Stream sink that writes half of its `fail_on`-th write, then errors.
    struct TornWrite {
        data: Arc<Mutex<std::io::Cursor<Vec<u8>>>>,
        writes: usize,
        fail_on: usize,
    }

    impl StreamSink for TornWrite {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            use std::io::Write;
            self.writes += 1;
            let mut data = self.data.lock();
            if self.writes == self.fail_on {
                data.write_all(&bytes[..bytes.len() / 2])?;
                return Err(std::io::Error::other("device removed"));
            }
            data.write_all(bytes)
        }

        fn seek(&mut self, offset: u64) -> std::io::Result<()> {
            self.data.lock().set_position(offset);
            Ok(())
        }

        fn tell(&mut self) -> std::io::Result<u64> {
            Ok(self.data.lock().position())
        }
    }

    #[test]
    fn torn_frame_write_keeps_seek_offsets_accurate() {
        let data = Arc::new(Mutex::new(std::io::Cursor::new(Vec::new())));
        // Writes 1 and 2 are the header and seek table; 4 is the second frame.
        let sink = TornWrite {
            data: Arc::clone(&data),
            writes: 0,
            fail_on: 4,
        };
        let input = ramp(20_000);

        let mut encoder = FlacEncoder::new(OutputSink::stream(sink), small_config(), None).unwrap();
        assert!(matches!(encoder.process(&input), Err(EncoderError::Process(_))));
        let stats = encoder.finish().unwrap();

        let bytes = data.lock().get_ref().clone();
        assert_eq!(stats.bytes_written, bytes.len() as u64);
        let (_, points) = read_stream_header(&bytes).unwrap();
        let audio = audio_offset(&bytes).unwrap();
        let later: Vec<_> = points
            .iter()
            .filter(|p| !p.is_placeholder() && p.sample_number > 1152)
            .collect();
        assert!(!later.is_empty());
        for point in later {
            let start = audio + point.stream_offset as usize;
            let first = point.sample_number as usize;
            let decoded = decode_frame(&bytes[start..]).unwrap();
            assert_eq!(decoded, input[first..first + 1152]);
        }
    }

    #[test]
    fn diagnostics() {
        assert!(available());
        assert!(version().contains(env!("CARGO_PKG_VERSION")));
        assert_eq!(resolve_threads(1).0, 1);
        assert_eq!(resolve_threads(64).0, 64);
        assert!(resolve_threads(0).0 >= 1);
        assert!(resolve_threads(100).1.is_some());
    }
}
