//! Mono FLAC frame coding on top of `flacenc`, with `claxon` reading the
//! frames back for verification.

use std::io::Cursor;

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::error::{Verified, Verify};
use flacenc::source::{Fill, FrameBuf};

use super::flac_format::{read_stream_header, StreamInfo};

/// Block size for compression level 0-8.
pub fn block_size_for_level(level: u8) -> usize {
    if level <= 2 {
        1152
    } else {
        4096
    }
}

/// Encodes blocks of mono samples into complete frames.
pub struct FrameCoder {
    config: Verified<flacenc::config::Encoder>,
    stream_info: flacenc::component::StreamInfo,
    block_size: usize,
}

impl FrameCoder {
    pub fn new(sample_rate: u32, bits_per_sample: u8, level: u8) -> Result<Self, String> {
        let block_size = block_size_for_level(level);
        let mut config = flacenc::config::Encoder::default();
        config.block_size = block_size;
        config.subframe_coding.use_lpc = level >= 3;
        let config = config
            .into_verified()
            .map_err(|(_, e)| format!("encoder settings: {e}"))?;
        let stream_info = flacenc::component::StreamInfo::new(
            sample_rate as usize,
            1,
            usize::from(bits_per_sample),
        )
        .map_err(|e| format!("stream parameters: {e}"))?;
        Ok(Self {
            config,
            stream_info,
            block_size,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Encodes `samples` as frame `frame_number`. `samples` must be
    /// non-empty, at most one block long and within the stream bit depth.
    pub fn encode(&self, frame_number: u64, samples: &[i32]) -> Result<Vec<u8>, String> {
        let mut buf =
            FrameBuf::with_size(1, samples.len()).map_err(|e| format!("frame buffer: {e}"))?;
        buf.fill_interleaved(samples)
            .map_err(|e| format!("frame buffer: {e}"))?;
        let frame = flacenc::encode_fixed_size_frame(
            &self.config,
            &buf,
            frame_number as usize,
            &self.stream_info,
        )
        .map_err(|e| format!("frame {frame_number}: {e}"))?;
        let mut sink = ByteSink::new();
        frame
            .write(&mut sink)
            .map_err(|_| format!("frame {frame_number}: serialization failed"))?;
        Ok(sink.as_slice().to_vec())
    }
}

/// Decodes one mono frame, checking both CRCs.
pub fn decode_frame(frame: &[u8]) -> Result<Vec<i32>, String> {
    let mut reader = claxon::frame::FrameReader::new(Cursor::new(frame));
    match reader.read_next_or_eof(Vec::new()) {
        Ok(Some(block)) => Ok(block.channel(0).to_vec()),
        Ok(None) => Err("frame truncated".into()),
        Err(e) => Err(e.to_string()),
    }
}

/// Decodes a whole mono stream written by the encoder: its STREAMINFO and
/// every sample that follows the metadata.
pub fn decode_stream(bytes: &[u8]) -> Result<(StreamInfo, Vec<i32>), String> {
    let (info, _) = read_stream_header(bytes).ok_or("missing FLAC stream header")?;
    let mut reader = claxon::FlacReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let samples = reader
        .samples()
        .collect::<Result<Vec<i32>, _>>()
        .map_err(|e| e.to_string())?;
    Ok((info, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i32> {
        (0..len as i32).map(|i| (i * 37) % 4000 - 2000).collect()
    }

    #[test]
    fn frame_decodes_to_input() {
        let coder = FrameCoder::new(48_000, 12, 1).unwrap();
        let block = ramp(coder.block_size());
        let bytes = coder.encode(0, &block).unwrap();
        assert_eq!(decode_frame(&bytes).unwrap(), block);
    }

    #[test]
    fn short_tail_frame_decodes() {
        let coder = FrameCoder::new(40_000, 16, 5).unwrap();
        let tail = vec![7, -3, 12_000];
        let bytes = coder.encode(9, &tail).unwrap();
        assert_eq!(decode_frame(&bytes).unwrap(), tail);
    }

    #[test]
    fn flat_block_compresses() {
        let coder = FrameCoder::new(48_000, 8, 0).unwrap();
        let bytes = coder.encode(3, &vec![-5; 1152]).unwrap();
        assert!(bytes.len() < 32, "{} bytes", bytes.len());
        assert_eq!(decode_frame(&bytes).unwrap(), vec![-5; 1152]);
    }

    #[test]
    fn corrupted_frame_is_rejected() {
        let coder = FrameCoder::new(48_000, 16, 1).unwrap();
        let mut bytes = coder.encode(0, &ramp(1152)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(decode_frame(&bytes).is_err());
    }

    #[test]
    fn block_size_follows_level() {
        assert_eq!(block_size_for_level(0), 1152);
        assert_eq!(block_size_for_level(2), 1152);
        assert_eq!(block_size_for_level(3), 4096);
        assert_eq!(block_size_for_level(8), 4096);
    }
}
