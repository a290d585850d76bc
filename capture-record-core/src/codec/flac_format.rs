//! FLAC stream header utilities.
//!
//! Generates the `fLaC` marker, STREAMINFO and SEEKTABLE metadata blocks,
//! and the helpers the encoder uses to patch them once the stream length
//! is known.
//!
//! Header layout written by the encoder:
//! ```text
//! [0-3]    "fLaC"
//! [4-7]    block header: last=0/1, type 0 (STREAMINFO), length 34
//! [8-41]   STREAMINFO body
//! [42-45]  block header: last=1, type 3 (SEEKTABLE), length 18 * points
//! [46-..]  seek points, 18 bytes each
//! ```

use std::collections::TryReserveError;

pub const FLAC_MARKER: &[u8; 4] = b"fLaC";
pub const METADATA_HEADER_LEN: usize = 4;
pub const STREAMINFO_LEN: usize = 34;
pub const SEEK_POINT_LEN: usize = 18;

/// Offset of the STREAMINFO body from the start of the stream.
pub const STREAMINFO_OFFSET: u64 = (FLAC_MARKER.len() + METADATA_HEADER_LEN) as u64;
/// Offset of the first seek point from the start of the stream.
pub const SEEK_TABLE_OFFSET: u64 = STREAMINFO_OFFSET + (STREAMINFO_LEN + METADATA_HEADER_LEN) as u64;

/// Largest metadata block body (24-bit length field).
pub const MAX_METADATA_LEN: usize = (1 << 24) - 1;
/// Most seek points one SEEKTABLE block can hold.
pub const MAX_SEEK_POINTS: usize = MAX_METADATA_LEN / SEEK_POINT_LEN;
/// Sample number marking an unused seek point.
pub const PLACEHOLDER_SAMPLE: u64 = u64::MAX;

pub const BLOCK_TYPE_STREAMINFO: u8 = 0;
pub const BLOCK_TYPE_SEEKTABLE: u8 = 3;

/// Encodes a metadata block header.
///
/// ```text
/// bit 7      last-metadata-block flag
/// bits 0-6   block type
/// [1-3]      body length, 24-bit big-endian
/// ```
pub fn metadata_block_header(is_last: bool, block_type: u8, len: usize) -> [u8; METADATA_HEADER_LEN] {
    let len = len.min(MAX_METADATA_LEN) as u32;
    let flag = if is_last { 0x80 } else { 0 };
    let len_bytes = len.to_be_bytes();
    [flag | (block_type & 0x7F), len_bytes[1], len_bytes[2], len_bytes[3]]
}

/// Parsed metadata block header: `(is_last, block_type, body_len)`.
pub fn parse_metadata_block_header(bytes: &[u8]) -> Option<(bool, u8, usize)> {
    let header = bytes.get(..METADATA_HEADER_LEN)?;
    let len = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
    Some((header[0] & 0x80 != 0, header[0] & 0x7F, len))
}

/// STREAMINFO block contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    /// Smallest frame in bytes; 0 when unknown.
    pub min_frame_size: u32,
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    /// Samples per channel; 0 when unknown.
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// Serializes the 34-byte body.
    ///
    /// ```text
    /// [0-1]    min block size
    /// [2-3]    max block size
    /// [4-6]    min frame size (24 bits)
    /// [7-9]    max frame size (24 bits)
    /// [10-17]  sample rate (20) | channels-1 (3) | bits-1 (5) | total samples (36)
    /// [18-33]  MD5 of the unencoded audio (zero: not computed)
    /// ```
    pub fn to_bytes(&self) -> [u8; STREAMINFO_LEN] {
        let mut body = [0u8; STREAMINFO_LEN];
        body[0..2].copy_from_slice(&self.min_block_size.to_be_bytes());
        body[2..4].copy_from_slice(&self.max_block_size.to_be_bytes());
        body[4..7].copy_from_slice(&self.min_frame_size.to_be_bytes()[1..]);
        body[7..10].copy_from_slice(&self.max_frame_size.to_be_bytes()[1..]);

        let packed = (u64::from(self.sample_rate) & 0xF_FFFF) << 44
            | (u64::from(self.channels.saturating_sub(1)) & 0x7) << 41
            | (u64::from(self.bits_per_sample.saturating_sub(1)) & 0x1F) << 36
            | (self.total_samples & 0xF_FFFF_FFFF);
        body[10..18].copy_from_slice(&packed.to_be_bytes());
        body[18..34].copy_from_slice(&self.md5);
        body
    }

    pub fn parse(body: &[u8]) -> Option<Self> {
        let body = body.get(..STREAMINFO_LEN)?;
        let be24 = |b: &[u8]| u32::from_be_bytes([0, b[0], b[1], b[2]]);
        let mut packed_bytes = [0u8; 8];
        packed_bytes.copy_from_slice(&body[10..18]);
        let packed = u64::from_be_bytes(packed_bytes);
        let mut md5 = [0u8; 16];
        md5.copy_from_slice(&body[18..34]);

        Some(Self {
            min_block_size: u16::from_be_bytes([body[0], body[1]]),
            max_block_size: u16::from_be_bytes([body[2], body[3]]),
            min_frame_size: be24(&body[4..7]),
            max_frame_size: be24(&body[7..10]),
            sample_rate: (packed >> 44) as u32,
            channels: ((packed >> 41) & 0x7) as u8 + 1,
            bits_per_sample: ((packed >> 36) & 0x1F) as u8 + 1,
            total_samples: packed & 0xF_FFFF_FFFF,
            md5,
        })
    }
}

/// One SEEKTABLE entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPoint {
    /// First sample of the target frame, or [`PLACEHOLDER_SAMPLE`].
    pub sample_number: u64,
    /// Byte offset of the frame header from the first frame header.
    pub stream_offset: u64,
    pub frame_samples: u16,
}

impl SeekPoint {
    pub const fn placeholder() -> Self {
        Self {
            sample_number: PLACEHOLDER_SAMPLE,
            stream_offset: 0,
            frame_samples: 0,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.sample_number == PLACEHOLDER_SAMPLE
    }

    pub fn to_bytes(&self) -> [u8; SEEK_POINT_LEN] {
        let mut out = [0u8; SEEK_POINT_LEN];
        out[0..8].copy_from_slice(&self.sample_number.to_be_bytes());
        out[8..16].copy_from_slice(&self.stream_offset.to_be_bytes());
        out[16..18].copy_from_slice(&self.frame_samples.to_be_bytes());
        out
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let b = bytes.get(..SEEK_POINT_LEN)?;
        let mut sample = [0u8; 8];
        let mut offset = [0u8; 8];
        sample.copy_from_slice(&b[0..8]);
        offset.copy_from_slice(&b[8..16]);
        Some(Self {
            sample_number: u64::from_be_bytes(sample),
            stream_offset: u64::from_be_bytes(offset),
            frame_samples: u16::from_be_bytes([b[16], b[17]]),
        })
    }
}

/// Seek table sized up front for the longest stream the recording may
/// reach. The block cannot grow once audio follows it, so every point is
/// reserved before the first frame and filled in as frames are written.
#[derive(Debug, Clone)]
pub struct SeekTable {
    points: Vec<SeekPoint>,
    spacing: u64,
    next_target: usize,
}

impl SeekTable {
    /// Reserves one point every `spacing` samples up to `horizon` samples,
    /// capped at [`MAX_SEEK_POINTS`].
    pub fn template(spacing: u64, horizon: u64) -> Result<Self, TryReserveError> {
        let spacing = spacing.max(1);
        let wanted = (horizon / spacing).max(1);
        let count = usize::try_from(wanted).unwrap_or(usize::MAX).min(MAX_SEEK_POINTS);
        let mut points = Vec::new();
        points.try_reserve_exact(count)?;
        points.resize(count, SeekPoint::placeholder());
        Ok(Self {
            points,
            spacing,
            next_target: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Size of the SEEKTABLE block body.
    pub fn body_len(&self) -> usize {
        self.points.len() * SEEK_POINT_LEN
    }

    pub fn points(&self) -> &[SeekPoint] {
        &self.points
    }

    /// Fills every pending target that falls inside the frame starting at
    /// `first_sample`.
    pub fn record_frame(&mut self, first_sample: u64, frame_samples: usize, stream_offset: u64) {
        let end = first_sample + frame_samples as u64;
        while self.next_target < self.points.len() {
            let target = self.next_target as u64 * self.spacing;
            if target >= end {
                break;
            }
            self.points[self.next_target] = SeekPoint {
                sample_number: first_sample,
                stream_offset,
                frame_samples: frame_samples.min(u16::MAX as usize) as u16,
            };
            self.next_target += 1;
        }
    }

    /// Sorts by sample number and turns duplicates into placeholders, which
    /// sort to the end.
    pub fn finalize(&mut self) {
        self.points.sort_by_key(|p| p.sample_number);
        let mut last = None;
        for point in self.points.iter_mut().filter(|p| !p.is_placeholder()) {
            if last == Some(point.sample_number) {
                *point = SeekPoint::placeholder();
            } else {
                last = Some(point.sample_number);
            }
        }
        self.points.sort_by_key(|p| p.sample_number);
    }

    /// Serializes points `range` for writing in slices.
    pub fn encode_range(&self, range: std::ops::Range<usize>) -> Vec<u8> {
        let points = &self.points[range];
        let mut out = Vec::with_capacity(points.len() * SEEK_POINT_LEN);
        for point in points {
            out.extend_from_slice(&point.to_bytes());
        }
        out
    }
}

/// Reads STREAMINFO and, when present, the seek points from the start of a
/// FLAC stream.
pub fn read_stream_header(bytes: &[u8]) -> Option<(StreamInfo, Vec<SeekPoint>)> {
    if bytes.get(..4)? != FLAC_MARKER {
        return None;
    }
    let mut pos = FLAC_MARKER.len();
    let mut info = None;
    let mut seek_points = Vec::new();
    loop {
        let (is_last, block_type, len) = parse_metadata_block_header(bytes.get(pos..)?)?;
        pos += METADATA_HEADER_LEN;
        let body = bytes.get(pos..pos + len)?;
        match block_type {
            BLOCK_TYPE_STREAMINFO => info = StreamInfo::parse(body),
            BLOCK_TYPE_SEEKTABLE => {
                seek_points = body
                    .chunks_exact(SEEK_POINT_LEN)
                    .filter_map(SeekPoint::parse)
                    .collect();
            }
            _ => {}
        }
        pos += len;
        if is_last {
            break;
        }
    }
    info.map(|info| (info, seek_points))
}

/// Byte offset of the first audio frame.
pub fn audio_offset(bytes: &[u8]) -> Option<usize> {
    let mut pos = FLAC_MARKER.len();
    loop {
        let (is_last, _, len) = parse_metadata_block_header(bytes.get(pos..)?)?;
        pos += METADATA_HEADER_LEN + len;
        if is_last {
            return Some(pos);
        }
    }
}
