use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independently captured streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// Index into per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn label(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How samples for one channel are laid out in its ring buffer.
///
/// Raw layouts carry little-endian `i8` (8-bit) or `i16` samples that are
/// written to disk verbatim. Encoded layouts carry little-endian `i32`
/// samples already scaled to `bits_per_sample`, ready for the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleLayout {
    pub bits_per_sample: u8,
    pub encoded: bool,
}

impl SampleLayout {
    pub fn raw(bits_per_sample: u8) -> Self {
        Self {
            bits_per_sample,
            encoded: false,
        }
    }

    pub fn encoded(bits_per_sample: u8) -> Self {
        Self {
            bits_per_sample,
            encoded: true,
        }
    }

    /// Width of one sample in the ring buffer.
    pub fn bytes_per_sample(&self) -> usize {
        if self.encoded {
            4
        } else if self.bits_per_sample <= 8 {
            1
        } else {
            2
        }
    }

    /// Packs the layout into a single byte; 0 is reserved for "no layout".
    pub(crate) fn to_bits(self) -> u8 {
        (self.bits_per_sample & 0x7F) | if self.encoded { 0x80 } else { 0 }
    }

    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x7F {
            0 => None,
            depth => Some(Self {
                bits_per_sample: depth,
                encoded: bits & 0x80 != 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_indices_are_distinct() {
        assert_eq!(Channel::A.index(), 0);
        assert_eq!(Channel::B.index(), 1);
        assert_eq!(Channel::B.to_string(), "B");
    }

    #[test]
    fn sample_widths() {
        assert_eq!(SampleLayout::raw(8).bytes_per_sample(), 1);
        assert_eq!(SampleLayout::raw(16).bytes_per_sample(), 2);
        assert_eq!(SampleLayout::encoded(8).bytes_per_sample(), 4);
        assert_eq!(SampleLayout::encoded(12).bytes_per_sample(), 4);
    }

    #[test]
    fn layout_packing() {
        for layout in [SampleLayout::raw(8), SampleLayout::raw(16), SampleLayout::encoded(12)] {
            assert_eq!(SampleLayout::from_bits(layout.to_bits()), Some(layout));
        }
        assert_eq!(SampleLayout::from_bits(0), None);
    }
}
