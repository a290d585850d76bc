//! Conversions between 12-bit ADC samples, ring buffer bytes and encoder
//! input.
//!
//! The producer captures 12-bit samples held in `i16`. What it pushes
//! depends on the channel's [`SampleLayout`]:
//!
//! | layout        | stored value   | ring bytes |
//! |---------------|----------------|------------|
//! | raw 16-bit    | sample as-is   | `i16` LE   |
//! | raw 8-bit     | `sample >> 4`  | `i8`       |
//! | FLAC 16-bit   | `sample << 4`  | `i32` LE   |
//! | FLAC 12-bit   | sample as-is   | `i32` LE   |
//! | FLAC 8-bit    | `sample >> 4`  | `i32` LE   |

use crate::models::channel::SampleLayout;

/// Scales one captured sample to the depth stored for `layout`.
pub fn scale_sample(sample: i16, layout: SampleLayout) -> i32 {
    let sample = i32::from(sample);
    match (layout.encoded, layout.bits_per_sample) {
        (_, 8) => sample >> 4,
        (true, 16) => sample << 4,
        _ => sample,
    }
}

/// Appends `samples` to `out` in the ring representation of `layout`.
pub fn encode_samples(samples: &[i16], layout: SampleLayout, out: &mut Vec<u8>) {
    out.reserve(samples.len() * layout.bytes_per_sample());
    match layout.bytes_per_sample() {
        1 => out.extend(samples.iter().map(|&s| scale_sample(s, layout) as i8 as u8)),
        2 => {
            for &s in samples {
                out.extend_from_slice(&(scale_sample(s, layout) as i16).to_le_bytes());
            }
        }
        _ => {
            for &s in samples {
                out.extend_from_slice(&scale_sample(s, layout).to_le_bytes());
            }
        }
    }
}

/// Decodes little-endian `i32` samples into `out`, replacing its contents.
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode_i32_le(bytes: &[u8], out: &mut Vec<i32>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_per_layout() {
        assert_eq!(scale_sample(2047, SampleLayout::raw(16)), 2047);
        assert_eq!(scale_sample(-2048, SampleLayout::raw(8)), -128);
        assert_eq!(scale_sample(2047, SampleLayout::encoded(16)), 32752);
        assert_eq!(scale_sample(-2048, SampleLayout::encoded(12)), -2048);
        assert_eq!(scale_sample(2047, SampleLayout::encoded(8)), 127);
    }

    #[test]
    fn raw_16bit_is_little_endian() {
        let mut out = Vec::new();
        encode_samples(&[0x0102, -1], SampleLayout::raw(16), &mut out);
        assert_eq!(out, vec![0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn raw_8bit_is_one_byte_per_sample() {
        let mut out = Vec::new();
        encode_samples(&[16, -16, 2047], SampleLayout::raw(8), &mut out);
        assert_eq!(out, vec![1, 0xFF, 127]);
    }

    #[test]
    fn encoded_samples_decode_back() {
        let layout = SampleLayout::encoded(12);
        let mut bytes = Vec::new();
        encode_samples(&[-2048, 0, 2047], layout, &mut bytes);
        assert_eq!(bytes.len(), 12);

        let mut samples = vec![99];
        decode_i32_le(&bytes, &mut samples);
        assert_eq!(samples, vec![-2048, 0, 2047]);
    }

    #[test]
    fn decode_ignores_partial_sample() {
        let mut samples = Vec::new();
        decode_i32_le(&[1, 0, 0, 0, 7, 7], &mut samples);
        assert_eq!(samples, vec![1]);
    }
}
