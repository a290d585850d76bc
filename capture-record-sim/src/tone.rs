use std::f64::consts::TAU;

/// Largest magnitude of a signed 12-bit sample.
pub const MAX_12BIT: i16 = 2047;

/// Sine source producing 12-bit samples held in `i16`.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    amplitude: f64,
    phase: f64,
    step: f64,
}

impl ToneGenerator {
    /// `amplitude` is clamped to the 12-bit range.
    pub fn new(frequency: f64, amplitude: i16, sample_rate: u32) -> Self {
        Self {
            amplitude: f64::from(amplitude.clamp(0, MAX_12BIT)),
            phase: 0.0,
            step: TAU * frequency / f64::from(sample_rate.max(1)),
        }
    }

    /// Replaces the contents of `out` with the next `len` samples.
    pub fn fill(&mut self, len: usize, out: &mut Vec<i16>) {
        out.clear();
        out.extend((0..len).map(|_| {
            let sample = (self.phase.sin() * self.amplitude).round() as i16;
            self.phase = (self.phase + self.step) % TAU;
            sample
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_12_bits() {
        let mut tone = ToneGenerator::new(440.0, i16::MAX, 40_000);
        let mut out = Vec::new();
        tone.fill(10_000, &mut out);
        assert_eq!(out.len(), 10_000);
        assert!(out.iter().all(|s| (-MAX_12BIT..=MAX_12BIT).contains(s)));
        assert!(out.iter().copied().max().unwrap() > 2000);
    }

    #[test]
    fn continues_phase_across_calls() {
        let mut whole = ToneGenerator::new(1000.0, 1500, 40_000);
        let mut split = whole.clone();
        let mut expected = Vec::new();
        whole.fill(200, &mut expected);

        let mut first = Vec::new();
        let mut second = Vec::new();
        split.fill(120, &mut first);
        split.fill(80, &mut second);
        first.extend(second);
        assert_eq!(first, expected);
    }
}
