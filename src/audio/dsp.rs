//! Digital signal processing for audio
//!
//! Filters applied to the mixed APU output before it reaches the host:
//! a DC blocker to strip the mixer's standing offset, plus first-order
//! low-pass and high-pass stages approximating the console's analog
//! output path.

/// DC-blocking filter: `y[n] = x[n] - x[n-1] + R * y[n-1]`
///
/// A sustained offset decays by the pole factor every sample, so constant
/// mixer bias never reaches the speakers.
pub struct DcBlocker {
    /// Pole factor R
    pole: f32,

    /// Previous input
    prev_input: f32,

    /// Previous output
    prev_output: f32,
}

impl DcBlocker {
    /// Create a DC blocker with the standard pole factor
    pub fn new() -> Self {
        DcBlocker {
            pole: 0.995,
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    /// Process a sample through the filter
    pub fn process(&mut self, input: f32) -> f32 {
        let output = input - self.prev_input + self.pole * self.prev_output;
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        DcBlocker::new()
    }
}

/// Low-pass filter (attenuate high frequencies)
pub struct LowPassFilter {
    /// Filter coefficient
    alpha: f32,

    /// Previous output
    prev_output: f32,
}

/// High-pass filter (attenuate low frequencies)
pub struct HighPassFilter {
    /// Filter coefficient
    alpha: f32,

    /// Previous input
    prev_input: f32,

    /// Previous output
    prev_output: f32,
}

impl LowPassFilter {
    /// Create a new low-pass filter
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        let dt = 1.0 / sample_rate as f32;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff);

        LowPassFilter {
            alpha: dt / (dt + rc),
            prev_output: 0.0,
        }
    }

    /// Process a sample through the filter
    pub fn process(&mut self, input: f32) -> f32 {
        self.prev_output += self.alpha * (input - self.prev_output);
        self.prev_output
    }

    pub fn reset(&mut self) {
        self.prev_output = 0.0;
    }
}

impl HighPassFilter {
    /// Create a new high-pass filter
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        let dt = 1.0 / sample_rate as f32;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff);

        HighPassFilter {
            alpha: rc / (dt + rc),
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    /// Process a sample through the filter
    pub fn process(&mut self, input: f32) -> f32 {
        self.prev_output = self.alpha * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output
    }

    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_blocker_decays_constant_input() {
        let mut filter = DcBlocker::new();
        let first = filter.process(0.5);
        assert!((first - 0.5).abs() < 1e-6);

        // Each further sample of the same level decays by the pole factor.
        let mut prev = first;
        for _ in 0..10 {
            let out = filter.process(0.5);
            assert!((out - prev * 0.995).abs() < 1e-6);
            prev = out;
        }
    }

    #[test]
    fn dc_blocker_converges_to_zero_mean() {
        let mut filter = DcBlocker::new();
        let mut sum = 0.0f64;
        let count = 44_100;
        for _ in 0..count {
            sum += filter.process(0.25) as f64;
        }
        assert!((sum / count as f64).abs() < 1e-3);
    }

    #[test]
    fn low_pass_smooths_steps() {
        let mut filter = LowPassFilter::new(44_100, 12_000.0);
        let first = filter.process(1.0);
        assert!(first > 0.0 && first < 1.0);
        let second = filter.process(1.0);
        assert!(second > first);
    }

    #[test]
    fn high_pass_rejects_dc() {
        let mut filter = HighPassFilter::new(44_100, 90.0);
        let mut last = 0.0;
        for _ in 0..44_100 {
            last = filter.process(1.0);
        }
        assert!(last.abs() < 1e-3);
    }
}
