//! Audio post-processing and host hand-off
//!
//! The APU mixer produces one mono value per CPU cycle; this module holds
//! everything that happens after resampling: the filter chain shaping the
//! output and the lock-free ring the host's audio thread drains.

mod dsp;
mod ring;

pub use dsp::{DcBlocker, HighPassFilter, LowPassFilter};
pub use ring::{SampleRing, RING_CAPACITY};

/// Low-pass cutoff approximating the console's output stage
const LOW_PASS_CUTOFF: f32 = 12_000.0;

/// High-pass cutoff removing inaudible rumble
const HIGH_PASS_CUTOFF: f32 = 90.0;

/// The filter chain applied to every resampled sample: DC removal, then
/// the analog-stage approximations
pub struct FilterChain {
    dc: DcBlocker,
    low_pass: LowPassFilter,
    high_pass: HighPassFilter,
}

impl FilterChain {
    /// Build the chain for a host sample rate
    pub fn new(sample_rate: u32) -> Self {
        FilterChain {
            dc: DcBlocker::new(),
            low_pass: LowPassFilter::new(sample_rate, LOW_PASS_CUTOFF),
            high_pass: HighPassFilter::new(sample_rate, HIGH_PASS_CUTOFF),
        }
    }

    /// Run one sample through the chain
    pub fn process(&mut self, input: f32) -> f32 {
        let centered = self.dc.process(input);
        self.high_pass.process(self.low_pass.process(centered))
    }

    pub fn reset(&mut self) {
        self.dc.reset();
        self.low_pass.reset();
        self.high_pass.reset();
    }
}
