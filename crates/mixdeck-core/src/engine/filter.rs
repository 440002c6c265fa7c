//! General-purpose channel filter
//!
//! A two-pole state-variable filter switchable between lowpass, highpass,
//! bandpass, and allpass response. Allpass is the default and leaves the
//! amplitude spectrum untouched, matching a channel with no filtering
//! applied.

use crate::types::{FilterKind, StereoBuffer};

/// Cutoff is clamped to this range (Hz)
pub const MIN_CUTOFF: f32 = 20.0;
pub const MAX_CUTOFF: f32 = 20_000.0;

const DEFAULT_CUTOFF: f32 = 1000.0;
const DEFAULT_Q: f32 = 0.707;

/// Two-pole (12dB/octave) state-variable filter
struct SvfFilter {
    // State per channel
    ic1eq_l: f32,
    ic2eq_l: f32,
    ic1eq_r: f32,
    ic2eq_r: f32,
    // Coefficients
    g: f32,
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl SvfFilter {
    fn new(sample_rate: u32) -> Self {
        let mut f = Self {
            ic1eq_l: 0.0,
            ic2eq_l: 0.0,
            ic1eq_r: 0.0,
            ic2eq_r: 0.0,
            g: 0.0,
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        };
        f.set_params(DEFAULT_CUTOFF, DEFAULT_Q, sample_rate);
        f
    }

    fn set_params(&mut self, cutoff: f32, q: f32, sample_rate: u32) {
        let cutoff = cutoff.clamp(MIN_CUTOFF, MAX_CUTOFF);
        let q = q.clamp(0.1, 10.0);

        self.g = (std::f32::consts::PI * cutoff / sample_rate as f32).tan();
        self.k = 1.0 / q;
        self.a1 = 1.0 / (1.0 + self.g * (self.g + self.k));
        self.a2 = self.g * self.a1;
        self.a3 = self.g * self.a2;
    }

    /// Process and return (lowpass, highpass, bandpass)
    #[inline]
    fn process(&mut self, left: f32, right: f32) -> ((f32, f32), (f32, f32), (f32, f32)) {
        // Left channel
        let v3_l = left - self.ic2eq_l;
        let v1_l = self.a1 * self.ic1eq_l + self.a2 * v3_l;
        let v2_l = self.ic2eq_l + self.a2 * self.ic1eq_l + self.a3 * v3_l;
        self.ic1eq_l = 2.0 * v1_l - self.ic1eq_l;
        self.ic2eq_l = 2.0 * v2_l - self.ic2eq_l;

        let low_l = v2_l;
        let band_l = v1_l;
        let high_l = left - self.k * band_l - low_l;

        // Right channel
        let v3_r = right - self.ic2eq_r;
        let v1_r = self.a1 * self.ic1eq_r + self.a2 * v3_r;
        let v2_r = self.ic2eq_r + self.a2 * self.ic1eq_r + self.a3 * v3_r;
        self.ic1eq_r = 2.0 * v1_r - self.ic1eq_r;
        self.ic2eq_r = 2.0 * v2_r - self.ic2eq_r;

        let low_r = v2_r;
        let band_r = v1_r;
        let high_r = right - self.k * band_r - low_r;

        ((low_l, low_r), (high_l, high_r), (band_l, band_r))
    }

    fn reset(&mut self) {
        self.ic1eq_l = 0.0;
        self.ic2eq_l = 0.0;
        self.ic1eq_r = 0.0;
        self.ic2eq_r = 0.0;
    }
}

/// Channel filter stage: SVF plus a response selector
pub struct ChannelFilter {
    filter: SvfFilter,
    kind: FilterKind,
    cutoff: f32,
    sample_rate: u32,
}

impl ChannelFilter {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            filter: SvfFilter::new(sample_rate),
            kind: FilterKind::default(),
            cutoff: DEFAULT_CUTOFF,
            sample_rate,
        }
    }

    /// Set response type and cutoff; cutoff clamps to [20, 20000] Hz
    pub fn configure(&mut self, cutoff: f32, kind: FilterKind) {
        self.cutoff = cutoff.clamp(MIN_CUTOFF, MAX_CUTOFF);
        self.kind = kind;
        self.filter.set_params(self.cutoff, DEFAULT_Q, self.sample_rate);
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        // Allpass leaves the signal untouched and keeps no state to warm up
        if self.kind == FilterKind::AllPass {
            return;
        }

        for sample in buffer.iter_mut() {
            let (low, high, band) = self.filter.process(sample.left, sample.right);
            let (l, r) = match self.kind {
                FilterKind::LowPass => low,
                FilterKind::HighPass => high,
                FilterKind::BandPass => band,
                FilterKind::AllPass => unreachable!(),
            };
            sample.left = l;
            sample.right = r;
        }
    }

    pub fn reset(&mut self) {
        self.filter.reset();
    }
}
