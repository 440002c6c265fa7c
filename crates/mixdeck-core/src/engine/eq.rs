//! Three-band channel EQ
//!
//! Low shelf at 100 Hz, mid peak at 1 kHz, high shelf at 10 kHz, each an
//! RBJ biquad. Coefficients are recomputed lazily when a band's gain
//! changes; near-flat bands collapse to passthrough coefficients.

use crate::types::{EqBand, StereoBuffer};

/// EQ frequency centers
const EQ_LO_FREQ: f32 = 100.0; // Low shelf at 100 Hz
const EQ_MID_FREQ: f32 = 1000.0; // Mid peak at 1 kHz
const EQ_HI_FREQ: f32 = 10000.0; // High shelf at 10 kHz
const EQ_MID_Q: f32 = 0.7; // Q for mid band

/// Gains within this margin of 0 dB use passthrough coefficients
const FLAT_DB: f32 = 0.1;

/// Biquad filter state, one pair of delay lines per stereo side
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    fn process(&mut self, input_l: f32, input_r: f32, coeffs: &BiquadCoeffs) -> (f32, f32) {
        // Left channel
        let out_l = coeffs.b0 * input_l + coeffs.b1 * self.x1_l + coeffs.b2 * self.x2_l
            - coeffs.a1 * self.y1_l - coeffs.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        // Right channel
        let out_r = coeffs.b0 * input_r + coeffs.b1 * self.x1_r + coeffs.b2 * self.x2_r
            - coeffs.a1 * self.y1_r - coeffs.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Biquad filter coefficients
#[derive(Debug, Clone)]
struct BiquadCoeffs {
    b0: f32, b1: f32, b2: f32,
    a1: f32, a2: f32,
}

impl BiquadCoeffs {
    /// Create low shelf filter coefficients
    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha) / a0,
        }
    }

    /// Create peaking EQ filter coefficients
    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    /// Create high shelf filter coefficients
    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha) / a0,
        }
    }

    /// Passthrough (unity gain, no filtering)
    fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

/// Map a normalized EQ control value [0,1] onto decibels
///
/// 0 -> -12 dB, 0.5 -> 0 dB, 1 -> +12 dB.
pub fn eq_value_to_db(value: f32) -> f32 {
    (value.clamp(0.0, 1.0) - 0.5) * 24.0
}

/// Three-band EQ strip stage
pub struct ThreeBandEq {
    sample_rate: f32,
    /// Gain per band in dB
    gains_db: [f32; 3],
    coeffs: [BiquadCoeffs; 3],
    states: [BiquadState; 3],
    dirty: bool,
}

impl ThreeBandEq {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            gains_db: [0.0; 3],
            coeffs: [
                BiquadCoeffs::passthrough(),
                BiquadCoeffs::passthrough(),
                BiquadCoeffs::passthrough(),
            ],
            states: Default::default(),
            dirty: false,
        }
    }

    /// Set one band's gain in dB; coefficients rebuild on the next process
    pub fn set_band_db(&mut self, band: EqBand, gain_db: f32) {
        let slot = &mut self.gains_db[band as usize];
        if (*slot - gain_db).abs() > f32::EPSILON {
            *slot = gain_db;
            self.dirty = true;
        }
    }

    pub fn band_db(&self, band: EqBand) -> f32 {
        self.gains_db[band as usize]
    }

    fn rebuild_coeffs(&mut self) {
        let sr = self.sample_rate;

        let lo = self.gains_db[EqBand::Low as usize];
        self.coeffs[EqBand::Low as usize] = if lo.abs() > FLAT_DB {
            BiquadCoeffs::low_shelf(EQ_LO_FREQ, lo, sr)
        } else {
            BiquadCoeffs::passthrough()
        };

        let mid = self.gains_db[EqBand::Mid as usize];
        self.coeffs[EqBand::Mid as usize] = if mid.abs() > FLAT_DB {
            BiquadCoeffs::peaking(EQ_MID_FREQ, mid, EQ_MID_Q, sr)
        } else {
            BiquadCoeffs::passthrough()
        };

        let hi = self.gains_db[EqBand::High as usize];
        self.coeffs[EqBand::High as usize] = if hi.abs() > FLAT_DB {
            BiquadCoeffs::high_shelf(EQ_HI_FREQ, hi, sr)
        } else {
            BiquadCoeffs::passthrough()
        };

        self.dirty = false;
    }

    /// Run the buffer through low, mid, then high band in series
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.dirty {
            self.rebuild_coeffs();
        }

        for sample in buffer.iter_mut() {
            let mut l = sample.left;
            let mut r = sample.right;
            for band in EqBand::ALL {
                let (nl, nr) = self.states[band as usize].process(l, r, &self.coeffs[band as usize]);
                l = nl;
                r = nr;
            }
            sample.left = l;
            sample.right = r;
        }
    }

    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StereoSample, SAMPLE_RATE};

    #[test]
    fn test_eq_value_mapping() {
        assert_eq!(eq_value_to_db(0.0), -12.0);
        assert_eq!(eq_value_to_db(0.5), 0.0);
        assert_eq!(eq_value_to_db(1.0), 12.0);

        // Out-of-range input clamps before mapping
        assert_eq!(eq_value_to_db(2.0), 12.0);
        assert_eq!(eq_value_to_db(-1.0), -12.0);
    }

    #[test]
    fn test_flat_eq_is_identity() {
        let mut eq = ThreeBandEq::new(SAMPLE_RATE);
        let mut buffer = StereoBuffer::silence(64);
        for (i, s) in buffer.iter_mut().enumerate() {
            *s = StereoSample::mono((i as f32 / 64.0).sin());
        }
        let original: Vec<f32> = buffer.iter().map(|s| s.left).collect();

        eq.process(&mut buffer);

        for (s, &orig) in buffer.iter().zip(original.iter()) {
            assert!((s.left - orig).abs() < 1e-6);
        }
    }

    #[test]
    fn test_low_boost_amplifies_low_frequency() {
        let mut eq = ThreeBandEq::new(SAMPLE_RATE);
        eq.set_band_db(EqBand::Low, 12.0);

        // 50 Hz tone, well inside the low shelf
        let n = 8192;
        let mut buffer = StereoBuffer::silence(n);
        for (i, s) in buffer.iter_mut().enumerate() {
            let t = i as f32 / SAMPLE_RATE as f32;
            *s = StereoSample::mono((2.0 * std::f32::consts::PI * 50.0 * t).sin());
        }
        eq.process(&mut buffer);

        // Skip the transient, then compare RMS against the unit-amplitude input
        let rms: f32 = {
            let tail: Vec<f32> = buffer.iter().skip(n / 2).map(|s| s.left).collect();
            (tail.iter().map(|x| x * x).sum::<f32>() / tail.len() as f32).sqrt()
        };
        let input_rms = 1.0 / 2.0_f32.sqrt();
        assert!(rms > input_rms * 1.5, "rms = {}, input = {}", rms, input_rms);
    }

    #[test]
    fn test_low_cut_attenuates_low_frequency() {
        let mut eq = ThreeBandEq::new(SAMPLE_RATE);
        eq.set_band_db(EqBand::Low, -12.0);

        let n = 8192;
        let mut buffer = StereoBuffer::silence(n);
        for (i, s) in buffer.iter_mut().enumerate() {
            let t = i as f32 / SAMPLE_RATE as f32;
            *s = StereoSample::mono((2.0 * std::f32::consts::PI * 50.0 * t).sin());
        }
        eq.process(&mut buffer);

        let rms: f32 = {
            let tail: Vec<f32> = buffer.iter().skip(n / 2).map(|s| s.left).collect();
            (tail.iter().map(|x| x * x).sum::<f32>() / tail.len() as f32).sqrt()
        };
        let input_rms = 1.0 / 2.0_f32.sqrt();
        assert!(rms < input_rms * 0.5, "rms = {}", rms);
    }
}
