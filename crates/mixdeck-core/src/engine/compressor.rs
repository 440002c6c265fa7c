//! Channel dynamics compressor
//!
//! Fixed-character soft-knee compressor sitting between the EQ and the
//! insert chain on every channel strip. The constants mirror a classic
//! broadcast preset: -24 dB threshold, 30 dB knee, 12:1 ratio, 3 ms
//! attack, 250 ms release.
//!
//! Feed-forward design: the sidechain tracks the stereo peak through an
//! exponential envelope follower, the gain computer maps the envelope
//! level to a gain reduction, and both channels are scaled by the same
//! reduction so the stereo image stays put.

use crate::types::StereoBuffer;

const THRESHOLD_DB: f32 = -24.0;
const KNEE_DB: f32 = 30.0;
const RATIO: f32 = 12.0;
const ATTACK_SECS: f32 = 0.003;
const RELEASE_SECS: f32 = 0.25;

#[inline]
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[inline]
fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-10).log10()
}

/// Soft-knee gain computer: input level in dB to output level in dB
///
/// Below the knee the line is identity; above it the slope is 1/ratio;
/// inside the knee the two are blended quadratically.
fn computed_db(input_db: f32) -> f32 {
    let overshoot = input_db - THRESHOLD_DB;
    if overshoot <= -KNEE_DB / 2.0 {
        input_db
    } else if overshoot >= KNEE_DB / 2.0 {
        THRESHOLD_DB + overshoot / RATIO
    } else {
        let t = overshoot + KNEE_DB / 2.0;
        input_db + (1.0 / RATIO - 1.0) * t * t / (2.0 * KNEE_DB)
    }
}

pub struct Compressor {
    /// Sidechain envelope, linear amplitude
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Compressor {
    pub fn new(sample_rate: u32) -> Self {
        // First-order exponential: coeff = exp(-1 / (tau * fs))
        let attack_coeff = (-1.0 / (ATTACK_SECS * sample_rate as f32)).exp();
        let release_coeff = (-1.0 / (RELEASE_SECS * sample_rate as f32)).exp();
        Self {
            envelope: 0.0,
            attack_coeff,
            release_coeff,
        }
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let peak = sample.peak();

            // Envelope follower: fast rise, slow fall
            let coeff = if peak > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = peak + coeff * (self.envelope - peak);

            let level_db = linear_to_db(self.envelope);
            let reduction_db = computed_db(level_db) - level_db;
            let gain = db_to_linear(reduction_db);

            sample.left *= gain;
            sample.right *= gain;
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}
