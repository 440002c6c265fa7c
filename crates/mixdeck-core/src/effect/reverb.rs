//! Convolution reverb insert
//!
//! Synthesizes a decaying-noise impulse response and convolves the channel
//! signal with it on a wet path, blended at a fixed 30/70 wet/dry ratio.
//! The convolution is a direct form over an input history ring; impulse
//! length is capped so the per-sample cost stays bounded.

use crate::effect::{Effect, EffectBase, EffectInfo, EffectKind, ParamInfo, ParamValue};
use crate::types::{StereoBuffer, SAMPLE_RATE};

/// Fixed wet/dry blend
const WET_LEVEL: f32 = 0.3;
const DRY_LEVEL: f32 = 0.7;

/// Longest synthesized impulse in seconds
pub const MAX_DECAY_SECONDS: f32 = 3.0;

/// Synthesize one noise-burst impulse response channel
///
/// Sample `i` has amplitude `random(-1, 1) * ((len - i) / len)^room_size`:
/// white noise under an envelope whose steepness grows with room size.
pub fn synthesize_impulse(room_size: f32, decay_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let decay_seconds = decay_seconds.clamp(0.01, MAX_DECAY_SECONDS);
    let len = ((sample_rate as f32 * decay_seconds) as usize).max(1);

    (0..len)
        .map(|i| {
            let envelope = ((len - i) as f32 / len as f32).powf(room_size);
            (fastrand::f32() * 2.0 - 1.0) * envelope
        })
        .collect()
}

/// Streaming direct-form convolver over one channel
struct Convolver {
    impulse: Vec<f32>,
    /// Input history ring, same length as the impulse
    history: Vec<f32>,
    pos: usize,
}

impl Convolver {
    fn new(impulse: Vec<f32>) -> Self {
        let len = impulse.len().max(1);
        Self {
            impulse,
            history: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.history[self.pos] = input;

        let len = self.history.len();
        let mut acc = 0.0f32;
        for (tap, &coeff) in self.impulse.iter().enumerate() {
            let idx = (self.pos + len - tap) % len;
            acc += self.history[idx] * coeff;
        }

        self.pos = (self.pos + 1) % len;
        acc
    }

    fn reset(&mut self) {
        self.history.fill(0.0);
        self.pos = 0;
    }
}

/// Impulse-convolution reverb
///
/// Parameters:
/// - Room Size: envelope steepness of the synthesized impulse (0.0-1.0)
/// - Decay: impulse length in seconds (0.01-3.0)
///
/// Changing either parameter re-synthesizes the impulse, so parameter
/// moves are meant for setup time, not per-buffer automation.
pub struct ReverbEffect {
    base: EffectBase,
    conv_l: Convolver,
    conv_r: Convolver,
}

impl ReverbEffect {
    pub fn new(room_size: f32, decay_seconds: f32) -> Self {
        let room_size = room_size.clamp(0.0, 1.0);
        let decay_seconds = decay_seconds.clamp(0.01, MAX_DECAY_SECONDS);
        let decay_norm = (decay_seconds - 0.01) / (MAX_DECAY_SECONDS - 0.01);

        let info = EffectInfo::new("Reverb", EffectKind::Reverb)
            .with_param(ParamInfo::new("Room Size", room_size).with_range(0.0, 1.0))
            .with_param(
                ParamInfo::new("Decay", decay_norm)
                    .with_range(0.01, MAX_DECAY_SECONDS)
                    .with_unit("s"),
            );

        let impulse_l = synthesize_impulse(room_size, decay_seconds, SAMPLE_RATE);
        let impulse_r = synthesize_impulse(room_size, decay_seconds, SAMPLE_RATE);

        Self {
            base: EffectBase::new(info),
            conv_l: Convolver::new(impulse_l),
            conv_r: Convolver::new(impulse_r),
        }
    }

    fn resynthesize(&mut self) {
        let room_size = self.base.param_actual(0);
        let decay = self.base.param_actual(1);
        self.conv_l = Convolver::new(synthesize_impulse(room_size, decay, SAMPLE_RATE));
        self.conv_r = Convolver::new(synthesize_impulse(room_size, decay, SAMPLE_RATE));
    }
}

impl Effect for ReverbEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        for sample in buffer.iter_mut() {
            let wet_l = self.conv_l.process(sample.left);
            let wet_r = self.conv_r.process(sample.right);
            sample.left = sample.left * DRY_LEVEL + wet_l * WET_LEVEL;
            sample.right = sample.right * DRY_LEVEL + wet_r * WET_LEVEL;
        }
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.base.set_param(index, value);
        self.resynthesize();
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.conv_l.reset();
        self.conv_r.reset();
    }
}
