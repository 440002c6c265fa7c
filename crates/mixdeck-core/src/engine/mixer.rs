//! Mix bus - crossfader and master stage
//!
//! Channel outputs are weighted by the crossfader, summed, scaled by the
//! master gain, then run through a soft clip guard so a hot mix cannot
//! hand the device values outside [-1, 1].

use crate::types::{CrossfaderSide, StereoBuffer};

/// Equal-power crossfade law
///
/// Position -1 is full A, +1 is full B, 0 keeps both at -3 dB so the
/// combined power stays constant across the sweep.
pub fn crossfade_gains(position: f32) -> (f32, f32) {
    let position = position.clamp(-1.0, 1.0);
    let angle = (position + 1.0) * std::f32::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Clip guard threshold in linear amplitude; pure bypass below it
const CLIP_THRESHOLD: f32 = 0.95;

/// Soft clip guard: identity below the threshold, saturating toward 1 above
#[inline]
fn soft_clip(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= CLIP_THRESHOLD {
        return x;
    }
    let headroom = 1.0 - CLIP_THRESHOLD;
    let over = (magnitude - CLIP_THRESHOLD) / headroom;
    x.signum() * (CLIP_THRESHOLD + headroom * over.tanh())
}

/// Master mix stage shared by all channels
pub struct MixBus {
    /// Crossfader position in [-1, 1]
    position: f32,
    /// Master output gain, linear
    master_gain: f32,
    /// Pre-allocated mix output
    out: StereoBuffer,
}

impl MixBus {
    pub fn new(master_gain: f32) -> Self {
        Self {
            position: 0.0,
            master_gain: master_gain.clamp(0.0, 2.0),
            out: StereoBuffer::silence(crate::types::MAX_BUFFER_SIZE),
        }
    }

    pub fn set_crossfader(&mut self, position: f32) {
        self.position = position.clamp(-1.0, 1.0);
    }

    pub fn crossfader(&self) -> f32 {
        self.position
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain = gain.clamp(0.0, 2.0);
    }

    /// Gain applied to a channel on the given crossfader side
    pub fn side_gain(&self, side: CrossfaderSide) -> f32 {
        let (gain_a, gain_b) = crossfade_gains(self.position);
        match side {
            CrossfaderSide::A => gain_a,
            CrossfaderSide::B => gain_b,
            // Channels outside the A/B pair bypass the crossfader
            CrossfaderSide::Center => 1.0,
        }
    }

    /// Start a new mix frame of `frames` samples
    pub fn begin(&mut self, frames: usize) {
        let frames = frames.min(crate::types::MAX_BUFFER_SIZE);
        self.out.set_len_from_capacity(frames);
        self.out.fill_silence();
    }

    /// Accumulate one channel's output at its crossfader weight
    pub fn add_channel(&mut self, buffer: &StereoBuffer, side: CrossfaderSide) {
        self.out.add_scaled(buffer, self.side_gain(side));
    }

    /// Apply master gain and the clip guard, returning the mixed frame
    pub fn finish(&mut self) -> &StereoBuffer {
        let gain = self.master_gain;
        for sample in self.out.iter_mut() {
            sample.left = soft_clip(sample.left * gain);
            sample.right = soft_clip(sample.right * gain);
        }
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_crossfade_endpoints() {
        let (a, b) = crossfade_gains(-1.0);
        assert!((a - 1.0).abs() < 1e-6);
        assert!(b.abs() < 1e-6);

        let (a, b) = crossfade_gains(1.0);
        assert!(a.abs() < 1e-6);
        assert!((b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_crossfade_center_equal_power() {
        let (a, b) = crossfade_gains(0.0);
        assert!((a - b).abs() < 1e-6);
        // -3 dB each: squared gains sum to unity
        assert!((a * a + b * b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_crossfade_varies_with_position() {
        // The law must actually move with the fader
        let (a_left, _) = crossfade_gains(-0.5);
        let (a_right, _) = crossfade_gains(0.5);
        assert!(a_left > a_right);
    }

    #[test]
    fn test_position_clamped() {
        let mut bus = MixBus::new(1.0);
        bus.set_crossfader(5.0);
        assert_eq!(bus.crossfader(), 1.0);
        bus.set_crossfader(-5.0);
        assert_eq!(bus.crossfader(), -1.0);
    }

    #[test]
    fn test_mix_weights_sides() {
        let mut bus = MixBus::new(1.0);
        bus.set_crossfader(-1.0); // Full A

        let mut a = StereoBuffer::silence(4);
        let mut b = StereoBuffer::silence(4);
        for s in a.iter_mut() {
            *s = StereoSample::mono(0.25);
        }
        for s in b.iter_mut() {
            *s = StereoSample::mono(0.5);
        }

        bus.begin(4);
        bus.add_channel(&a, CrossfaderSide::A);
        bus.add_channel(&b, CrossfaderSide::B);
        let out = bus.finish();

        // B is fully faded out; the clip guard bypasses at this level
        assert!((out[0].left - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_center_channel_bypasses_fader() {
        let mut bus = MixBus::new(1.0);
        bus.set_crossfader(-1.0);
        assert_eq!(bus.side_gain(CrossfaderSide::Center), 1.0);
    }

    #[test]
    fn test_output_bounded() {
        let mut bus = MixBus::new(2.0);
        let mut hot = StereoBuffer::silence(8);
        for s in hot.iter_mut() {
            *s = StereoSample::mono(1.0);
        }

        bus.begin(8);
        bus.add_channel(&hot, CrossfaderSide::Center);
        bus.add_channel(&hot, CrossfaderSide::Center);
        let out = bus.finish();

        assert!(out.iter().all(|s| s.left.abs() <= 1.0 && s.right.abs() <= 1.0));
    }
}
