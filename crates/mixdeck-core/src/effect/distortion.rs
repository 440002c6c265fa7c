//! Tanh waveshaper distortion insert

use crate::effect::{Effect, EffectBase, EffectInfo, EffectKind, ParamInfo, ParamValue};
use crate::types::StereoBuffer;

/// Soft-clipping distortion
///
/// Parameters:
/// - Drive: pre-shaper gain in dB (0-20)
/// - Mix: dry/wet balance
///
/// Output is level-compensated so increasing drive adds saturation, not
/// loudness.
pub struct DistortionEffect {
    base: EffectBase,
}

impl DistortionEffect {
    pub fn new() -> Self {
        let info = EffectInfo::new("Distortion", EffectKind::Distortion)
            .with_param(ParamInfo::new("Drive", 0.3).with_range(0.0, 20.0).with_unit("dB"))
            .with_param(ParamInfo::new("Mix", 1.0).with_range(0.0, 1.0));
        Self {
            base: EffectBase::new(info),
        }
    }

    fn drive_gain(&self) -> f32 {
        10.0f32.powf(self.base.param_actual(0) / 20.0)
    }

    fn mix(&self) -> f32 {
        self.base.param_actual(1)
    }
}

impl Default for DistortionEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for DistortionEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        let gain = self.drive_gain();
        let compensation = gain.tanh().max(1e-3);
        let mix = self.mix();
        let dry = 1.0 - mix;

        for sample in buffer.iter_mut() {
            let wet_l = (sample.left * gain).tanh() / compensation;
            let wet_r = (sample.right * gain).tanh() / compensation;
            sample.left = sample.left * dry + wet_l * mix;
            sample.right = sample.right * dry + wet_r * mix;
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
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {}
}
