//! Effect system - traits, chains, and parameter mapping
//!
//! Insert effects ride a channel's signal path after the compressor and
//! before the gain stage, in the order they were added. All parameters are
//! normalized (0.0-1.0) so control surfaces can map them uniformly.

pub mod delay;
pub mod distortion;
pub mod reverb;

pub use delay::DelayEffect;
pub use distortion::DistortionEffect;
pub use reverb::ReverbEffect;

use serde::{Deserialize, Serialize};

use crate::types::StereoBuffer;

/// Effect categories known to the engine
///
/// Filter, compressor, and EQ exist as fixed strip stages on every channel;
/// the remaining kinds are constructed as chain inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Filter,
    Reverb,
    Delay,
    Distortion,
    Compressor,
    Eq,
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Filter => "Filter",
            EffectKind::Reverb => "Reverb",
            EffectKind::Delay => "Delay",
            EffectKind::Distortion => "Distortion",
            EffectKind::Compressor => "Compressor",
            EffectKind::Eq => "EQ",
        }
    }
}

/// Information about an effect parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name for display
    pub name: String,
    /// Default value (0.0-1.0)
    pub default: f32,
    /// Minimum value (typically 0.0)
    pub min: f32,
    /// Maximum value (typically 1.0)
    pub max: f32,
    /// Unit label (e.g., "ms", "dB", "%")
    pub unit: String,
}

impl Default for ParamInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: 0.5,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Current parameter value with display formatting
#[derive(Debug, Clone, Copy)]
pub struct ParamValue {
    /// Normalized value (0.0-1.0)
    pub normalized: f32,
    /// Actual value after range mapping
    pub actual: f32,
}

impl ParamValue {
    /// Create from normalized value with the given param info
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        let actual = info.min + normalized * (info.max - info.min);
        Self { normalized, actual }
    }
}

/// Information about an effect
#[derive(Debug, Clone)]
pub struct EffectInfo {
    /// Effect name for display
    pub name: String,
    /// Effect category
    pub kind: EffectKind,
    /// Parameter descriptions
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    pub fn new(name: impl Into<String>, kind: EffectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// The core effect trait - implemented by all insert effects
///
/// Effects process stereo buffers in-place on the audio thread, so
/// implementations must not allocate or block in `process`.
pub trait Effect: Send {
    /// Process a stereo buffer in-place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Get information about this effect (name, kind, parameters)
    fn info(&self) -> &EffectInfo;

    /// Get the current parameter values
    fn get_params(&self) -> &[ParamValue];

    /// Set a parameter by index (normalized value 0.0-1.0)
    fn set_param(&mut self, index: usize, value: f32);

    /// Set the bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Check if the effect is bypassed
    fn is_bypassed(&self) -> bool;

    /// Reset the effect state (called on source attach, etc.)
    fn reset(&mut self);
}

/// Base implementation helper for effects
///
/// Provides common functionality like bypass state and parameter storage.
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    params: Vec<ParamValue>,
    bypassed: bool,
}

impl EffectBase {
    pub fn new(info: EffectInfo) -> Self {
        let params: Vec<ParamValue> = info
            .params
            .iter()
            .map(|p| ParamValue::from_normalized(p.default, p))
            .collect();
        Self {
            info,
            params,
            bypassed: false,
        }
    }

    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    pub fn get_params(&self) -> &[ParamValue] {
        &self.params
    }

    pub fn set_param(&mut self, index: usize, value: f32) {
        if index < self.params.len() {
            self.params[index] = ParamValue::from_normalized(value, &self.info.params[index]);
        }
    }

    /// Get a parameter's actual (denormalized) value
    pub fn param_actual(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.actual).unwrap_or(0.0)
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

/// Ordered list of insert effects on one channel
///
/// Effects run in insertion order. The chain lives on the audio thread;
/// inserts arrive pre-boxed through the command queue.
#[derive(Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for effect in &mut self.effects {
            effect.process(buffer);
        }
    }

    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Box<dyn Effect>> {
        self.effects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_info() {
        let param = ParamInfo::new("Feedback", 0.4)
            .with_range(0.0, 0.95)
            .with_unit("%");

        assert_eq!(param.name, "Feedback");
        assert_eq!(param.default, 0.4);
        assert_eq!(param.max, 0.95);
        assert_eq!(param.unit, "%");
    }

    #[test]
    fn test_param_value_mapping() {
        let info = ParamInfo::new("Test", 0.5).with_range(0.0, 100.0);

        let value = ParamValue::from_normalized(0.5, &info);
        assert_eq!(value.normalized, 0.5);
        assert_eq!(value.actual, 50.0);

        // Out-of-range normalized input clamps
        let value = ParamValue::from_normalized(1.5, &info);
        assert_eq!(value.actual, 100.0);
    }

    #[test]
    fn test_effect_base() {
        let info = EffectInfo::new("Test", EffectKind::Delay)
            .with_param(ParamInfo::new("P1", 0.5).with_range(0.0, 100.0));
        let mut base = EffectBase::new(info);

        assert_eq!(base.param_actual(0), 50.0);
        base.set_param(0, 1.0);
        assert_eq!(base.param_actual(0), 100.0);

        assert!(!base.is_bypassed());
        base.set_bypass(true);
        assert!(base.is_bypassed());
    }

    #[test]
    fn test_chain_runs_in_insertion_order() {
        let mut chain = EffectChain::new();
        assert!(chain.is_empty());

        chain.push(Box::new(DistortionEffect::new()));
        chain.push(Box::new(DelayEffect::new(0.25, 0.4)));
        assert_eq!(chain.len(), 2);

        let kinds: Vec<EffectKind> = chain.iter().map(|e| e.info().kind).collect();
        assert_eq!(kinds, vec![EffectKind::Distortion, EffectKind::Delay]);
    }
}
