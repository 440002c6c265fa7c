//! Feedback delay insert
//!
//! A stereo delay line with self-feedback and a fixed-level wet tap. The
//! wet signal is additive: the dry path continues to the gain stage
//! untouched, with the delayed copy blended on top.

use crate::effect::{Effect, EffectBase, EffectInfo, EffectKind, ParamInfo, ParamValue};
use crate::types::{StereoBuffer, SAMPLE_RATE};

/// Maximum delay time in seconds
const MAX_DELAY_SECONDS: f32 = 2.0;
/// Maximum delay buffer size in samples per channel
const MAX_DELAY_SAMPLES: usize = (SAMPLE_RATE as f32 * MAX_DELAY_SECONDS) as usize;

/// Wet tap level blended on top of the dry signal
const WET_LEVEL: f32 = 0.3;

/// Feedback ceiling; anything at or above 1.0 diverges
pub const MAX_FEEDBACK: f32 = 0.95;

/// Stereo delay line with feedback
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new() -> Self {
        Self {
            buffer_l: vec![0.0; MAX_DELAY_SAMPLES],
            buffer_r: vec![0.0; MAX_DELAY_SAMPLES],
            write_pos: 0,
            delay_samples: SAMPLE_RATE as usize / 4,
        }
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, MAX_DELAY_SAMPLES - 1);
    }

    #[inline]
    fn read(&self) -> (f32, f32) {
        let read_pos = if self.write_pos >= self.delay_samples {
            self.write_pos - self.delay_samples
        } else {
            MAX_DELAY_SAMPLES - (self.delay_samples - self.write_pos)
        };
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    /// Process one sample: read the tap, write input plus feedback, advance
    #[inline]
    fn process(&mut self, left: f32, right: f32, feedback: f32) -> (f32, f32) {
        let (delayed_l, delayed_r) = self.read();

        self.buffer_l[self.write_pos] = left + delayed_l * feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * feedback;
        self.write_pos = (self.write_pos + 1) % MAX_DELAY_SAMPLES;

        (delayed_l, delayed_r)
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Delay insert effect
///
/// Parameters:
/// - Time: delay time in seconds (0.001-2.0)
/// - Feedback: self-loop gain, clamped to [0, 0.95] for stability
///
/// The wet tap is a fixed 30% on top of the unmodified dry signal.
pub struct DelayEffect {
    base: EffectBase,
    delay_line: DelayLine,
}

impl DelayEffect {
    /// Create a delay with the given time (seconds) and feedback gain
    pub fn new(delay_seconds: f32, feedback: f32) -> Self {
        let delay_seconds = delay_seconds.clamp(0.001, MAX_DELAY_SECONDS);
        let time_norm = (delay_seconds - 0.001) / (MAX_DELAY_SECONDS - 0.001);
        let info = EffectInfo::new("Delay", EffectKind::Delay)
            .with_param(
                ParamInfo::new("Time", time_norm)
                    .with_range(0.001, MAX_DELAY_SECONDS)
                    .with_unit("s"),
            )
            .with_param(
                ParamInfo::new("Feedback", (feedback / MAX_FEEDBACK).clamp(0.0, 1.0))
                    .with_range(0.0, MAX_FEEDBACK),
            );

        let mut effect = Self {
            base: EffectBase::new(info),
            delay_line: DelayLine::new(),
        };
        effect.update_delay_time();
        effect
    }

    fn delay_time_seconds(&self) -> f32 {
        self.base.param_actual(0)
    }

    /// Feedback gain, bounded by the parameter range at 0.95
    fn feedback(&self) -> f32 {
        self.base.param_actual(1)
    }

    fn update_delay_time(&mut self) {
        let samples = (self.delay_time_seconds() * SAMPLE_RATE as f32) as usize;
        self.delay_line.set_delay_samples(samples);
    }
}

impl Effect for DelayEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        let feedback = self.feedback();
        for sample in buffer.iter_mut() {
            let (delayed_l, delayed_r) = self.delay_line.process(sample.left, sample.right, feedback);

            // Additive wet tap; dry passes through unchanged
            sample.left += delayed_l * WET_LEVEL;
            sample.right += delayed_r * WET_LEVEL;
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
        if index == 0 {
            self.update_delay_time();
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.delay_line.reset();
    }
}
