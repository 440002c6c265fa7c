//! Channel - one named audio path through the console
//!
//! Signal order is fixed: source → filter → EQ → compressor → insert
//! chain → gain → analysis tap. The channel owns its strip stages and its
//! playing source; the engine owns the channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::effect::{Effect, EffectChain};
use crate::engine::compressor::Compressor;
use crate::engine::eq::ThreeBandEq;
use crate::engine::filter::ChannelFilter;
use crate::types::{CrossfaderSide, EqBand, FilterKind, StereoBuffer, StereoSample};

/// Lock-free playback state shared with the control side
///
/// Written by the audio thread every buffer, read by beat-phase queries
/// without touching the command queue.
#[derive(Debug, Default)]
pub struct ChannelAtomics {
    /// Playhead position in source frames, f64 bits
    position: AtomicU64,
    /// Playback-rate multiplier, f64 bits
    rate: AtomicU64,
    playing: AtomicBool,
}

impl ChannelAtomics {
    pub fn new() -> Self {
        let atomics = Self::default();
        atomics.set_rate(1.0);
        atomics
    }

    pub fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Relaxed))
    }

    pub fn set_position(&self, position: f64) {
        self.position.store(position.to_bits(), Ordering::Relaxed);
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    pub fn set_rate(&self, rate: f64) {
        self.rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }
}

/// A decoded source currently attached to a channel
struct ChannelSource {
    buffer: Arc<StereoBuffer>,
    /// Playhead in source frames; fractional for rate != 1
    position: f64,
    /// Rate multiplier applied during read (1.0 = native speed)
    rate: f64,
}

impl ChannelSource {
    fn new(buffer: Arc<StereoBuffer>) -> Self {
        Self {
            buffer,
            position: 0.0,
            rate: 1.0,
        }
    }

    /// Read the next frame with linear interpolation, or None at the end
    #[inline]
    fn next_frame(&mut self) -> Option<StereoSample> {
        let len = self.buffer.len();
        let idx = self.position as usize;
        if idx >= len {
            return None;
        }

        let frac = (self.position - idx as f64) as f32;
        let a = self.buffer[idx];
        let b = if idx + 1 < len { self.buffer[idx + 1] } else { a };

        self.position += self.rate;
        Some(StereoSample::new(
            a.left + (b.left - a.left) * frac,
            a.right + (b.right - a.right) * frac,
        ))
    }
}

/// One console channel: source playback plus the full strip
pub struct Channel {
    pub id: String,
    /// Which crossfader side this channel feeds; assigned at creation
    pub side: CrossfaderSide,
    source: Option<ChannelSource>,
    filter: ChannelFilter,
    eq: ThreeBandEq,
    compressor: Compressor,
    chain: EffectChain,
    /// Linear amplitude, clamped to [0, 1]
    gain: f32,
    /// Post-strip mono tap feeding this channel's analysis worker
    tap: Option<rtrb::Producer<f32>>,
    atomics: Arc<ChannelAtomics>,
    /// Scratch output, reused every buffer
    out: StereoBuffer,
}

impl Channel {
    pub fn new(id: String, sample_rate: u32, atomics: Arc<ChannelAtomics>) -> Self {
        Self {
            id,
            side: CrossfaderSide::Center,
            source: None,
            filter: ChannelFilter::new(sample_rate),
            eq: ThreeBandEq::new(sample_rate),
            compressor: Compressor::new(sample_rate),
            chain: EffectChain::new(),
            gain: 1.0,
            tap: None,
            atomics,
            out: StereoBuffer::silence(crate::types::MAX_BUFFER_SIZE),
        }
    }

    /// Attach a decoded source and start playing it
    ///
    /// Replaces any prior source: the old one stops, the strip state
    /// resets so no tail from the previous material bleeds through.
    pub fn attach_source(&mut self, buffer: Arc<StereoBuffer>, tap: rtrb::Producer<f32>) {
        let rate = self.source.as_ref().map(|s| s.rate).unwrap_or(1.0);
        let mut source = ChannelSource::new(buffer);
        source.rate = rate;
        self.source = Some(source);
        self.tap = Some(tap);

        self.filter.reset();
        self.eq.reset();
        self.compressor.reset();
        self.chain.reset();

        self.atomics.set_position(0.0);
        self.atomics.set_playing(true);
    }

    /// Stop and detach the current source; no-op when nothing is playing
    pub fn stop_source(&mut self) {
        self.source = None;
        self.tap = None;
        self.atomics.set_playing(false);
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_eq_db(&mut self, band: EqBand, gain_db: f32) {
        self.eq.set_band_db(band, gain_db);
    }

    pub fn set_filter(&mut self, cutoff: f32, kind: FilterKind) {
        self.filter.configure(cutoff, kind);
    }

    pub fn set_rate(&mut self, rate: f64) {
        if let Some(source) = &mut self.source {
            source.rate = rate.max(0.0);
            self.atomics.set_rate(source.rate);
        }
    }

    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.chain.push(effect);
    }

    /// Render `frames` samples through the full strip
    ///
    /// Returns the channel's output buffer. Silent (and source-free)
    /// channels still run so effect tails decay naturally.
    pub fn process(&mut self, frames: usize) -> &StereoBuffer {
        let frames = frames.min(crate::types::MAX_BUFFER_SIZE);
        self.out.set_len_from_capacity(frames);
        self.out.fill_silence();

        let mut ended = false;
        if let Some(source) = &mut self.source {
            for sample in self.out.iter_mut() {
                match source.next_frame() {
                    Some(frame) => *sample = frame,
                    None => {
                        ended = true;
                        break;
                    }
                }
            }
            self.atomics.set_position(source.position);
        }
        if ended {
            self.stop_source();
        }

        self.filter.process(&mut self.out);
        self.eq.process(&mut self.out);
        self.compressor.process(&mut self.out);
        self.chain.process(&mut self.out);
        self.out.scale(self.gain);

        // Mono tap for the analysis worker; drop samples when it lags
        if let Some(tap) = &mut self.tap {
            for sample in self.out.iter() {
                let _ = tap.push(sample.mid());
            }
        }

        &self.out
    }

    /// Output of the most recent `process` call
    pub fn output(&self) -> &StereoBuffer {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    fn test_channel() -> Channel {
        Channel::new("test".into(), SAMPLE_RATE, Arc::new(ChannelAtomics::new()))
    }

    fn ramp_source(n: usize) -> Arc<StereoBuffer> {
        let mut buffer = StereoBuffer::silence(n);
        for (i, s) in buffer.iter_mut().enumerate() {
            *s = StereoSample::mono(0.001 * i as f32);
        }
        Arc::new(buffer)
    }

    #[test]
    fn test_gain_clamped() {
        let mut channel = test_channel();
        channel.set_gain(1.5);
        assert_eq!(channel.gain(), 1.0);
        channel.set_gain(-0.5);
        assert_eq!(channel.gain(), 0.0);
        channel.set_gain(0.42);
        assert_eq!(channel.gain(), 0.42);
    }

    #[test]
    fn test_attach_replaces_prior_source() {
        let mut channel = test_channel();
        let (tap1, _rx1) = rtrb::RingBuffer::new(1024);
        let (tap2, _rx2) = rtrb::RingBuffer::new(1024);

        channel.attach_source(ramp_source(100), tap1);
        assert!(channel.has_source());

        // Advance the first source before replacing it
        channel.process(50);

        channel.attach_source(ramp_source(200), tap2);
        assert!(channel.has_source());

        // The replacement starts fresh from position zero
        let out = channel.process(4);
        assert!((out[0].left - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_source_exhaustion_stops_playback() {
        let mut channel = test_channel();
        let (tap, _rx) = rtrb::RingBuffer::new(1024);
        channel.attach_source(ramp_source(64), tap);

        channel.process(128);
        assert!(!channel.has_source());
    }

    #[test]
    fn test_stop_without_source_is_noop() {
        let mut channel = test_channel();
        channel.stop_source();
        channel.stop_source();
        assert!(!channel.has_source());
    }

    #[test]
    fn test_rate_requires_source() {
        let atomics = Arc::new(ChannelAtomics::new());
        let mut channel = Channel::new("x".into(), SAMPLE_RATE, atomics.clone());

        // No source: rate change is ignored
        channel.set_rate(2.0);
        assert_eq!(atomics.rate(), 1.0);

        let (tap, _rx) = rtrb::RingBuffer::new(1024);
        channel.attach_source(ramp_source(1000), tap);
        channel.set_rate(2.0);
        assert_eq!(atomics.rate(), 2.0);

        // Double rate advances the playhead twice as far
        channel.process(100);
        assert!((atomics.position() - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_tap_receives_post_strip_mono() {
        let mut channel = test_channel();
        let (tap, mut rx) = rtrb::RingBuffer::new(1024);

        let mut buffer = StereoBuffer::silence(32);
        for s in buffer.iter_mut() {
            *s = StereoSample::new(0.01, 0.03);
        }
        channel.attach_source(Arc::new(buffer), tap);
        channel.set_gain(0.5);
        channel.process(32);

        let mut received = Vec::new();
        while let Ok(s) = rx.pop() {
            received.push(s);
        }
        assert_eq!(received.len(), 32);
        // Quiet signal passes the strip untouched except for the 0.5 gain:
        // mid of (0.01, 0.03) is 0.02, scaled to 0.01
        assert!((received[0] - 0.01).abs() < 1e-3);
    }

    #[test]
    fn test_silent_channel_outputs_silence() {
        let mut channel = test_channel();
        let out = channel.process(64);
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|s| s.left == 0.0 && s.right == 0.0));
    }
}
