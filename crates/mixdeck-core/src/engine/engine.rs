//! MixEngine - the audio-thread side of the console
//!
//! Owns every channel and the mix bus. The audio callback drives it:
//! drain the command queue, render all channels (in parallel when there
//! is more than a couple), then fold them into the crossfader bus.
//!
//! The engine is an explicit instance, not process-global state; tests
//! construct as many as they like.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::engine::channel::{Channel, ChannelAtomics};
use crate::engine::command::EngineCommand;
use crate::engine::mixer::MixBus;
use crate::types::{CrossfaderSide, StereoBuffer};

pub struct MixEngine {
    channels: HashMap<String, Channel>,
    bus: MixBus,
    sample_rate: u32,
    /// How many channels have been created; decides crossfader sides
    created: usize,
}

impl MixEngine {
    pub fn new(sample_rate: u32, master_gain: f32) -> Self {
        Self {
            channels: HashMap::new(),
            bus: MixBus::new(master_gain),
            sample_rate,
            created: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Register a channel; the first two created feed crossfader sides A
    /// and B, later ones bypass the fader at full level.
    pub fn create_channel(&mut self, id: String, atomics: Arc<ChannelAtomics>) {
        if self.channels.contains_key(&id) {
            return;
        }
        let mut channel = Channel::new(id.clone(), self.sample_rate, atomics);
        channel.side = match self.created {
            0 => CrossfaderSide::A,
            1 => CrossfaderSide::B,
            _ => CrossfaderSide::Center,
        };
        self.created += 1;
        self.channels.insert(id, channel);
    }

    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn channel_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    /// Drain the control queue; called once per buffer before rendering
    pub fn process_commands(&mut self, queue: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = queue.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::CreateChannel { id, atomics } => {
                self.create_channel(id, atomics);
            }
            EngineCommand::RemoveChannel { id } => {
                if let Some(mut channel) = self.channels.remove(&id) {
                    channel.stop_source();
                }
            }
            EngineCommand::AttachSource { id, buffer, tap } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.attach_source(buffer, tap);
                }
            }
            EngineCommand::StopSource { id } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.stop_source();
                }
            }
            EngineCommand::SetGain { id, gain } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.set_gain(gain);
                }
            }
            EngineCommand::SetEq { id, band, gain_db } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.set_eq_db(band, gain_db);
                }
            }
            EngineCommand::SetFilter { id, cutoff, kind } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.set_filter(cutoff, kind);
                }
            }
            EngineCommand::AddEffect { id, effect } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.add_effect(effect);
                }
            }
            EngineCommand::SetPlaybackRate { id, rate } => {
                if let Some(channel) = self.channels.get_mut(&id) {
                    channel.set_rate(rate);
                }
            }
            EngineCommand::SetCrossfader { position } => {
                self.bus.set_crossfader(position);
            }
            EngineCommand::SetMasterGain { gain } => {
                self.bus.set_master_gain(gain);
            }
            EngineCommand::DisposeAll => {
                for channel in self.channels.values_mut() {
                    channel.stop_source();
                }
                self.channels.clear();
                self.created = 0;
            }
        }
    }

    /// Render one buffer of `frames` samples through every channel and
    /// the mix bus
    pub fn process(&mut self, frames: usize) -> &StereoBuffer {
        // Channel strips are independent; worth parallelizing past a pair
        if self.channels.len() > 2 {
            self.channels.par_iter_mut().for_each(|(_, channel)| {
                channel.process(frames);
            });
        } else {
            for channel in self.channels.values_mut() {
                channel.process(frames);
            }
        }

        self.bus.begin(frames);
        for channel in self.channels.values() {
            self.bus.add_channel(channel.output(), channel.side);
        }
        self.bus.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ChannelAnalyzer;
    use crate::engine::command::command_channel;
    use crate::engine::eq::eq_value_to_db;
    use crate::types::{EqBand, StereoSample, FFT_SIZE, SAMPLE_RATE};

    fn atomics() -> Arc<ChannelAtomics> {
        Arc::new(ChannelAtomics::new())
    }

    #[test]
    fn test_create_is_idempotent() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        engine.create_channel("a".into(), atomics());
        engine.create_channel("a".into(), atomics());
        assert_eq!(engine.channel_count(), 1);
    }

    #[test]
    fn test_side_assignment_order() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        engine.create_channel("a".into(), atomics());
        engine.create_channel("b".into(), atomics());
        engine.create_channel("c".into(), atomics());

        assert_eq!(engine.channel("a").unwrap().side, CrossfaderSide::A);
        assert_eq!(engine.channel("b").unwrap().side, CrossfaderSide::B);
        assert_eq!(engine.channel("c").unwrap().side, CrossfaderSide::Center);
    }

    #[test]
    fn test_unknown_channel_commands_are_noops() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::SetGain {
            id: "ghost".into(),
            gain: 0.5,
        })
        .ok()
        .unwrap();
        tx.push(EngineCommand::StopSource { id: "ghost".into() })
            .ok()
            .unwrap();

        engine.process_commands(&mut rx);
        assert_eq!(engine.channel_count(), 0);
    }

    #[test]
    fn test_commands_set_channel_state() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::CreateChannel {
            id: "a".into(),
            atomics: atomics(),
        })
        .ok()
        .unwrap();
        tx.push(EngineCommand::SetGain {
            id: "a".into(),
            gain: 3.0,
        })
        .ok()
        .unwrap();
        tx.push(EngineCommand::SetEq {
            id: "a".into(),
            band: EqBand::Low,
            gain_db: eq_value_to_db(1.0),
        })
        .ok()
        .unwrap();
        engine.process_commands(&mut rx);

        let channel = engine.channel("a").unwrap();
        assert_eq!(channel.gain(), 1.0); // Clamped from 3.0
    }

    #[test]
    fn test_dispose_clears_registry() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        engine.create_channel("a".into(), atomics());
        engine.create_channel("b".into(), atomics());

        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::DisposeAll).ok().unwrap();
        engine.process_commands(&mut rx);

        assert_eq!(engine.channel_count(), 0);

        // Side assignment starts over after dispose
        engine.create_channel("c".into(), atomics());
        assert_eq!(engine.channel("c").unwrap().side, CrossfaderSide::A);
    }

    #[test]
    fn test_empty_engine_renders_silence() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        let out = engine.process(256);
        assert_eq!(out.len(), 256);
        assert!(out.iter().all(|s| s.left == 0.0 && s.right == 0.0));
    }

    /// Full path: impulse train source -> strip -> tap -> analyzer -> tempo.
    /// Peaks at a 500-sample spacing at 44100 Hz imply 1323 BPM, which the
    /// estimator clamps to 200.
    #[test]
    fn test_impulse_train_tempo_through_full_strip() {
        let mut engine = MixEngine::new(SAMPLE_RATE, 1.0);
        let shared = atomics();
        engine.create_channel("a".into(), shared.clone());

        // Impulse train spanning several FFT windows
        let n = FFT_SIZE * 4;
        let mut source = StereoBuffer::silence(n);
        for i in (0..n).step_by(500) {
            source.as_mut_slice()[i] = StereoSample::new(1.0, 1.0);
        }

        let (tap, tap_rx) = rtrb::RingBuffer::new(n * 2);
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::AttachSource {
            id: "a".into(),
            buffer: Arc::new(source),
            tap,
        })
        .ok()
        .unwrap();
        // Full A so the crossfader passes the channel at unity
        tx.push(EngineCommand::SetCrossfader { position: -1.0 })
            .ok()
            .unwrap();
        engine.process_commands(&mut rx);

        // Render enough buffers to push a full analysis window to the tap
        let mut rendered = 0;
        while rendered < FFT_SIZE * 2 {
            engine.process(512);
            rendered += 512;
        }

        let mut analyzer = ChannelAnalyzer::new(tap_rx, SAMPLE_RATE);
        let snapshot = analyzer.poll().expect("analysis window should be full");
        assert_eq!(snapshot.result.tempo, 200.0);
        assert!(snapshot.result.loudness > 0.0);
    }
}
