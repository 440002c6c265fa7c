//! MixerConsole - the control-side facade over the engine
//!
//! The console owns the command producer, the analysis store, and the
//! control-side view of every channel. All audio work happens on the
//! audio thread behind the command queue; all analysis happens on the
//! per-channel worker threads. The console itself never blocks.
//!
//! Every console is an independent instance. Two consoles own two
//! engines, two output streams, and two analysis stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{spawn_worker, AnalysisResult, AnalysisStore};
use crate::audio::{start_output, OutputHandle};
use crate::config::EngineConfig;
use crate::effect::{DelayEffect, Effect, ReverbEffect};
use crate::engine::{command_channel, eq_value_to_db, ChannelAtomics, EngineCommand, MixEngine};
use crate::error::{EngineError, EngineResult};
use crate::types::{EqBand, FilterKind, StereoBuffer, FFT_SIZE};

/// Control-side record of one channel
struct ControlChannel {
    atomics: Arc<ChannelAtomics>,
    /// Liveness flag for the current analysis worker, if any
    worker_alive: Option<Arc<AtomicBool>>,
}

impl ControlChannel {
    fn stop_worker(&mut self) {
        if let Some(alive) = self.worker_alive.take() {
            alive.store(false, Ordering::Relaxed);
        }
    }
}

/// Everything that exists only between initialize() and dispose()
struct ConsoleInner {
    command_tx: rtrb::Producer<EngineCommand>,
    /// Absent only in headless tests
    output: Option<OutputHandle>,
    store: Arc<AnalysisStore>,
    channels: HashMap<String, ControlChannel>,
    sample_rate: u32,
    analysis_interval: Duration,
}

pub struct MixerConsole {
    config: EngineConfig,
    inner: Option<ConsoleInner>,
}

impl MixerConsole {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            inner: None,
        }
    }

    /// Bring up the engine and output stream
    ///
    /// Idempotent: a second call on a running console resumes the output
    /// stream and changes nothing else.
    pub fn initialize(&mut self) -> EngineResult<()> {
        if let Some(inner) = &self.inner {
            if let Some(output) = &inner.output {
                output.resume()?;
            }
            return Ok(());
        }

        let engine = MixEngine::new(self.config.sample_rate, self.config.master_gain);
        let (command_tx, command_rx) = command_channel();
        let output = start_output(
            engine,
            command_rx,
            self.config.sample_rate,
            self.config.buffer_size,
        )?;
        let sample_rate = output.sample_rate();

        self.inner = Some(ConsoleInner {
            command_tx,
            output: Some(output),
            store: Arc::new(AnalysisStore::new()),
            channels: HashMap::new(),
            sample_rate,
            analysis_interval: Duration::from_millis(self.config.analysis_interval_ms),
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    fn inner_mut(&mut self) -> EngineResult<&mut ConsoleInner> {
        self.inner.as_mut().ok_or(EngineError::NotInitialized)
    }

    /// Register a channel; safe to call for an existing id
    pub fn create_channel(&mut self, id: &str) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.ensure_channel(id);
        Ok(())
    }

    /// Drop a channel, its worker, and its published analysis
    pub fn remove_channel(&mut self, id: &str) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        if let Some(mut channel) = inner.channels.remove(id) {
            channel.stop_worker();
            inner.store.remove(id);
            inner.send(EngineCommand::RemoveChannel { id: id.to_string() });
        }
        Ok(())
    }

    /// Attach a decoded stereo source and start playing it
    ///
    /// Replaces any source already on the channel; the previous analysis
    /// worker is cancelled and a fresh one starts for the new material.
    pub fn attach_source(&mut self, id: &str, source: StereoBuffer) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.ensure_channel(id);

        let (tap, tap_rx) = rtrb::RingBuffer::new(FFT_SIZE * 4);

        let alive = Arc::new(AtomicBool::new(true));
        if let Some(channel) = inner.channels.get_mut(id) {
            channel.stop_worker();
            channel.worker_alive = Some(alive.clone());
        }
        spawn_worker(
            id.to_string(),
            tap_rx,
            inner.sample_rate,
            inner.analysis_interval,
            alive,
            inner.store.clone(),
        );

        inner.send(EngineCommand::AttachSource {
            id: id.to_string(),
            buffer: Arc::new(source),
            tap,
        });
        Ok(())
    }

    /// Stop a channel's source; tolerates a channel that is already quiet
    pub fn stop_source(&mut self, id: &str) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        if let Some(channel) = inner.channels.get_mut(id) {
            channel.stop_worker();
            inner.send(EngineCommand::StopSource { id: id.to_string() });
        }
        Ok(())
    }

    /// Set channel gain; values outside [0, 1] clamp at the channel
    pub fn set_channel_gain(&mut self, id: &str, gain: f32) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.ensure_channel(id);
        inner.send(EngineCommand::SetGain {
            id: id.to_string(),
            gain,
        });
        Ok(())
    }

    /// Set an EQ band from a normalized control value
    ///
    /// `value` in [0, 1] maps to (value - 0.5) * 24 dB.
    pub fn set_eq(&mut self, id: &str, band: EqBand, value: f32) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.ensure_channel(id);
        inner.send(EngineCommand::SetEq {
            id: id.to_string(),
            band,
            gain_db: eq_value_to_db(value),
        });
        Ok(())
    }

    /// Configure the channel filter; frequency clamps to [20, 20000] Hz
    pub fn set_filter(&mut self, id: &str, frequency: f32, kind: FilterKind) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.ensure_channel(id);
        inner.send(EngineCommand::SetFilter {
            id: id.to_string(),
            cutoff: frequency,
            kind,
        });
        Ok(())
    }

    /// Move the crossfader; position in [-1, 1], equal-power law
    pub fn set_crossfader(&mut self, position: f32) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.send(EngineCommand::SetCrossfader { position });
        Ok(())
    }

    pub fn set_master_gain(&mut self, gain: f32) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.send(EngineCommand::SetMasterGain { gain });
        Ok(())
    }

    /// Insert a convolution reverb on the channel
    pub fn add_reverb(&mut self, id: &str, room_size: f32, decay_seconds: f32) -> EngineResult<()> {
        self.add_effect(id, Box::new(ReverbEffect::new(room_size, decay_seconds)))
    }

    /// Insert a feedback delay on the channel
    ///
    /// Feedback is clamped to [0, 0.95] by the effect.
    pub fn add_delay(&mut self, id: &str, delay_seconds: f32, feedback: f32) -> EngineResult<()> {
        self.add_effect(id, Box::new(DelayEffect::new(delay_seconds, feedback)))
    }

    pub fn add_effect(&mut self, id: &str, effect: Box<dyn Effect>) -> EngineResult<()> {
        let inner = self.inner_mut()?;
        inner.ensure_channel(id);
        inner.send(EngineCommand::AddEffect {
            id: id.to_string(),
            effect,
        });
        Ok(())
    }

    /// Match the target channel's tempo to the source channel's
    ///
    /// Sets the target's playback-rate multiplier to
    /// `tempo(source) / tempo(target)`. A no-op when either channel has
    /// no playing source or no analysis yet.
    pub fn sync_bpm(&mut self, source_id: &str, target_id: &str) -> EngineResult<()> {
        let inner = self.inner_mut()?;

        let playing = |id: &str| {
            inner
                .channels
                .get(id)
                .map(|c| c.atomics.is_playing())
                .unwrap_or(false)
        };
        if !playing(source_id) || !playing(target_id) {
            return Ok(());
        }

        let tempo = |id: &str| inner.store.get(id).map(|s| s.result.tempo);
        let (source_tempo, target_tempo) = match (tempo(source_id), tempo(target_id)) {
            (Some(s), Some(t)) if t > 0.0 => (s, t),
            _ => return Ok(()),
        };

        inner.send(EngineCommand::SetPlaybackRate {
            id: target_id.to_string(),
            rate: (source_tempo / target_tempo) as f64,
        });
        Ok(())
    }

    /// Latest analysis for a channel, or None before the first window
    pub fn analysis(&self, id: &str) -> Option<AnalysisResult> {
        let inner = self.inner.as_ref()?;
        inner.store.get(id).map(|s| s.result)
    }

    /// Latest magnitude spectrum bytes (0-255), or None
    pub fn spectrum(&self, id: &str) -> Option<Vec<u8>> {
        let inner = self.inner.as_ref()?;
        inner.store.get(id).map(|s| s.spectrum)
    }

    /// Latest time-domain waveform bytes (midpoint 128), or None
    pub fn waveform(&self, id: &str) -> Option<Vec<u8>> {
        let inner = self.inner.as_ref()?;
        inner.store.get(id).map(|s| s.waveform)
    }

    /// Fractional position within the current beat (0..1)
    ///
    /// Derived from the channel's playhead clock and its latest tempo
    /// estimate. None when the channel is silent or unanalyzed.
    pub fn beat_phase(&self, id: &str) -> Option<f32> {
        let inner = self.inner.as_ref()?;
        let channel = inner.channels.get(id)?;
        if !channel.atomics.is_playing() {
            return None;
        }
        let tempo = inner.store.get(id)?.result.tempo;

        let seconds = channel.atomics.position() / inner.sample_rate as f64;
        let beats = seconds * tempo as f64 / 60.0;
        Some(beats.fract() as f32)
    }

    /// Tear everything down: stop sources and workers, clear the registry
    /// and analysis cache, release the output stream
    ///
    /// Subsequent operations fail with NotInitialized until the console is
    /// initialized again.
    pub fn dispose(&mut self) -> EngineResult<()> {
        let mut inner = self.inner.take().ok_or(EngineError::NotInitialized)?;
        for channel in inner.channels.values_mut() {
            channel.stop_worker();
        }
        inner.send(EngineCommand::DisposeAll);
        inner.store.clear();
        // Dropping inner drops the output handle and stops the stream
        Ok(())
    }
}

impl ConsoleInner {
    /// Create the channel on both sides if this id is new
    fn ensure_channel(&mut self, id: &str) {
        if self.channels.contains_key(id) {
            return;
        }
        let atomics = Arc::new(ChannelAtomics::new());
        self.channels.insert(
            id.to_string(),
            ControlChannel {
                atomics: atomics.clone(),
                worker_alive: None,
            },
        );
        self.send(EngineCommand::CreateChannel {
            id: id.to_string(),
            atomics,
        });
    }

    fn send(&mut self, command: EngineCommand) {
        if self.command_tx.push(command).is_err() {
            log::warn!("command queue full; dropping command");
        }
    }
}

impl Drop for MixerConsole {
    fn drop(&mut self) {
        let _ = self.dispose();
    }
}
