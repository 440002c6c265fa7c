//! CPAL output backend
//!
//! Builds the single stereo output stream and hands the [`MixEngine`] to
//! its callback, which then owns the engine exclusively. Commands reach
//! the callback through the lock-free queue; nothing else crosses the
//! thread boundary.
//!
//! ```text
//! ┌──────────────────┐                   ┌─────────────────────┐
//! │  Control thread  │───push()─────────►│   Command Queue     │
//! │  (MixerConsole)  │                   │  (lock-free SPSC)   │
//! └──────────────────┘                   └──────────┬──────────┘
//!         ▲                                         │ pop()
//!         │ Relaxed atomics                         ▼
//! ┌──────────────────┐                   ┌─────────────────────┐
//! │  ChannelAtomics  │◄──────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │    sync writes    │   (owns MixEngine)  │
//! └──────────────────┘                   └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig};

use crate::engine::{EngineCommand, MixEngine};
use crate::error::{EngineError, EngineResult};
use crate::types::MAX_BUFFER_SIZE;

/// Keeps the output stream alive; drop to stop audio
pub struct OutputHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl OutputHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Resume a paused stream; starting an already-running stream is a
    /// no-op on every backend we use
    pub fn resume(&self) -> EngineResult<()> {
        self._stream
            .play()
            .map_err(|e| EngineError::StreamPlayError(e.to_string()))
    }
}

/// Pick the best f32 stereo output config near the requested rate
fn select_output_config(
    device: &cpal::Device,
    target_sample_rate: u32,
    requested_buffer: u32,
) -> EngineResult<(StreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| EngineError::ConfigError(e.to_string()))?
        .collect();

    if supported.is_empty() {
        return Err(EngineError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| {
            target_sample_rate >= c.min_sample_rate().0
                && target_sample_rate <= c.max_sample_rate().0
        })
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| {
            EngineError::ConfigError("No suitable output configuration found".to_string())
        })?;

    if best.sample_format() != SampleFormat::F32 {
        return Err(EngineError::UnsupportedFormat(format!(
            "{:?}",
            best.sample_format()
        )));
    }

    let sample_rate = if target_sample_rate >= best.min_sample_rate().0
        && target_sample_rate <= best.max_sample_rate().0
    {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    let buffer_size = requested_buffer.clamp(64, MAX_BUFFER_SIZE as u32);
    let config = StreamConfig {
        channels: best.channels(),
        sample_rate,
        buffer_size: BufferSize::Fixed(buffer_size),
    };

    Ok((config, buffer_size))
}

/// Build and start the output stream, moving the engine onto the audio
/// thread
pub fn start_output(
    mut engine: MixEngine,
    mut command_rx: rtrb::Consumer<EngineCommand>,
    target_sample_rate: u32,
    requested_buffer: u32,
) -> EngineResult<OutputHandle> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(EngineError::NoDefaultDevice(host.id().name().to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (config, buffer_size) = select_output_config(&device, target_sample_rate, requested_buffer)?;
    let sample_rate = config.sample_rate.0;
    let channels = config.channels as usize;

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        channels,
        sample_rate,
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let n_frames = data.len() / channels;

                engine.process_commands(&mut command_rx);
                let mix = engine.process(n_frames);

                let samples = mix.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if i < samples.len() {
                        let sample = samples[i];
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| EngineError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| EngineError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(OutputHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
    })
}
