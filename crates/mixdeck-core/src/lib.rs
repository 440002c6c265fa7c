//! Mixdeck Core - real-time DJ mixing engine
//!
//! Routes named playback channels through a full strip (filter, 3-band
//! EQ, compressor, insert effects, gain) into an equal-power crossfader
//! bus, while per-channel worker threads continuously extract features
//! (loudness, spectral centroid, tempo, musical key, timbre) from the
//! live signal.
//!
//! Entry point is [`MixerConsole`]: construct one from an
//! [`EngineConfig`], call `initialize()`, and drive it with control
//! commands. Audio rendering happens on the device callback thread,
//! which owns the [`MixEngine`] outright; analysis happens on dedicated
//! worker threads fed by lock-free taps.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod console;
pub mod effect;
pub mod engine;
pub mod error;
pub mod music;
pub mod types;

pub use analysis::{AnalysisResult, AnalysisSnapshot, AnalysisStore};
pub use config::{default_config_path, load_config, save_config, EngineConfig};
pub use console::MixerConsole;
pub use effect::{DelayEffect, DistortionEffect, Effect, EffectKind, ReverbEffect};
pub use engine::{ChannelAtomics, EngineCommand, MixEngine};
pub use error::{EngineError, EngineResult};
pub use music::MusicalKey;
pub use types::{
    CrossfaderSide, EqBand, FilterKind, StereoBuffer, StereoSample, FFT_SIZE, SAMPLE_RATE,
};
