//! Continuous per-channel audio analysis
//!
//! Feature extraction runs off the audio thread: the engine pushes post-mix
//! mono samples into a lock-free tap ring and a worker thread per channel
//! turns those into [`AnalysisSnapshot`]s on a fixed cadence.

pub mod features;
pub mod spectrum;
pub mod worker;

pub use features::{analyze, AnalysisResult, DEFAULT_BPM, MAX_BPM, MIN_BPM, TIMBRE_COEFFS};
pub use spectrum::SpectrumAnalyzer;
pub use worker::{spawn_worker, AnalysisSnapshot, AnalysisStore, ChannelAnalyzer};
