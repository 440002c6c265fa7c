//! Engine error types

use thiserror::Error;

/// Errors surfaced by engine lifecycle and control operations.
///
/// Only lifecycle failures are real errors: operating on an unknown channel
/// degrades to a no-op or `None`, and the analysis math never fails.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A channel or mix operation was issued before `initialize()` completed
    #[error("Engine not initialized; call initialize() first")]
    NotInitialized,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/resume stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format reported by the device
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
