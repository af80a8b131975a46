//! Soundcard error types

use thiserror::Error;

/// Errors that can occur bringing up or driving audio output
#[derive(Error, Debug)]
pub enum SoundcardError {
    /// No audio devices available
    #[error("No audio output devices found")]
    NoDevices,

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Unsupported sample format
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for soundcard operations
pub type SoundcardResult<T> = Result<T, SoundcardError>;
