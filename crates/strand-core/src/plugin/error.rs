//! Plugin host error types

use thiserror::Error;

/// Errors surfaced at the plugin boundary
#[derive(Error, Debug)]
pub enum PluginError {
    /// No provider with this name registered
    #[error("Plugin not found: {0}")]
    NotFound(String),

    /// Control index past the descriptor's port list
    #[error("Control index {index} out of range ({count} controls)")]
    ControlOutOfRange { index: usize, count: usize },

    /// Provider failed to create an instance
    #[error("Failed to instantiate plugin: {0}")]
    Instantiate(String),

    /// Processing failed mid-run
    #[error("Plugin run failed: {0}")]
    Run(String),
}

/// Result type for plugin operations
pub type PluginResult<T> = Result<T, PluginError>;
