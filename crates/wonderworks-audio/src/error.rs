//! Error types for the site audio engine
//!
//! Most runtime failures never leave the engine: backend refusals, missing
//! assets and storage errors are logged and replaced by a safe fallback state.
//! These types are what the backend and settings traits report, and what
//! construction-time validation returns.

use thiserror::Error;

/// The main error type for engine, backend and settings operations
#[derive(Error, Debug)]
pub enum AudioError {
    /// The platform audio output refused an operation
    #[error("Audio backend error: {0}")]
    Backend(String),

    /// An asset could not be fetched or decoded
    #[error("Failed to load asset '{source_url}': {reason}")]
    AssetLoad {
        /// Asset path or URL
        source_url: String,
        /// Platform-provided failure description
        reason: String,
    },

    /// The settings store could not be read or written
    #[error("Settings storage error: {0}")]
    Storage(String),

    /// A channel name did not match `music`, `ambient` or `sfx`
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Engine configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error from a file-backed settings store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AudioError {
    /// Creates a backend error
    pub fn backend(reason: impl Into<String>) -> Self {
        AudioError::Backend(reason.into())
    }

    /// Creates an asset load error
    pub fn asset_load(source_url: impl Into<String>, reason: impl Into<String>) -> Self {
        AudioError::AssetLoad {
            source_url: source_url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a storage error
    pub fn storage(reason: impl Into<String>) -> Self {
        AudioError::Storage(reason.into())
    }

    /// Creates a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        AudioError::Config(reason.into())
    }
}

/// Type alias for Result using AudioError
pub type Result<T> = std::result::Result<T, AudioError>;
