//! Error types for bergvox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BergvoxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Transport token env var {var} is not set")]
    TokenMissing { var: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio normalization errors
    #[error("Unsupported audio container: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("Audio tool not found: {tool}")]
    ToolMissing { tool: String },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Transcription inference failed: {message}")]
    TranscriptionFailed { message: String },

    // Result encoding errors
    #[error("Result encoding failed: {0}")]
    Encoding(#[from] rust_xlsxwriter::XlsxError),

    // Pipeline errors
    #[error("Invocation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Transport rejected credentials: {message}")]
    TransportAuth { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BergvoxError>;
