//! bergvox - Berg Balance Scale score extraction from voice messages
//!
//! Receives voice notes over a messaging transport, normalizes the audio,
//! transcribes it with Whisper, pulls out the Berg-scale score, and replies
//! with a one-cell spreadsheet.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod score;
pub mod service;
pub mod stt;
pub mod transport;

// Core seams (clip → transcript → score → artifact)
pub use audio::{AudioClip, ClipFormat, Waveform};
pub use report::ResultArtifact;
pub use score::extract_berg_score;
pub use stt::{Transcriber, Transcript};
pub use transport::{Delivery, IncomingClip, ReplyTarget, Transport};

// Pipeline
pub use pipeline::{ErrorKind, Outcome, Pipeline, PipelineConfig, Stage};

// Error handling
pub use error::{BergvoxError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.2+abc1234"` when git hash is available, `"0.1.2"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(ver.contains('+'));
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
