//! Pipeline orchestration: stages, outcomes, and failure classification.

pub mod orchestrator;

pub use orchestrator::{Pipeline, PipelineConfig};

use crate::error::BergvoxError;
use crate::report::ResultArtifact;
use std::fmt;

/// States an invocation moves through, in order.
///
/// A failure is recorded against the state the invocation had reached when
/// the faulting operation began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Normalized,
    Transcribed,
    Scored,
    Finalized,
}

impl Stage {
    /// The stage label used in log records.
    pub fn label(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Normalized => "normalized",
            Self::Transcribed => "transcribed",
            Self::Scored => "scored",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-visible failure classification, one kind per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedFormat,
    DecodeError,
    ModelUnavailable,
    EncodingFault,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Collapse a stage error into its user-visible kind.
    pub fn classify(error: &BergvoxError) -> Self {
        match error {
            BergvoxError::UnsupportedFormat { .. } => Self::UnsupportedFormat,
            BergvoxError::AudioDecode { .. } | BergvoxError::ToolMissing { .. } => {
                Self::DecodeError
            }
            BergvoxError::ModelNotFound { .. } | BergvoxError::TranscriptionFailed { .. } => {
                Self::ModelUnavailable
            }
            BergvoxError::Encoding(_) => Self::EncodingFault,
            BergvoxError::Timeout { .. } => Self::Timeout,
            _ => Self::Internal,
        }
    }
}

/// The single outcome of one pipeline invocation.
///
/// Stage failures never escape the orchestrator; they arrive here as
/// `Error(kind)` after being logged with the failing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A score was extracted and serialized.
    Delivered(ResultArtifact),
    /// The transcript was valid but mentioned no score. Not an error.
    NotFound,
    /// A stage failed; the artifact was never produced.
    Error(ErrorKind),
}
