//! Speech-to-text: the transcriber seam and its Whisper implementation.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{MockTranscriber, Transcriber, Transcript};
pub use whisper::{WhisperConfig, WhisperTranscriber};
