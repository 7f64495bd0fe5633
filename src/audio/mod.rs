//! Audio acquisition and normalization.

pub mod normalize;
pub mod wav;

pub use normalize::{AudioClip, ClipFormat, Waveform, normalize};
