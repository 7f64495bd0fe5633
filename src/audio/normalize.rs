//! Clip normalization: compressed voice recordings → canonical waveform.
//!
//! Telegram voice notes arrive as OGG/Opus. The container is decoded by an
//! `ffmpeg` subprocess into a 16kHz mono WAV inside the caller's scratch
//! directory; the WAV is then parsed in-process. Pre-decoded WAV clips skip
//! the subprocess entirely.

use crate::audio::wav;
use crate::defaults::{CHANNELS, SAMPLE_RATE};
use crate::error::{BergvoxError, Result};
use std::io::Cursor;
use std::path::Path;
use tokio::process::Command;

/// Container formats the normalizer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    /// OGG container with Opus audio (Telegram voice notes).
    OggOpus,
    /// Uncompressed RIFF/WAVE.
    Wav,
}

impl ClipFormat {
    /// Map a transport-provided MIME type to a recognized container.
    ///
    /// Returns `None` for anything the decoder does not handle; callers
    /// turn that into `UnsupportedFormat`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let base = mime.split(';').next().unwrap_or("").trim();
        match base {
            "audio/ogg" | "audio/opus" | "application/ogg" => Some(Self::OggOpus),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(Self::Wav),
            _ => None,
        }
    }

    /// File extension used for scratch files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::OggOpus => "ogg",
            Self::Wav => "wav",
        }
    }

    /// Check the container magic bytes before any decoding work.
    fn magic_matches(self, bytes: &[u8]) -> bool {
        match self {
            Self::OggOpus => bytes.starts_with(b"OggS"),
            Self::Wav => bytes.starts_with(b"RIFF"),
        }
    }
}

/// A raw voice recording as delivered by the transport. Immutable.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: ClipFormat,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, format: ClipFormat) -> Self {
        Self { bytes, format }
    }

    /// Build a clip from bytes plus the transport's MIME tag.
    ///
    /// # Errors
    /// `UnsupportedFormat` if the MIME type names a container the decoder
    /// does not recognize.
    pub fn from_mime(bytes: Vec<u8>, mime: &str) -> Result<Self> {
        let format = ClipFormat::from_mime(mime).ok_or_else(|| BergvoxError::UnsupportedFormat {
            format: mime.to_string(),
        })?;
        Ok(Self { bytes, format })
    }
}

/// Decoded audio in the canonical representation required by the
/// transcriber: 16kHz mono 16-bit PCM.
///
/// Owned by exactly one pipeline invocation; dropped after transcription.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    fn canonical(samples: Vec<i16>) -> Self {
        Self {
            samples,
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
        }
    }

    /// Duration of the decoded audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a clip into the canonical waveform.
///
/// `scratch` is invocation-scoped temporary storage owned by the caller;
/// everything written here is reclaimed when the caller's scope ends.
///
/// # Errors
/// * `AudioDecode` — bytes truncated or malformed, or ffmpeg rejected them.
/// * `ToolMissing` — ffmpeg is not on PATH.
pub async fn normalize(clip: &AudioClip, scratch: &Path) -> Result<Waveform> {
    if clip.bytes.is_empty() || !clip.format.magic_matches(&clip.bytes) {
        return Err(BergvoxError::AudioDecode {
            message: format!(
                "clip bytes do not match the declared {:?} container",
                clip.format
            ),
        });
    }

    match clip.format {
        ClipFormat::Wav => {
            let samples = wav::read_canonical(Cursor::new(clip.bytes.as_slice()))?;
            Ok(Waveform::canonical(samples))
        }
        ClipFormat::OggOpus => {
            let input = scratch.join(format!("input.{}", clip.format.extension()));
            let output = scratch.join("normalized.wav");
            tokio::fs::write(&input, &clip.bytes).await?;

            run_ffmpeg(&input, &output).await?;

            let wav_bytes = tokio::fs::read(&output).await?;
            let samples = wav::read_canonical(Cursor::new(wav_bytes))?;
            Ok(Waveform::canonical(samples))
        }
    }
}

/// Convert `input` to 16kHz mono 16-bit PCM WAV at `output`.
async fn run_ffmpeg(input: &Path, output: &Path) -> Result<()> {
    let result = Command::new("ffmpeg")
        .arg("-hide_banner")
        .args(["-loglevel", "error"])
        .arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-ar", "16000"])
        .args(["-ac", "1"])
        .args(["-sample_fmt", "s16"])
        .arg(output)
        .output()
        .await;

    let out = match result {
        Ok(out) => out,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BergvoxError::ToolMissing {
                tool: "ffmpeg".to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if !out.status.success() {
        return Err(BergvoxError::AudioDecode {
            message: format!(
                "ffmpeg exited with {}: {}",
                out.status,
                stderr_suffix(&out.stderr)
            ),
        });
    }

    Ok(())
}

/// Last few lines of ffmpeg stderr, enough to diagnose without flooding logs.
fn stderr_suffix(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    const MAX: usize = 400;
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let start = trimmed.len() - MAX;
        // Avoid splitting a UTF-8 codepoint
        let start = (start..trimmed.len())
            .find(|&i| trimmed.is_char_boundary(i))
            .unwrap_or(start);
        format!("...{}", &trimmed[start..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mime_recognizes_ogg_variants() {
        assert_eq!(ClipFormat::from_mime("audio/ogg"), Some(ClipFormat::OggOpus));
        assert_eq!(
            ClipFormat::from_mime("audio/ogg; codecs=opus"),
            Some(ClipFormat::OggOpus)
        );
        assert_eq!(ClipFormat::from_mime("audio/opus"), Some(ClipFormat::OggOpus));
    }

    #[test]
    fn from_mime_recognizes_wav_variants() {
        assert_eq!(ClipFormat::from_mime("audio/wav"), Some(ClipFormat::Wav));
        assert_eq!(ClipFormat::from_mime("audio/x-wav"), Some(ClipFormat::Wav));
    }

    #[test]
    fn from_mime_rejects_unknown_containers() {
        assert_eq!(ClipFormat::from_mime("audio/mp4"), None);
        assert_eq!(ClipFormat::from_mime("video/webm"), None);
        assert_eq!(ClipFormat::from_mime(""), None);
    }

    #[test]
    fn clip_from_mime_maps_unknown_to_unsupported_format() {
        let result = AudioClip::from_mime(vec![1, 2, 3], "audio/mp4");
        match result {
            Err(BergvoxError::UnsupportedFormat { format }) => {
                assert_eq!(format, "audio/mp4");
            }
            _ => panic!("Expected UnsupportedFormat error"),
        }
    }

    #[test]
    fn waveform_duration() {
        let wave = Waveform::canonical(vec![0i16; 32000]);
        assert!((wave.duration_secs() - 2.0).abs() < f64::EPSILON);
        assert_eq!(wave.sample_rate, 16000);
        assert_eq!(wave.channels, 1);
    }

    #[tokio::test]
    async fn normalize_rejects_mismatched_magic() {
        let clip = AudioClip::new(b"not an ogg stream".to_vec(), ClipFormat::OggOpus);
        let scratch = tempfile::tempdir().unwrap();

        let result = normalize(&clip, scratch.path()).await;

        match result {
            Err(BergvoxError::AudioDecode { message }) => {
                assert!(message.contains("OggOpus"));
            }
            other => panic!("Expected AudioDecode error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn normalize_rejects_empty_clip() {
        let clip = AudioClip::new(Vec::new(), ClipFormat::Wav);
        let scratch = tempfile::tempdir().unwrap();

        assert!(normalize(&clip, scratch.path()).await.is_err());
    }

    #[tokio::test]
    async fn normalize_parses_wav_clip_without_ffmpeg() {
        let wav_bytes = crate::audio::wav::test_support::make_wav_data(16000, 1, &[10i16, 20, 30]);
        let clip = AudioClip::new(wav_bytes, ClipFormat::Wav);
        let scratch = tempfile::tempdir().unwrap();

        let wave = normalize(&clip, scratch.path()).await.unwrap();

        assert_eq!(wave.samples, vec![10i16, 20, 30]);
        assert_eq!(wave.sample_rate, 16000);
    }

    #[tokio::test]
    async fn normalize_rejects_truncated_wav() {
        let mut wav_bytes = crate::audio::wav::test_support::make_wav_data(16000, 1, &[10i16; 100]);
        wav_bytes.truncate(16); // header cut mid-chunk
        let clip = AudioClip::new(wav_bytes, ClipFormat::Wav);
        let scratch = tempfile::tempdir().unwrap();

        let result = normalize(&clip, scratch.path()).await;
        assert!(matches!(result, Err(BergvoxError::AudioDecode { .. })));
    }

    #[test]
    fn stderr_suffix_truncates_long_output() {
        let long = "x".repeat(1000);
        let suffix = stderr_suffix(long.as_bytes());
        assert!(suffix.starts_with("..."));
        assert!(suffix.len() <= 403);
    }

    #[test]
    fn stderr_suffix_keeps_short_output() {
        assert_eq!(stderr_suffix(b"  broken header\n"), "broken header");
    }
}
