//! Default configuration constants for bergvox.
//!
//! Shared across configuration types to keep the pipeline, the transport
//! and the tests agreeing on the same values.

/// Audio sample rate in Hz required by the transcription stage.
///
/// 16kHz mono PCM is what Whisper expects; every clip is normalized to this
/// rate before inference.
pub const SAMPLE_RATE: u32 = 16000;

/// Channel count of the canonical waveform.
pub const CHANNELS: u16 = 1;

/// Default Whisper model path.
pub const DEFAULT_MODEL_PATH: &str = "models/ggml-base.bin";

/// Transcription language.
///
/// The bot serves Russian-speaking clinicians; the language is pinned, not
/// auto-detected, so short noisy voice notes are never mis-detected.
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Header label of the single column in the result artifact.
pub const SCORE_HEADER: &str = "Berg scale score";

/// Filename under which the result artifact is delivered.
pub const ARTIFACT_FILENAME: &str = "berg_score.xlsx";

/// Reply sent when a valid transcript contains no Berg-scale mention.
///
/// Distinct from the generic failure text: a missing score is a normal
/// outcome, not an error.
pub const NOT_FOUND_REPLY: &str = "Не удалось извлечь баллы по шкале Берга.";

/// Uniform reply sent for every pipeline failure.
///
/// Intentionally generic; the log record carries the failing stage and the
/// precise cause.
pub const FAILURE_REPLY: &str = "Произошла ошибка при обработке голосового сообщения.";

/// Default per-invocation timeout covering decode and transcription.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default bound on concurrent Whisper invocations.
///
/// The model is a shared, memory-heavy resource; one inference at a time is
/// the safe default on CPU hosts.
pub const MAX_CONCURRENT_TRANSCRIPTIONS: usize = 1;

/// Environment variable holding the transport authentication token.
pub const TOKEN_ENV: &str = "BOT_TOKEN";

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}
