//! The per-invocation pipeline: normalize → transcribe → score → encode.
//!
//! Each invocation is independent and owns its scratch storage. The only
//! shared resource is the loaded transcription model; concurrent inference
//! is bounded by a semaphore so a burst of voice notes cannot exhaust
//! memory.

use crate::audio::{self, AudioClip};
use crate::defaults;
use crate::error::BergvoxError;
use crate::pipeline::{ErrorKind, Outcome, Stage};
use crate::report::{self, ResultArtifact};
use crate::score::extract_berg_score;
use crate::stt::Transcriber;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-invocation budget covering decode and transcription.
    pub timeout: Duration,
    /// Bound on simultaneous Whisper invocations.
    pub max_concurrent_transcriptions: usize,
    /// Root directory for invocation scratch dirs (system tmp when `None`).
    pub scratch_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(defaults::DEFAULT_TIMEOUT_SECS),
            max_concurrent_transcriptions: defaults::MAX_CONCURRENT_TRANSCRIPTIONS,
            scratch_root: None,
        }
    }
}

/// A stage error paired with the state the invocation had reached.
struct StageFailure {
    stage: Stage,
    error: BergvoxError,
}

impl StageFailure {
    fn at(stage: Stage) -> impl FnOnce(BergvoxError) -> Self {
        move |error| Self { stage, error }
    }
}

/// Sequences the pipeline stages for every incoming clip.
///
/// Holds the process-wide transcriber handle (read-only after startup) and
/// the inference gate. Cheap to share behind an `Arc`.
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    gate: Arc<Semaphore>,
    config: PipelineConfig,
    invocation_seq: AtomicU64,
}

impl Pipeline {
    pub fn new(transcriber: Arc<dyn Transcriber>, config: PipelineConfig) -> Self {
        let permits = config.max_concurrent_transcriptions.max(1);
        Self {
            transcriber,
            gate: Arc::new(Semaphore::new(permits)),
            config,
            invocation_seq: AtomicU64::new(0),
        }
    }

    /// Run one invocation to its single outcome.
    ///
    /// Never returns an error past this boundary: every stage failure is
    /// logged with the invocation id and failing stage, then collapsed to
    /// `Outcome::Error(kind)`. Scratch storage is reclaimed on every exit
    /// path, including timeout.
    pub async fn run(&self, clip: AudioClip) -> Outcome {
        let id = self.invocation_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let span = info_span!("invocation", id);

        async move {
            let started = Instant::now();
            let result = tokio::time::timeout(self.config.timeout, self.execute(&clip)).await;

            match result {
                Ok(Ok(Some(artifact))) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "score delivered"
                    );
                    Outcome::Delivered(artifact)
                }
                Ok(Ok(None)) => {
                    info!("no Berg score in transcript");
                    Outcome::NotFound
                }
                Ok(Err(failure)) => {
                    warn!(
                        stage = failure.stage.label(),
                        error = %failure.error,
                        "pipeline stage failed"
                    );
                    Outcome::Error(ErrorKind::classify(&failure.error))
                }
                Err(_) => {
                    warn!(
                        timeout_secs = self.config.timeout.as_secs(),
                        "invocation timed out"
                    );
                    Outcome::Error(ErrorKind::Timeout)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// The staged body: `Ok(Some)` delivered, `Ok(None)` score absent.
    ///
    /// The scratch dir lives exactly as long as this future; cancellation
    /// by the outer timeout still drops it.
    async fn execute(
        &self,
        clip: &AudioClip,
    ) -> std::result::Result<Option<ResultArtifact>, StageFailure> {
        let scratch = self
            .new_scratch()
            .map_err(StageFailure::at(Stage::Received))?;

        let wave = audio::normalize(clip, scratch.path())
            .await
            .map_err(StageFailure::at(Stage::Received))?;
        debug!(
            duration_secs = wave.duration_secs(),
            samples = wave.samples.len(),
            "clip normalized"
        );

        let transcript = self
            .transcribe_bounded(wave.samples)
            .await
            .map_err(StageFailure::at(Stage::Normalized))?;
        info!(transcript = %transcript.text, language = %transcript.language, "speech recognized");

        let score = extract_berg_score(&transcript.text);

        match score {
            Some(value) => {
                debug!(score = value, "Berg score extracted");
                let artifact = report::encode(value).map_err(StageFailure::at(Stage::Scored))?;
                Ok(Some(artifact))
            }
            None => Ok(None),
        }
    }

    /// Run inference on the blocking pool, gated by the semaphore.
    ///
    /// The permit moves into the blocking task, so it is held until the
    /// model actually finishes even if this future is cancelled by the
    /// timeout; the model never sees more than the configured concurrency.
    async fn transcribe_bounded(
        &self,
        samples: Vec<i16>,
    ) -> crate::error::Result<crate::stt::Transcript> {
        let permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|e| BergvoxError::Other(format!("inference gate closed: {}", e)))?;

        let transcriber = Arc::clone(&self.transcriber);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            transcriber.transcribe(&samples)
        })
        .await
        .map_err(|e| BergvoxError::Other(format!("inference task failed: {}", e)))?
    }

    fn new_scratch(&self) -> crate::error::Result<TempDir> {
        let scratch = match &self.config.scratch_root {
            Some(root) => TempDir::new_in(root)?,
            None => TempDir::new()?,
        };
        Ok(scratch)
    }
}
