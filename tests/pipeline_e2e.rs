//! End-to-end tests: a WAV voice clip goes in through the transport, the
//! pipeline runs with a mock transcriber, and exactly one reply comes out.

use bergvox::defaults;
use bergvox::pipeline::{ErrorKind, Outcome, Pipeline, PipelineConfig};
use bergvox::stt::MockTranscriber;
use bergvox::transport::{ChannelTransport, Delivery, IncomingClip, ReplyTarget};
use bergvox::{AudioClip, ClipFormat};
use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;
use std::sync::Arc;

/// Builds an in-memory 16 kHz mono WAV clip of the given length.
fn wav_clip(seconds: f64) -> AudioClip {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: defaults::SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let total = (seconds * defaults::SAMPLE_RATE as f64) as usize;
        for i in 0..total {
            writer.write_sample(((i % 200) as i16) - 100).unwrap();
        }
        writer.finalize().unwrap();
    }
    AudioClip::new(cursor.into_inner(), ClipFormat::Wav)
}

fn pipeline_with(transcriber: MockTranscriber) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        Arc::new(transcriber),
        PipelineConfig::default(),
    ))
}

#[tokio::test]
async fn voice_note_with_score_yields_spreadsheet() {
    let pipeline = pipeline_with(
        MockTranscriber::new("mock").with_response("оценка по шкале берга 42 балла"),
    );

    let outcome = pipeline.run(wav_clip(1.0)).await;

    match outcome {
        Outcome::Delivered(artifact) => {
            assert_eq!(artifact.filename, defaults::ARTIFACT_FILENAME);
            // xlsx is a ZIP container
            assert!(artifact.bytes.starts_with(b"PK\x03\x04"));

            // Parse the artifact back: one header cell, one data cell
            // holding the extracted score.
            let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(artifact.bytes))
                .expect("artifact parses as a spreadsheet");
            let range = workbook
                .worksheet_range_at(0)
                .expect("artifact has a sheet")
                .expect("sheet is readable");
            assert_eq!(
                range.get_value((0, 0)),
                Some(&Data::String(defaults::SCORE_HEADER.to_string()))
            );
            assert_eq!(range.get_value((1, 0)), Some(&Data::Float(42.0)));
        }
        other => panic!("expected delivered artifact, got {:?}", other),
    }
}

#[tokio::test]
async fn voice_note_without_score_yields_not_found() {
    let pipeline = pipeline_with(
        MockTranscriber::new("mock").with_response("пациент ходит самостоятельно"),
    );

    assert_eq!(pipeline.run(wav_clip(0.5)).await, Outcome::NotFound);
}

#[tokio::test]
async fn corrupt_clip_yields_decode_error() {
    let pipeline = pipeline_with(MockTranscriber::new("mock").with_response("берг 10"));
    let clip = AudioClip::new(b"definitely not audio".to_vec(), ClipFormat::OggOpus);

    assert_eq!(
        pipeline.run(clip).await,
        Outcome::Error(ErrorKind::DecodeError)
    );
}

#[tokio::test]
async fn transcriber_failure_yields_model_unavailable() {
    let pipeline = pipeline_with(MockTranscriber::new("mock").with_failure());

    assert_eq!(
        pipeline.run(wav_clip(0.5)).await,
        Outcome::Error(ErrorKind::ModelUnavailable)
    );
}

#[tokio::test]
async fn tie_break_takes_first_mention() {
    let pipeline = pipeline_with(
        MockTranscriber::new("mock").with_response("берг 12, а до этого было 45"),
    );

    // The first mention wins; the artifact is produced from score 12.
    assert!(matches!(
        pipeline.run(wav_clip(0.5)).await,
        Outcome::Delivered(_)
    ));
}

#[tokio::test]
async fn serve_round_trip_over_channel_transport() {
    let (transport, clip_tx, mut delivery_rx) = ChannelTransport::new(8);
    let pipeline = pipeline_with(MockTranscriber::new("mock").with_response("шкала берга 30"));

    let handle = tokio::spawn(bergvox::service::serve(transport, pipeline));

    clip_tx
        .send(IncomingClip {
            reply: ReplyTarget("chat:100".into()),
            clip: wav_clip(1.0),
        })
        .await
        .unwrap();
    clip_tx
        .send(IncomingClip {
            reply: ReplyTarget("chat:101".into()),
            clip: AudioClip::new(b"garbage".to_vec(), ClipFormat::OggOpus),
        })
        .await
        .unwrap();
    drop(clip_tx);

    handle.await.unwrap().unwrap();

    let mut documents = 0;
    let mut failures = 0;
    while let Some((_, delivery)) = delivery_rx.recv().await {
        match delivery {
            Delivery::Document { filename, .. } => {
                assert_eq!(filename, defaults::ARTIFACT_FILENAME);
                documents += 1;
            }
            Delivery::Text(text) => {
                assert_eq!(text, defaults::FAILURE_REPLY);
                failures += 1;
            }
        }
    }
    assert_eq!((documents, failures), (1, 1));
}

#[tokio::test]
async fn empty_transcript_yields_not_found() {
    let pipeline = pipeline_with(MockTranscriber::new("mock").with_response(""));

    assert_eq!(pipeline.run(wav_clip(0.25)).await, Outcome::NotFound);
}

#[tokio::test]
async fn unsupported_mime_is_rejected_before_the_pipeline() {
    let err = AudioClip::from_mime(vec![0u8; 16], "video/mp4").unwrap_err();
    assert!(matches!(
        err,
        bergvox::BergvoxError::UnsupportedFormat { .. }
    ));
}
