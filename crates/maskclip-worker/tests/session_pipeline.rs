//! End-to-end pipeline tests over fake engine, transport and media source.

mod common;

use common::{
    session, FakeEngine, FakeSource, FakeTransport, Harness, Outbound, SourceBehavior, MIB,
};
use maskclip_models::{FailureKind, JobState, MediaDescriptor, TranscodeStage, VolumeOption};
use maskclip_worker::{messages, JobError, Rejection};

/// A 5 MiB upload with token "2" is transcoded at half volume and delivered.
#[tokio::test]
async fn test_upload_select_deliver() {
    let h = Harness::new();
    let sid = session(100);

    let job = h
        .manager
        .begin_job(&sid, &MediaDescriptor::video(5 * MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");
    assert_eq!(job.state, JobState::AwaitingOption);
    assert!(job.files.input.exists());

    let finished = h
        .manager
        .select_option(&sid, "2")
        .await
        .expect("Pipeline failed");
    assert_eq!(finished.state, JobState::Delivered);
    assert_eq!(finished.selected_option, Some(VolumeOption::Half));
    assert!(finished.failure.is_none());

    let calls = h.engine.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].inputs, vec![job.files.input.clone()]);
    assert_eq!(calls[0].output, job.files.preprocessed);
    assert_eq!(calls[1].inputs[0], job.files.preprocessed);
    assert_eq!(calls[1].output, job.files.output);
    let filter = calls[1].arg_after("-filter_complex").expect("No filter graph");
    assert!(filter.contains("volume=0.50"));
    assert_eq!(calls[1].arg_after("-t"), Some("10"));

    assert_eq!(h.transport.deliveries(), vec![(job.files.output.clone(), true)]);
    assert_eq!(
        h.transport.texts(),
        vec![messages::VIDEO_RECEIVED, messages::PROCESSING]
    );
    assert!(h.transport.sent().iter().any(|o| matches!(
        o,
        Outbound::Options(s, prompt, options)
            if s == &sid && prompt == messages::CHOOSE_VOLUME && options.len() == 4
    )));

    assert!(h.staged_files().is_empty());
    assert_eq!(h.manager.active_count().await, 0);
}

/// Token "3" renders a 0.75 gain in the composite filter.
#[tokio::test]
async fn test_option_mapping() {
    let h = Harness::new();
    let sid = session(101);

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");
    h.manager
        .select_option(&sid, "3")
        .await
        .expect("Pipeline failed");

    let calls = h.engine.calls();
    let filter = calls[1].arg_after("-filter_complex").expect("No filter graph");
    assert!(filter.contains("volume=0.75"));
}

/// A second upload while a job is active is refused and leaves the first job intact.
#[tokio::test]
async fn test_single_active_job_per_session() {
    let h = Harness::new();
    let sid = session(102);

    let first = h
        .manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");

    let second_source = FakeSource::ok();
    let err = h
        .manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &second_source)
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Conflict(_)));
    assert_eq!(second_source.fetches(), 0);

    let active = h.manager.active_job(&sid).await.expect("Job vanished");
    assert_eq!(active.id, first.id);
    assert_eq!(active.state, JobState::AwaitingOption);
    assert!(first.files.input.exists());
}

/// Uploads over the ceiling are rejected before anything is staged; the ceiling itself passes.
#[tokio::test]
async fn test_size_gate() {
    let h = Harness::new();
    let sid = session(103);

    let source = FakeSource::ok();
    let err = h
        .manager
        .begin_job(&sid, &MediaDescriptor::video(21 * MIB), &source)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JobError::Rejected(Rejection::SizeLimitExceeded { size, .. }) if size == 21 * MIB
    ));
    assert_eq!(source.fetches(), 0);
    assert!(h.staged_files().is_empty());
    assert!(h.manager.active_job(&sid).await.is_none());

    let job = h
        .manager
        .begin_job(&sid, &MediaDescriptor::video(20 * MIB), &FakeSource::ok())
        .await
        .expect("Exactly 20 MiB should be accepted");
    assert_eq!(job.size_bytes, 20_971_520);
}

/// Selecting before any upload, or twice, never starts a transcode.
#[tokio::test]
async fn test_state_ordering() {
    let h = Harness::new();
    let sid = session(104);

    let err = h.manager.select_option(&sid, "1").await.unwrap_err();
    assert!(matches!(err, JobError::InvalidState { state: None, .. }));
    assert!(h.engine.calls().is_empty());

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");
    h.manager
        .select_option(&sid, "1")
        .await
        .expect("Pipeline failed");

    let err = h.manager.select_option(&sid, "1").await.unwrap_err();
    assert!(matches!(err, JobError::InvalidState { .. }));
    assert_eq!(h.engine.calls().len(), 2);
}

/// An unknown token is refused without touching the pending job.
#[tokio::test]
async fn test_unknown_option() {
    let h = Harness::new();
    let sid = session(105);

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");

    let err = h.manager.select_option(&sid, "9").await.unwrap_err();
    assert!(matches!(err, JobError::UnknownOption(_)));
    let active = h.manager.active_job(&sid).await.expect("Job vanished");
    assert_eq!(active.state, JobState::AwaitingOption);
    assert!(active.selected_option.is_none());
    assert!(h.engine.calls().is_empty());
}

/// A preprocess failure skips the composite stage and removes every staged file.
#[tokio::test]
async fn test_preprocess_failure() {
    let h = Harness::with_engine(FakeEngine::failing_on_call(0));
    let sid = session(106);
    let dispatcher = h.dispatcher();

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");

    let err = dispatcher
        .dispatch(maskclip_worker::InboundEvent::OptionSelected(
            maskclip_worker::OptionSelectedEvent {
                session_id: sid.clone(),
                token: "4".to_string(),
            },
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err.failure_kind(),
        Some(FailureKind::Transcode(TranscodeStage::Preprocess))
    );

    assert_eq!(h.engine.calls().len(), 1);
    let texts = h.transport.texts();
    assert!(texts.iter().any(|t| t == messages::PROCESSING));
    assert_eq!(texts.last().map(String::as_str), Some("Processing failed."));
    assert!(h.transport.deliveries().is_empty());
    assert!(h.staged_files().is_empty());
    assert!(h.manager.active_job(&sid).await.is_none());
}

/// A composite failure still removes the preprocessed intermediate.
#[tokio::test]
async fn test_composite_failure_cleans_up() {
    let h = Harness::with_engine(FakeEngine::failing_on_call(1));
    let sid = session(107);

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");
    let err = h.manager.select_option(&sid, "2").await.unwrap_err();

    assert_eq!(
        err.failure_kind(),
        Some(FailureKind::Transcode(TranscodeStage::Composite))
    );
    assert_eq!(h.engine.calls().len(), 2);
    assert!(h.staged_files().is_empty());
}

/// Delivery failures are reported and the output is still removed.
#[tokio::test]
async fn test_delivery_failure_cleans_up() {
    let h = Harness::with_transport(FakeTransport::failing_delivery());
    let sid = session(108);

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Failed to begin job");
    let err = h.manager.select_option(&sid, "2").await.unwrap_err();

    assert!(matches!(err, JobError::DeliveryFailure(_)));
    assert_eq!(err.failure_kind(), Some(FailureKind::Delivery));
    assert!(h.staged_files().is_empty());
    assert_eq!(h.manager.active_count().await, 0);
}

/// A failed download removes the partial input and frees the session.
#[tokio::test]
async fn test_download_failure() {
    let h = Harness::new();
    let sid = session(109);

    let err = h
        .manager
        .begin_job(
            &sid,
            &MediaDescriptor::video(MIB),
            &FakeSource::new(SourceBehavior::Fail),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::DownloadFailure(_)));
    assert!(h.staged_files().is_empty());
    assert!(h.manager.active_job(&sid).await.is_none());

    h.manager
        .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
        .await
        .expect("Session should accept a new upload");
}

/// A panicking download aborts the job without leaking it.
#[tokio::test]
async fn test_download_panic_aborts() {
    let h = Harness::new();
    let sid = session(110);

    let err = h
        .manager
        .begin_job(
            &sid,
            &MediaDescriptor::video(MIB),
            &FakeSource::new(SourceBehavior::Panic),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Aborted));
    assert!(h.manager.active_job(&sid).await.is_none());
    assert!(h.staged_files().is_empty());
}

/// Distinct sessions run their pipelines concurrently without sharing paths.
#[tokio::test]
async fn test_concurrent_sessions() {
    let h = Harness::new();

    let mut handles = Vec::new();
    for id in 200..204 {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            let sid = session(id);
            manager
                .begin_job(&sid, &MediaDescriptor::video(MIB), &FakeSource::ok())
                .await?;
            manager.select_option(&sid, "1").await
        }));
    }

    for handle in handles {
        let job = handle
            .await
            .expect("Task panicked")
            .expect("Pipeline failed");
        assert_eq!(job.state, JobState::Delivered);
    }

    let outputs: std::collections::HashSet<_> =
        h.transport.deliveries().into_iter().map(|(p, _)| p).collect();
    assert_eq!(outputs.len(), 4);
    assert!(h.staged_files().is_empty());
}
