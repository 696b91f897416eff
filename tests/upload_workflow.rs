mod common;

use common::*;
use ingestctl::backend::{IngestReceipt, JobState, JobStatus, SubmitBody, SubmitMode};
use ingestctl::metrics::SessionMetrics;
use ingestctl::upload::{
    AcceptedJob, ConflictChoice, FailureKind, FixedChoice, JobOutcome, JobPoller, Notice,
    NoticeLevel, PollError, SubmitOutcome, UploadCandidate, UploadFailure, UploadObserver,
    UploadOrchestrator, UploadOutcome, UploadState,
};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingObserver {
    notices: Mutex<Vec<Notice>>,
    resets: AtomicUsize,
}

impl UploadObserver for RecordingObserver {
    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn selection_reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

fn conflict(document_id: &str, filename: &str) -> SubmitBody {
    SubmitBody {
        can_replace: true,
        existing_document_id: Some(document_id.into()),
        existing_filename: Some(filename.into()),
        error: Some("Duplicate document for this user".into()),
        ..SubmitBody::default()
    }
}

#[tokio::test]
async fn accepted_job_is_polled_until_completed() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(accepted("j1"))
            .on_status(Ok(status(JobState::Running)))
            .on_status(Ok(status(JobState::Running)))
            .on_status(Ok(completed(12, 3))),
    );
    let observer = Arc::new(RecordingObserver::default());
    let metrics = Arc::new(SessionMetrics::new());
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_observer(observer.clone())
        .with_metrics(metrics.clone());

    let outcome = orchestrator
        .run(pdf("report.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    let UploadOutcome::Ingested {
        message,
        text_chunks,
        image_chunks,
    } = outcome
    else {
        panic!("expected ingestion");
    };
    assert!(message.contains("report.pdf"));
    assert!(message.contains("12"));
    assert!(message.contains('3'));
    assert_eq!((text_chunks, image_chunks), (12, 3));

    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 3);
    assert!(matches!(orchestrator.state(), UploadState::Done));
    assert!(orchestrator.active_job().is_none());

    let notices = observer.notices.lock().unwrap().clone();
    let levels: Vec<_> = notices.iter().map(|notice| notice.level).collect();
    assert_eq!(levels, vec![NoticeLevel::Info, NoticeLevel::Success]);
    assert_eq!(observer.resets.load(Ordering::SeqCst), 1);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.documents_ingested, 1);
    assert_eq!(snapshot.text_chunks, 12);
    assert_eq!(snapshot.image_chunks, 3);
}

#[tokio::test]
async fn declined_conflict_cancels_without_replace() {
    let backend = Arc::new(
        ScriptedBackend::default().on_submit(submit_response(
            StatusCode::CONFLICT,
            conflict("d1", "dup.pdf"),
        )),
    );
    let observer = Arc::new(RecordingObserver::default());
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_observer(observer.clone());

    let outcome = orchestrator
        .run(pdf("dup.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    assert_eq!(outcome, UploadOutcome::Cancelled);
    assert_eq!(outcome.message(), "Upload cancelled");
    assert_eq!(backend.replace_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.total_calls(), 1);
    assert!(matches!(orchestrator.state(), UploadState::Idle));
    assert_eq!(observer.resets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn accepted_conflict_issues_exactly_one_replace() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(submit_response(
                StatusCode::CONFLICT,
                conflict("d1", "dup.pdf"),
            ))
            .on_replace(Ok(IngestReceipt {
                message: None,
                chunks_stored: 5,
                images_stored: 1,
            })),
    );
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());

    let outcome = orchestrator
        .run(pdf("dup.pdf"), &FixedChoice(ConflictChoice::Replace))
        .await;

    assert_eq!(
        outcome.message(),
        "Document replaced successfully · chunks: 5, images: 1"
    );
    assert_eq!(backend.replace_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn conflict_is_resolved_only_once() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(submit_response(
                StatusCode::CONFLICT,
                conflict("d1", "dup.pdf"),
            ))
            .on_replace(Ok(IngestReceipt::default())),
    );
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());
    orchestrator.select(pdf("dup.pdf")).expect("pdf accepted");

    let submitted = orchestrator.submit().await;
    assert!(matches!(submitted, SubmitOutcome::ConflictDetected(ref existing) if existing.document_id == "d1"));

    let prompt = FixedChoice(ConflictChoice::Replace);
    assert!(matches!(
        orchestrator.resolve_conflict(&prompt).await,
        UploadOutcome::Ingested { .. }
    ));
    assert!(matches!(
        orchestrator.resolve_conflict(&prompt).await,
        UploadOutcome::Failed(UploadFailure {
            kind: FailureKind::Precondition,
            ..
        })
    ));
    assert_eq!(backend.replace_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_replace_keeps_candidate_for_retry() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(submit_response(
                StatusCode::CONFLICT,
                conflict("d1", "dup.pdf"),
            ))
            .on_replace(Err(ingestctl::backend::ApiError::UnexpectedStatus {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: Some("Document could not be parsed".into()),
                body: String::new(),
            })),
    );
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());

    let outcome = orchestrator
        .run(pdf("dup.pdf"), &FixedChoice(ConflictChoice::Replace))
        .await;

    assert_eq!(
        outcome,
        UploadOutcome::Failed(UploadFailure::new(
            FailureKind::Server,
            "Document could not be parsed"
        ))
    );
    assert!(matches!(orchestrator.state(), UploadState::Selected(_)));
}

#[tokio::test]
async fn transient_lookup_failures_are_retried_until_failed_state() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(accepted("j1"))
            .on_status(Err(transport_error()))
            .on_status(Err(transport_error()))
            .on_status(Err(transport_error()))
            .on_status(Ok(JobStatus {
                state: JobState::Failed,
                result: None,
                message: Some("corrupt pdf".into()),
            })),
    );
    let metrics = Arc::new(SessionMetrics::new());
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_metrics(metrics.clone());

    let outcome = orchestrator
        .run(pdf("scan.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    assert_eq!(
        outcome,
        UploadOutcome::Failed(UploadFailure::new(FailureKind::Server, "corrupt pdf"))
    );
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 4);
    assert_eq!(metrics.snapshot().transient_failures, 3);
    assert_eq!(metrics.snapshot().documents_ingested, 0);
}

#[tokio::test]
async fn missing_credential_makes_no_calls() {
    let backend = Arc::new(ScriptedBackend::default());
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), None, fast_policy());

    let outcome = orchestrator
        .run(pdf("report.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    assert_eq!(
        outcome,
        UploadOutcome::Failed(UploadFailure::sign_in_required())
    );
    assert_eq!(backend.total_calls(), 0);
    assert!(matches!(orchestrator.state(), UploadState::Selected(_)));
}

#[tokio::test]
async fn non_pdf_is_rejected_before_submission() {
    let backend = Arc::new(ScriptedBackend::default());
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());

    let outcome = orchestrator
        .run(
            UploadCandidate::new("notes.txt", "notes.txt", 12, "text/plain"),
            &FixedChoice(ConflictChoice::Abort),
        )
        .await;

    assert_eq!(outcome, UploadOutcome::Failed(UploadFailure::not_pdf()));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn sync_mode_finishes_immediately() {
    let backend = Arc::new(ScriptedBackend::default().on_submit(submit_response(
        StatusCode::OK,
        SubmitBody {
            message: Some("report.pdf processed successfully!".into()),
            chunks_stored: Some(8),
            images_stored: Some(2),
            ..SubmitBody::default()
        },
    )));
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_mode(SubmitMode::Sync);

    let outcome = orchestrator
        .run(pdf("report.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    assert_eq!(
        outcome.message(),
        "report.pdf processed successfully! · chunks: 8, images: 2"
    );
    assert_eq!(*backend.last_mode.lock().unwrap(), Some(SubmitMode::Sync));
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_rejection_surfaces_error_message() {
    let backend = Arc::new(ScriptedBackend::default().on_submit(submit_response(
        StatusCode::BAD_REQUEST,
        SubmitBody {
            error: Some("Only PDF files are allowed".into()),
            ..SubmitBody::default()
        },
    )));
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());

    let outcome = orchestrator
        .run(pdf("report.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    assert_eq!(outcome.message(), "Only PDF files are allowed");
    assert!(matches!(orchestrator.state(), UploadState::Selected(_)));
}

#[tokio::test]
async fn cancellation_stops_polling() {
    let backend = Arc::new(ScriptedBackend::default().on_submit(accepted("j1")));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_cancellation(cancel);

    let outcome = orchestrator
        .run(pdf("report.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;

    assert!(matches!(
        outcome,
        UploadOutcome::Failed(UploadFailure {
            kind: FailureKind::Cancelled,
            ..
        })
    ));
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn same_job_cannot_be_polled_twice_concurrently() {
    let backend = Arc::new(ScriptedBackend::default());
    let poller = JobPoller::new(backend.clone(), fast_policy());
    let job = AcceptedJob::new("j1", "report.pdf");
    let cancel = CancellationToken::new();
    let token = credential().expect("credential");

    let first = tokio::spawn({
        let poller = poller.clone();
        let job = job.clone();
        let cancel = cancel.clone();
        let token = token.clone();
        async move { poller.track(&token, &job, &cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = poller.track(&token, &job, &cancel).await;
    assert_eq!(second, Err(PollError::AlreadyTracking("j1".into())));

    cancel.cancel();
    let summary = first.await.expect("join").expect("tracked");
    assert_eq!(summary.outcome, JobOutcome::Cancelled);
    assert!(summary.lookups >= 1);
}

#[tokio::test]
async fn retry_ceiling_gives_up() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_status(Err(transport_error()))
            .on_status(Err(transport_error()))
            .on_status(Err(transport_error())),
    );
    let mut policy = fast_policy();
    policy.max_transient_retries = Some(2);
    let poller = JobPoller::new(backend.clone(), policy);

    let summary = poller
        .track(
            &credential().expect("credential"),
            &AcceptedJob::new("j9", "big.pdf"),
            &CancellationToken::new(),
        )
        .await
        .expect("tracked");

    assert!(matches!(
        summary.outcome,
        JobOutcome::GaveUp {
            transient_failures: 3,
            ..
        }
    ));
    assert_eq!(summary.lookups, 3);
}

#[tokio::test]
async fn blank_replace_error_falls_back_to_generic_message() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(submit_response(
                StatusCode::CONFLICT,
                conflict("d1", "dup.pdf"),
            ))
            .on_replace(Err(ingestctl::backend::ApiError::UnexpectedStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: Some(String::new()),
                body: String::new(),
            })),
    );
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());

    let outcome = orchestrator
        .run(pdf("dup.pdf"), &FixedChoice(ConflictChoice::Replace))
        .await;

    assert_eq!(
        outcome,
        UploadOutcome::Failed(UploadFailure::new(FailureKind::Server, "Replace failed"))
    );
}

#[tokio::test]
async fn separate_pollers_share_the_tracking_guard() {
    let backend = Arc::new(ScriptedBackend::default());
    let first_poller = JobPoller::new(backend.clone(), fast_policy());
    let second_poller = JobPoller::new(backend.clone(), fast_policy());
    let job = AcceptedJob::new("shared-j1", "report.pdf");
    let cancel = CancellationToken::new();
    let token = credential().expect("credential");

    let first = tokio::spawn({
        let job = job.clone();
        let cancel = cancel.clone();
        let token = token.clone();
        async move { first_poller.track(&token, &job, &cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = second_poller.track(&token, &job, &cancel).await;
    assert_eq!(second, Err(PollError::AlreadyTracking("shared-j1".into())));

    cancel.cancel();
    let summary = first.await.expect("join").expect("tracked");
    assert_eq!(summary.outcome, JobOutcome::Cancelled);

    let other_backend = Arc::new(ScriptedBackend::default().on_status(Ok(completed(1, 0))));
    let summary = JobPoller::new(other_backend, fast_policy())
        .track(&token, &job, &CancellationToken::new())
        .await
        .expect("other backend tracks independently");
    assert!(matches!(summary.outcome, JobOutcome::Completed { .. }));
}

#[tokio::test]
async fn cleared_selection_cannot_be_submitted() {
    let backend = Arc::new(ScriptedBackend::default());
    let observer = Arc::new(RecordingObserver::default());
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_observer(observer.clone());

    orchestrator.select(pdf("report.pdf")).expect("pdf accepted");
    orchestrator.clear().expect("clear while idle");
    assert!(matches!(orchestrator.state(), UploadState::Idle));
    assert_eq!(observer.resets.load(Ordering::SeqCst), 1);

    let outcome = orchestrator.submit().await;
    assert_eq!(outcome, SubmitOutcome::Failure(UploadFailure::no_selection()));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn clear_is_refused_while_resolving_a_conflict() {
    let backend = Arc::new(ScriptedBackend::default().on_submit(submit_response(
        StatusCode::CONFLICT,
        conflict("d1", "dup.pdf"),
    )));
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());
    orchestrator.select(pdf("dup.pdf")).expect("pdf accepted");
    orchestrator.submit().await;

    assert_eq!(orchestrator.clear(), Err(UploadFailure::busy()));
    assert!(matches!(orchestrator.state(), UploadState::Resolving { .. }));
}

#[tokio::test]
async fn fired_cancellation_applies_to_later_tracking() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(accepted("j1"))
            .on_submit(accepted("j2")),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy())
        .with_cancellation(cancel);

    let first = orchestrator
        .run(pdf("report.pdf"), &FixedChoice(ConflictChoice::Abort))
        .await;
    assert!(matches!(orchestrator.state(), UploadState::Selected(_)));

    assert!(matches!(orchestrator.submit().await, SubmitOutcome::Accepted(_)));
    let second = orchestrator.track().await;

    for outcome in [first, second] {
        assert!(matches!(
            outcome,
            UploadOutcome::Failed(UploadFailure {
                kind: FailureKind::Cancelled,
                ..
            })
        ));
    }
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn submit_timeout_keeps_candidate_for_retry() {
    let backend = Arc::new(
        ScriptedBackend::default()
            .on_submit(Err(ingestctl::backend::ApiError::Timeout {
                after: Duration::from_secs(60),
            }))
            .on_submit(accepted("j1"))
            .on_status(Ok(completed(2, 0))),
    );
    let mut orchestrator = UploadOrchestrator::new(backend.clone(), credential(), fast_policy());
    orchestrator.select(pdf("report.pdf")).expect("pdf accepted");

    let outcome = orchestrator.submit().await;
    assert!(matches!(
        outcome,
        SubmitOutcome::Failure(UploadFailure {
            kind: FailureKind::Timeout,
            ..
        })
    ));
    assert_eq!(
        orchestrator.state().candidate().map(UploadCandidate::display_name),
        Some("report.pdf")
    );

    assert!(matches!(orchestrator.submit().await, SubmitOutcome::Accepted(_)));
    assert!(matches!(
        orchestrator.track().await,
        UploadOutcome::Ingested { text_chunks: 2, .. }
    ));
}
