//! Upload orchestration: validation, submission, conflict handling, and job tracking.

use crate::backend::{IngestBackend, IngestReceipt, SubmitMode, SubmitResponse};
use crate::credentials::Credential;
use crate::metrics::SessionMetrics;
use crate::upload::UploadCandidate;
use crate::upload::conflict::{
    ConflictDecisionRequest, ConflictPrompt, ConflictResolution, ConflictResolver,
};
use crate::upload::outcome::{
    AcceptedJob, ExistingDocument, FailureKind, Notice, NoticeLevel, SubmitOutcome, UploadFailure,
    UploadOutcome,
};
use crate::upload::poller::{JobPoller, PollError, PollPolicy};
use crate::upload::state::{Effect, UploadEvent, UploadState, transition};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Receives progress notices from the orchestrator.
pub trait UploadObserver: Send + Sync {
    /// A success, info, or error message was produced.
    fn notice(&self, _notice: &Notice) {}

    /// The selection was cleared and a new file may be chosen.
    fn selection_reset(&self) {}
}

/// Observer that ignores everything; notices still reach the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl UploadObserver for SilentObserver {}

/// Owns the upload state and sequences every remote call of an upload.
///
/// The credential is injected at construction. Without it, submission fails locally with
/// "sign in required" and no request is made.
pub struct UploadOrchestrator {
    backend: Arc<dyn IngestBackend>,
    credential: Option<Credential>,
    mode: SubmitMode,
    poller: JobPoller,
    resolver: ConflictResolver,
    observer: Arc<dyn UploadObserver>,
    metrics: Arc<SessionMetrics>,
    cancel: CancellationToken,
    state: UploadState,
    pending_conflict: Option<ConflictDecisionRequest>,
    active_job: Option<AcceptedJob>,
}

struct Applied {
    effects: Vec<Effect>,
    finished: Option<UploadOutcome>,
}

impl UploadOrchestrator {
    /// Build an orchestrator over `backend` using `credential` for every call.
    pub fn new(
        backend: Arc<dyn IngestBackend>,
        credential: Option<Credential>,
        policy: PollPolicy,
    ) -> Self {
        let metrics = Arc::new(SessionMetrics::new());
        Self {
            poller: JobPoller::new(Arc::clone(&backend), policy).with_metrics(Arc::clone(&metrics)),
            resolver: ConflictResolver::new(Arc::clone(&backend)),
            backend,
            credential,
            mode: SubmitMode::Async,
            observer: Arc::new(SilentObserver),
            metrics,
            cancel: CancellationToken::new(),
            state: UploadState::Idle,
            pending_conflict: None,
            active_job: None,
        }
    }

    /// Choose the ingestion endpoint.
    pub fn with_mode(mut self, mode: SubmitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Report notices to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Accumulate counters into shared metrics.
    pub fn with_metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.poller = self.poller.with_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    /// Stop job polling when `cancel` fires.
    ///
    /// A fired token stays cancelled: every later [`Self::track`] on this orchestrator ends as
    /// [`FailureKind::Cancelled`] without a status lookup. Supply a fresh orchestrator to resume.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current workflow state.
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Identifier of the job currently awaiting tracking, if any.
    pub fn active_job(&self) -> Option<&AcceptedJob> {
        self.active_job.as_ref()
    }

    /// Select a file for upload. Non-PDF files are rejected and the previous state is kept.
    pub fn select(&mut self, candidate: UploadCandidate) -> Result<(), UploadFailure> {
        tracing::debug!(
            file = candidate.display_name(),
            size = %candidate.size_label(),
            media_type = candidate.media_type(),
            "Candidate selected"
        );
        match self.apply(UploadEvent::Select(candidate)).finished {
            Some(UploadOutcome::Failed(failure)) => Err(failure),
            _ => Ok(()),
        }
    }

    /// Drop the current selection.
    pub fn clear(&mut self) -> Result<(), UploadFailure> {
        match self.apply(UploadEvent::Clear).finished {
            Some(UploadOutcome::Failed(failure)) => Err(failure),
            _ => Ok(()),
        }
    }

    /// Submit the selected candidate and interpret the response.
    ///
    /// After [`SubmitOutcome::Accepted`] call [`Self::track`]; after
    /// [`SubmitOutcome::ConflictDetected`] call [`Self::resolve_conflict`].
    pub async fn submit(&mut self) -> SubmitOutcome {
        self.submit_step().await.0
    }

    async fn submit_step(&mut self) -> (SubmitOutcome, Option<UploadOutcome>) {
        let applied = self.apply(UploadEvent::Submit {
            signed_in: self.credential.is_some(),
        });
        if !applied
            .effects
            .iter()
            .any(|effect| matches!(effect, Effect::Submit))
        {
            let failure = match applied.finished {
                Some(UploadOutcome::Failed(failure)) => failure,
                _ => cannot_continue(),
            };
            return (SubmitOutcome::Failure(failure.clone()), Some(UploadOutcome::Failed(failure)));
        }

        let outcome = self.send_submission().await;
        tracing::info!(outcome = ?outcome, "Submission resolved");
        let applied = self.apply(UploadEvent::Submitted(outcome.clone()));
        for effect in applied.effects {
            match effect {
                Effect::Poll(job) => self.active_job = Some(job),
                Effect::PromptConflict(request) => self.pending_conflict = Some(request),
                _ => {}
            }
        }
        (outcome, applied.finished)
    }

    async fn send_submission(&self) -> SubmitOutcome {
        let (Some(credential), UploadState::Submitting(candidate)) =
            (self.credential.as_ref(), &self.state)
        else {
            return SubmitOutcome::Failure(UploadFailure::no_selection());
        };

        match self.backend.submit(credential, candidate, self.mode).await {
            Ok(response) => interpret_submission(response, candidate.display_name()),
            Err(error) => {
                tracing::error!(file = candidate.display_name(), error = %error, "Submission failed");
                SubmitOutcome::Failure(UploadFailure::from_api(&error, "Upload failed"))
            }
        }
    }

    /// Ask `prompt` about the pending conflict and replace or abort accordingly.
    pub async fn resolve_conflict(&mut self, prompt: &dyn ConflictPrompt) -> UploadOutcome {
        let Some(request) = self.pending_conflict.take() else {
            return UploadOutcome::Failed(UploadFailure::new(
                FailureKind::Precondition,
                "No conflict is awaiting a decision",
            ));
        };

        let resolution = match (&self.state, self.credential.as_ref()) {
            (UploadState::Resolving { candidate, .. }, Some(credential)) => {
                self.resolver
                    .resolve(request, candidate, credential, prompt)
                    .await
            }
            _ => ConflictResolution::Failed(UploadFailure::sign_in_required()),
        };

        self.apply(UploadEvent::Resolved(resolution))
            .finished
            .unwrap_or_else(unexpected_state)
    }

    /// Poll the accepted job until it completes or fails.
    pub async fn track(&mut self) -> UploadOutcome {
        let (Some(job), Some(credential)) = (self.active_job.clone(), self.credential.clone())
        else {
            return UploadOutcome::Failed(UploadFailure::new(
                FailureKind::Precondition,
                "No job is awaiting tracking",
            ));
        };

        let outcome = match self.poller.track(&credential, &job, &self.cancel).await {
            Ok(summary) => summary.outcome,
            Err(PollError::AlreadyTracking(job_id)) => {
                return UploadOutcome::Failed(UploadFailure::new(
                    FailureKind::Precondition,
                    format!("Job {job_id} is already being tracked"),
                ));
            }
        };
        self.active_job = None;

        self.apply(UploadEvent::JobFinished(outcome))
            .finished
            .unwrap_or_else(unexpected_state)
    }

    /// Run a complete upload: select, submit, then resolve a conflict or track the job.
    pub async fn run(
        &mut self,
        candidate: UploadCandidate,
        prompt: &dyn ConflictPrompt,
    ) -> UploadOutcome {
        if let Err(failure) = self.select(candidate) {
            return UploadOutcome::Failed(failure);
        }

        let (outcome, finished) = self.submit_step().await;
        if let Some(finished) = finished {
            return finished;
        }
        match outcome {
            SubmitOutcome::Accepted(_) => self.track().await,
            SubmitOutcome::ConflictDetected(_) => self.resolve_conflict(prompt).await,
            SubmitOutcome::ImmediateSuccess(_) | SubmitOutcome::Failure(_) => {
                unexpected_state()
            }
        }
    }

    fn apply(&mut self, event: UploadEvent) -> Applied {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = transition(state, event);
        self.state = next;

        let mut remaining = Vec::new();
        let mut finished = None;
        for effect in effects {
            match effect {
                Effect::Notify(notice) => {
                    match notice.level {
                        NoticeLevel::Error => tracing::warn!(message = %notice.message, "Upload notice"),
                        NoticeLevel::Success | NoticeLevel::Info => {
                            tracing::info!(message = %notice.message, "Upload notice")
                        }
                    }
                    self.observer.notice(&notice);
                }
                Effect::ResetSelection => self.observer.selection_reset(),
                Effect::Finish(outcome) => {
                    if let UploadOutcome::Ingested {
                        text_chunks,
                        image_chunks,
                        ..
                    } = &outcome
                    {
                        self.metrics.record_document(*text_chunks, *image_chunks);
                    }
                    finished = Some(outcome);
                }
                other => remaining.push(other),
            }
        }
        Applied {
            effects: remaining,
            finished,
        }
    }
}

fn cannot_continue() -> UploadFailure {
    UploadFailure::new(
        FailureKind::Precondition,
        "Upload is not in a state that can continue",
    )
}

fn unexpected_state() -> UploadOutcome {
    UploadOutcome::Failed(cannot_continue())
}

/// Classify a submission response.
///
/// A 409 flagged as replaceable is a conflict; a 202 with a job identifier is an accepted job;
/// any other success is an immediate ingestion; everything else is a failure carrying the
/// server's `error` or a generic message.
pub fn interpret_submission(response: SubmitResponse, fallback_name: &str) -> SubmitOutcome {
    let SubmitResponse { status, mut body } = response;

    if status == StatusCode::CONFLICT
        && body.can_replace
        && let Some(document_id) = body.existing_document_id.take()
    {
        return SubmitOutcome::ConflictDetected(ExistingDocument {
            document_id,
            filename: body
                .existing_filename
                .take()
                .unwrap_or_else(|| fallback_name.to_string()),
        });
    }

    if status == StatusCode::ACCEPTED
        && let Some(job_id) = body.job_id.take()
    {
        let mut job = AcceptedJob::new(
            job_id,
            body.filename.take().unwrap_or_else(|| fallback_name.to_string()),
        );
        if let Some(message) = body.message.take() {
            job.message = message;
        }
        return SubmitOutcome::Accepted(job);
    }

    if status.is_success() {
        return SubmitOutcome::ImmediateSuccess(IngestReceipt {
            message: body.message,
            chunks_stored: body.chunks_stored.unwrap_or_default(),
            images_stored: body.images_stored.unwrap_or_default(),
        });
    }

    tracing::debug!(%status, error = ?body.error, "Submission rejected");
    SubmitOutcome::Failure(UploadFailure::server(body.error))
}
