//! Upload workflow as a finite-state value.
//!
//! [`transition`] is pure: it consumes the current state and an event and returns the next state
//! together with the effects the orchestrator must perform. The candidate moves between states,
//! so exactly one state owns it at any instant.

use crate::upload::UploadCandidate;
use crate::upload::conflict::{ConflictDecisionRequest, ConflictResolution};
use crate::upload::outcome::{
    AcceptedJob, CANCELLED, ExistingDocument, FailureKind, Notice, REPLACED_MESSAGE,
    SubmitOutcome, UploadFailure, UploadOutcome,
};
use crate::upload::poller::JobOutcome;

/// Where an upload currently stands.
#[derive(Debug, Default)]
pub enum UploadState {
    /// Nothing selected.
    #[default]
    Idle,
    /// A validated PDF is selected and ready to submit.
    Selected(UploadCandidate),
    /// The submission call is in flight.
    Submitting(UploadCandidate),
    /// The service accepted the document and the job is being polled.
    Polling {
        /// Job under observation.
        job: AcceptedJob,
        /// Retained until the job reaches a terminal state.
        candidate: UploadCandidate,
    },
    /// Waiting for the user's conflict decision.
    Resolving {
        /// Document the service already holds.
        existing: ExistingDocument,
        /// Candidate that would replace it.
        candidate: UploadCandidate,
    },
    /// The last upload finished; a new candidate may be selected.
    Done,
}

impl UploadState {
    /// Candidate held by the state, if any.
    pub fn candidate(&self) -> Option<&UploadCandidate> {
        match self {
            Self::Selected(candidate) | Self::Submitting(candidate) => Some(candidate),
            Self::Polling { candidate, .. } | Self::Resolving { candidate, .. } => Some(candidate),
            Self::Idle | Self::Done => None,
        }
    }

    /// Whether an upload is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Submitting(_) | Self::Polling { .. } | Self::Resolving { .. }
        )
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selected(_) => "selected",
            Self::Submitting(_) => "submitting",
            Self::Polling { .. } => "polling",
            Self::Resolving { .. } => "resolving",
            Self::Done => "done",
        }
    }
}

/// Inputs driving the workflow.
#[derive(Debug)]
pub enum UploadEvent {
    /// The user picked a file.
    Select(UploadCandidate),
    /// The user dropped the current selection.
    Clear,
    /// The user asked to upload the selection.
    Submit {
        /// Whether a credential is available.
        signed_in: bool,
    },
    /// The submission call returned.
    Submitted(SubmitOutcome),
    /// The conflict was resolved.
    Resolved(ConflictResolution),
    /// Job polling reached a terminal state.
    JobFinished(JobOutcome),
}

/// Work requested by a transition.
#[derive(Debug)]
pub enum Effect {
    /// Send the selected candidate to the service.
    Submit,
    /// Start polling the accepted job.
    Poll(AcceptedJob),
    /// Ask the user for a decision on this conflict.
    PromptConflict(ConflictDecisionRequest),
    /// Tell observers something happened.
    Notify(Notice),
    /// Clear the file selection affordance.
    ResetSelection,
    /// The current operation ended with this result.
    Finish(UploadOutcome),
}

/// Compute the next state and effects for `event`.
pub fn transition(state: UploadState, event: UploadEvent) -> (UploadState, Vec<Effect>) {
    use UploadEvent as E;
    use UploadState as S;

    match (state, event) {
        (state, E::Select(candidate)) if state.is_busy() => {
            drop(candidate);
            (state, fail(UploadFailure::busy()))
        }
        (state, E::Select(candidate)) => {
            if candidate.is_pdf() {
                (S::Selected(candidate), Vec::new())
            } else {
                (state, fail(UploadFailure::not_pdf()))
            }
        }

        (state, E::Clear) if state.is_busy() => (state, fail(UploadFailure::busy())),
        (_, E::Clear) => (S::Idle, vec![Effect::ResetSelection]),

        (S::Selected(candidate), E::Submit { signed_in: false }) => (
            S::Selected(candidate),
            fail(UploadFailure::sign_in_required()),
        ),
        (S::Selected(candidate), E::Submit { signed_in: true }) => {
            (S::Submitting(candidate), vec![Effect::Submit])
        }
        (state, E::Submit { .. }) if state.is_busy() => (state, fail(UploadFailure::busy())),
        (state, E::Submit { .. }) => (state, fail(UploadFailure::no_selection())),

        (S::Submitting(candidate), E::Submitted(outcome)) => match outcome {
            SubmitOutcome::ImmediateSuccess(receipt) => {
                succeed(UploadOutcome::from_receipt(&receipt, None))
            }
            SubmitOutcome::Accepted(job) => (
                S::Polling {
                    job: job.clone(),
                    candidate,
                },
                vec![Effect::Notify(Notice::info(job.message.clone())), Effect::Poll(job)],
            ),
            SubmitOutcome::ConflictDetected(existing) => (
                S::Resolving {
                    existing: existing.clone(),
                    candidate,
                },
                vec![Effect::PromptConflict(ConflictDecisionRequest::new(existing))],
            ),
            SubmitOutcome::Failure(failure) => (S::Selected(candidate), fail(failure)),
        },

        (S::Resolving { candidate, .. }, E::Resolved(resolution)) => match resolution {
            ConflictResolution::Replaced(receipt) => {
                succeed(UploadOutcome::from_receipt(&receipt, Some(REPLACED_MESSAGE)))
            }
            ConflictResolution::Declined => {
                drop(candidate);
                (
                    S::Idle,
                    vec![
                        Effect::Notify(Notice::error(CANCELLED)),
                        Effect::ResetSelection,
                        Effect::Finish(UploadOutcome::Cancelled),
                    ],
                )
            }
            ConflictResolution::Failed(failure) => (S::Selected(candidate), fail(failure)),
        },

        (S::Polling { candidate, .. }, E::JobFinished(outcome)) => {
            let message = outcome.message();
            match outcome {
                JobOutcome::Completed { result, .. } => succeed(UploadOutcome::Ingested {
                    message,
                    text_chunks: result.text_chunks,
                    image_chunks: result.image_chunks,
                }),
                JobOutcome::Failed { .. } => (
                    S::Selected(candidate),
                    fail(UploadFailure::new(FailureKind::Server, message)),
                ),
                JobOutcome::Cancelled => (
                    S::Selected(candidate),
                    fail(UploadFailure::new(FailureKind::Cancelled, message)),
                ),
                JobOutcome::GaveUp { .. } => (
                    S::Selected(candidate),
                    fail(UploadFailure::new(FailureKind::Transport, message)),
                ),
            }
        }

        (state, event) => {
            tracing::debug!(state = state.label(), ?event, "Ignoring event");
            (state, Vec::new())
        }
    }
}

fn fail(failure: UploadFailure) -> Vec<Effect> {
    vec![
        Effect::Notify(Notice::error(failure.message.clone())),
        Effect::Finish(UploadOutcome::Failed(failure)),
    ]
}

fn succeed(outcome: UploadOutcome) -> (UploadState, Vec<Effect>) {
    (
        UploadState::Done,
        vec![
            Effect::Notify(Notice::success(outcome.message())),
            Effect::ResetSelection,
            Effect::Finish(outcome),
        ],
    )
}
