//! Upload workflow: candidate selection, submission, conflict resolution, and job tracking.

pub mod candidate;
pub mod conflict;
pub mod orchestrator;
pub mod outcome;
pub mod poller;
pub mod state;

pub use candidate::{CandidateError, PDF_MEDIA_TYPE, UploadCandidate};
pub use conflict::{
    ConflictChoice, ConflictDecisionRequest, ConflictPrompt, ConflictResolution, ConflictResolver,
    FixedChoice, TerminalPrompt, prompt_text,
};
pub use orchestrator::{SilentObserver, UploadObserver, UploadOrchestrator, interpret_submission};
pub use outcome::{
    AcceptedJob, ExistingDocument, FailureKind, Notice, NoticeLevel, SubmitOutcome, UploadFailure,
    UploadOutcome, completion_message,
};
pub use poller::{JobOutcome, JobPoller, PollError, PollPolicy, PollSummary};
pub use state::{Effect, UploadEvent, UploadState, transition};
