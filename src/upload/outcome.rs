//! Outcome, failure, and notice values reported by the upload workflow.

use crate::backend::{ApiError, IngestReceipt, JobResult};
use std::fmt;

const UPLOAD_FAILED: &str = "Upload failed";
const IMMEDIATE_SUCCESS: &str = "File uploaded and processed successfully!";
const ACCEPTED: &str = "Accepted for background processing";
pub(crate) const REPLACED_MESSAGE: &str = "Document replaced successfully";
pub(crate) const CANCELLED: &str = "Upload cancelled";

/// Classification of a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Detected locally before any network call (missing credential, nothing selected).
    Precondition,
    /// Local input validation (non-PDF selection).
    Validation,
    /// The service reported the failure.
    Server,
    /// No interpretable response was received.
    Transport,
    /// The call exceeded its bounded wait.
    Timeout,
    /// Work was cancelled before reaching a terminal state.
    Cancelled,
}

/// Failure surfaced to the caller, always carrying a readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    /// What kind of failure occurred.
    pub kind: FailureKind,
    /// Message shown to the user.
    pub message: String,
}

impl UploadFailure {
    /// Build a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// No credential is stored.
    pub fn sign_in_required() -> Self {
        Self::new(FailureKind::Precondition, "sign in required")
    }

    /// Nothing was selected before submitting.
    pub fn no_selection() -> Self {
        Self::new(FailureKind::Precondition, "Please select a file first")
    }

    /// A submission is already in flight.
    pub fn busy() -> Self {
        Self::new(FailureKind::Precondition, "An upload is already in progress")
    }

    /// The selection is not a PDF.
    pub fn not_pdf() -> Self {
        Self::new(FailureKind::Validation, "Please select a valid PDF file")
    }

    /// The service returned an error, or a generic fallback when it gave none.
    pub fn server(message: Option<String>) -> Self {
        Self::new(
            FailureKind::Server,
            message
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| UPLOAD_FAILED.to_string()),
        )
    }

    /// Convert a client error, using `fallback` when the server supplied no message.
    pub fn from_api(error: &ApiError, fallback: &str) -> Self {
        match error {
            ApiError::Timeout { after } => {
                Self::new(FailureKind::Timeout, format!("request timed out after {after:?}"))
            }
            ApiError::UnexpectedStatus { message, .. } => Self::new(
                FailureKind::Server,
                message
                    .as_deref()
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or(fallback),
            ),
            ApiError::Io { .. } => Self::new(FailureKind::Precondition, error.to_string()),
            ApiError::Http(_) | ApiError::InvalidUrl(_) => {
                Self::new(FailureKind::Transport, error.to_string())
            }
        }
    }
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UploadFailure {}

/// Job accepted by the service for background processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedJob {
    /// Identifier used for status lookups.
    pub job_id: String,
    /// Name reported in completion messages.
    pub display_name: String,
    /// Acceptance message.
    pub message: String,
}

impl AcceptedJob {
    /// Describe a job, defaulting the acceptance message.
    pub fn new(job_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            display_name: display_name.into(),
            message: ACCEPTED.to_string(),
        }
    }
}

/// Document the service reports as already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingDocument {
    /// Identifier used to scope the replace call.
    pub document_id: String,
    /// Filename of the stored document.
    pub filename: String,
}

/// Interpretation of a submission response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Processed synchronously.
    ImmediateSuccess(IngestReceipt),
    /// Accepted for background processing.
    Accepted(AcceptedJob),
    /// A document with the same identity exists and may be replaced.
    ConflictDetected(ExistingDocument),
    /// Rejected, failed, or never answered.
    Failure(UploadFailure),
}

/// Terminal result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The document was ingested (directly, through a job, or by replacement).
    Ingested {
        /// Success message including the counts.
        message: String,
        /// Text chunks stored.
        text_chunks: u64,
        /// Image chunks stored.
        image_chunks: u64,
    },
    /// The user declined to replace a conflicting document.
    Cancelled,
    /// The upload failed.
    Failed(UploadFailure),
}

impl UploadOutcome {
    pub(crate) fn from_receipt(receipt: &IngestReceipt, default_message: Option<&str>) -> Self {
        Self::Ingested {
            message: receipt_message(receipt, default_message),
            text_chunks: receipt.chunks_stored,
            image_chunks: receipt.images_stored,
        }
    }

    /// Message shown to the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Ingested { message, .. } => message,
            Self::Cancelled => CANCELLED,
            Self::Failed(failure) => &failure.message,
        }
    }
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Work finished successfully.
    Success,
    /// Progress information.
    Info,
    /// Something failed or was cancelled.
    Error,
}

/// Message emitted to observers as the workflow progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text.
    pub message: String,
}

impl Notice {
    /// Success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Success message for a synchronous ingestion or replace.
///
/// With `default_message` set, the counts are always appended; without it, a missing server
/// message yields the generic success text alone.
pub(crate) fn receipt_message(receipt: &IngestReceipt, default_message: Option<&str>) -> String {
    match (receipt.message.as_deref(), default_message) {
        (Some(message), _) | (None, Some(message)) => format!(
            "{message} · chunks: {}, images: {}",
            receipt.chunks_stored, receipt.images_stored
        ),
        (None, None) => IMMEDIATE_SUCCESS.to_string(),
    }
}

/// Success message for a completed background job.
pub fn completion_message(display_name: &str, result: &JobResult) -> String {
    format!(
        "Processed {display_name} · chunks: {}, images: {}",
        result.text_chunks, result.image_chunks
    )
}
