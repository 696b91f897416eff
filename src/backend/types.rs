//! Wire types and errors shared by the ingestion service client and its callers.

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while talking to the ingestion service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The request exceeded its bounded wait.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// Wait that was exceeded.
        after: Duration,
    },
    /// Service responded with a status the caller does not accept.
    #[error("Unexpected response ({status}): {}", detail(.message, .body))]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// `error` field of the response body, when present.
        message: Option<String>,
        /// Raw response body.
        body: String,
    },
    /// The document to upload could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Location of the document.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Message supplied by the server, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::UnexpectedStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

fn detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    message.as_deref().unwrap_or(body)
}

/// Which ingestion endpoint receives a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitMode {
    /// Background processing; the service answers 202 with a job identifier.
    #[default]
    Async,
    /// Processing happens inside the request; the service answers with counts directly.
    Sync,
}

/// Raw submission response: status plus whichever fields the service filled in.
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    /// HTTP status of the submission.
    pub status: StatusCode,
    /// Decoded body; empty when the body was not JSON.
    pub body: SubmitBody,
}

/// Union of the fields the submission endpoint may return.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitBody {
    /// Human readable status line.
    #[serde(default)]
    pub message: Option<String>,
    /// Text chunks stored by a synchronous ingestion.
    #[serde(default)]
    pub chunks_stored: Option<u64>,
    /// Image chunks stored by a synchronous ingestion.
    #[serde(default)]
    pub images_stored: Option<u64>,
    /// Identifier of the background job.
    #[serde(default)]
    pub job_id: Option<String>,
    /// Filename the service recorded.
    #[serde(default)]
    pub filename: Option<String>,
    /// Whether a conflicting document may be replaced.
    #[serde(default)]
    pub can_replace: bool,
    /// Identifier of the conflicting document.
    #[serde(default, deserialize_with = "string_or_number")]
    pub existing_document_id: Option<String>,
    /// Filename of the conflicting document.
    #[serde(default)]
    pub existing_filename: Option<String>,
    /// Error description for failed submissions.
    #[serde(default)]
    pub error: Option<String>,
}

/// Counts reported by a completed synchronous ingestion or replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IngestReceipt {
    /// Human readable status line.
    #[serde(default)]
    pub message: Option<String>,
    /// Text chunks stored.
    #[serde(default)]
    pub chunks_stored: u64,
    /// Image chunks stored.
    #[serde(default)]
    pub images_stored: u64,
}

/// Server-side lifecycle of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker.
    Queued,
    /// Picked up by a worker.
    Running,
    /// Alias of `Running` used by some service versions.
    Processing,
    /// Finished successfully; `result` carries counts.
    Completed,
    /// Finished with an error; `message` describes it.
    Failed,
    /// The service does not know the job.
    NotFound,
    /// Any state this client does not recognise.
    #[serde(other)]
    Unknown,
}

/// Chunk counts produced by a background job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct JobResult {
    /// Text chunks produced.
    #[serde(default)]
    pub text_chunks: u64,
    /// Image chunks produced.
    #[serde(default)]
    pub image_chunks: u64,
}

/// Response of the job status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    /// Current lifecycle state.
    pub state: JobState,
    /// Counts, present once completed.
    #[serde(default)]
    pub result: Option<JobResult>,
    /// Status or failure description.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of a search call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    /// Trimmed, non-empty query text.
    pub query: String,
    /// Number of results requested.
    pub top_k: u32,
}

/// Answer returned by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Generated answer text.
    #[serde(default)]
    pub answer: String,
    /// Ranked sections backing the answer.
    #[serde(default)]
    pub sections: Vec<Value>,
    /// Raw context excerpts.
    #[serde(default)]
    pub context: Vec<Value>,
    /// Failure description, when the search did not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResult {
    /// Empty result carrying only an error message.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(text) => text,
            StringOrNumber::Number(number) => number.to_string(),
        }),
    )
}

#[derive(Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) error: Option<String>,
}
