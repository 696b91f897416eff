//! Ingestion and search service integration.

pub mod client;
pub mod types;

pub use client::{ClientSettings, IngestApiClient, IngestBackend};
pub use types::{
    ApiError, IngestReceipt, JobResult, JobState, JobStatus, SearchRequest, SearchResult,
    SubmitBody, SubmitMode, SubmitResponse,
};
