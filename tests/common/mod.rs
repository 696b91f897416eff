#![allow(dead_code)]

use async_trait::async_trait;
use ingestctl::backend::{
    ApiError, IngestBackend, IngestReceipt, JobResult, JobState, JobStatus, SearchRequest,
    SearchResult, SubmitBody, SubmitMode, SubmitResponse,
};
use ingestctl::credentials::Credential;
use ingestctl::upload::{PDF_MEDIA_TYPE, PollPolicy, UploadCandidate};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory backend answering from per-endpoint scripts and counting every call.
#[derive(Default)]
pub struct ScriptedBackend {
    submits: Mutex<VecDeque<Result<SubmitResponse, ApiError>>>,
    replaces: Mutex<VecDeque<Result<IngestReceipt, ApiError>>>,
    statuses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
    searches: Mutex<VecDeque<Result<SearchResult, ApiError>>>,
    pub submit_calls: AtomicUsize,
    pub replace_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub last_search: Mutex<Option<SearchRequest>>,
    pub last_mode: Mutex<Option<SubmitMode>>,
}

impl ScriptedBackend {
    pub fn on_submit(self, response: Result<SubmitResponse, ApiError>) -> Self {
        self.submits.lock().unwrap().push_back(response);
        self
    }

    pub fn on_replace(self, response: Result<IngestReceipt, ApiError>) -> Self {
        self.replaces.lock().unwrap().push_back(response);
        self
    }

    pub fn on_status(self, response: Result<JobStatus, ApiError>) -> Self {
        self.statuses.lock().unwrap().push_back(response);
        self
    }

    pub fn on_search(self, response: Result<SearchResult, ApiError>) -> Self {
        self.searches.lock().unwrap().push_back(response);
        self
    }

    pub fn total_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
            + self.replace_calls.load(Ordering::SeqCst)
            + self.status_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngestBackend for ScriptedBackend {
    async fn submit(
        &self,
        _credential: &Credential,
        _candidate: &UploadCandidate,
        mode: SubmitMode,
    ) -> Result<SubmitResponse, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_mode.lock().unwrap() = Some(mode);
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected submit call")
    }

    async fn replace(
        &self,
        _credential: &Credential,
        _document_id: &str,
        _candidate: &UploadCandidate,
    ) -> Result<IngestReceipt, ApiError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        self.replaces
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected replace call")
    }

    async fn job_status(
        &self,
        _credential: &Credential,
        _job_id: &str,
    ) -> Result<JobStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(status(JobState::Running))
            }
        }
    }

    async fn search(
        &self,
        _credential: &Credential,
        request: &SearchRequest,
    ) -> Result<SearchResult, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_search.lock().unwrap() = Some(request.clone());
        self.searches
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected search call")
    }
}

pub fn credential() -> Option<Credential> {
    Credential::new("test-token")
}

pub fn pdf(name: &str) -> UploadCandidate {
    UploadCandidate::new(name, name, 2048, PDF_MEDIA_TYPE)
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        pending_delay: Duration::from_millis(5),
        transient_delay: Duration::from_millis(10),
        max_transient_retries: None,
    }
}

pub fn submit_response(status: StatusCode, body: SubmitBody) -> Result<SubmitResponse, ApiError> {
    Ok(SubmitResponse { status, body })
}

pub fn accepted(job_id: &str) -> Result<SubmitResponse, ApiError> {
    submit_response(
        StatusCode::ACCEPTED,
        SubmitBody {
            job_id: Some(job_id.into()),
            ..SubmitBody::default()
        },
    )
}

pub fn status(state: JobState) -> JobStatus {
    JobStatus {
        state,
        result: None,
        message: None,
    }
}

pub fn completed(text_chunks: u64, image_chunks: u64) -> JobStatus {
    JobStatus {
        state: JobState::Completed,
        result: Some(JobResult {
            text_chunks,
            image_chunks,
        }),
        message: None,
    }
}

pub fn transport_error() -> ApiError {
    ApiError::Timeout {
        after: Duration::from_millis(1),
    }
}
