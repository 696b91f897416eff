//! HTTP client wrapper for the ingestion and search service.

use crate::backend::types::{
    ApiError, ErrorBody, IngestReceipt, JobStatus, SearchRequest, SearchResult, SubmitBody,
    SubmitMode, SubmitResponse,
};
use crate::config::Config;
use crate::credentials::Credential;
use crate::upload::UploadCandidate;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;

/// Remote operations consumed by the upload and search workflows.
///
/// Every call requires a credential; callers without one short-circuit before reaching this
/// trait, so no request is ever sent without an `Authorization` header.
#[async_trait]
pub trait IngestBackend: Send + Sync {
    /// Send a document to the ingestion endpoint. Any HTTP status is returned as a response;
    /// only transport failures and timeouts are errors.
    async fn submit(
        &self,
        credential: &Credential,
        candidate: &UploadCandidate,
        mode: SubmitMode,
    ) -> Result<SubmitResponse, ApiError>;

    /// Replace an existing document with the candidate's contents.
    async fn replace(
        &self,
        credential: &Credential,
        document_id: &str,
        candidate: &UploadCandidate,
    ) -> Result<IngestReceipt, ApiError>;

    /// Look up the state of a background job.
    async fn job_status(&self, credential: &Credential, job_id: &str)
    -> Result<JobStatus, ApiError>;

    /// Run a semantic search against the indexed corpus.
    async fn search(
        &self,
        credential: &Credential,
        request: &SearchRequest,
    ) -> Result<SearchResult, ApiError>;
}

/// Per-call waits applied by [`IngestApiClient`].
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    /// Bounded wait for submissions and status lookups.
    pub submit_timeout: Duration,
    /// Extended wait for replace calls and synchronous submissions.
    pub replace_timeout: Duration,
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            submit_timeout: config.submit_timeout,
            replace_timeout: config.replace_timeout,
        }
    }
}

/// `reqwest`-backed implementation of [`IngestBackend`].
pub struct IngestApiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) settings: ClientSettings,
}

impl IngestApiClient {
    /// Construct a client for the service at `base_url`.
    pub fn new(base_url: &str, settings: ClientSettings) -> Result<Self, ApiError> {
        let client = Client::builder().user_agent("ingestctl/0.1").build()?;
        let base_url = normalize_base_url(base_url).map_err(ApiError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            submit_timeout = ?settings.submit_timeout,
            replace_timeout = ?settings.replace_timeout,
            "Initialized ingestion HTTP client"
        );
        Ok(Self {
            client,
            base_url,
            settings,
        })
    }

    /// Construct a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_url, ClientSettings::from(config))
    }

    fn request(&self, method: Method, path: &str, credential: &Credential) -> RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .header(AUTHORIZATION, credential.bearer())
    }

    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Response, ApiError> {
        request
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify(err, timeout))
    }

    async fn file_form(candidate: &UploadCandidate) -> Result<Form, ApiError> {
        let bytes = tokio::fs::read(candidate.path())
            .await
            .map_err(|source| ApiError::Io {
                path: candidate.path().to_path_buf(),
                source,
            })?;
        let part = Part::bytes(bytes)
            .file_name(candidate.display_name().to_string())
            .mime_str(candidate.media_type())?;
        Ok(Form::new().part("file", part))
    }
}

#[async_trait]
impl IngestBackend for IngestApiClient {
    async fn submit(
        &self,
        credential: &Credential,
        candidate: &UploadCandidate,
        mode: SubmitMode,
    ) -> Result<SubmitResponse, ApiError> {
        let (path, timeout) = match mode {
            SubmitMode::Async => ("api/upload_async", self.settings.submit_timeout),
            SubmitMode::Sync => ("api/upload", self.settings.replace_timeout),
        };
        let form = Self::file_form(candidate).await?;
        tracing::debug!(
            file = candidate.display_name(),
            bytes = candidate.size(),
            ?mode,
            "Submitting document"
        );

        let response = self
            .send(
                self.request(Method::POST, path, credential).multipart(form),
                timeout,
            )
            .await?;
        let status = response.status();
        let text = response.text().await.map_err(|err| classify(err, timeout))?;
        let body = serde_json::from_str::<SubmitBody>(&text).unwrap_or_else(|error| {
            tracing::debug!(%status, %error, "Submission response body was not JSON");
            SubmitBody::default()
        });
        tracing::debug!(%status, job_id = ?body.job_id, "Submission answered");
        Ok(SubmitResponse { status, body })
    }

    async fn replace(
        &self,
        credential: &Credential,
        document_id: &str,
        candidate: &UploadCandidate,
    ) -> Result<IngestReceipt, ApiError> {
        let timeout = self.settings.replace_timeout;
        let form = Self::file_form(candidate).await?;
        tracing::debug!(
            document_id,
            file = candidate.display_name(),
            "Replacing document"
        );
        let response = self
            .send(
                self.request(
                    Method::POST,
                    &format!("api/documents/{document_id}/replace"),
                    credential,
                )
                .multipart(form),
                timeout,
            )
            .await?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(|err| classify(err, timeout))
    }

    async fn job_status(
        &self,
        credential: &Credential,
        job_id: &str,
    ) -> Result<JobStatus, ApiError> {
        let timeout = self.settings.submit_timeout;
        let response = self
            .send(
                self.request(Method::GET, &format!("api/jobs/{job_id}"), credential),
                timeout,
            )
            .await?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(|err| classify(err, timeout))
    }

    async fn search(
        &self,
        credential: &Credential,
        request: &SearchRequest,
    ) -> Result<SearchResult, ApiError> {
        let timeout = self.settings.submit_timeout;
        let response = self
            .send(
                self.request(Method::POST, "api/search", credential)
                    .json(request),
                timeout,
            )
            .await?;
        let response = ensure_success(response).await?;
        response.json().await.map_err(|err| classify(err, timeout))
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.error);
    let error = ApiError::UnexpectedStatus {
        status,
        message,
        body,
    };
    tracing::debug!(error = %error, "Service request failed");
    Err(error)
}

fn classify(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout { after: timeout }
    } else {
        ApiError::Http(err)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
