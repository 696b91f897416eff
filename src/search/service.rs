//! Authenticated search execution.

use crate::backend::{IngestBackend, SearchRequest, SearchResult};
use crate::credentials::Credential;
use crate::search::composer::QueryComposer;
use std::sync::Arc;

const SIGN_IN_TO_SEARCH: &str = "Please sign in to search.";
const SEARCH_FAILED: &str = "Search failed. Please try again.";

/// Sends composed queries to the search endpoint.
#[derive(Clone)]
pub struct SearchService {
    backend: Arc<dyn IngestBackend>,
    credential: Option<Credential>,
}

impl SearchService {
    /// Build a service over `backend`; without a credential every search fails locally.
    pub fn new(backend: Arc<dyn IngestBackend>, credential: Option<Credential>) -> Self {
        Self {
            backend,
            credential,
        }
    }

    /// Compose a request from `composer` and run it.
    ///
    /// Returns `None` when the query is empty; no call is made in that case.
    pub async fn search(
        &self,
        composer: &mut QueryComposer,
        limit_input: &str,
    ) -> Option<SearchResult> {
        match composer.compose(limit_input).await {
            Ok(request) => Some(self.execute(&request).await),
            Err(error) => {
                tracing::debug!(%error, "Search skipped");
                None
            }
        }
    }

    /// Run a validated request. Failures are reported in [`SearchResult::error`].
    pub async fn execute(&self, request: &SearchRequest) -> SearchResult {
        let Some(credential) = self.credential.as_ref() else {
            return SearchResult::from_error(SIGN_IN_TO_SEARCH);
        };

        tracing::info!(query = %request.query, top_k = request.top_k, "Searching");
        match self.backend.search(credential, request).await {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(error = %error, "Search failed");
                SearchResult::from_error(
                    error
                        .server_message()
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or(SEARCH_FAILED),
                )
            }
        }
    }
}
