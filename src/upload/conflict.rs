//! Handling of "document already exists" responses.

use crate::backend::{IngestBackend, IngestReceipt};
use crate::credentials::Credential;
use crate::upload::UploadCandidate;
use crate::upload::outcome::{ExistingDocument, UploadFailure};
use async_trait::async_trait;
use std::sync::Arc;

const REPLACE_FAILED: &str = "Replace failed";

/// Pending decision about a conflicting document.
///
/// Created once per conflict response and consumed by [`ConflictResolver::resolve`]; it is not
/// `Clone`, so a decision cannot be solicited twice for the same conflict.
#[derive(Debug, PartialEq, Eq)]
pub struct ConflictDecisionRequest {
    existing: ExistingDocument,
}

impl ConflictDecisionRequest {
    pub(crate) fn new(existing: ExistingDocument) -> Self {
        Self { existing }
    }

    /// The document already stored by the service.
    pub fn existing(&self) -> &ExistingDocument {
        &self.existing
    }
}

/// The user's answer to a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Overwrite the stored document with the candidate.
    Replace,
    /// Keep the stored document and drop the candidate.
    Abort,
}

/// Result of resolving a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    /// The stored document was replaced.
    Replaced(IngestReceipt),
    /// The user kept the stored document.
    Declined,
    /// The replace call failed.
    Failed(UploadFailure),
}

/// Source of conflict decisions.
#[async_trait]
pub trait ConflictPrompt: Send + Sync {
    /// Ask whether `existing` should be replaced.
    async fn decide(&self, existing: &ExistingDocument) -> ConflictChoice;
}

/// Question presented for a conflict.
pub fn prompt_text(existing: &ExistingDocument) -> String {
    format!(
        "This document already exists as \"{}\". Replace it?",
        existing.filename
    )
}

/// Prompt that always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub ConflictChoice);

#[async_trait]
impl ConflictPrompt for FixedChoice {
    async fn decide(&self, _existing: &ExistingDocument) -> ConflictChoice {
        self.0
    }
}

/// Interactive yes/no prompt on the terminal. Any prompt error counts as abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

#[async_trait]
impl ConflictPrompt for TerminalPrompt {
    async fn decide(&self, existing: &ExistingDocument) -> ConflictChoice {
        let question = prompt_text(existing);
        let answer = tokio::task::spawn_blocking(move || {
            inquire::Confirm::new(&question)
                .with_default(false)
                .prompt()
        })
        .await;

        match answer {
            Ok(Ok(true)) => ConflictChoice::Replace,
            Ok(Ok(false)) => ConflictChoice::Abort,
            Ok(Err(error)) => {
                tracing::debug!(%error, "Conflict prompt dismissed");
                ConflictChoice::Abort
            }
            Err(error) => {
                tracing::warn!(%error, "Conflict prompt task failed");
                ConflictChoice::Abort
            }
        }
    }
}

/// Drives the replace-or-abort decision for a conflicting submission.
#[derive(Clone)]
pub struct ConflictResolver {
    backend: Arc<dyn IngestBackend>,
}

impl ConflictResolver {
    /// Build a resolver sharing the given backend.
    pub fn new(backend: Arc<dyn IngestBackend>) -> Self {
        Self { backend }
    }

    /// Obtain a decision and act on it. Replace issues exactly one replace call; abort issues none.
    pub async fn resolve(
        &self,
        request: ConflictDecisionRequest,
        candidate: &UploadCandidate,
        credential: &Credential,
        prompt: &dyn ConflictPrompt,
    ) -> ConflictResolution {
        let ConflictDecisionRequest { existing } = request;
        let choice = prompt.decide(&existing).await;
        tracing::info!(
            document_id = %existing.document_id,
            existing = %existing.filename,
            ?choice,
            "Conflict decision made"
        );

        match choice {
            ConflictChoice::Abort => ConflictResolution::Declined,
            ConflictChoice::Replace => {
                match self
                    .backend
                    .replace(credential, &existing.document_id, candidate)
                    .await
                {
                    Ok(receipt) => ConflictResolution::Replaced(receipt),
                    Err(error) => {
                        tracing::error!(
                            document_id = %existing.document_id,
                            error = %error,
                            "Replace failed"
                        );
                        ConflictResolution::Failed(UploadFailure::from_api(&error, REPLACE_FAILED))
                    }
                }
            }
        }
    }
}
