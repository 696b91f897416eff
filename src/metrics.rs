use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing one client session.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    documents_ingested: AtomicU64,
    text_chunks: AtomicU64,
    image_chunks: AtomicU64,
    transient_failures: AtomicU64,
}

impl SessionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document and the chunk counts the service reported for it.
    pub fn record_document(&self, text_chunks: u64, image_chunks: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.text_chunks.fetch_add(text_chunks, Ordering::Relaxed);
        self.image_chunks.fetch_add(image_chunks, Ordering::Relaxed);
    }

    /// Record a job status lookup that failed and was retried.
    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            text_chunks: self.text_chunks.load(Ordering::Relaxed),
            image_chunks: self.image_chunks.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of session counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents ingested directly, through a job, or by replacement.
    pub documents_ingested: u64,
    /// Text chunks stored across all ingested documents.
    pub text_chunks: u64,
    /// Image chunks stored across all ingested documents.
    pub image_chunks: u64,
    /// Job status lookups that failed and were retried.
    pub transient_failures: u64,
}
