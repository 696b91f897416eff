//! Background job tracking.
//!
//! A job is polled serially until the service reports `completed` or `failed`. A "still running"
//! answer schedules the next lookup after [`PollPolicy::pending_delay`]; a lookup that fails at
//! the communication layer is treated as transient and retried after the longer
//! [`PollPolicy::transient_delay`]. Transient retries are unbounded unless
//! [`PollPolicy::max_transient_retries`] is set. Every wait observes the cancellation token.

use crate::backend::{ApiError, IngestBackend, JobResult, JobState, JobStatus};
use crate::config::Config;
use crate::credentials::Credential;
use crate::metrics::SessionMetrics;
use crate::upload::outcome::{AcceptedJob, completion_message};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

const PROCESSING_FAILED: &str = "Processing failed";

/// Jobs currently being tracked, keyed by backend instance and job identifier.
static IN_FLIGHT: OnceLock<Mutex<HashSet<(usize, String)>>> = OnceLock::new();

/// Timing rules applied while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after a non-terminal status.
    pub pending_delay: Duration,
    /// Delay after a failed lookup.
    pub transient_delay: Duration,
    /// Consecutive failed lookups tolerated before giving up; `None` never gives up.
    pub max_transient_retries: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            pending_delay: Duration::from_secs(2),
            transient_delay: Duration::from_secs(3),
            max_transient_retries: None,
        }
    }
}

impl From<&Config> for PollPolicy {
    fn from(config: &Config) -> Self {
        Self {
            pending_delay: config.poll_interval,
            transient_delay: config.poll_retry_delay,
            max_transient_retries: config.poll_max_transient_retries,
        }
    }
}

/// Errors preventing a job from being tracked.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    /// Another task is already polling this job.
    #[error("job {0} is already being tracked")]
    AlreadyTracking(String),
}

/// Terminal result of tracking a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The service finished processing the document.
    Completed {
        /// Name used in the success message.
        display_name: String,
        /// Counts reported by the service.
        result: JobResult,
    },
    /// The service reported a failure.
    Failed {
        /// Server message, or a generic one.
        message: String,
    },
    /// Polling stopped because the cancellation token fired.
    Cancelled,
    /// The configured transient retry ceiling was reached.
    GaveUp {
        /// Consecutive failed lookups observed.
        transient_failures: u32,
        /// Description of the last failure.
        last_error: String,
    },
}

impl JobOutcome {
    /// Message shown to the user.
    pub fn message(&self) -> String {
        match self {
            Self::Completed {
                display_name,
                result,
            } => completion_message(display_name, result),
            Self::Failed { message } => message.clone(),
            Self::Cancelled => "Job tracking cancelled".to_string(),
            Self::GaveUp {
                transient_failures,
                last_error,
            } => format!(
                "Gave up checking job status after {transient_failures} failed attempts: {last_error}"
            ),
        }
    }
}

/// Terminal outcome plus lookup statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    /// How tracking ended.
    pub outcome: JobOutcome,
    /// Status lookups issued, including failed ones.
    pub lookups: u32,
    /// Lookups that failed at the communication layer.
    pub transient_failures: u32,
}

/// Next move after observing one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollStep {
    Finish(JobOutcome),
    Wait(Duration),
}

/// Lookup state of one tracked job.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    consecutive_failures: u32,
    transient_failures: u32,
}

impl Pending {
    /// Fold one lookup result into the state and decide what happens next.
    pub(crate) fn advance(
        &mut self,
        policy: &PollPolicy,
        display_name: &str,
        observation: Result<JobStatus, ApiError>,
    ) -> PollStep {
        match observation {
            Ok(status) => {
                self.consecutive_failures = 0;
                match status.state {
                    JobState::Completed => PollStep::Finish(JobOutcome::Completed {
                        display_name: display_name.to_string(),
                        result: status.result.unwrap_or_default(),
                    }),
                    JobState::Failed => PollStep::Finish(JobOutcome::Failed {
                        message: status
                            .message
                            .filter(|text| !text.trim().is_empty())
                            .unwrap_or_else(|| PROCESSING_FAILED.to_string()),
                    }),
                    _ => PollStep::Wait(policy.pending_delay),
                }
            }
            Err(error) => {
                self.consecutive_failures += 1;
                self.transient_failures += 1;
                if let Some(limit) = policy.max_transient_retries
                    && self.consecutive_failures > limit
                {
                    return PollStep::Finish(JobOutcome::GaveUp {
                        transient_failures: self.consecutive_failures,
                        last_error: error.to_string(),
                    });
                }
                tracing::warn!(
                    error = %error,
                    consecutive_failures = self.consecutive_failures,
                    "Job status lookup failed; retrying"
                );
                PollStep::Wait(policy.transient_delay)
            }
        }
    }
}

/// Polls background jobs to a terminal state.
///
/// At most one poller tracks a given job identifier against a given backend at any time, across
/// every `JobPoller` built over that backend.
#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn IngestBackend>,
    policy: PollPolicy,
    metrics: Arc<SessionMetrics>,
}

impl JobPoller {
    /// Build a poller sharing the given backend.
    pub fn new(backend: Arc<dyn IngestBackend>, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            metrics: Arc::new(SessionMetrics::new()),
        }
    }

    /// Record transient failures into shared session metrics.
    pub fn with_metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Poll `job` until it completes, fails, or `cancel` fires.
    ///
    /// Lookups are strictly serial. A second concurrent call for the same job identifier over the
    /// same backend is rejected with [`PollError::AlreadyTracking`].
    pub async fn track(
        &self,
        credential: &Credential,
        job: &AcceptedJob,
        cancel: &CancellationToken,
    ) -> Result<PollSummary, PollError> {
        let _guard = InFlightGuard::acquire(backend_key(&self.backend), &job.job_id)?;
        let mut pending = Pending::default();
        let mut lookups = 0_u32;

        tracing::info!(job_id = %job.job_id, file = %job.display_name, "Tracking ingestion job");
        let outcome = loop {
            let observation = tokio::select! {
                biased;
                _ = cancel.cancelled() => break JobOutcome::Cancelled,
                status = self.backend.job_status(credential, &job.job_id) => status,
            };
            lookups += 1;
            let failed = observation.is_err();

            match pending.advance(&self.policy, &job.display_name, observation) {
                PollStep::Finish(outcome) => break outcome,
                PollStep::Wait(delay) => {
                    if failed {
                        self.metrics.record_transient_failure();
                    }
                    tracing::debug!(job_id = %job.job_id, lookups, ?delay, "Job still pending");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break JobOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        tracing::info!(
            job_id = %job.job_id,
            lookups,
            transient_failures = pending.transient_failures,
            outcome = ?outcome,
            "Job tracking finished"
        );
        Ok(PollSummary {
            outcome,
            lookups,
            transient_failures: pending.transient_failures,
        })
    }
}

fn backend_key(backend: &Arc<dyn IngestBackend>) -> usize {
    Arc::as_ptr(backend) as *const () as usize
}

fn in_flight() -> &'static Mutex<HashSet<(usize, String)>> {
    IN_FLIGHT.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Registration of one tracked job; the entry is released on drop.
///
/// The key stays unique while the guard lives because the poller holding it keeps the backend
/// allocation alive.
struct InFlightGuard {
    key: (usize, String),
}

impl InFlightGuard {
    fn acquire(backend: usize, job_id: &str) -> Result<Self, PollError> {
        let key = (backend, job_id.to_string());
        let mut active = in_flight()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(key.clone()) {
            return Err(PollError::AlreadyTracking(job_id.to_string()));
        }
        Ok(Self { key })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = in_flight()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.key);
    }
}
