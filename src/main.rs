//! Command-line entrypoint: upload PDFs, follow ingestion jobs, and run searches.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ingestctl::backend::{IngestApiClient, IngestBackend, SubmitMode};
use ingestctl::credentials::load_credential;
use ingestctl::metrics::SessionMetrics;
use ingestctl::search::{QueryComposer, SearchService};
use ingestctl::upload::{
    AcceptedJob, ConflictChoice, ConflictPrompt, FixedChoice, JobOutcome, JobPoller, Notice,
    NoticeLevel, PollPolicy, TerminalPrompt, UploadCandidate, UploadObserver, UploadOrchestrator,
    UploadOutcome,
};
use ingestctl::{config, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ingestctl", about = "Upload PDFs for ingestion and search the indexed corpus")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a PDF and wait for it to be processed.
    Upload {
        path: PathBuf,
        /// Use the synchronous endpoint instead of a background job.
        #[arg(long)]
        sync: bool,
        /// Replace an existing document without asking.
        #[arg(long, conflicts_with = "keep")]
        replace: bool,
        /// Keep an existing document without asking.
        #[arg(long)]
        keep: bool,
    },
    /// Follow a previously accepted ingestion job.
    Job {
        job_id: String,
        /// Name used in the completion message.
        #[arg(long)]
        name: Option<String>,
    },
    /// Search the indexed documents.
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        /// Number of results (1-20).
        #[arg(long, default_value = "")]
        limit: String,
    },
}

struct ConsoleObserver;

impl UploadObserver for ConsoleObserver {
    fn notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Success | NoticeLevel::Info => println!("{}", notice.message),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let credential = load_credential(config).context("failed to load credential")?;
    let backend: Arc<dyn IngestBackend> = Arc::new(
        IngestApiClient::from_config(config).context("failed to build ingestion client")?,
    );
    let metrics = Arc::new(SessionMetrics::new());
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let succeeded = match cli.command {
        Command::Upload {
            path,
            sync,
            replace,
            keep,
        } => {
            let candidate = UploadCandidate::from_path(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let prompt: Box<dyn ConflictPrompt> = match (replace, keep) {
                (true, _) => Box::new(FixedChoice(ConflictChoice::Replace)),
                (_, true) => Box::new(FixedChoice(ConflictChoice::Abort)),
                _ => Box::new(TerminalPrompt),
            };
            let mode = if sync { SubmitMode::Sync } else { SubmitMode::Async };

            let mut orchestrator =
                UploadOrchestrator::new(backend, credential, PollPolicy::from(config))
                    .with_mode(mode)
                    .with_observer(Arc::new(ConsoleObserver))
                    .with_metrics(Arc::clone(&metrics))
                    .with_cancellation(cancel);
            let outcome = orchestrator.run(candidate, prompt.as_ref()).await;
            !matches!(outcome, UploadOutcome::Failed(_))
        }
        Command::Job { job_id, name } => {
            let Some(credential) = credential else {
                eprintln!("error: sign in required");
                return Ok(ExitCode::FAILURE);
            };
            let job = AcceptedJob::new(job_id.clone(), name.unwrap_or(job_id));
            let poller = JobPoller::new(backend, PollPolicy::from(config))
                .with_metrics(Arc::clone(&metrics));
            let summary = poller.track(&credential, &job, &cancel).await?;
            let message = summary.outcome.message();
            if let JobOutcome::Completed { result, .. } = &summary.outcome {
                metrics.record_document(result.text_chunks, result.image_chunks);
                println!("{message}");
                true
            } else {
                eprintln!("error: {message}");
                false
            }
        }
        Command::Search { query, limit } => {
            let service = SearchService::new(backend, credential);
            let mut composer = QueryComposer::new(config.search_default_limit);
            composer.set_typed(query.join(" "));
            match service.search(&mut composer, &limit).await {
                None => {
                    eprintln!("error: search query is empty");
                    false
                }
                Some(result) => {
                    if let Some(error) = result.error.as_deref() {
                        eprintln!("error: {error}");
                        false
                    } else {
                        println!("{}", result.answer);
                        for (rank, section) in result.sections.iter().enumerate() {
                            let rendered = serde_json::to_string_pretty(section)
                                .context("failed to render search section")?;
                            println!("\n[{}] {rendered}", rank + 1);
                        }
                        true
                    }
                }
            }
        }
    };

    let snapshot = metrics.snapshot();
    tracing::debug!(
        metrics = %serde_json::to_string(&snapshot).context("failed to serialize metrics")?,
        "Session finished"
    );

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; stopping");
            cancel.cancel();
        }
    });
}
