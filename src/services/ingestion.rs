//! Ingestion pipeline orchestrating fetch, decode, and persistence per file.
//!
//! Every requested file runs as its own task: fetch the file from the
//! repository contents API, decode its scan payload, then store the results
//! in one transaction. At most `max_concurrency` tasks run at once. A failing
//! file never cancels the others; failures are collected and reported once
//! every task has finished.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinHandle, JoinSet};

use crate::models::repository::RepositoryLocator;
use crate::services::github::{ContentFetcher, FetchError};
use crate::services::payload::{self, DecodeError};
use crate::services::store::{self, PersistError};

/// Default number of files processed at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Pipeline stage a file failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Fetch,
    Decode,
    Persist,
    /// The task itself panicked or was aborted.
    Task,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Decode => write!(f, "decode"),
            Self::Persist => write!(f, "persist"),
            Self::Task => write!(f, "task"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("error fetching file data: {0}")]
    Fetch(#[from] FetchError),

    #[error("error decoding scan results: {0}")]
    Decode(#[from] DecodeError),

    #[error("error storing scan results: {0}")]
    Persist(#[from] PersistError),
}

impl IngestError {
    pub fn stage(&self) -> IngestStage {
        match self {
            Self::Fetch(_) => IngestStage::Fetch,
            Self::Decode(_) => IngestStage::Decode,
            Self::Persist(_) => IngestStage::Persist,
        }
    }
}

/// Failure of a single file.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file: String,
    pub stage: IngestStage,
    pub message: String,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}: {} failed: {}", self.file, self.stage, self.message)
    }
}

/// Outcome of an ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub files_requested: usize,
    pub files_succeeded: usize,
    /// One entry per failed file, in completion order.
    pub failures: Vec<FileFailure>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure messages, one per failed file.
    pub fn error_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

/// Runs the per-file pipeline with bounded concurrency.
pub struct Ingestor<F> {
    pool: SqlitePool,
    fetcher: Arc<F>,
    max_concurrency: usize,
}

impl<F: ContentFetcher> Ingestor<F> {
    pub fn new(pool: SqlitePool, fetcher: Arc<F>, max_concurrency: usize) -> Self {
        Self {
            pool,
            fetcher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Run the ingestion on its own task.
    ///
    /// Dropping the returned handle detaches the run: every file still goes
    /// through fetch, decode and persist even if nobody awaits the report.
    pub fn spawn(self, repo: RepositoryLocator, files: Vec<String>) -> JoinHandle<IngestReport> {
        tokio::spawn(async move { self.run(&repo, &files).await })
    }

    /// Ingest every file of `repo`, waiting for all of them to finish.
    ///
    /// Dropping this future aborts the per-file tasks; use [`Ingestor::spawn`]
    /// when the caller may go away before the run completes.
    pub async fn run(&self, repo: &RepositoryLocator, files: &[String]) -> IngestReport {
        let started = Instant::now();
        let endpoint: Arc<str> = self.fetcher.contents_endpoint(repo).into();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        tracing::info!(
            repository = %repo,
            files = files.len(),
            max_concurrency = self.max_concurrency,
            "Starting ingestion"
        );

        // Panicked tasks come back without their output, so remember which
        // file each task was working on.
        let mut task_files: HashMap<task::Id, String> = HashMap::with_capacity(files.len());

        for file in files {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let pool = self.pool.clone();
            let endpoint = Arc::clone(&endpoint);
            let path = file.clone();

            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquiring only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                ingest_file(&*fetcher, &pool, &endpoint, &path).await
            });
            task_files.insert(handle.id(), file.clone());
        }

        let mut report = IngestReport {
            files_requested: files.len(),
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, result.map_err(|e| (e.stage(), e.to_string()))),
                Err(e) => (e.id(), Err((IngestStage::Task, e.to_string()))),
            };
            let file = task_files.remove(&id).unwrap_or_default();

            match outcome {
                Ok(()) => {
                    tracing::debug!(file = %file, "File ingested");
                    report.files_succeeded += 1;
                }
                Err((stage, message)) => {
                    tracing::warn!(
                        file = %file,
                        stage = %stage,
                        error = %message,
                        "File ingestion failed"
                    );
                    report.failures.push(FileFailure {
                        file,
                        stage,
                        message,
                    });
                }
            }
        }

        tracing::info!(
            repository = %repo,
            succeeded = report.files_succeeded,
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion finished"
        );

        report
    }
}

/// Fetch, decode, and store one file.
async fn ingest_file<F: ContentFetcher>(
    fetcher: &F,
    pool: &SqlitePool,
    endpoint: &str,
    file: &str,
) -> Result<(), IngestError> {
    let started = Instant::now();

    let remote = fetcher.fetch(endpoint, file).await?;
    let mut results = payload::decode_scan_results(&remote.content)?;
    for result in &mut results {
        result.attach_source(&remote.html_url);
    }

    store::persist_file(pool, &remote.html_url, &results, started.elapsed()).await?;
    Ok(())
}
