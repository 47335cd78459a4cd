//! Bounded-parallelism execution of [`DownloadJob`]s.
//!
//! Each job is fetched once into a staging file under the destination root,
//! verified, then hard-linked to every destination. A job that fails at any
//! step leaves an error sidecar next to each of its destinations instead.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use extdata_fetch::{Client, fetch_to};
use extdata_fs::{
    FallbackStrategy, HardlinkOrCopyOptions, PermissionMode, hardlink_or_copy,
    remove_file_if_exists, staging_file_in,
};
use futures_util::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::manager::{DownloadJob, record_error};
use crate::verify::verify;

pub const DEFAULT_PARALLELISM: usize = 4;
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Options for [`run_downloads`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Number of concurrent workers. Values below one are treated as one.
    pub parallelism: usize,
    /// Interval of silence after which a "still downloading" line is logged.
    pub keepalive:   Duration,
    /// What to do when the destination filesystem refuses hard links.
    pub fallback:    FallbackStrategy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            keepalive:   DEFAULT_KEEPALIVE,
            fallback:    FallbackStrategy::Copy,
        }
    }
}

impl DownloadOptions {
    pub fn new() -> Self { Self::default() }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Outcome counts of one [`run_downloads`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub succeeded: usize,
    pub failed:    usize,
    /// Bytes fetched by successful jobs.
    pub bytes:     u64,
}

impl DownloadReport {
    pub fn total(&self) -> usize { self.succeeded + self.failed }

    pub fn is_success(&self) -> bool { self.failed == 0 }
}

struct Outcome {
    url:     String,
    elapsed: Duration,
    result:  Result<u64, DownloadError>,
}

/// Runs `jobs` against `client` with a fixed pool of workers.
///
/// Staging files are created under `dest_root`, so it must be on the same
/// filesystem as the destinations for hard links to work. No job failure
/// aborts the batch. Dropping the returned future aborts every in-flight
/// transfer.
pub async fn run_downloads<C>(
    dest_root: &Path,
    jobs: Vec<DownloadJob>,
    client: Arc<C>,
    options: &DownloadOptions,
) -> DownloadReport
where
    C: Client + 'static,
{
    let total = jobs.len();
    let mut report = DownloadReport::default();
    if total == 0 {
        return report;
    }

    let (job_tx, job_rx) = mpsc::channel(total);
    for job in jobs {
        // Capacity equals the job count, so this never waits.
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel(total);
    let mut workers = JoinSet::new();
    for _ in 0..options.parallelism.clamp(1, total) {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let client = Arc::clone(&client);
        let dest_root = dest_root.to_path_buf();
        let options = options.clone();
        workers.spawn(async move {
            loop {
                let Some(job) = job_rx.lock().await.recv().await else {
                    break;
                };
                let outcome = run_job(&dest_root, job, client.as_ref(), &options).await;
                if result_tx.send(outcome).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    while report.total() < total {
        let outcome = match timeout(options.keepalive, result_rx.recv()).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => break,
            Err(_) => {
                info!(done = report.total(), total, "still downloading external data");
                continue;
            }
        };
        match outcome.result {
            Ok(bytes) => {
                report.succeeded += 1;
                report.bytes += bytes;
                info!(
                    url = %outcome.url,
                    bytes,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "downloaded"
                );
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    url = %outcome.url,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    error = %e,
                    "download failed"
                );
            }
        }
    }

    // Only reachable if every worker exited early.
    report.failed += total - report.total();
    while workers.join_next().await.is_some() {}

    info!(
        "{} of {} downloads succeeded",
        report.succeeded,
        report.total()
    );
    report
}

async fn run_job<C: Client>(
    dest_root: &Path,
    job: DownloadJob,
    client: &C,
    options: &DownloadOptions,
) -> Outcome {
    let url = job.link.computed_url().to_string();
    let start = Instant::now();
    let mut linked = Vec::new();

    let caught = AssertUnwindSafe(fetch_and_link(dest_root, &job, client, options, &mut linked))
        .catch_unwind()
        .await;
    let result = match caught {
        Ok(result) => result,
        Err(payload) => {
            // The panic may have hit between two links.
            linked.clone_from(&job.dests);
            Err(DownloadError::Panicked(panic_message(payload.as_ref())))
        }
    };
    if let Err(e) = &result {
        for dest in &linked {
            if let Err(e) = remove_file_if_exists(dest) {
                warn!(dest = %dest.display(), error = %e, "failed to remove partial destination");
            }
        }
        let msg = format!("failed to download {url}: {e}");
        for dest in &job.dests {
            record_error(dest, &msg);
        }
    }

    Outcome {
        url,
        elapsed: start.elapsed(),
        result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

async fn fetch_and_link<C: Client>(
    dest_root: &Path,
    job: &DownloadJob,
    client: &C,
    options: &DownloadOptions,
    linked: &mut Vec<PathBuf>,
) -> Result<u64, DownloadError> {
    let staging = staging_file_in(dest_root)?;
    let mut file = tokio::fs::File::from_std(staging.as_file().try_clone()?);
    let bytes = fetch_to(client, job.link.computed_url(), &mut file).await?;
    file.sync_all().await?;
    drop(file);
    debug!(url = job.link.computed_url(), bytes, staging = %staging.path().display(), "fetched");

    let staged_path = staging.path().to_path_buf();
    let link = job.link.clone();
    tokio::task::spawn_blocking(move || verify(&staged_path, &link)).await??;

    PermissionMode::for_data(job.link.executable()).apply_to_path(staging.path())?;

    let link_options = HardlinkOrCopyOptions::new().fallback(options.fallback);
    for dest in &job.dests {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        hardlink_or_copy(staging.path(), dest, link_options)?;
        linked.push(dest.clone());
    }
    Ok(bytes)
}
