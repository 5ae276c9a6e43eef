//! Dual-stream conversion entry points.
//!
//! ## Why two blocking tasks and a channel?
//!
//! Writing the document and copying the archive are independent, I/O-bound
//! loops over the same snapshot. Each runs on its own `spawn_blocking`
//! thread so they overlap for real, and neither waits on the other. Progress
//! flows back as [`ProgressEvent`]s over an unbounded channel; the coordinator
//! task is the only owner of the counters, so no lock is needed and the
//! callback is never called from two threads at once.
//!
//! ## Why return both results?
//!
//! The document is the primary artifact, but a failed document must not hide
//! an archive that was written successfully (or vice versa), and two failures
//! must not overwrite each other. [`convert_outcome`] keeps each stream's
//! `Result`; [`convert`] folds them into a summary or a
//! [`ConversionError::StreamsFailed`] that still carries both.

use crate::config::{ConversionConfig, ConversionJob};
use crate::error::{BuildError, ConversionError};
use crate::output::{ConversionOutcome, ConversionSummary, StreamKind, StreamSummary};
use crate::pipeline::{archive, document};
use crate::progress::{ProgressCallback, ProgressEvent, ProgressState};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Convert the job's images into a document (and optional archive).
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionSummary)` when every requested stream succeeded.
///
/// # Errors
/// - [`ConversionError::EmptyInput`] if the job has no images; nothing is
///   created or truncated
/// - [`ConversionError::StreamsFailed`] if either stream failed (a builder
///   that panicked counts as a failed stream); the error carries both
///   stream results
pub async fn convert(
    job: &ConversionJob,
    config: &ConversionConfig,
) -> Result<ConversionSummary, ConversionError> {
    convert_outcome(job, config).await?.into_result()
}

/// Run both streams and report each one's terminal state.
///
/// Unlike [`convert`], a stream failure is not an `Err`: inspect
/// [`ConversionOutcome::is_success`] and the per-stream results.
pub async fn convert_outcome(
    job: &ConversionJob,
    config: &ConversionConfig,
) -> Result<ConversionOutcome, ConversionError> {
    let total = job.total();
    if total == 0 {
        return Err(ConversionError::EmptyInput);
    }

    let start = Instant::now();
    let archive_enabled = job.archive_path().is_some();
    let callback = config.progress_callback.clone();
    info!(
        "Starting conversion: {} images → {}{}",
        total,
        job.document_path().display(),
        job.archive_path()
            .map(|p| format!(" + {}", p.display()))
            .unwrap_or_default()
    );
    if let Some(ref cb) = callback {
        cb.on_conversion_start(total, archive_enabled);
    }

    // ── Spawn builders ───────────────────────────────────────────────────
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

    let document_task = {
        let images = job.images_arc();
        let output = job.document_path().to_path_buf();
        let mode = job.page_size();
        let config = config.clone();
        let tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            document::build_document(&images, &output, mode, &config, |done| {
                // The receiver outlives every sender.
                let _ = tx.send(ProgressEvent {
                    stream: StreamKind::Document,
                    done,
                });
            })
        })
    };

    let archive_task: Option<StreamTask> =
        job.archive_path().map(|path| {
            let images = job.images_arc();
            let output = path.to_path_buf();
            let config = config.clone();
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || {
                archive::build_archive(&images, &output, &config, |done| {
                    let _ = tx.send(ProgressEvent {
                        stream: StreamKind::Archive,
                        done,
                    });
                })
            })
        });

    // Only the builders hold senders now; the loop below ends when both finish.
    drop(tx);

    // ── Aggregate progress ───────────────────────────────────────────────
    let mut state = ProgressState::new(total, archive_enabled);
    while let Some(event) = rx.recv().await {
        let snapshot = state.record(event);
        if let Some(ref cb) = callback {
            cb.on_progress(&snapshot);
        }
    }

    // ── Join ─────────────────────────────────────────────────────────────
    let (document, archive) = join_streams(document_task, archive_task).await;

    report(callback.as_ref(), StreamKind::Document, &document);
    if let Some(ref result) = archive {
        report(callback.as_ref(), StreamKind::Archive, result);
    }

    let outcome = ConversionOutcome {
        document,
        archive,
        total_images: total,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    let snapshot = state.snapshot();
    if let Some(ref cb) = callback {
        cb.on_conversion_complete(&snapshot, outcome.is_success());
    }

    if outcome.is_success() {
        info!(
            "Conversion complete: {} images in {}ms",
            total, outcome.duration_ms
        );
    } else {
        warn!(
            "Conversion finished with {} failed stream(s) in {}ms",
            outcome.failed_streams(),
            outcome.duration_ms
        );
    }
    Ok(outcome)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn convert_sync(
    job: &ConversionJob,
    config: &ConversionConfig,
) -> Result<ConversionSummary, ConversionError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConversionError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(job, config))
}

type StreamTask = JoinHandle<Result<StreamSummary, BuildError>>;

/// Wait for both builders. A builder that panicked fails its own stream
/// only; the other stream's result is kept.
async fn join_streams(
    document: StreamTask,
    archive: Option<StreamTask>,
) -> (
    Result<StreamSummary, BuildError>,
    Option<Result<StreamSummary, BuildError>>,
) {
    let document = join_stream(StreamKind::Document, document).await;
    let archive = match archive {
        Some(task) => Some(join_stream(StreamKind::Archive, task).await),
        None => None,
    };
    (document, archive)
}

async fn join_stream(stream: StreamKind, task: StreamTask) -> Result<StreamSummary, BuildError> {
    task.await
        .unwrap_or_else(|e| Err(BuildError::Internal(format!("{stream} task panicked: {e}"))))
}

fn report(
    callback: Option<&ProgressCallback>,
    stream: StreamKind,
    result: &Result<StreamSummary, BuildError>,
) {
    match result {
        Ok(summary) => {
            info!(
                "{stream} stream done: {} items → {}",
                summary.items,
                summary.path.display()
            );
            if let Some(cb) = callback {
                cb.on_stream_complete(stream, summary.items);
            }
        }
        Err(e) => {
            warn!("{stream} stream failed: {e}");
            if let Some(cb) = callback {
                cb.on_stream_error(stream, &e.to_string());
            }
        }
    }
}
