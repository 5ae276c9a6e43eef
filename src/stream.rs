//! Streaming conversion API: progress as a `Stream`.
//!
//! ## Why stream?
//!
//! A callback suits a UI that repaints from any thread; an async caller often
//! prefers to `select!` over progress alongside other work. [`convert_stream`]
//! starts the job on the runtime and hands back a [`ProgressStream`] of
//! snapshots plus the `JoinHandle` of the job itself. The stream ends when the
//! job reaches its terminal state; await the handle for the result.

use crate::config::{ConversionConfig, ConversionJob};
use crate::convert::convert;
use crate::error::ConversionError;
use crate::output::{ConversionSummary, StreamKind};
use crate::progress::{ConversionProgressCallback, ProgressCallback, ProgressSnapshot};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of progress snapshots.
pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressSnapshot> + Send>>;

/// Handle to the running job.
pub type ConversionHandle = JoinHandle<Result<ConversionSummary, ConversionError>>;

/// Start a conversion and observe its progress as a stream.
///
/// A callback already set on `config` still receives every event.
///
/// # Errors
/// [`ConversionError::EmptyInput`] before anything is spawned if the job has
/// no images.
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2pdf::{convert_stream, ConversionConfig, ConversionJob};
/// use tokio_stream::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let job = ConversionJob::builder(["scan1.jpg", "scan2.jpg"], "scans.pdf")
///     .with_sibling_archive()
///     .build()?;
/// let (mut progress, handle) = convert_stream(job, &ConversionConfig::default()).await?;
/// while let Some(p) = progress.next().await {
///     println!("{:.0}%", p.fraction() * 100.0);
/// }
/// let summary = handle.await??;
/// println!("{} pages", summary.document.items);
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    job: ConversionJob,
    config: &ConversionConfig,
) -> Result<(ProgressStream, ConversionHandle), ConversionError> {
    if job.total() == 0 {
        return Err(ConversionError::EmptyInput);
    }
    info!("Starting streaming conversion: {} images", job.total());

    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder: ProgressCallback = Arc::new(Forwarder {
        tx,
        inner: config.progress_callback.clone(),
    });
    let mut config = config.clone();
    config.progress_callback = Some(forwarder);

    // The forwarder (and its sender) lives in `config`; dropping it at the end
    // of the task closes the stream.
    let handle = tokio::spawn(async move { convert(&job, &config).await });

    Ok((Box::pin(UnboundedReceiverStream::new(rx)), handle))
}

/// Sends snapshots down the channel and relays everything to the caller's callback.
struct Forwarder {
    tx: mpsc::UnboundedSender<ProgressSnapshot>,
    inner: Option<ProgressCallback>,
}

impl ConversionProgressCallback for Forwarder {
    fn on_conversion_start(&self, total_images: usize, archive_enabled: bool) {
        if let Some(ref cb) = self.inner {
            cb.on_conversion_start(total_images, archive_enabled);
        }
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        // A dropped stream only means the caller stopped listening.
        let _ = self.tx.send(*snapshot);
        if let Some(ref cb) = self.inner {
            cb.on_progress(snapshot);
        }
    }

    fn on_stream_complete(&self, stream: StreamKind, items: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_stream_complete(stream, items);
        }
    }

    fn on_stream_error(&self, stream: StreamKind, error: &str) {
        if let Some(ref cb) = self.inner {
            cb.on_stream_error(stream, error);
        }
    }

    fn on_conversion_complete(&self, snapshot: &ProgressSnapshot, success: bool) {
        if let Some(ref cb) = self.inner {
            cb.on_conversion_complete(snapshot, success);
        }
    }
}
