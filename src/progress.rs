//! Progress reporting for the dual-stream conversion.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! ticks as pages and archive entries complete.
//!
//! # Where the counters live
//!
//! The document and archive builders run on separate blocking threads. They
//! never touch shared counters: each one sends `(stream, done)` events over a
//! channel, and a single aggregator task owns the [`ProgressState`], folds the
//! events in and invokes the callback. Callbacks are therefore never invoked
//! concurrently, and the fractions they see are non-decreasing.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2pdf::{ConversionConfig, ConversionProgressCallback, ProgressSnapshot};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ConversionProgressCallback for Printer {
//!     fn on_progress(&self, p: &ProgressSnapshot) {
//!         eprintln!("{:>5.1}%  pdf {}/{}  zip {}/{}",
//!             p.fraction() * 100.0, p.document_done, p.total, p.archive_done, p.total);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::StreamKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Called by the coordinator as the two streams advance.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls come from the aggregator task, one at a time,
/// but that task may live on any runtime thread, hence `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before either builder starts.
    ///
    /// # Arguments
    /// * `total_images`   : images in the job snapshot
    /// * `archive_enabled`: whether an archive stream runs alongside the document
    fn on_conversion_start(&self, total_images: usize, archive_enabled: bool) {
        let _ = (total_images, archive_enabled);
    }

    /// Called after every committed page or archive entry.
    ///
    /// Ticks from the two streams interleave arbitrarily; do not assume they
    /// alternate. Expect high-frequency calls.
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = snapshot;
    }

    /// Called when a stream finished and its file is in place.
    fn on_stream_complete(&self, stream: StreamKind, items: usize) {
        let _ = (stream, items);
    }

    /// Called when a stream stopped on an error.
    fn on_stream_error(&self, stream: StreamKind, error: &str) {
        let _ = (stream, error);
    }

    /// Called once after both streams reached a terminal state.
    fn on_conversion_complete(&self, snapshot: &ProgressSnapshot, success: bool) {
        let _ = (snapshot, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Immutable view of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub document_done: usize,
    pub archive_done: usize,
    /// Images in the job; fixed for the job's lifetime.
    pub total: usize,
    pub archive_enabled: bool,
}

impl ProgressSnapshot {
    /// Combined completion in `[0, 1]`.
    ///
    /// `(document_done + archive_done) / (2 × total)` with an archive,
    /// `document_done / total` without one.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let (done, denom) = if self.archive_enabled {
            (self.document_done + self.archive_done, 2 * self.total)
        } else {
            (self.document_done, self.total)
        };
        (done as f64 / denom as f64).clamp(0.0, 1.0)
    }

    /// Both requested streams have processed every image.
    pub fn is_complete(&self) -> bool {
        self.document_done == self.total && (!self.archive_enabled || self.archive_done == self.total)
    }
}

/// One completion tick from a builder: `done` items of `stream` are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stream: StreamKind,
    pub done: usize,
}

/// Mutable counters owned by the aggregator.
#[derive(Debug, Clone)]
pub struct ProgressState {
    document_done: usize,
    archive_done: usize,
    total: usize,
    archive_enabled: bool,
}

impl ProgressState {
    pub fn new(total: usize, archive_enabled: bool) -> Self {
        Self {
            document_done: 0,
            archive_done: 0,
            total,
            archive_enabled,
        }
    }

    /// Fold one event in. Counters only ever move forward and never pass `total`.
    pub fn record(&mut self, event: ProgressEvent) -> ProgressSnapshot {
        let done = event.done.min(self.total);
        match event.stream {
            StreamKind::Document => self.document_done = self.document_done.max(done),
            StreamKind::Archive => self.archive_done = self.archive_done.max(done),
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            document_done: self.document_done,
            archive_done: self.archive_done,
            total: self.total,
            archive_enabled: self.archive_enabled,
        }
    }
}
