//! Error types for the edgequake-img2pdf library.
//!
//! Three layers reflect three distinct failure scopes:
//!
//! * [`LayoutError`]: pure geometry failed (zero-sized image, sheet whose
//!   margins leave no room). Never touches the file system.
//!
//! * [`BuildError`]: **One stream failed**: the document builder or the
//!   archive builder stopped at the first bad image, or could not write its
//!   output. Per-image variants render as `failed to add <name>: <reason>` so
//!   the message a user sees is the deepest failure reason.
//!
//! * [`ConversionError`]: **Job-level**: returned from the top-level
//!   `convert*` functions. When one or both streams fail, the full
//!   [`ConversionOutcome`] is carried along so callers can see a mixed result
//!   (archive written, document failed) instead of a single error that hides
//!   the other stream's success.

use crate::output::{ConversionOutcome, StreamKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Base file name of `path`, used in user-facing messages.
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A failure inside one output stream (document or archive).
#[derive(Debug, Error)]
pub enum BuildError {
    /// No images were supplied.
    #[error("no images to convert")]
    EmptyInput,

    /// The extension is not one of .jpg, .jpeg, .png.
    #[error("failed to add {}: unsupported image format (expected .jpg, .jpeg or .png)", file_label(.path))]
    UnsupportedFormat { path: PathBuf },

    /// The image header is unreadable, corrupt, or reports a zero dimension.
    #[error("failed to add {}: {detail}", file_label(.path))]
    Measurement { path: PathBuf, detail: String },

    /// A source file could not be opened or read.
    #[error("failed to add {}: {source}", file_label(.path))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The destination could not be created, written or finalised.
    #[error("failed to write '{}': {detail}", .path.display())]
    Write { path: PathBuf, detail: String },

    /// The builder task died before reporting a result (it panicked).
    #[error("builder stopped unexpectedly: {0}")]
    Internal(String),
}

impl BuildError {
    /// The image (or output) path this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            BuildError::EmptyInput | BuildError::Internal(_) => None,
            BuildError::UnsupportedFormat { path }
            | BuildError::Measurement { path, .. }
            | BuildError::Read { path, .. }
            | BuildError::Write { path, .. } => Some(path),
        }
    }
}

/// Page geometry could not be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("image has zero size ({width}x{height} px)")]
    ZeroDimension { width: u32, height: u32 },

    #[error("sheet {width_mm}x{height_mm} mm with {margin_mm} mm margins leaves no printable area")]
    InvalidSheet {
        width_mm: f64,
        height_mm: f64,
        margin_mm: f64,
    },

    #[error("DPI must be positive and finite, got {0}")]
    InvalidDpi(f64),
}

/// Fatal or aggregate error returned by the `convert*` entry points.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The job had no images; nothing was created or truncated.
    #[error("no images to convert")]
    EmptyInput,

    /// Job or config validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// At least one stream failed. The outcome keeps both stream results.
    #[error("{}", describe_failures(.0))]
    StreamsFailed(Box<ConversionOutcome>),

    /// The runtime for the blocking wrapper could not be created.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    /// The document stream's failure, if the document failed.
    pub fn document_error(&self) -> Option<&BuildError> {
        match self {
            ConversionError::StreamsFailed(outcome) => outcome.document.as_ref().err(),
            _ => None,
        }
    }

    /// The archive stream's failure, if an archive was requested and failed.
    pub fn archive_error(&self) -> Option<&BuildError> {
        match self {
            ConversionError::StreamsFailed(outcome) => {
                outcome.archive.as_ref().and_then(|r| r.as_ref().err())
            }
            _ => None,
        }
    }

    /// The full per-stream outcome behind a stream failure.
    pub fn outcome(&self) -> Option<&ConversionOutcome> {
        match self {
            ConversionError::StreamsFailed(outcome) => Some(outcome),
            _ => None,
        }
    }
}

fn describe_failures(outcome: &ConversionOutcome) -> String {
    let mut parts = Vec::new();
    if let Err(e) = &outcome.document {
        parts.push(format!("{} failed: {e}", StreamKind::Document));
    }
    match &outcome.archive {
        Some(Err(e)) => parts.push(format!("{} failed: {e}", StreamKind::Archive)),
        Some(Ok(summary)) if outcome.document.is_err() => parts.push(format!(
            "{} written to '{}'",
            StreamKind::Archive,
            summary.path.display()
        )),
        _ => {}
    }
    if let (Ok(summary), Some(Err(_))) = (&outcome.document, &outcome.archive) {
        parts.push(format!(
            "{} written to '{}'",
            StreamKind::Document,
            summary.path.display()
        ));
    }
    parts.join("; ")
}
