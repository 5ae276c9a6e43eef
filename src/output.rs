//! Result types returned by the conversion entry points.

use crate::error::{BuildError, ConversionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which output stream an event or result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// The paginated PDF (the primary artifact).
    Document,
    /// The companion ZIP of the source files.
    Archive,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Document => f.pad("document"),
            StreamKind::Archive => f.pad("archive"),
        }
    }
}

/// What one stream produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub kind: StreamKind,
    /// Final location of the written file.
    pub path: PathBuf,
    /// Pages (document) or entries (archive) written.
    pub items: usize,
    /// Size of the finished file on disk.
    pub bytes_written: u64,
    /// Wall-clock time spent in this stream.
    pub duration_ms: u64,
}

/// Summary of a fully successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSummary {
    pub document: StreamSummary,
    /// `None` when no archive was requested.
    pub archive: Option<StreamSummary>,
    pub total_images: usize,
    pub total_duration_ms: u64,
}

/// Terminal state of both streams, successful or not.
///
/// Each stream keeps its own `Result`, so a failed document never hides an
/// archive that was written, and two failures never overwrite each other.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub document: Result<StreamSummary, BuildError>,
    /// `None` when no archive was requested.
    pub archive: Option<Result<StreamSummary, BuildError>>,
    pub total_images: usize,
    pub duration_ms: u64,
}

impl ConversionOutcome {
    /// Every requested stream succeeded.
    pub fn is_success(&self) -> bool {
        self.document.is_ok() && !matches!(self.archive, Some(Err(_)))
    }

    /// Exactly one of two requested streams succeeded.
    pub fn is_mixed(&self) -> bool {
        match &self.archive {
            Some(archive) => self.document.is_ok() != archive.is_ok(),
            None => false,
        }
    }

    /// Number of streams that failed (0, 1 or 2).
    pub fn failed_streams(&self) -> usize {
        usize::from(self.document.is_err()) + usize::from(matches!(self.archive, Some(Err(_))))
    }

    /// Collapse into a summary, or an aggregate error holding this outcome.
    pub fn into_result(self) -> Result<ConversionSummary, ConversionError> {
        let ConversionOutcome {
            document,
            archive,
            total_images,
            duration_ms,
        } = self;
        match (document, archive.transpose()) {
            (Ok(document), Ok(archive)) => Ok(ConversionSummary {
                document,
                archive,
                total_images,
                total_duration_ms: duration_ms,
            }),
            (document, archive) => Err(ConversionError::StreamsFailed(Box::new(
                ConversionOutcome {
                    document,
                    archive: archive.transpose(),
                    total_images,
                    duration_ms,
                },
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(kind: StreamKind) -> Result<StreamSummary, BuildError> {
        Ok(StreamSummary {
            kind,
            path: PathBuf::from(format!("/out/x.{kind}")),
            items: 2,
            bytes_written: 10,
            duration_ms: 1,
        })
    }

    fn failed() -> Result<StreamSummary, BuildError> {
        Err(BuildError::Measurement {
            path: PathBuf::from("/in/bad.png"),
            detail: "corrupt".into(),
        })
    }

    fn outcome(
        document: Result<StreamSummary, BuildError>,
        archive: Option<Result<StreamSummary, BuildError>>,
    ) -> ConversionOutcome {
        ConversionOutcome {
            document,
            archive,
            total_images: 2,
            duration_ms: 3,
        }
    }

    #[test]
    fn document_only_success() {
        let o = outcome(ok(StreamKind::Document), None);
        assert!(o.is_success());
        assert!(!o.is_mixed());
        let summary = o.into_result().expect("success");
        assert!(summary.archive.is_none());
        assert_eq!(summary.total_images, 2);
    }

    #[test]
    fn both_streams_success() {
        let summary = outcome(ok(StreamKind::Document), Some(ok(StreamKind::Archive)))
            .into_result()
            .expect("success");
        assert_eq!(summary.archive.map(|a| a.kind), Some(StreamKind::Archive));
    }

    #[test]
    fn document_failure_with_archive_is_mixed() {
        let o = outcome(failed(), Some(ok(StreamKind::Archive)));
        assert!(o.is_mixed());
        assert_eq!(o.failed_streams(), 1);
        let err = o.into_result().unwrap_err();
        let inner = err.outcome().expect("aggregate");
        assert!(inner.archive.as_ref().is_some_and(|a| a.is_ok()));
    }

    #[test]
    fn double_failure_counts_two() {
        let o = outcome(failed(), Some(failed()));
        assert!(!o.is_mixed());
        assert_eq!(o.failed_streams(), 2);
    }

    #[test]
    fn stream_kind_serialises_lowercase() {
        let json = serde_json::to_string(&StreamKind::Archive).unwrap();
        assert_eq!(json, "\"archive\"");
    }
}
