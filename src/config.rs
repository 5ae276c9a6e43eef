//! Configuration types for image-to-PDF conversion.
//!
//! Two values drive a run:
//!
//! * [`ConversionJob`]: *what* to convert: an immutable snapshot of the
//!   ordered image list, the page-size policy, and where the document and
//!   (optionally) the archive go. Built via [`ConversionJob::builder`].
//! * [`ConversionConfig`]: *how* to write it: compression knobs, PDF
//!   metadata and the progress callback. Built via [`ConversionConfig::builder`].
//!
//! Keeping the page-size policy on the job (not per image) means it is
//! dispatched once per run and cannot change while a job is in flight.

use crate::error::{ConversionError, LayoutError};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A4 portrait width in millimetres.
pub const A4_WIDTH_MM: f64 = 210.0;
/// A4 portrait height in millimetres.
pub const A4_HEIGHT_MM: f64 = 297.0;
/// Margin around the image on a fixed sheet, in millimetres.
pub const DEFAULT_MARGIN_MM: f64 = 10.0;
/// Pixels per inch assumed when turning pixel sizes into physical sizes.
pub const DEFAULT_DPI: f64 = 96.0;

// ── Page sizing ──────────────────────────────────────────────────────────

/// A fixed physical page with a uniform margin, all in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
}

impl Sheet {
    /// A4 portrait, 10 mm margins.
    pub const A4: Sheet = Sheet {
        width_mm: A4_WIDTH_MM,
        height_mm: A4_HEIGHT_MM,
        margin_mm: DEFAULT_MARGIN_MM,
    };

    /// US Letter portrait, 10 mm margins.
    pub const LETTER: Sheet = Sheet {
        width_mm: 215.9,
        height_mm: 279.4,
        margin_mm: DEFAULT_MARGIN_MM,
    };

    /// Same sheet with a different margin.
    pub fn with_margin(self, margin_mm: f64) -> Self {
        Self { margin_mm, ..self }
    }

    /// Width of the area inside the margins.
    pub fn available_width(&self) -> f64 {
        self.width_mm - 2.0 * self.margin_mm
    }

    /// Height of the area inside the margins.
    pub fn available_height(&self) -> f64 {
        self.height_mm - 2.0 * self.margin_mm
    }

    /// Reject sheets whose margins swallow the whole page.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let finite = self.width_mm.is_finite()
            && self.height_mm.is_finite()
            && self.margin_mm.is_finite();
        if !finite
            || self.margin_mm < 0.0
            || self.available_width() <= 0.0
            || self.available_height() <= 0.0
        {
            return Err(LayoutError::InvalidSheet {
                width_mm: self.width_mm,
                height_mm: self.height_mm,
                margin_mm: self.margin_mm,
            });
        }
        Ok(())
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::A4
    }
}

/// How each page is sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageSizeMode {
    /// Every page is the same sheet; the image is scaled to fit inside the
    /// margins and centred.
    FixedSheet(Sheet),
    /// Each page is exactly the image's size at `dpi`, with no margin.
    FitToImage { dpi: f64 },
}

impl Default for PageSizeMode {
    fn default() -> Self {
        PageSizeMode::FitToImage { dpi: DEFAULT_DPI }
    }
}

impl PageSizeMode {
    /// A4 portrait with the default margin.
    pub fn a4() -> Self {
        PageSizeMode::FixedSheet(Sheet::A4)
    }

    /// Fit-to-image at the default 96 DPI.
    pub fn fit_to_image() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        match self {
            PageSizeMode::FixedSheet(sheet) => sheet.validate(),
            PageSizeMode::FitToImage { dpi } => {
                if dpi.is_finite() && *dpi > 0.0 {
                    Ok(())
                } else {
                    Err(LayoutError::InvalidDpi(*dpi))
                }
            }
        }
    }
}

// ── Ordering ─────────────────────────────────────────────────────────────

/// Ordering applied to discovered image files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortPolicy {
    /// Numeric-aware filename order: `img2.png` before `img10.png`. (default)
    #[default]
    Natural,
    /// Most recently modified first.
    ModifiedDesc,
}

// ── Archive ──────────────────────────────────────────────────────────────

/// Compression used for archive entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArchiveCompression {
    /// Deflate every entry. (default)
    #[default]
    Deflated,
    /// Store entries as-is. JPEG and PNG barely shrink under deflate.
    Stored,
}

// ── Config ───────────────────────────────────────────────────────────────

/// Writer settings shared by every job.
///
/// # Example
/// ```rust
/// use edgequake_img2pdf::{ArchiveCompression, ConversionConfig};
///
/// let config = ConversionConfig::builder()
///     .archive_compression(ArchiveCompression::Stored)
///     .title("Holiday scans")
///     .build()
///     .unwrap();
/// assert_eq!(config.title.as_deref(), Some("Holiday scans"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Compression for archive entries. Default: [`ArchiveCompression::Deflated`].
    pub archive_compression: ArchiveCompression,

    /// Deflate level 0–9 for archive entries. `None` uses the zip default.
    pub compression_level: Option<i64>,

    /// Deflate page content streams and decoded-PNG pixel streams. Default: true.
    ///
    /// JPEG and pass-through PNG payloads are never recompressed either way.
    pub compress_document: bool,

    /// Title written to the PDF `/Info` dictionary.
    pub title: Option<String>,

    /// Receives progress ticks from both streams.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            archive_compression: ArchiveCompression::default(),
            compression_level: None,
            compress_document: true,
            title: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("archive_compression", &self.archive_compression)
            .field("compression_level", &self.compression_level)
            .field("compress_document", &self.compress_document)
            .field("title", &self.title)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn archive_compression(mut self, c: ArchiveCompression) -> Self {
        self.config.archive_compression = c;
        self
    }

    pub fn compression_level(mut self, level: i64) -> Self {
        self.config.compression_level = Some(level.clamp(0, 9));
        self
    }

    pub fn compress_document(mut self, v: bool) -> Self {
        self.config.compress_document = v;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConversionError> {
        let c = &self.config;
        if let Some(level) = c.compression_level {
            if !(0..=9).contains(&level) {
                return Err(ConversionError::InvalidConfig(format!(
                    "Compression level must be 0–9, got {level}"
                )));
            }
            if c.archive_compression == ArchiveCompression::Stored {
                return Err(ConversionError::InvalidConfig(
                    "Compression level has no effect on stored entries".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Job ──────────────────────────────────────────────────────────────────

/// One conversion request.
///
/// The image list is copied into an `Arc<[PathBuf]>` when the job is built,
/// so later edits to the caller's list cannot reach an in-flight job.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    images: Arc<[PathBuf]>,
    page_size: PageSizeMode,
    document_path: PathBuf,
    archive_path: Option<PathBuf>,
}

impl ConversionJob {
    /// Start a job for `images`, writing the document to `document_path`.
    pub fn builder<I, P>(images: I, document_path: impl Into<PathBuf>) -> ConversionJobBuilder
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ConversionJobBuilder {
            images: images.into_iter().map(Into::into).collect(),
            page_size: PageSizeMode::default(),
            document_path: document_path.into(),
            archive_path: None,
        }
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    /// Shared handle to the snapshot; cloning it does not copy the paths.
    pub fn images_arc(&self) -> Arc<[PathBuf]> {
        Arc::clone(&self.images)
    }

    pub fn total(&self) -> usize {
        self.images.len()
    }

    pub fn page_size(&self) -> PageSizeMode {
        self.page_size
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }
}

/// Builder for [`ConversionJob`].
#[derive(Debug)]
pub struct ConversionJobBuilder {
    images: Vec<PathBuf>,
    page_size: PageSizeMode,
    document_path: PathBuf,
    archive_path: Option<PathBuf>,
}

impl ConversionJobBuilder {
    pub fn page_size(mut self, mode: PageSizeMode) -> Self {
        self.page_size = mode;
        self
    }

    /// Also write a ZIP of the source files to `path`.
    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    /// Also write a ZIP next to the document (see [`archive_path_for`]).
    pub fn with_sibling_archive(mut self) -> Self {
        self.archive_path = Some(archive_path_for(&self.document_path));
        self
    }

    /// Build the job, validating the page-size policy and output paths.
    ///
    /// An empty image list is accepted here; `convert` rejects it before
    /// touching the file system.
    pub fn build(self) -> Result<ConversionJob, ConversionError> {
        self.page_size
            .validate()
            .map_err(|e| ConversionError::InvalidConfig(e.to_string()))?;

        if self.document_path.as_os_str().is_empty() {
            return Err(ConversionError::InvalidConfig(
                "Document output path is empty".into(),
            ));
        }
        if self.archive_path.as_deref() == Some(self.document_path.as_path()) {
            return Err(ConversionError::InvalidConfig(format!(
                "Document and archive would both be written to '{}'",
                self.document_path.display()
            )));
        }

        Ok(ConversionJob {
            images: self.images.into(),
            page_size: self.page_size,
            document_path: self.document_path,
            archive_path: self.archive_path,
        })
    }
}

// ── Output naming ────────────────────────────────────────────────────────

/// Archive path derived from a document path: `out.pdf` → `out.zip`.
///
/// A `.pdf` suffix (any case) is replaced; any other name gets `.zip` appended.
pub fn archive_path_for(document: &Path) -> PathBuf {
    let is_pdf = document
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        document.with_extension("zip")
    } else {
        let mut name = document.as_os_str().to_os_string();
        name.push(".zip");
        PathBuf::from(name)
    }
}

/// Default document file name for a set that starts with `first_image`:
/// the image's stem with a `.pdf` extension.
pub fn default_document_name(first_image: &Path) -> PathBuf {
    let stem = first_image
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "images".into());
    let mut name = PathBuf::from(stem);
    name.set_extension("pdf");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_fit_at_96_dpi() {
        assert_eq!(PageSizeMode::default(), PageSizeMode::FitToImage { dpi: 96.0 });
    }

    #[test]
    fn a4_available_area() {
        let s = Sheet::A4;
        assert_eq!(s.available_width(), 190.0);
        assert_eq!(s.available_height(), 277.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn oversized_margin_rejected() {
        let s = Sheet::A4.with_margin(105.0);
        assert!(matches!(s.validate(), Err(LayoutError::InvalidSheet { .. })));
    }

    #[test]
    fn zero_dpi_rejected() {
        let mode = PageSizeMode::FitToImage { dpi: 0.0 };
        assert_eq!(mode.validate(), Err(LayoutError::InvalidDpi(0.0)));
    }

    #[test]
    fn config_builder_defaults() {
        let c = ConversionConfig::builder().build().unwrap();
        assert_eq!(c.archive_compression, ArchiveCompression::Deflated);
        assert!(c.compress_document);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn compression_level_clamped() {
        let c = ConversionConfig::builder().compression_level(42).build().unwrap();
        assert_eq!(c.compression_level, Some(9));
    }

    #[test]
    fn stored_with_level_is_invalid() {
        let r = ConversionConfig::builder()
            .archive_compression(ArchiveCompression::Stored)
            .compression_level(5)
            .build();
        assert!(matches!(r, Err(ConversionError::InvalidConfig(_))));
    }

    #[test]
    fn job_snapshot_is_independent_of_source_list() {
        let mut live = vec![PathBuf::from("/a/1.png"), PathBuf::from("/a/2.png")];
        let job = ConversionJob::builder(live.clone(), "/out/doc.pdf")
            .build()
            .unwrap();
        live.push(PathBuf::from("/a/3.png"));
        live.remove(0);
        assert_eq!(job.total(), 2);
        assert_eq!(job.images()[0], PathBuf::from("/a/1.png"));
    }

    #[test]
    fn job_rejects_same_output_twice() {
        let r = ConversionJob::builder(["/a/1.png"], "/out/doc.pdf")
            .archive_path("/out/doc.pdf")
            .build();
        assert!(matches!(r, Err(ConversionError::InvalidConfig(_))));
    }

    #[test]
    fn job_rejects_invalid_sheet() {
        let r = ConversionJob::builder(["/a/1.png"], "/out/doc.pdf")
            .page_size(PageSizeMode::FixedSheet(Sheet::A4.with_margin(200.0)))
            .build();
        assert!(matches!(r, Err(ConversionError::InvalidConfig(_))));
    }

    #[test]
    fn sibling_archive_path() {
        let job = ConversionJob::builder(["/a/1.png"], "/out/doc.pdf")
            .with_sibling_archive()
            .build()
            .unwrap();
        assert_eq!(job.archive_path(), Some(Path::new("/out/doc.zip")));
    }

    #[test]
    fn archive_path_swaps_pdf_suffix() {
        assert_eq!(archive_path_for(Path::new("/o/book.pdf")), PathBuf::from("/o/book.zip"));
        assert_eq!(archive_path_for(Path::new("/o/book.PDF")), PathBuf::from("/o/book.zip"));
        assert_eq!(archive_path_for(Path::new("/o/book")), PathBuf::from("/o/book.zip"));
        assert_eq!(
            archive_path_for(Path::new("/o/book.v2")),
            PathBuf::from("/o/book.v2.zip")
        );
    }

    #[test]
    fn default_name_from_first_image() {
        assert_eq!(
            default_document_name(Path::new("/scans/page01.JPG")),
            PathBuf::from("page01.pdf")
        );
    }
}
