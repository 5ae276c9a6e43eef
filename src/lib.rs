//! # edgequake-img2pdf
//!
//! Turn an ordered set of JPEG/PNG images into a paginated PDF and,
//! optionally, a companion ZIP of the same files, with live progress.
//!
//! ## Why this crate?
//!
//! Scanned pages and phone photos usually end up as a folder of `img1.jpg …
//! img42.jpg` that needs to become one document. Most tools decode and
//! re-encode every image on the way, which costs time and quality. This crate
//! embeds JPEG and PNG data as-is, lays each image out on its own page, and
//! writes the archive in parallel so the originals travel with the PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images
//!  │
//!  ├─ 1. Input     filter .jpg/.jpeg/.png, scan folders, editable ImageSet
//!  ├─ 2. Order     natural filename order or newest-first
//!  ├─ 3. Probe     read pixel size from the header (no re-encoding)
//!  ├─ 4. Layout    fixed sheet (A4, Letter, …) or page = image size at a DPI
//!  ├─ 5. Document  one page per image (spawn_blocking)   ┐ concurrent,
//!  ├─ 6. Archive   one ZIP entry per file (spawn_blocking)┘ merged progress
//!  └─ 7. Output    temp file → rename, per-stream summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2pdf::{convert, scan_images, ConversionConfig, ConversionJob, PageSizeMode, SortPolicy};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let images = scan_images(Path::new("scans"), SortPolicy::Natural)?;
//!     let job = ConversionJob::builder(images, "scans.pdf")
//!         .page_size(PageSizeMode::a4())
//!         .with_sibling_archive()
//!         .build()?;
//!     let summary = convert(&job, &ConversionConfig::default()).await?;
//!     eprintln!("{} pages, {} bytes",
//!         summary.document.items,
//!         summary.document.bytes_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-img2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Page Size
//!
//! | Mode | Page | Image placement |
//! |------|------|-----------------|
//! | `FitToImage { dpi: 96.0 }` (default) | pixels ÷ DPI × 25.4 mm | fills the page |
//! | `FixedSheet(Sheet::A4)` | 210 × 297 mm | scaled to fit inside 10 mm margins, centred |
//! | `FixedSheet(Sheet::LETTER)` | 215.9 × 279.4 mm | as above |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    archive_path_for, default_document_name, ArchiveCompression, ConversionConfig,
    ConversionConfigBuilder, ConversionJob, ConversionJobBuilder, PageSizeMode, Sheet, SortPolicy,
};
pub use convert::{convert, convert_outcome, convert_sync};
pub use error::{BuildError, ConversionError, LayoutError};
pub use output::{ConversionOutcome, ConversionSummary, StreamKind, StreamSummary};
pub use pipeline::input::{filter_supported, scan_images, ImageKind, ImageSet};
pub use pipeline::layout::{compute_layout, PageLayout};
pub use pipeline::order::{natural_cmp, order};
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressSnapshot,
};
pub use stream::{convert_stream, ConversionHandle, ProgressStream};
