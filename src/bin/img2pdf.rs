//! CLI binary for edgequake-img2pdf.
//!
//! A thin shim over the library crate that resolves inputs, maps CLI flags
//! to `ConversionJob` + `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2pdf::{
    archive_path_for, convert_outcome, default_document_name, ArchiveCompression, BuildError,
    ConversionConfig, ConversionError, ConversionJob, ConversionOutcome,
    ConversionProgressCallback, ImageSet, PageSizeMode, ProgressCallback, ProgressSnapshot, Sheet,
    SortPolicy, StreamKind, StreamSummary,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar covering both streams, with a line per
/// finished stream. Ticks from the two streams interleave freely; the bar
/// position is always `document_done + archive_done`.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, steps: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {percent:>3}%  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(steps as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_images: usize, archive_enabled: bool) {
        let streams = if archive_enabled { 2 } else { 1 };
        self.activate_bar(total_images * streams);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Converting {total_images} images{}…",
                if archive_enabled { " (PDF + ZIP)" } else { "" }
            ))
        ));
    }

    fn on_progress(&self, p: &ProgressSnapshot) {
        self.bar.set_position((p.document_done + p.archive_done) as u64);
        let msg = if p.archive_enabled {
            format!("pdf {}/{}  zip {}/{}", p.document_done, p.total, p.archive_done, p.total)
        } else {
            format!("pdf {}/{}", p.document_done, p.total)
        };
        self.bar.set_message(msg);
    }

    fn on_stream_complete(&self, stream: StreamKind, items: usize) {
        let unit = match stream {
            StreamKind::Document => "pages",
            StreamKind::Archive => "entries",
        };
        self.bar
            .println(format!("  {} {stream:<8}  {}", green("✓"), dim(&format!("{items} {unit}"))));
    }

    fn on_stream_error(&self, stream: StreamKind, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {stream:<8}  {}", red("✗"), red(&msg)));
    }

    fn on_conversion_complete(&self, _snapshot: &ProgressSnapshot, _success: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every image in a folder, natural order (img2 before img10), PDF + ZIP
  img2pdf scans/ -o scans.pdf

  # Explicit files in the given order, A4 pages, no archive
  img2pdf --sort none --page-size a4 --no-archive cover.png p1.jpg p2.jpg -o book.pdf

  # Newest photos first, letter paper with 15 mm margins
  img2pdf --sort mtime --page-size letter --margin 15 ~/Photos/trip -o trip.pdf

  # Page = image size at 300 DPI, uncompressed archive next to the PDF
  img2pdf --dpi 300 --stored photos/ -o prints.pdf

  # Machine-readable summary
  img2pdf --json scans/ -o scans.pdf > summary.json

PAGE SIZES:
  fit      page = image pixels ÷ DPI (default 96), no margin   (default)
  a4       210 × 297 mm, image scaled to fit inside the margins, centred
  letter   215.9 × 279.4 mm, same placement as a4

ENVIRONMENT VARIABLES:
  IMG2PDF_SOURCE_DIR      Folder scanned when no inputs are given
  IMG2PDF_OUTPUT          Default document path
  IMG2PDF_PAGE_SIZE       fit | a4 | letter
  IMG2PDF_SORT            natural | mtime | none
  RUST_LOG                Override log filtering (e.g. edgequake_img2pdf=debug)
"#;

/// Convert JPEG/PNG images into a paginated PDF and a companion ZIP.
#[derive(Parser, Debug)]
#[command(
    name = "img2pdf",
    version,
    about = "Convert JPEG/PNG images into a paginated PDF and a companion ZIP",
    long_about = "Convert an ordered set of JPEG/PNG images into one PDF (one page per image) \
and, alongside it, a ZIP archive of the original files. Image data is embedded as-is: JPEG and \
plain PNG are never re-encoded.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files and/or folders (folders are scanned, not recursively).
    inputs: Vec<PathBuf>,

    /// Folder to scan when no inputs are given.
    #[arg(long, env = "IMG2PDF_SOURCE_DIR")]
    source_dir: Option<PathBuf>,

    /// Document path. Default: <first image stem>.pdf beside the first image.
    #[arg(short, long, env = "IMG2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Page sizing: fit, a4, letter.
    #[arg(long, env = "IMG2PDF_PAGE_SIZE", value_enum, default_value = "fit")]
    page_size: PageSizeArg,

    /// Margin in millimetres for a4/letter pages.
    #[arg(long, env = "IMG2PDF_MARGIN", default_value_t = 10.0)]
    margin: f64,

    /// Assumed resolution for --page-size fit.
    #[arg(long, env = "IMG2PDF_DPI", default_value_t = 96.0)]
    dpi: f64,

    /// Ordering: natural (img2 before img10), mtime (newest first), none.
    #[arg(long, env = "IMG2PDF_SORT", value_enum, default_value = "natural")]
    sort: SortArg,

    /// Archive path. Default: the document path with a .zip extension.
    #[arg(long, env = "IMG2PDF_ARCHIVE", conflicts_with = "no_archive")]
    archive: Option<PathBuf>,

    /// Write the PDF only.
    #[arg(long, env = "IMG2PDF_NO_ARCHIVE")]
    no_archive: bool,

    /// Store archive entries without compression.
    #[arg(long, env = "IMG2PDF_STORED")]
    stored: bool,

    /// Deflate level for archive entries (0–9).
    #[arg(long, env = "IMG2PDF_COMPRESSION_LEVEL",
          value_parser = clap::value_parser!(i64).range(0..=9))]
    compression_level: Option<i64>,

    /// Do not deflate PDF content streams.
    #[arg(long, env = "IMG2PDF_NO_PDF_COMPRESSION")]
    no_pdf_compression: bool,

    /// Title stored in the PDF metadata.
    #[arg(long, env = "IMG2PDF_TITLE")]
    title: Option<String>,

    /// Output a JSON summary on stdout.
    #[arg(long, env = "IMG2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    Fit,
    A4,
    Letter,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Natural,
    Mtime,
    /// Keep the order given on the command line.
    #[value(name = "none")]
    Keep,
}

impl SortArg {
    fn policy(self) -> Option<SortPolicy> {
        match self {
            SortArg::Natural => Some(SortPolicy::Natural),
            SortArg::Mtime => Some(SortPolicy::ModifiedDesc),
            SortArg::Keep => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Resolve inputs ───────────────────────────────────────────────────
    let images = collect_images(&cli)?;
    let output = match (&cli.output, images.as_slice().first()) {
        (Some(path), _) => path.clone(),
        (None, Some(first)) => first.with_file_name(default_document_name(first)),
        (None, None) => PathBuf::from("images.pdf"),
    };
    let archive = if cli.no_archive {
        None
    } else {
        Some(cli.archive.clone().unwrap_or_else(|| archive_path_for(&output)))
    };

    if !images.is_empty() {
        for path in std::iter::once(&output).chain(archive.as_ref()) {
            ensure_parent(path)?;
        }
    }

    // ── Build job + config ───────────────────────────────────────────────
    let mut job = ConversionJob::builder(images.snapshot().iter().cloned(), &output)
        .page_size(page_size(&cli));
    if let Some(ref path) = archive {
        job = job.archive_path(path);
    }
    let job = job.build().context("Invalid job")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let outcome = convert_outcome(&job, &config)
        .await
        .context("Conversion failed")?;

    if !cli.json && !cli.quiet {
        print_summary(&outcome);
    }

    let result = outcome.into_result();
    if cli.json {
        let value = match result {
            Ok(ref summary) => serde_json::to_value(summary).context("Failed to serialise summary")?,
            Err(ref err) => failure_json(err),
        };
        let json = serde_json::to_string_pretty(&value).context("Failed to serialise summary")?;
        println!("{json}");
    }

    result.map(|_| ()).context("Conversion failed")
}

/// Resolve CLI inputs into the ordered image list.
fn collect_images(cli: &Cli) -> Result<ImageSet> {
    let scan_policy = cli.sort.policy().unwrap_or_default();
    let roots: Vec<PathBuf> = if cli.inputs.is_empty() {
        match cli.source_dir {
            Some(ref dir) => vec![dir.clone()],
            None => anyhow::bail!(
                "No inputs given: pass image files or folders, or set IMG2PDF_SOURCE_DIR"
            ),
        }
    } else {
        cli.inputs.clone()
    };

    let mut set = ImageSet::new();
    for root in &roots {
        if root.is_dir() {
            set.add_folder(root, scan_policy)
                .with_context(|| format!("Failed to scan {}", root.display()))?;
        } else if !set.push(root.clone()) {
            warn!("Skipping {}: not a .jpg, .jpeg or .png file", root.display());
        }
    }

    if let Some(policy) = cli.sort.policy() {
        set.sort(policy);
    }
    Ok(set)
}

fn page_size(cli: &Cli) -> PageSizeMode {
    match cli.page_size {
        PageSizeArg::Fit => PageSizeMode::FitToImage { dpi: cli.dpi },
        PageSizeArg::A4 => PageSizeMode::FixedSheet(Sheet::A4.with_margin(cli.margin)),
        PageSizeArg::Letter => PageSizeMode::FixedSheet(Sheet::LETTER.with_margin(cli.margin)),
    }
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let compression = if cli.stored {
        ArchiveCompression::Stored
    } else {
        ArchiveCompression::Deflated
    };
    let mut builder = ConversionConfig::builder()
        .archive_compression(compression)
        .compress_document(!cli.no_pdf_compression);

    if let Some(level) = cli.compression_level {
        builder = builder.compression_level(level);
    }
    if let Some(ref title) = cli.title {
        builder = builder.title(title);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display())),
        _ => Ok(()),
    }
}

fn print_summary(outcome: &ConversionOutcome) {
    let line = |result: &Result<StreamSummary, BuildError>, kind: StreamKind| match result {
        Ok(s) => eprintln!(
            "{}  {kind:<8}  {} items  {}  {}ms  →  {}",
            green("✔"),
            s.items,
            dim(&format!("{} bytes", s.bytes_written)),
            s.duration_ms,
            bold(&s.path.display().to_string()),
        ),
        Err(e) => eprintln!("{}  {kind:<8}  {}", red("✘"), red(&e.to_string())),
    };
    line(&outcome.document, StreamKind::Document);
    if let Some(ref archive) = outcome.archive {
        line(archive, StreamKind::Archive);
    }
    if outcome.is_mixed() {
        eprintln!("{}  one stream failed; the other output was kept", cyan("⚠"));
    }
}

fn failure_json(err: &ConversionError) -> serde_json::Value {
    serde_json::json!({
        "error": err.to_string(),
        "document_error": err.document_error().map(ToString::to_string),
        "archive_error": err.archive_error().map(ToString::to_string),
    })
}
