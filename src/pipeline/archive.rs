//! Archive stream: the source files, copied verbatim into a ZIP.
//!
//! Entries are named by the source's base file name, in input order, and
//! carry the source's modification time and permissions. Names are never
//! rewritten. When several inputs share a base name (the same file listed
//! twice, or equal names from different folders) the later input overwrites
//! the earlier one: only the last occurrence is written, at its own position.
//! Every input still counts as one progress step.

use crate::config::{ArchiveCompression, ConversionConfig};
use crate::error::BuildError;
use crate::output::{StreamKind, StreamSummary};
use crate::pipeline::sink::{write_error, PendingFile};
use chrono::{Datelike, Local, Timelike};
use std::collections::HashMap;
use std::fs::{File, Metadata};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const COPY_BUF: usize = 64 * 1024;

/// Streams source files into a staged ZIP.
pub struct ArchiveBuilder {
    zip: ZipWriter<BufWriter<PendingFile>>,
    target: PathBuf,
    compression: ArchiveCompression,
    level: Option<i64>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn create(output: &Path, config: &ConversionConfig) -> Result<Self, BuildError> {
        let pending = PendingFile::create(output)?;
        Ok(Self {
            zip: ZipWriter::new(BufWriter::new(pending)),
            target: output.to_path_buf(),
            compression: config.archive_compression,
            level: config.compression_level,
            entries: 0,
        })
    }

    /// Copy `path` into a new entry named by its base name.
    ///
    /// The zip writer rejects a name that is already in the archive; callers
    /// resolve repeats first (see [`build_archive`]).
    pub fn add_file(&mut self, path: &Path) -> Result<(), BuildError> {
        let read_err = |source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut source = File::open(path).map_err(read_err)?;
        let meta = source.metadata().map_err(read_err)?;
        let name = entry_name(path);
        let options = self.entry_options(&meta);

        self.zip
            .start_file(name.clone(), options)
            .map_err(|e| write_error(&self.target, e))?;

        let mut buf = vec![0u8; COPY_BUF];
        let mut copied = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_err(e)),
            };
            self.zip
                .write_all(&buf[..n])
                .map_err(|e| write_error(&self.target, e))?;
            copied += n as u64;
        }

        self.entries += 1;
        debug!("Entry {}: {name} ({copied} bytes)", self.entries);
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Write the central directory and move the archive into place.
    pub fn finish(self) -> Result<u64, BuildError> {
        let ArchiveBuilder { zip, target, .. } = self;
        let buffered = zip.finish().map_err(|e| write_error(&target, e))?;
        let pending = buffered
            .into_inner()
            .map_err(|e| write_error(&target, e.error()))?;
        pending.commit()
    }

    fn entry_options(&self, meta: &Metadata) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .last_modified_time(zip_timestamp(meta.modified().ok()))
            .unix_permissions(permissions(meta))
            .large_file(meta.len() >= u32::MAX as u64);
        match self.compression {
            ArchiveCompression::Deflated => options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(self.level),
            ArchiveCompression::Stored => options.compression_method(CompressionMethod::Stored),
        }
    }
}

/// Build one archive from `images`, in order.
///
/// `on_item_done` is called with the number of inputs processed so far,
/// including inputs overwritten by a later one with the same base name.
///
/// # Errors
/// [`BuildError::EmptyInput`] before anything is created when `images` is
/// empty; [`BuildError::Read`] if a source cannot be opened or read;
/// [`BuildError::Write`] if the archive cannot be written or finalised.
pub fn build_archive(
    images: &[PathBuf],
    output: &Path,
    config: &ConversionConfig,
    mut on_item_done: impl FnMut(usize),
) -> Result<StreamSummary, BuildError> {
    if images.is_empty() {
        return Err(BuildError::EmptyInput);
    }
    let start = Instant::now();
    info!("Writing archive {} ({} entries)", output.display(), images.len());

    let overwritten = overwritten_inputs(images);
    let mut builder = ArchiveBuilder::create(output, config)?;
    for (index, path) in images.iter().enumerate() {
        if overwritten[index] {
            warn!(
                "{}: a later input named {} overwrites it in the archive",
                path.display(),
                entry_name(path)
            );
        } else {
            builder.add_file(path)?;
        }
        on_item_done(index + 1);
    }
    let items = builder.entry_count();
    let bytes_written = builder.finish()?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Archive written: {} ({items} entries, {bytes_written} bytes, {duration_ms}ms)",
        output.display()
    );
    Ok(StreamSummary {
        kind: StreamKind::Archive,
        path: output.to_path_buf(),
        items,
        bytes_written,
        duration_ms,
    })
}

/// `true` for every input whose base name appears again later in `images`.
fn overwritten_inputs(images: &[PathBuf]) -> Vec<bool> {
    let mut last: HashMap<String, usize> = HashMap::new();
    for (index, path) in images.iter().enumerate() {
        last.insert(entry_name(path), index);
    }
    images
        .iter()
        .enumerate()
        .map(|(index, path)| last.get(&entry_name(path)) != Some(&index))
        .collect()
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Local wall-clock time in the ZIP's DOS format; out-of-range dates fall
/// back to the format's epoch (1980-01-01).
fn zip_timestamp(modified: Option<SystemTime>) -> zip::DateTime {
    let Some(modified) = modified else {
        return zip::DateTime::default();
    };
    let local = chrono::DateTime::<Local>::from(modified).naive_local();
    u16::try_from(local.year())
        .ok()
        .and_then(|year| {
            zip::DateTime::from_date_and_time(
                year,
                local.month() as u8,
                local.day() as u8,
                local.hour() as u8,
                local.minute() as u8,
                local.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

#[cfg(unix)]
fn permissions(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permissions(_meta: &Metadata) -> u32 {
    0o644
}
