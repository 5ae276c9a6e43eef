//! Output files that only appear at their target path on success.
//!
//! Both writers stream into a hidden temp file in the destination directory
//! and rename it over the target in [`PendingFile::commit`]. Dropping a
//! `PendingFile` without committing deletes the temp file, so a failed stream
//! never leaves a truncated PDF or ZIP under the name the caller asked for.

use crate::error::BuildError;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A temp file that becomes `target` on commit.
#[derive(Debug)]
pub struct PendingFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl PendingFile {
    /// Create the temp file next to `target`.
    pub fn create(target: &Path) -> Result<Self, BuildError> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".img2pdf-").suffix(".part");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }

        let tmp = builder
            .tempfile_in(dir)
            .map_err(|e| write_error(target, e))?;
        debug!("Staging {} at {}", target.display(), tmp.path().display());

        Ok(Self {
            tmp,
            target: target.to_path_buf(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush, sync and rename over the target. Returns the final file size.
    pub fn commit(mut self) -> Result<u64, BuildError> {
        let target = self.target.clone();
        self.tmp.flush().map_err(|e| write_error(&target, e))?;
        self.tmp
            .as_file()
            .sync_all()
            .map_err(|e| write_error(&target, e))?;

        let file = self
            .tmp
            .persist(&target)
            .map_err(|e| write_error(&target, e.error))?;
        let len = file
            .metadata()
            .map_err(|e| write_error(&target, e))?
            .len();
        Ok(len)
    }
}

impl Write for PendingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.flush()
    }
}

impl Seek for PendingFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.tmp.seek(pos)
    }
}

pub(crate) fn write_error(path: &Path, err: impl std::fmt::Display) -> BuildError {
    BuildError::Write {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}
