//! Input resolution: which files count as images, and in what order.
//!
//! The library never opens file pickers. Callers hand it paths (explicit
//! files, drag-and-drop lists, or a folder to scan) and keep an editable
//! [`ImageSet`]; a job takes a snapshot of that set when it starts.

use crate::config::SortPolicy;
use crate::error::BuildError;
use crate::pipeline::order;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Container formats the document writer can embed without transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Classify by extension (`.jpg`, `.jpeg`, `.png`, any case).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            _ => None,
        }
    }

    /// Matching decoder format for header probing.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
            ImageKind::Png => image::ImageFormat::Png,
        }
    }
}

/// True when `path` has a supported image extension.
pub fn is_supported(path: &Path) -> bool {
    ImageKind::from_path(path).is_some()
}

/// Keep only supported images, preserving order.
pub fn filter_supported<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    paths
        .into_iter()
        .map(Into::into)
        .filter(|p| is_supported(p))
        .collect()
}

/// List the JPEG/PNG files directly inside `dir` (no recursion), ordered by `policy`.
///
/// # Errors
/// [`BuildError::Read`] if the directory cannot be listed.
pub fn scan_images(dir: &Path, policy: SortPolicy) -> Result<Vec<PathBuf>, BuildError> {
    let read_err = |source| BuildError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        // Follow symlinks: a link to an image counts, a link to a folder does not.
        if !path.is_file() || !is_supported(&path) {
            continue;
        }
        found.push(path);
    }

    debug!("Scanned {}: {} images", dir.display(), found.len());
    Ok(order::order(&found, policy))
}

/// The caller's editable, ordered list of images.
///
/// Duplicates are allowed and insertion order is kept unless [`ImageSet::sort`]
/// is called. A running job works on a [`snapshot`](ImageSet::snapshot), never
/// on the live set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    paths: Vec<PathBuf>,
}

impl ImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an image. Returns `false` (and ignores it) for unsupported extensions.
    pub fn push(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !is_supported(&path) {
            debug!("Ignoring unsupported file {}", path.display());
            return false;
        }
        self.paths.push(path);
        true
    }

    /// Append many images; returns how many were accepted.
    pub fn extend<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut accepted = 0;
        for path in paths {
            if self.push(path) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Append every image found directly in `dir`, ordered by `policy`.
    pub fn add_folder(&mut self, dir: &Path, policy: SortPolicy) -> Result<usize, BuildError> {
        let found = scan_images(dir, policy)?;
        let n = found.len();
        self.paths.extend(found);
        Ok(n)
    }

    /// Remove the image at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.paths.len()).then(|| self.paths.remove(index))
    }

    /// Reorder the whole set.
    pub fn sort(&mut self, policy: SortPolicy) {
        self.paths = order::order(&self.paths, policy);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Copy of the current list for a job; later edits do not reach it.
    pub fn snapshot(&self) -> Arc<[PathBuf]> {
        self.paths.as_slice().into()
    }
}

impl<'a> IntoIterator for &'a ImageSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(ImageKind::from_path(Path::new("a.JPG")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("a.jpeg")), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_path(Path::new("/x/a.Png")), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_path(Path::new("a.gif")), None);
        assert_eq!(ImageKind::from_path(Path::new("png")), None);
    }

    #[test]
    fn filter_keeps_order() {
        let out = filter_supported(["b.png", "notes.txt", "a.jpg", "c.webp", "b.png"]);
        assert_eq!(out, vec![PathBuf::from("b.png"), PathBuf::from("a.jpg"), PathBuf::from("b.png")]);
    }

    #[test]
    fn image_set_push_remove() {
        let mut set = ImageSet::new();
        assert!(set.push("/p/1.png"));
        assert!(!set.push("/p/readme.md"));
        assert!(set.push("/p/2.jpg"));
        assert!(set.push("/p/1.png"));
        assert_eq!(set.len(), 3);

        assert_eq!(set.remove(7), None);
        assert_eq!(set.remove(0), Some(PathBuf::from("/p/1.png")));
        assert_eq!(set.as_slice(), &[PathBuf::from("/p/2.jpg"), PathBuf::from("/p/1.png")]);
    }

    #[test]
    fn extend_counts_accepted() {
        let mut set = ImageSet::new();
        assert_eq!(set.extend(["x.png", "y.tiff", "z.jpeg"]), 2);
    }

    #[test]
    fn snapshot_does_not_alias_live_set() {
        let mut set = ImageSet::new();
        set.push("/p/1.png");
        set.push("/p/2.png");
        let snap = set.snapshot();
        set.remove(0);
        set.push("/p/3.png");
        assert_eq!(&*snap, &[PathBuf::from("/p/1.png"), PathBuf::from("/p/2.png")]);
    }

    #[test]
    fn sort_applies_policy() {
        let mut set = ImageSet::new();
        set.extend(["img10.png", "img2.png", "img1.png"]);
        set.sort(SortPolicy::Natural);
        let names: Vec<_> = set.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["img1.png", "img2.png", "img10.png"]);
    }

    #[test]
    fn scan_is_flat_filtered_and_natural() {
        let dir = TempDir::new().unwrap();
        for name in ["p10.png", "p2.JPG", "p1.jpeg", "notes.txt", "p3.gif"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("p0.png")).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/p4.png"), b"x").unwrap();

        let found = scan_images(dir.path(), SortPolicy::Natural).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["p1.jpeg", "p2.JPG", "p10.png"]);
    }

    #[test]
    fn scan_missing_dir_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = scan_images(&dir.path().join("gone"), SortPolicy::Natural).unwrap_err();
        assert!(matches!(err, BuildError::Read { .. }));
    }

    #[test]
    fn add_folder_appends_after_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b2.png"), b"x").unwrap();
        std::fs::write(dir.path().join("b1.png"), b"x").unwrap();
        let mut set = ImageSet::new();
        set.push("/first.png");
        assert_eq!(set.add_folder(dir.path(), SortPolicy::Natural).unwrap(), 2);
        assert_eq!(set.as_slice()[0], PathBuf::from("/first.png"));
        assert!(set.as_slice()[1].ends_with("b1.png"));
    }
}
