//! Source-to-destination path mapping.

use std::path::{Path, PathBuf};

/// Maps a source path to its location in the mirror tree.
///
/// Implementations must be pure: the same input always maps to the same
/// output, with no filesystem access.
pub trait PathMapper: Send + Sync {
    /// Returns the destination path for `source_path`.
    fn map(&self, source_path: &Path) -> PathBuf;
}

/// Default mapper: replaces the source-root prefix with the destination
/// root. Paths outside the source root are routed to
/// `dest_root/{basename}`.
#[derive(Clone, Debug)]
pub struct RootPathMapper {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl RootPathMapper {
    /// Creates a mapper between the two roots.
    #[must_use]
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }
}

impl PathMapper for RootPathMapper {
    fn map(&self, source_path: &Path) -> PathBuf {
        if let Ok(relative) = source_path.strip_prefix(&self.source_root) {
            return self.dest_root.join(relative);
        }
        match source_path.file_name() {
            Some(name) => self.dest_root.join(name),
            None => self.dest_root.clone(),
        }
    }
}
