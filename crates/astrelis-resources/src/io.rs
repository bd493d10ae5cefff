//! Path resolution and file reads.

use std::path::{Path, PathBuf};

use crate::error::{AssetError, AssetResult};

/// Ordered list of directories probed when resolving a relative asset path.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    /// Create an empty search path list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory. Directories are probed in the order they were added.
    pub fn add(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if self.dirs.contains(&dir) {
            return;
        }
        tracing::debug!("Added asset search path: {}", dir.display());
        self.dirs.push(dir);
    }

    /// The registered directories, in probe order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Find the first existing file for `path`.
    ///
    /// An existing absolute path short-circuits the search. A relative path
    /// is tried against each directory, then against the working directory.
    pub fn find_full_path(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        if path.is_absolute() {
            return path.exists().then(|| path.to_path_buf());
        }

        self.dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
            .or_else(|| path.exists().then(|| path.to_path_buf()))
    }

    /// Resolve `path` to the key used for identity.
    ///
    /// Existing files resolve to their canonical path, so two spellings of
    /// the same file share a slot. Missing files keep the path as given so
    /// the failure can still be cached and reported under it.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match self.find_full_path(path) {
            Some(found) => path_key(&found),
            None => path.to_path_buf(),
        }
    }
}

/// Canonicalize `path` if possible.
pub fn path_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Read a whole file, distinguishing a missing file from other IO failures.
pub fn read_bytes(path: &Path) -> AssetResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            AssetError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_paths_probe_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("shared.txt"), "first").unwrap();
        std::fs::write(second.path().join("shared.txt"), "second").unwrap();
        std::fs::write(second.path().join("only.txt"), "second").unwrap();

        let mut paths = SearchPaths::new();
        paths.add(first.path());
        paths.add(second.path());

        assert_eq!(
            paths.find_full_path("shared.txt"),
            Some(first.path().join("shared.txt"))
        );
        assert_eq!(
            paths.find_full_path("only.txt"),
            Some(second.path().join("only.txt"))
        );
        assert_eq!(paths.find_full_path("missing.txt"), None);
    }

    #[test]
    fn test_absolute_path_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abs.txt");
        std::fs::write(&file, "x").unwrap();

        let paths = SearchPaths::new();
        assert_eq!(paths.find_full_path(&file), Some(file.clone()));
        assert_eq!(paths.find_full_path(dir.path().join("nope.txt")), None);
    }

    #[test]
    fn test_resolve_canonicalizes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();

        let mut paths = SearchPaths::new();
        paths.add(dir.path());

        let direct = paths.resolve("a.txt");
        let dotted = paths.resolve("sub/../a.txt");
        assert_eq!(direct, dotted);
        assert_eq!(paths.resolve("missing.txt"), PathBuf::from("missing.txt"));
    }

    #[test]
    fn test_duplicate_search_path_ignored() {
        let mut paths = SearchPaths::new();
        paths.add("assets");
        paths.add("assets");
        assert_eq!(paths.dirs().len(), 1);
    }

    #[test]
    fn test_read_bytes_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_bytes(&dir.path().join("missing.bin"));
        assert!(matches!(missing, Err(AssetError::NotFound { .. })));

        // Reading a directory is an IO error, not a missing file
        let is_dir = read_bytes(dir.path());
        assert!(matches!(is_dir, Err(AssetError::Io { .. })));
    }
}
