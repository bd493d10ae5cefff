//! Hot reload support for assets during development.
//!
//! Watches search paths for file changes and reports which loaded assets
//! came from the changed files.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};

use astrelis_core::collections::HashMap;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::id::UntypedAssetId;

/// File watcher for hot-reloading assets.
///
/// Tracks which files correspond to which assets. Several assets of
/// different types may come from the same file.
pub struct AssetWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    /// Maps file paths to the assets loaded from them
    path_to_ids: HashMap<PathBuf, Vec<UntypedAssetId>>,
    /// Watched directories
    watched_dirs: Vec<PathBuf>,
}

impl AssetWatcher {
    /// Create a new asset watcher.
    pub fn new() -> Result<Self, notify::Error> {
        let (sender, receiver) = channel();

        let watcher = notify::recommended_watcher(move |res| {
            let _ = sender.send(res);
        })?;

        Ok(Self {
            watcher,
            receiver,
            path_to_ids: HashMap::new(),
            watched_dirs: Vec::new(),
        })
    }

    /// Watch a directory for changes.
    pub fn watch_directory(&mut self, path: impl AsRef<Path>) -> Result<(), notify::Error> {
        let path = path.as_ref();

        if !self.watched_dirs.iter().any(|dir| dir == path) {
            self.watcher.watch(path, RecursiveMode::Recursive)?;
            self.watched_dirs.push(path.to_path_buf());
            tracing::debug!("Watching directory for changes: {}", path.display());
        }

        Ok(())
    }

    /// Register that a file backs an asset.
    pub fn register_file(&mut self, path: impl AsRef<Path>, id: UntypedAssetId) {
        let ids = self.path_to_ids.entry(path.as_ref().to_path_buf()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// Forget that a file backs an asset.
    pub fn unregister_file(&mut self, path: impl AsRef<Path>, id: UntypedAssetId) {
        let path = path.as_ref();
        if let Some(ids) = self.path_to_ids.get_mut(path) {
            ids.retain(|registered| *registered != id);
            if ids.is_empty() {
                self.path_to_ids.remove(path);
            }
        }
    }

    /// Poll for changed files.
    ///
    /// Returns each affected asset once, however many events its file produced.
    pub fn poll_changes(&mut self) -> Vec<UntypedAssetId> {
        let mut changed = Vec::new();

        while let Ok(event) = self.receiver.try_recv() {
            match event {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        continue;
                    }
                    for path in &event.paths {
                        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                        if let Some(ids) = self.path_to_ids.get(&key) {
                            tracing::debug!("File changed, marking for reload: {}", key.display());
                            changed.extend(ids.iter().copied());
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("File watcher error: {}", e);
                }
            }
        }

        changed.sort();
        changed.dedup();
        changed
    }

    /// Get the list of watched directories.
    pub fn watched_directories(&self) -> &[PathBuf] {
        &self.watched_dirs
    }

    /// Number of files with registered assets.
    pub fn registered_files(&self) -> usize {
        self.path_to_ids.len()
    }
}
