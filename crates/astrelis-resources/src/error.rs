//! Error types for the resource system.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur during asset operations.
#[derive(Debug)]
pub enum AssetError {
    /// The requested asset file was not found.
    NotFound {
        /// The path that was probed.
        path: PathBuf,
    },

    /// Failed to read asset data from disk.
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// No factory is registered for the requested asset type.
    NoFactory {
        /// Human-readable type name.
        type_name: &'static str,
    },

    /// The factory failed to turn the source into an asset.
    LoadFailed {
        /// The path being loaded.
        path: PathBuf,
        /// Description of the error.
        message: String,
    },

    /// The factory panicked while loading.
    LoaderPanicked {
        /// The path being loaded.
        path: PathBuf,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The handle is stale or was never issued by this registry.
    ///
    /// Getters return `None` for such handles instead; this is only reported
    /// to a load callback whose slot disappeared before it ran.
    InvalidHandle {
        /// Description of why the handle is invalid.
        reason: String,
    },

    /// A job was submitted to a worker pool that has been shut down.
    PoolStopped,

    /// A registry ran out of slot indices.
    CapacityExhausted {
        /// Human-readable type name.
        type_name: &'static str,
    },
}

impl AssetError {
    /// Convenience constructor for factory failures.
    pub fn load_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AssetError::LoadFailed {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::NotFound { path } => {
                write!(f, "Asset not found: {}", path.display())
            }
            AssetError::Io { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            AssetError::NoFactory { type_name } => {
                write!(f, "No factory registered for asset type: {}", type_name)
            }
            AssetError::LoadFailed { path, message } => {
                write!(f, "Failed to load '{}': {}", path.display(), message)
            }
            AssetError::LoaderPanicked { path, message } => {
                write!(f, "Loader panicked while loading '{}': {}", path.display(), message)
            }
            AssetError::InvalidHandle { reason } => {
                write!(f, "Invalid asset handle: {}", reason)
            }
            AssetError::PoolStopped => {
                write!(f, "Load submitted after the worker pool was stopped")
            }
            AssetError::CapacityExhausted { type_name } => {
                write!(f, "Asset registry for {} has no free slots left", type_name)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
