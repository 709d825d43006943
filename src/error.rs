//! Error types for mod management operations.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for mod management operations.
pub type ModResult<T> = Result<T, ModError>;

/// Errors surfaced to the caller by install, switch, uninstall and toggle operations.
///
/// Per-file failures during bulk renames and modules that cannot be read are
/// not represented here: they are logged and skipped.
#[derive(Debug, Error)]
pub enum ModError {
    /// No usable game folder has been configured.
    #[error("game folder is not configured: {reason}")]
    NotConfigured { reason: String },

    /// A source payload, stored version or the plugin directory is missing.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// The install source is neither a module, a directory nor a supported archive.
    #[error("unsupported install source: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// A whole-operation file system failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// An archive could not be read or unpacked.
    #[error("failed to extract {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    /// The package catalog could not be serialized.
    #[error("failed to write catalog {}: {source}", path.display())]
    Catalog {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A payload that must carry an identity does not.
    #[error("{} does not contain an identifiable package", path.display())]
    NotAPackage { path: PathBuf },

    /// A destination is already occupied by an unrelated payload.
    #[error("{} is occupied by another payload", path.display())]
    Conflict { path: PathBuf },
}

impl ModError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what,
            path: path.into(),
        }
    }
}

/// Attaches the offending path to an [`io::Result`].
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> ModResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> ModResult<T> {
        self.map_err(|e| ModError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ModError::not_found("stored version", "/tmp/.versions/a/1.0.0");
        assert_eq!(
            err.to_string(),
            "stored version not found: /tmp/.versions/a/1.0.0"
        );
    }

    #[test]
    fn test_io_context_keeps_source() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"));
        let err = result.at(Path::new("/tmp/Mod.dll")).unwrap_err();

        assert!(err.to_string().contains("/tmp/Mod.dll"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
