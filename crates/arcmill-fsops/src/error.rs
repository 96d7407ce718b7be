//! # Design
//!
//! - Provide structured, constant-message errors for the filesystem collaborators.
//! - Capture operation context (paths, fields, inputs) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the filesystem, archive, and report collaborators.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Zip archive failures.
    #[error("fsops zip failure")]
    Zip {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Path involved in the archive failure.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// The operation stopped early because its cancellation token fired.
    #[error("fsops operation interrupted")]
    Interrupted {
        /// Operation that was interrupted.
        operation: &'static str,
        /// Path the operation was working on.
        path: PathBuf,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Operation identifier recorded with the failure, when one applies.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Io { operation, .. }
            | Self::Walkdir { operation, .. }
            | Self::Zip { operation, .. }
            | Self::Interrupted { operation, .. } => Some(operation),
            Self::InvalidInput { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use walkdir::WalkDir;

    #[test]
    fn fsops_error_helpers_build_variants() -> Result<(), Box<dyn Error>> {
        let io_err = FsOpsError::io("read", "path", io::Error::other("io"));
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert_eq!(io_err.operation(), Some("read"));
        assert!(io_err.source().is_some());

        let temp = tempfile::tempdir()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk_err = FsOpsError::walkdir("walk", &missing, walkdir_error);
        assert!(matches!(walk_err, FsOpsError::Walkdir { .. }));
        assert!(walk_err.source().is_some());

        let zip_err = FsOpsError::zip("unpack", "archive.zip", zip::result::ZipError::FileNotFound);
        assert!(matches!(zip_err, FsOpsError::Zip { .. }));
        assert!(zip_err.source().is_some());
        assert_eq!(zip_err.to_string(), "fsops zip failure");

        let interrupted = FsOpsError::Interrupted {
            operation: "extract_archive.entry",
            path: PathBuf::from("archive.zip"),
        };
        assert_eq!(interrupted.operation(), Some("extract_archive.entry"));
        assert!(interrupted.source().is_none());

        let invalid = FsOpsError::InvalidInput {
            field: "archive_entry",
            reason: "absolute_path",
            value: None,
        };
        assert_eq!(invalid.operation(), None);
        Ok(())
    }
}
