//! Raw filesystem collaborator.
//!
//! # Design
//! - The processing core only sees [`FileManager`]; tests substitute recording fakes.
//! - Every operation is synchronous and scoped to a single path.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Filesystem operations required by archive processing.
pub trait FileManager: Send + Sync {
    /// Whether a regular file exists at `path`.
    fn file_exists(&self, path: &Path) -> bool;

    /// Whether a directory exists at `path`.
    fn directory_exists(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents. Existing directories are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_directory(&self, path: &Path) -> FsOpsResult<()>;

    /// Recursively delete the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    fn delete_directory(&self, path: &Path) -> FsOpsResult<()>;

    /// Delete the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    fn delete_file(&self, path: &Path) -> FsOpsResult<()>;

    /// List every regular file below `directory`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be traversed.
    fn list_files(&self, directory: &Path) -> FsOpsResult<Vec<PathBuf>>;

    /// Move a file, creating the destination's parent directory when needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be moved.
    fn move_file(&self, from: &Path, to: &Path) -> FsOpsResult<()>;
}

/// [`FileManager`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileManager;

impl FileManager for LocalFileManager {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_directory(&self, path: &Path) -> FsOpsResult<()> {
        fs::create_dir_all(path).map_err(|source| FsOpsError::io("create_directory", path, source))
    }

    fn delete_directory(&self, path: &Path) -> FsOpsResult<()> {
        fs::remove_dir_all(path).map_err(|source| FsOpsError::io("delete_directory", path, source))
    }

    fn delete_file(&self, path: &Path) -> FsOpsResult<()> {
        fs::remove_file(path).map_err(|source| FsOpsError::io("delete_file", path, source))
    }

    fn list_files(&self, directory: &Path) -> FsOpsResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(directory).sort_by_file_name() {
            let entry =
                entry.map_err(|source| FsOpsError::walkdir("list_files", directory, source))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn move_file(&self, from: &Path, to: &Path) -> FsOpsResult<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| FsOpsError::io("move_file.create_parent", parent, source))?;
        }
        fs::rename(from, to).map_err(|source| FsOpsError::io("move_file.rename", from, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn create_directory_is_idempotent() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let target = temp.path().join("nested").join("dir");
        let files = LocalFileManager;

        files.create_directory(&target)?;
        files.create_directory(&target)?;
        assert!(files.directory_exists(&target));
        assert!(!files.file_exists(&target));
        Ok(())
    }

    #[test]
    fn list_files_walks_nested_directories() -> Result<()> {
        let temp = tempfile::tempdir()?;
        fs::create_dir_all(temp.path().join("b"))?;
        fs::write(temp.path().join("b").join("two.txt"), "2")?;
        fs::write(temp.path().join("a.txt"), "1")?;

        let listed = LocalFileManager.list_files(temp.path())?;
        assert_eq!(
            listed,
            vec![temp.path().join("a.txt"), temp.path().join("b").join("two.txt")]
        );
        Ok(())
    }

    #[test]
    fn move_and_delete_files() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("source.txt");
        let target = temp.path().join("moved").join("target.txt");
        fs::write(&source, "payload")?;
        let files = LocalFileManager;

        files.move_file(&source, &target)?;
        assert!(!files.file_exists(&source));
        assert_eq!(fs::read_to_string(&target)?, "payload");

        files.delete_file(&target)?;
        assert!(!files.file_exists(&target));
        files.delete_directory(&temp.path().join("moved"))?;
        assert!(!files.directory_exists(&temp.path().join("moved")));
        Ok(())
    }

    #[test]
    fn delete_missing_file_reports_operation() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let err = LocalFileManager
            .delete_file(&temp.path().join("missing"))
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected delete failure"))?;
        assert_eq!(err.operation(), Some("delete_file"));
        Ok(())
    }
}
