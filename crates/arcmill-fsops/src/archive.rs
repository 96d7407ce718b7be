//! Zip archive collaborator.
//!
//! # Design
//! - Extraction rejects absolute and parent-traversal entries before touching disk.
//! - Extraction checks its cancellation token before every entry.
//! - Appends keep one writer open per archive; `finish_archive` writes the central
//!   directory. A writer dropped without finishing is finalised on drop.
//! - Entry names always use `/` separators regardless of the host platform.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::error::{FsOpsError, FsOpsResult};

/// Archive operations required by archive processing.
pub trait ArchiveManager: Send + Sync {
    /// Unpack `archive` into `target_dir`, creating nested directories as needed.
    ///
    /// Stops before the next entry once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or contains unsafe entry names,
    /// and [`FsOpsError::Interrupted`] when cancelled.
    fn extract_archive(
        &self,
        archive: &Path,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()>;

    /// Write every file below `source_dir` into a fresh archive at `archive`.
    ///
    /// An empty `source_dir` produces a valid, empty archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or the archive cannot be written.
    fn create_archive(&self, source_dir: &Path, archive: &Path) -> FsOpsResult<()>;

    /// Append `file` to `archive` under `entry_name`, creating the archive when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the archive cannot be updated.
    fn add_to_archive(&self, archive: &Path, file: &Path, entry_name: &str) -> FsOpsResult<()>;

    /// Complete every pending append to `archive`. A no-op when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive trailer cannot be written.
    fn finish_archive(&self, _archive: &Path) -> FsOpsResult<()> {
        Ok(())
    }
}

/// [`ArchiveManager`] producing deflate-compressed zip files.
#[derive(Default)]
pub struct ZipArchiveManager {
    writers: Mutex<HashMap<PathBuf, ZipWriter<File>>>,
}

impl ZipArchiveManager {
    /// Create a manager with no open writers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_writers(&self) -> MutexGuard<'_, HashMap<PathBuf, ZipWriter<File>>> {
        self.writers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry_options() -> FileOptions {
        FileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    fn open_writer(archive: &Path) -> FsOpsResult<ZipWriter<File>> {
        let existing_len = match fs::metadata(archive) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => 0,
            Err(err) => return Err(FsOpsError::io("add_to_archive.metadata", archive, err)),
        };

        if existing_len == 0 {
            let file = File::create(archive)
                .map_err(|err| FsOpsError::io("add_to_archive.create", archive, err))?;
            return Ok(ZipWriter::new(file));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(archive)
            .map_err(|err| FsOpsError::io("add_to_archive.open", archive, err))?;
        ZipWriter::new_append(file)
            .map_err(|err| FsOpsError::zip("add_to_archive.reopen", archive, err))
    }

    fn write_entry(
        writer: &mut ZipWriter<File>,
        archive: &Path,
        file: &Path,
        entry_name: String,
    ) -> FsOpsResult<()> {
        writer
            .start_file(entry_name, Self::entry_options())
            .map_err(|err| FsOpsError::zip("archive.start_entry", archive, err))?;
        let mut input =
            File::open(file).map_err(|err| FsOpsError::io("archive.open_entry", file, err))?;
        io::copy(&mut input, writer).map_err(|err| FsOpsError::io("archive.copy", file, err))?;
        writer
            .flush()
            .map_err(|err| FsOpsError::io("archive.flush", archive, err))
    }
}

impl ArchiveManager for ZipArchiveManager {
    fn extract_archive(
        &self,
        archive: &Path,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        let file = File::open(archive)
            .map_err(|err| FsOpsError::io("extract_archive.open", archive, err))?;
        let mut zip = ZipArchive::new(file)
            .map_err(|err| FsOpsError::zip("extract_archive.decode", archive, err))?;

        for index in 0..zip.len() {
            if cancel.is_cancelled() {
                return Err(FsOpsError::Interrupted {
                    operation: "extract_archive.entry",
                    path: archive.to_path_buf(),
                });
            }
            let mut entry = zip
                .by_index(index)
                .map_err(|err| FsOpsError::zip("extract_archive.read_entry", archive, err))?;
            let entry_path = sanitize_archive_path(entry.name())?;
            let destination = target_dir.join(&entry_path);

            if entry.is_dir() {
                fs::create_dir_all(&destination).map_err(|err| {
                    FsOpsError::io("extract_archive.create_dir", &destination, err)
                })?;
                continue;
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| FsOpsError::io("extract_archive.create_parent", parent, err))?;
            }

            let mut output = File::create(&destination)
                .map_err(|err| FsOpsError::io("extract_archive.create_file", &destination, err))?;
            io::copy(&mut entry, &mut output)
                .map_err(|err| FsOpsError::io("extract_archive.copy", &destination, err))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&destination, fs::Permissions::from_mode(mode)).map_err(
                    |err| FsOpsError::io("extract_archive.set_permissions", &destination, err),
                )?;
            }
        }

        debug!(archive = %archive.display(), entries = zip.len(), "archive extracted");
        Ok(())
    }

    fn create_archive(&self, source_dir: &Path, archive: &Path) -> FsOpsResult<()> {
        drop(self.lock_writers().remove(archive));
        let file = File::create(archive)
            .map_err(|err| FsOpsError::io("create_archive.create", archive, err))?;
        let mut writer = ZipWriter::new(file);

        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry =
                entry.map_err(|err| FsOpsError::walkdir("create_archive.walk", source_dir, err))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(source_dir).map_err(|_| {
                FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "outside_source_dir",
                    value: Some(entry.path().display().to_string()),
                }
            })?;
            Self::write_entry(&mut writer, archive, entry.path(), entry_name_for(relative)?)?;
        }

        writer
            .finish()
            .map_err(|err| FsOpsError::zip("create_archive.finish", archive, err))?;
        Ok(())
    }

    fn add_to_archive(&self, archive: &Path, file: &Path, entry_name: &str) -> FsOpsResult<()> {
        let entry_name = entry_name_for(&sanitize_archive_path(entry_name)?)?;
        let mut writers = self.lock_writers();
        let writer = match writers.entry(archive.to_path_buf()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(Self::open_writer(archive)?),
        };
        let written = Self::write_entry(writer, archive, file, entry_name);
        if written.is_err() {
            drop(writers.remove(archive));
        }
        drop(writers);
        written
    }

    fn finish_archive(&self, archive: &Path) -> FsOpsResult<()> {
        let Some(mut writer) = self.lock_writers().remove(archive) else {
            return Ok(());
        };
        writer
            .finish()
            .map_err(|err| FsOpsError::zip("finish_archive.finish", archive, err))?;
        Ok(())
    }
}

/// Normalise an archive entry name, rejecting absolute paths and traversal segments.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] when the entry would escape its target directory.
pub fn sanitize_archive_path(entry: &str) -> FsOpsResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() || entry.starts_with('/') || entry.starts_with('\\') {
        return Err(FsOpsError::InvalidInput {
            field: "archive_entry",
            reason: "absolute_path",
            value: Some(entry.to_string()),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "invalid_segment",
                    value: Some(entry.to_string()),
                });
            }
        }
    }

    if sanitized.as_os_str().is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "archive_entry",
            reason: "empty",
            value: Some(entry.to_string()),
        });
    }

    Ok(sanitized)
}

fn entry_name_for(relative: &Path) -> FsOpsResult<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "non_utf8",
                    value: Some(relative.display().to_string()),
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => {
                return Err(FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "invalid_segment",
                    value: Some(relative.display().to_string()),
                });
            }
        }
    }
    Ok(segments.join("/"))
}
