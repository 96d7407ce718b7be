//! Zip and temporary directory fixtures.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;
use zip::ZipArchive;
use zip::write::{FileOptions, ZipWriter};

/// Create a fresh temporary directory for a test.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    Ok(tempfile::tempdir()?)
}

/// Write a zip archive at `path` holding `entries` as `(name, contents)` pairs.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn write_zip_fixture(path: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    for (name, contents) in entries {
        writer.start_file(*name, FileOptions::default())?;
        writer.write_all(contents)?;
    }
    writer.finish()?;
    Ok(())
}

/// Read every entry of the zip archive at `path`, in archive order.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or decoded.
pub fn read_zip_entries(path: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        entries.push((entry.name().to_string(), contents));
    }
    Ok(entries)
}
