//! HTML error report accumulated across one archive job.
//!
//! # Design
//! - One generator per job; keys are registered in arrival order and deduplicated.
//! - The report file is rewritten in full on every registration so the file on disk always
//!   lists every failure seen so far.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};

use crate::error::{FsOpsError, FsOpsResult};

/// File name of the error report inside the rebuilt directory and the output archive.
pub const ERROR_REPORT_FILE_NAME: &str = "ErrorReport.html";

/// Collects failing file keys into a shared report.
pub trait ErrorReportGenerator: Send + Sync {
    /// Register `key` (formatted `{archive_file_id}/{file_id}`) and return the current report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report file cannot be written.
    fn add_id_to_report(&self, key: &str) -> FsOpsResult<String>;
}

/// [`ErrorReportGenerator`] writing `ErrorReport.html` into a fixed directory.
#[derive(Debug)]
pub struct HtmlErrorReportGenerator {
    report_dir: PathBuf,
    keys: Mutex<Vec<String>>,
}

impl HtmlErrorReportGenerator {
    /// Create a generator writing into `report_dir`.
    #[must_use]
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Location of the generated report.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.report_dir.join(ERROR_REPORT_FILE_NAME)
    }

    /// Keys registered so far, in arrival order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn render(keys: &[String]) -> String {
        let generated = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Error Report</title></head>\n<body>\n",
        );
        html.push_str("<h1>Files that could not be processed</h1>\n");
        html.push_str("<p>Generated ");
        html.push_str(&generated);
        html.push_str("</p>\n<ul>\n");
        for key in keys {
            html.push_str("<li>");
            html.push_str(&escape_html(key));
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n</body>\n</html>\n");
        html
    }

    fn write_report(path: &Path, html: &str) -> FsOpsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| FsOpsError::io("error_report.create_dir", parent, err))?;
        }
        fs::write(path, html).map_err(|err| FsOpsError::io("error_report.write", path, err))
    }
}

impl ErrorReportGenerator for HtmlErrorReportGenerator {
    fn add_id_to_report(&self, key: &str) -> FsOpsResult<String> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }
        let html = Self::render(&keys);
        Self::write_report(&self.report_path(), &html)?;
        Ok(html)
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn report_accumulates_keys_across_calls() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let generator = HtmlErrorReportGenerator::new(temp.path());

        generator.add_id_to_report("archive/one")?;
        let html = generator.add_id_to_report("archive/two")?;

        assert!(html.contains("<li>archive/one</li>"));
        assert!(html.contains("<li>archive/two</li>"));
        let on_disk = fs::read_to_string(generator.report_path())?;
        assert!(on_disk.contains("archive/one"));
        assert!(on_disk.contains("archive/two"));
        Ok(())
    }

    #[test]
    fn duplicate_keys_are_listed_once() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let generator = HtmlErrorReportGenerator::new(temp.path());

        generator.add_id_to_report("archive/one")?;
        let html = generator.add_id_to_report("archive/one")?;

        assert_eq!(html.matches("archive/one").count(), 1);
        assert_eq!(generator.keys(), vec!["archive/one".to_string()]);
        Ok(())
    }

    #[test]
    fn keys_are_html_escaped() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let generator = HtmlErrorReportGenerator::new(temp.path().join("nested"));

        let html = generator.add_id_to_report("<script>&")?;
        assert!(html.contains("&lt;script&gt;&amp;"));
        assert!(!html.contains("<script>"));
        assert!(generator.report_path().is_file());
        Ok(())
    }
}
