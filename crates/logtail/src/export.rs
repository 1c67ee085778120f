//! Client-side export of the tail buffer as a downloadable text file.

use std::path::{Path, PathBuf};

use xrayops_core::types::Timestamp;

/// File name prefix for exported logs.
pub const EXPORT_FILE_PREFIX: &str = "spark-logs";

/// A snapshot of the buffer, named for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedLog {
    pub file_name: String,
    pub contents: String,
}

impl ExportedLog {
    /// Name the export after the moment it was taken, e.g.
    /// `spark-logs-20250314-093000.txt`.
    pub fn new(contents: String, taken_at: Timestamp) -> Self {
        let file_name = format!(
            "{EXPORT_FILE_PREFIX}-{}.txt",
            taken_at.format("%Y%m%d-%H%M%S")
        );
        Self {
            file_name,
            contents,
        }
    }

    /// Write the export into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.contents)?;
        Ok(path)
    }
}
