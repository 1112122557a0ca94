//! Result writer station: the only stage that touches the output file.

use crate::error::Result;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::task::ResultRecord;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Acknowledgement that a record reached the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    pub name: String,
    pub bytes: usize,
}

/// Appends each record to the output file and flushes it.
pub struct ResultWriter {
    file: File,
    path: PathBuf,
}

impl ResultWriter {
    /// Creates (or truncates) the output file.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Station for ResultWriter {
    type Input = ResultRecord;
    type Output = WrittenRecord;

    fn process(
        &mut self,
        record: ResultRecord,
    ) -> std::result::Result<Option<WrittenRecord>, StationError> {
        self.file
            .write_all(record.text.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| {
                StationError::Fatal(format!(
                    "Failed to write {} to {}: {}",
                    record.name,
                    self.path.display(),
                    e
                ))
            })?;

        debug!(name = %record.name, bytes = record.text.len(), "result written");
        Ok(Some(WrittenRecord {
            name: record.name,
            bytes: record.text.len(),
        }))
    }

    fn name(&self) -> &'static str {
        "writer"
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.file.sync_all() {
            tracing::warn!(path = %self.path.display(), "Failed to sync output: {}", e);
        }
    }
}
