//! File destination.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::envelope::{Destination, LogEnvelope};
use crate::error::GatewayError;
use crate::format::Formatter;

use super::DestinationWriter;

/// Appends one rendered line per entry to a log file.
///
/// Thread-safe via internal mutex. The parent directory is created if it
/// does not exist.
pub struct FileWriter {
    file: Mutex<File>,
    path: PathBuf,
    formatter: Box<dyn Formatter>,
}

impl FileWriter {
    /// Open (or create) the log file for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - File cannot be opened for appending
    pub fn new(path: &Path, formatter: Box<dyn Formatter>) -> Result<Self, GatewayError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "File destination initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            formatter,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DestinationWriter for FileWriter {
    fn destination(&self) -> Destination {
        Destination::File
    }

    fn write(&self, envelope: &LogEnvelope) -> Result<(), GatewayError> {
        let line = self.formatter.render(envelope);
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), GatewayError> {
        let file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync log file");
        }
        Ok(())
    }
}
