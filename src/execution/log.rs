//! Job log - collects the output of every step into one file

use crate::execution::executor::OutputStream;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Append-only log file shared by all steps of a job
#[derive(Debug)]
pub struct JobLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JobLog {
    /// Create (or truncate) the log file, creating parent directories
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a step header line
    pub fn step_header(&self, step_name: &str) {
        self.write_line(&format!("==> {}", step_name));
    }

    /// Write one line of command output
    pub fn output_line(&self, stream: OutputStream, line: &str) {
        match stream {
            OutputStream::Stdout => self.write_line(line),
            OutputStream::Stderr => self.write_line(&format!("[stderr] {}", line)),
        }
    }

    fn write_line(&self, line: &str) {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line) {
            warn!("Failed to write to job log {}: {}", self.path.display(), e);
        }
    }

    /// Flush buffered lines to disk
    pub fn flush(&self) -> std::io::Result<()> {
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        writer.flush()
    }
}
