//! Rotating, size-capped file writer.
//!
//! Before each write the sink checks whether the write would push the current
//! file past `max_file_size`; if so the current file is closed and the next
//! one opened first. A write is never split across files. A write larger than
//! the cap on its own lands in a fresh file by itself.

use crate::error::{DaqError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Prefix of every data file name
pub const FILE_PREFIX: &str = "run";

/// Extension of every data file
pub const FILE_EXTENSION: &str = "dat";

/// Write buffer size per open file
const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Name of the `index`-th file of run `run_number`
pub fn file_name(run_number: u32, index: u32) -> String {
    format!(
        "{}{:06}_{:03}.{}",
        FILE_PREFIX, run_number, index, FILE_EXTENSION
    )
}

/// Check that `path` is an existing, writable directory
pub fn check_dir(path: &Path) -> Result<()> {
    let bad = |reason: String| DaqError::BadDirectory {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(path).map_err(|e| bad(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(bad("not a directory".to_string()));
    }
    if metadata.permissions().readonly() {
        return Err(bad("directory is read-only".to_string()));
    }
    Ok(())
}

/// Where and how a run's files are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    /// Destination directory
    pub directory: PathBuf,
    /// Run number used in file names
    pub run_number: u32,
    /// Maximum bytes per file, 0 = no rotation
    pub max_file_size: u64,
}

/// Rotating data file writer owned by the logger for one run
#[derive(Debug)]
pub struct FileSink {
    config: FileSinkConfig,
    writer: Option<BufWriter<File>>,
    current_path: PathBuf,
    file_index: u32,
    file_bytes: u64,
    total_bytes: u64,
    files: Vec<PathBuf>,
}

impl FileSink {
    /// Open the first file of the run
    pub fn open(config: FileSinkConfig) -> Result<Self> {
        let mut sink = Self {
            current_path: config.directory.join(file_name(config.run_number, 0)),
            config,
            writer: None,
            file_index: 0,
            file_bytes: 0,
            total_bytes: 0,
            files: Vec::new(),
        };
        sink.open_current()?;
        Ok(sink)
    }

    /// Append `data` to the run, rotating first if it would overflow the current file
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        if self.needs_rotation(data.len() as u64) {
            self.rotate()?;
        }

        let writer = self.writer.as_mut().ok_or_else(|| {
            DaqError::CannotWriteData(std::io::Error::other("file sink is closed"))
        })?;
        writer.write_all(data).map_err(DaqError::CannotWriteData)?;

        self.file_bytes += data.len() as u64;
        self.total_bytes += data.len() as u64;
        Ok(())
    }

    /// Flush and close the current file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(DaqError::CannotWriteData)?;
            writer
                .get_ref()
                .sync_all()
                .map_err(DaqError::CannotWriteData)?;
            tracing::info!(
                "Closed {:?} after {} bytes",
                self.current_path,
                self.file_bytes
            );
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Path of the file currently (or last) written
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Bytes written to the current file
    pub fn file_bytes(&self) -> u64 {
        self.file_bytes
    }

    /// Bytes written during the whole run
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Every file opened during the run, in order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn config(&self) -> &FileSinkConfig {
        &self.config
    }

    fn needs_rotation(&self, incoming: u64) -> bool {
        self.config.max_file_size > 0
            && self.file_bytes > 0
            && self.file_bytes + incoming > self.config.max_file_size
    }

    fn rotate(&mut self) -> Result<()> {
        self.close()?;
        self.file_index += 1;
        self.current_path = self
            .config
            .directory
            .join(file_name(self.config.run_number, self.file_index));
        self.open_current()
    }

    fn open_current(&mut self) -> Result<()> {
        // Never overwrite data from an earlier run with the same number
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.current_path)
            .map_err(|source| DaqError::CannotOpenFile {
                path: self.current_path.clone(),
                source,
            })?;

        tracing::info!("Opened data file {:?}", self.current_path);
        self.writer = Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
        self.file_bytes = 0;
        self.files.push(self.current_path.clone());
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to close {:?}: {}", self.current_path, e);
        }
    }
}
