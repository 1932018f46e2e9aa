//! Persistent storage for logged event data
//!
//! [`FileSink`] writes raw payload bytes into size-capped files that rotate
//! within a run. Files are named after the run number and a per-run index:
//!
//! ```text
//! <dir>/run000042_000.dat
//! <dir>/run000042_001.dat
//! ```

pub mod rotating;

pub use rotating::{check_dir, file_name, FileSink, FileSinkConfig, FILE_EXTENSION, FILE_PREFIX};
