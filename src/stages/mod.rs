//! The two pipeline stages of the data path
//!
//! ```text
//! EventSource ──> ReaderPipeline ──> port ──> LoggerPipeline ──> FileSink
//! ```
//!
//! Both are [`DaqComponent`](crate::component::DaqComponent)s and share
//! nothing but the port between them.

pub mod logger;
pub mod reader;

pub use logger::{LoggerPipeline, LOGGER_NAME};
pub use reader::{ReaderPipeline, READER_NAME};
