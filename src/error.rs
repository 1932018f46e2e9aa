//! Error handling for etherdaq
//!
//! Every condition that stops a stage is a [`DaqError`]. Each error maps onto
//! exactly one [`FatalKind`], which is the category the operator sees on the
//! fatal-report channel. Port timeouts are not errors and never show up here.

use crate::protocol::FrameError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for etherdaq operations
#[derive(Error, Debug)]
pub enum DaqError {
    /// `srcAddr` missing from the reader parameters
    #[error("Data source address not specified")]
    NoSourceAddress,

    /// `srcPort` missing from the reader parameters
    #[error("Data source port not specified")]
    NoSourcePort,

    /// A parameter is present but unusable
    #[error("Invalid parameter {name}={value:?}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// The logging directory is missing or cannot be written
    #[error("Cannot use directory {path:?}: {reason}")]
    BadDirectory { path: PathBuf, reason: String },

    /// Socket connect/read failure
    #[error("Socket error: {0}")]
    Socket(String),

    /// Socket read did not complete within its timeout
    #[error("Socket timeout: {0}")]
    SocketTimeout(String),

    /// Nobody is listening on the output port
    #[error("Data path disconnected: no consumer on the output port")]
    DatapathDisconnected,

    /// Output port reported a fatal condition
    #[error("Output port error")]
    OutPort,

    /// Input port reported a fatal condition
    #[error("Input port error")]
    InPort,

    /// A data file could not be created
    #[error("Cannot open file {path:?}: {source}")]
    CannotOpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing or flushing a data file failed
    #[error("Cannot write data: {0}")]
    CannotWriteData(#[source] std::io::Error),

    /// A block on the port failed structural validation
    #[error("Framing error: {0}")]
    Framing(#[from] FrameError),

    /// Errors related to settings loading/saving or lifecycle misuse
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DaqError>,
    },
}

impl DaqError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DaqError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for an [`DaqError::InvalidParameter`]
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DaqError::InvalidParameter {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// The fatal category reported to the operator for this error
    pub fn kind(&self) -> FatalKind {
        match self {
            DaqError::NoSourceAddress => FatalKind::NoSourceAddress,
            DaqError::NoSourcePort => FatalKind::NoSourcePort,
            DaqError::InvalidParameter { .. } | DaqError::Config(_) => FatalKind::InvalidParameter,
            DaqError::BadDirectory { .. } => FatalKind::BadDirectory,
            DaqError::Socket(_) => FatalKind::SocketError,
            DaqError::SocketTimeout(_) => FatalKind::SocketTimeout,
            DaqError::DatapathDisconnected => FatalKind::DatapathDisconnected,
            DaqError::OutPort => FatalKind::OutPortError,
            DaqError::InPort => FatalKind::InPortError,
            DaqError::CannotOpenFile { .. } => FatalKind::CannotOpenFile,
            DaqError::CannotWriteData(_) => FatalKind::CannotWriteData,
            DaqError::Framing(_) => FatalKind::FramingError,
            DaqError::WithContext { source, .. } => source.kind(),
        }
    }

    /// Whether this error was raised while resolving configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.kind(),
            FatalKind::NoSourceAddress
                | FatalKind::NoSourcePort
                | FatalKind::InvalidParameter
                | FatalKind::BadDirectory
        )
    }
}

/// Result type alias for etherdaq operations
pub type Result<T> = std::result::Result<T, DaqError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Category tag carried by every fatal report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FatalKind {
    NoSourceAddress,
    NoSourcePort,
    InvalidParameter,
    BadDirectory,
    SocketError,
    SocketTimeout,
    DatapathDisconnected,
    OutPortError,
    InPortError,
    CannotOpenFile,
    CannotWriteData,
    FramingError,
}

impl std::fmt::Display for FatalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FatalKind::NoSourceAddress => "NO_SOURCE_ADDRESS",
            FatalKind::NoSourcePort => "NO_SOURCE_PORT",
            FatalKind::InvalidParameter => "INVALID_PARAMETER",
            FatalKind::BadDirectory => "BAD_DIR",
            FatalKind::SocketError => "SOCKET_FATAL_ERROR",
            FatalKind::SocketTimeout => "SOCKET_TIMEOUT",
            FatalKind::DatapathDisconnected => "DATAPATH_DISCONNECTED",
            FatalKind::OutPortError => "OUTPORT_ERROR",
            FatalKind::InPortError => "INPORT_ERROR",
            FatalKind::CannotOpenFile => "CANNOT_OPEN_FILE",
            FatalKind::CannotWriteData => "CANNOT_WRITE_DATA",
            FatalKind::FramingError => "FRAMING_ERROR",
        };
        f.write_str(name)
    }
}

/// A fatal condition surfaced to the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatalReport {
    /// Name of the component that failed
    pub component: String,
    /// Category of the failure
    pub kind: FatalKind,
    /// Free-text detail
    pub detail: Option<String>,
    /// Raised while resolving parameters; fixed by a new Configure
    #[serde(default)]
    pub configuration: bool,
    /// When the failure was reported
    pub at: DateTime<Utc>,
}

impl FatalReport {
    /// Build a report from an error raised by `component`
    pub fn from_error(component: impl Into<String>, error: &DaqError) -> Self {
        Self {
            component: component.into(),
            kind: error.kind(),
            detail: Some(error.to_string()),
            configuration: error.is_configuration_error(),
            at: Utc::now(),
        }
    }
}

impl std::fmt::Display for FatalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "[{}] {}: {}", self.component, self.kind, detail),
            None => write!(f, "[{}] {}", self.component, self.kind),
        }
    }
}
