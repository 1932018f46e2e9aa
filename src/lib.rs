//! # etherdaq: Ethernet reader and file logger stages for a DAQ data path
//!
//! Two pipeline stages connected by a transport port:
//!
//! - **Reader**: pulls fixed-size events from a network data server, frames
//!   each one and writes it to the port, holding the block under
//!   backpressure instead of reading more
//! - **Logger**: reads blocks from the port, validates them and writes the
//!   payloads into size-capped files that rotate within a run
//!
//! Both are driven through the same lifecycle
//! (configure, start, run ticks, pause/resume, stop) by a
//! [`ComponentHost`](component::ComponentHost), which owns the command
//! channel and reports fatal errors to the operator.
//!
//! ## Example
//!
//! ```ignore
//! use etherdaq::{
//!     component::ComponentHost,
//!     config::ParamList,
//!     port::{port_pair, DEFAULT_PORT_CAPACITY, DEFAULT_PORT_TIMEOUT},
//!     source::TcpEventSource,
//!     stages::{LoggerPipeline, ReaderPipeline},
//! };
//! use std::time::Duration;
//!
//! let (out_port, in_port) = port_pair(DEFAULT_PORT_CAPACITY, DEFAULT_PORT_TIMEOUT);
//! let (mut reader, reader_handle) =
//!     ComponentHost::new(ReaderPipeline::new(TcpEventSource::new(), out_port), Duration::ZERO);
//! let (mut logger, logger_handle) =
//!     ComponentHost::new(LoggerPipeline::new(in_port), Duration::ZERO);
//!
//! std::thread::spawn(move || reader.run());
//! std::thread::spawn(move || logger.run());
//!
//! logger_handle.configure(ParamList::from_pairs([("isLogging", "yes"), ("dirName", "/data")]));
//! reader_handle.configure(ParamList::from_pairs([("srcAddr", "10.0.0.2"), ("srcPort", "24")]));
//! logger_handle.start();
//! reader_handle.start();
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod port;
pub mod protocol;
pub mod sink;
pub mod source;
pub mod stages;

// Re-export commonly used types
pub use component::{Command, ComponentHost, DaqComponent, HostHandle, RunReport, RunState};
pub use config::{LoggerConfig, ParamList, ReaderConfig, Settings};
pub use error::{DaqError, FatalKind, FatalReport, Result};
pub use stages::{LoggerPipeline, ReaderPipeline};
