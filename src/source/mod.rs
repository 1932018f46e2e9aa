//! Network data source contract
//!
//! The reader stage only needs three things from its transport: connect,
//! fill a buffer completely within a bounded time, and disconnect. Both the
//! real socket ([`TcpEventSource`]) and the [`ScriptedSource`] used for tests
//! and dry runs implement [`EventSource`].

pub mod mock;
pub mod tcp;

pub use mock::{ScriptedPattern, ScriptedSource};
pub use tcp::{TcpEventSource, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};

use crate::error::Result;

/// Outcome of a [`EventSource::read_all`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The whole buffer was filled
    Ok,
    /// The buffer could not be filled within the read timeout
    Timeout,
    /// The connection is broken or closed
    Fatal,
}

/// Unified interface for event data sources
///
/// Implementations must be `Send` so a stage can be moved onto its
/// scheduler thread.
#[cfg_attr(test, mockall::automock)]
pub trait EventSource: Send {
    /// Connect to the data server at `address:port`
    fn connect(&mut self, address: &str, port: u16) -> Result<()>;

    /// Fill `buf` completely
    fn read_all(&mut self, buf: &mut [u8]) -> ReadStatus;

    /// Close the connection. Safe to call when not connected.
    fn disconnect(&mut self);

    /// Check if a connection is open
    fn is_connected(&self) -> bool;
}
