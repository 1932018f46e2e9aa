//! Port I/O contract between stages.
//!
//! A port write or read ends in exactly one of three outcomes:
//!
//! - **Success**: the block was handed over (or received).
//! - **Timeout**: transient backpressure. The caller retries the *same*
//!   item on its next tick and must not touch its statistics.
//! - **Fatal**: the port is unusable. The caller escalates and never retries.
//!
//! The in-process implementation lives in [`channel`]; any other transport
//! only needs to implement [`OutPort`] / [`InPort`].

pub mod channel;

pub use channel::{port_pair, ChannelInPort, ChannelOutPort, DEFAULT_PORT_CAPACITY, DEFAULT_PORT_TIMEOUT};

use crate::protocol::FramedBlock;

/// Outcome of a port operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    Success,
    Timeout,
    Fatal,
}

/// Outcome of a port read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortRead {
    /// A block was received
    Block(Vec<u8>),
    /// Nothing arrived within the port timeout
    Timeout,
    /// The port is broken (e.g. the producer side is gone)
    Fatal,
}

impl PortRead {
    /// Collapse to the three-way status
    pub fn status(&self) -> PortStatus {
        match self {
            PortRead::Block(_) => PortStatus::Success,
            PortRead::Timeout => PortStatus::Timeout,
            PortRead::Fatal => PortStatus::Fatal,
        }
    }
}

/// Producer side of a transport port
#[cfg_attr(test, mockall::automock)]
pub trait OutPort: Send {
    /// Hand `block` to the port, waiting at most the port timeout.
    fn write(&mut self, block: &FramedBlock) -> PortStatus;

    /// Number of consumers currently attached to this port.
    fn connected_consumers(&self) -> usize;
}

/// Consumer side of a transport port
#[cfg_attr(test, mockall::automock)]
pub trait InPort: Send {
    /// Receive the next block, waiting at most the port timeout.
    fn read(&mut self) -> PortRead;

    /// Read and discard everything currently buffered. Returns the number of
    /// blocks discarded.
    fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let PortRead::Block(_) = self.read() {
            drained += 1;
        }
        drained
    }
}
