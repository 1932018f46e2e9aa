//! In-process transport port backed by a bounded crossbeam channel.
//!
//! The channel capacity is the only buffering between producer and consumer;
//! once it is full, writes time out and the producer holds its block.

use super::{InPort, OutPort, PortRead, PortStatus};
use crate::protocol::FramedBlock;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default number of blocks buffered in a port
pub const DEFAULT_PORT_CAPACITY: usize = 64;

/// Default time a port operation may block
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(10);

/// Create a connected output/input port pair.
pub fn port_pair(capacity: usize, timeout: Duration) -> (ChannelOutPort, ChannelInPort) {
    let (tx, rx) = bounded(capacity.max(1));
    let consumers = Arc::new(AtomicUsize::new(0));

    let out_port = ChannelOutPort {
        tx,
        timeout,
        consumers: consumers.clone(),
    };
    let in_port = ChannelInPort::attach(rx, timeout, consumers);

    (out_port, in_port)
}

/// Producer half of an in-process port
pub struct ChannelOutPort {
    tx: Sender<Vec<u8>>,
    timeout: Duration,
    consumers: Arc<AtomicUsize>,
}

impl ChannelOutPort {
    /// Blocks currently buffered
    pub fn buffered(&self) -> usize {
        self.tx.len()
    }
}

impl OutPort for ChannelOutPort {
    fn write(&mut self, block: &FramedBlock) -> PortStatus {
        match self.tx.send_timeout(block.as_bytes().to_vec(), self.timeout) {
            Ok(()) => PortStatus::Success,
            Err(SendTimeoutError::Timeout(_)) => PortStatus::Timeout,
            Err(SendTimeoutError::Disconnected(_)) => PortStatus::Fatal,
        }
    }

    fn connected_consumers(&self) -> usize {
        self.consumers.load(Ordering::Acquire)
    }
}

/// Consumer half of an in-process port
///
/// Counts itself as a connected consumer for as long as it is alive.
pub struct ChannelInPort {
    rx: Receiver<Vec<u8>>,
    timeout: Duration,
    consumers: Arc<AtomicUsize>,
}

impl ChannelInPort {
    fn attach(rx: Receiver<Vec<u8>>, timeout: Duration, consumers: Arc<AtomicUsize>) -> Self {
        consumers.fetch_add(1, Ordering::AcqRel);
        Self {
            rx,
            timeout,
            consumers,
        }
    }

    /// Blocks currently buffered
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }
}

impl InPort for ChannelInPort {
    fn read(&mut self) -> PortRead {
        match self.rx.recv_timeout(self.timeout) {
            Ok(bytes) => PortRead::Block(bytes),
            Err(RecvTimeoutError::Timeout) => PortRead::Timeout,
            Err(RecvTimeoutError::Disconnected) => PortRead::Fatal,
        }
    }

    fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

impl Drop for ChannelInPort {
    fn drop(&mut self) {
        self.consumers.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    fn fast_pair(capacity: usize) -> (ChannelOutPort, ChannelInPort) {
        port_pair(capacity, Duration::from_millis(1))
    }

    #[test]
    fn test_write_then_read() {
        let (mut out_port, mut in_port) = fast_pair(4);
        let block = encode(b"hello");

        assert_eq!(out_port.write(&block), PortStatus::Success);
        assert_eq!(in_port.read(), PortRead::Block(block.into_bytes()));
    }

    #[test]
    fn test_read_on_empty_port_times_out() {
        let (_out_port, mut in_port) = fast_pair(4);
        assert_eq!(in_port.read(), PortRead::Timeout);
        assert_eq!(in_port.read().status(), PortStatus::Timeout);
    }

    #[test]
    fn test_full_port_times_out() {
        let (mut out_port, _in_port) = fast_pair(1);
        let block = encode(b"x");

        assert_eq!(out_port.write(&block), PortStatus::Success);
        assert_eq!(out_port.write(&block), PortStatus::Timeout);
        assert_eq!(out_port.buffered(), 1);
    }

    #[test]
    fn test_write_without_consumer_is_fatal() {
        let (mut out_port, in_port) = fast_pair(1);
        assert_eq!(out_port.connected_consumers(), 1);

        drop(in_port);
        assert_eq!(out_port.connected_consumers(), 0);
        assert_eq!(out_port.write(&encode(b"x")), PortStatus::Fatal);
    }

    #[test]
    fn test_read_after_producer_gone_is_fatal() {
        let (mut out_port, mut in_port) = fast_pair(2);
        out_port.write(&encode(b"last"));
        drop(out_port);

        // Buffered data is still delivered before the disconnect surfaces
        assert!(matches!(in_port.read(), PortRead::Block(_)));
        assert_eq!(in_port.read(), PortRead::Fatal);
    }

    #[test]
    fn test_drain_empties_port() {
        let (mut out_port, mut in_port) = fast_pair(8);
        for _ in 0..5 {
            out_port.write(&encode(b"data"));
        }
        assert_eq!(in_port.buffered(), 5);
        assert_eq!(in_port.drain(), 5);
        assert_eq!(in_port.buffered(), 0);
        assert_eq!(in_port.drain(), 0);
    }
}
