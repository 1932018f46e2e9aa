//! Scripted data source for tests and dry runs
//!
//! Generates event bytes from a [`ScriptedPattern`] without touching the
//! network. A queue of [`ReadStatus`] values can be scripted to simulate
//! timeouts and broken connections on specific reads.
//!
//! ```ignore
//! use etherdaq::source::{ReadStatus, ScriptedPattern, ScriptedSource};
//!
//! let source = ScriptedSource::new()
//!     .with_pattern(ScriptedPattern::Constant(0xAB))
//!     .with_script([ReadStatus::Ok, ReadStatus::Timeout]);
//! ```

use super::{EventSource, ReadStatus};
use crate::error::{DaqError, Result};
use std::collections::VecDeque;

/// How payload bytes are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptedPattern {
    /// Every byte has the same value
    Constant(u8),
    /// Bytes count up and wrap at 255, continuing across reads
    #[default]
    Counter,
}

/// Event source that produces data from a pattern
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pattern: ScriptedPattern,
    script: VecDeque<ReadStatus>,
    refuse_connect: bool,
    connected: bool,
    next_byte: u8,
    reads: u64,
    connects: u64,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: ScriptedPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Statuses returned by successive reads; once exhausted every read succeeds.
    pub fn with_script(mut self, script: impl IntoIterator<Item = ReadStatus>) -> Self {
        self.script = script.into_iter().collect();
        self
    }

    /// Make every connect attempt fail
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connect = true;
        self
    }

    /// Number of `read_all` calls so far
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Number of successful connects so far
    pub fn connects(&self) -> u64 {
        self.connects
    }

    fn fill(&mut self, buf: &mut [u8]) {
        match self.pattern {
            ScriptedPattern::Constant(value) => buf.fill(value),
            ScriptedPattern::Counter => {
                for byte in buf.iter_mut() {
                    *byte = self.next_byte;
                    self.next_byte = self.next_byte.wrapping_add(1);
                }
            }
        }
    }
}

impl EventSource for ScriptedSource {
    fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        if self.refuse_connect {
            return Err(DaqError::Socket(format!(
                "connection to {}:{} refused",
                address, port
            )));
        }
        tracing::debug!("Scripted source connected as {}:{}", address, port);
        self.connected = true;
        self.connects += 1;
        Ok(())
    }

    fn read_all(&mut self, buf: &mut [u8]) -> ReadStatus {
        self.reads += 1;
        if !self.connected {
            return ReadStatus::Fatal;
        }

        let status = self.script.pop_front().unwrap_or(ReadStatus::Ok);
        if status == ReadStatus::Ok {
            self.fill(buf);
        }
        status
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_pattern_continues_across_reads() {
        let mut source = ScriptedSource::new();
        source.connect("mock", 1).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(source.read_all(&mut buf), ReadStatus::Ok);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(source.read_all(&mut buf), ReadStatus::Ok);
        assert_eq!(buf, [4, 5, 6, 7]);
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn test_script_is_consumed_in_order() {
        let mut source = ScriptedSource::new()
            .with_pattern(ScriptedPattern::Constant(9))
            .with_script([ReadStatus::Timeout, ReadStatus::Fatal]);
        source.connect("mock", 1).unwrap();

        let mut buf = [0u8; 2];
        assert_eq!(source.read_all(&mut buf), ReadStatus::Timeout);
        assert_eq!(source.read_all(&mut buf), ReadStatus::Fatal);
        assert_eq!(buf, [0, 0]);
        assert_eq!(source.read_all(&mut buf), ReadStatus::Ok);
        assert_eq!(buf, [9, 9]);
    }

    #[test]
    fn test_refused_connection() {
        let mut source = ScriptedSource::new().refusing_connections();
        assert!(source.connect("mock", 1).is_err());
        assert!(!source.is_connected());

        let mut buf = [0u8; 1];
        assert_eq!(source.read_all(&mut buf), ReadStatus::Fatal);
    }
}
