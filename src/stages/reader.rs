//! Reader stage: network source to framed blocks on the output port.
//!
//! Each tick reads exactly `bufsize` bytes from the source, frames them and
//! writes the block downstream. When the port is full the block is held and
//! retried on later ticks; no new data is read from the network until it has
//! been handed over, so at most one block is ever buffered here.

use crate::component::{ComponentContext, DaqComponent, RunReport, RunStatistics};
use crate::config::{ParamList, ReaderConfig};
use crate::error::{DaqError, Result};
use crate::port::{OutPort, PortStatus};
use crate::protocol::{encode_with_sequence, FramedBlock};
use crate::source::{EventSource, ReadStatus};

/// Component name used in logs and fatal reports
pub const READER_NAME: &str = "EtherReader";

/// Reads events from an [`EventSource`] and writes them to an [`OutPort`]
pub struct ReaderPipeline<S: EventSource, O: OutPort> {
    source: S,
    out_port: O,
    config: Option<ReaderConfig>,
    /// Read buffer, sized at configure
    buffer: Vec<u8>,
    /// Block waiting for the port to accept it
    pending: Option<FramedBlock>,
    stats: RunStatistics,
}

impl<S: EventSource, O: OutPort> ReaderPipeline<S, O> {
    pub fn new(source: S, out_port: O) -> Self {
        Self {
            source,
            out_port,
            config: None,
            buffer: Vec::new(),
            pending: None,
            stats: RunStatistics::default(),
        }
    }

    pub fn config(&self) -> Option<&ReaderConfig> {
        self.config.as_ref()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn out_port(&self) -> &O {
        &self.out_port
    }

    /// Whether a block is held back by backpressure
    pub fn has_pending_write(&self) -> bool {
        self.pending.is_some()
    }

    fn read_block(&mut self) -> Result<FramedBlock> {
        match self.source.read_all(&mut self.buffer) {
            ReadStatus::Ok => {
                // Footer carries the low 32 bits of the block count
                let sequence = self.stats.sequence_count() as u32;
                Ok(encode_with_sequence(&self.buffer, sequence))
            }
            ReadStatus::Timeout => Err(DaqError::SocketTimeout(format!(
                "no {} byte event within the read timeout",
                self.buffer.len()
            ))),
            ReadStatus::Fatal => Err(DaqError::Socket("read from data source failed".to_string())),
        }
    }
}

impl<S: EventSource, O: OutPort> DaqComponent for ReaderPipeline<S, O> {
    fn name(&self) -> &str {
        READER_NAME
    }

    fn configure(&mut self, params: &ParamList) -> Result<()> {
        let config = ReaderConfig::from_params(params)?;
        tracing::info!(
            "{} configured: source {}:{}, {} byte reads",
            READER_NAME,
            config.src_addr,
            config.src_port,
            config.bufsize
        );

        self.buffer = vec![0u8; config.bufsize];
        self.config = Some(config);
        Ok(())
    }

    fn unconfigure(&mut self) {
        self.config = None;
        self.buffer = Vec::new();
    }

    fn start(&mut self) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| DaqError::Config("reader started before configure".to_string()))?;

        self.source.connect(&config.src_addr, config.src_port)?;

        if self.out_port.connected_consumers() == 0 {
            return Err(DaqError::DatapathDisconnected);
        }

        self.pending = None;
        self.stats.start();
        Ok(())
    }

    fn run(&mut self, ctx: &mut ComponentContext) -> Result<()> {
        if ctx.stop_requested() {
            ctx.release_stop();
            return Ok(());
        }

        let block = match self.pending.take() {
            Some(block) => block,
            None => self.read_block()?,
        };

        match self.out_port.write(&block) {
            PortStatus::Success => {
                self.stats.record(block.payload_len());
                tracing::trace!(
                    "{} sent block {} ({} bytes)",
                    READER_NAME,
                    self.stats.sequence_count(),
                    block.payload_len()
                );
                Ok(())
            }
            PortStatus::Timeout => {
                self.pending = Some(block);
                Ok(())
            }
            PortStatus::Fatal => Err(DaqError::OutPort),
        }
    }

    fn stop(&mut self) -> Result<RunReport> {
        self.source.disconnect();

        let discarded = u64::from(self.pending.take().is_some());
        if discarded > 0 {
            tracing::warn!("{} discarded a block still waiting for the port", READER_NAME);
        }

        Ok(self.stats.report(READER_NAME).with_discarded(discarded))
    }

    fn abort(&mut self) {
        self.source.disconnect();
        self.pending = None;
    }

    fn statistics(&self) -> &RunStatistics {
        &self.stats
    }
}
