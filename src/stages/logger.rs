//! Logger stage: framed blocks from the input port to rotating data files.
//!
//! Each tick reads at most one block. Heartbeats are skipped, anything that
//! fails framing validation or arrives out of sequence is fatal, and every
//! payload is counted whether or not logging to disk is enabled.

use crate::component::{ComponentContext, DaqComponent, RunReport, RunStatistics};
use crate::config::{LoggerConfig, ParamList};
use crate::error::{DaqError, Result, ResultExt};
use crate::port::{InPort, PortRead};
use crate::protocol::{decode, Decoded, FrameError};
use crate::sink::{check_dir, FileSink, FileSinkConfig};
use std::path::Path;

/// Component name used in logs and fatal reports
pub const LOGGER_NAME: &str = "EtherLogger";

/// Reads blocks from an [`InPort`] and persists their payloads
pub struct LoggerPipeline<I: InPort> {
    in_port: I,
    config: LoggerConfig,
    configured: bool,
    sink: Option<FileSink>,
    stats: RunStatistics,
}

impl<I: InPort> LoggerPipeline<I> {
    pub fn new(in_port: I) -> Self {
        Self {
            in_port,
            config: LoggerConfig::default(),
            configured: false,
            sink: None,
            stats: RunStatistics::default(),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn in_port(&self) -> &I {
        &self.in_port
    }

    /// File currently being written, if logging
    pub fn current_file(&self) -> Option<&Path> {
        self.sink.as_ref().map(|sink| sink.current_path())
    }

    fn release_if_stopping(ctx: &mut ComponentContext) -> bool {
        if ctx.stop_requested() {
            ctx.release_stop();
            return true;
        }
        false
    }

    fn log_progress(&self) {
        let elapsed = self.stats.elapsed().as_secs_f64();
        tracing::info!(
            "{}: {} blocks, {} bytes, {:.3} MB/s",
            LOGGER_NAME,
            self.stats.sequence_count(),
            self.stats.total_bytes(),
            crate::component::throughput_mb_per_sec(self.stats.total_bytes(), elapsed)
        );
    }

    fn close_sink(&mut self) -> Result<Vec<std::path::PathBuf>> {
        match self.sink.take() {
            Some(mut sink) => {
                let files = sink.files().to_vec();
                sink.close()?;
                Ok(files)
            }
            None => Ok(Vec::new()),
        }
    }
}

impl<I: InPort> DaqComponent for LoggerPipeline<I> {
    fn name(&self) -> &str {
        LOGGER_NAME
    }

    fn configure(&mut self, params: &ParamList) -> Result<()> {
        let config = LoggerConfig::from_params(params)?;

        if let Some(dir) = config.dir_name.as_deref() {
            check_dir(dir)?;
        }

        match &config.dir_name {
            Some(dir) => tracing::info!(
                "{} configured: logging to {:?}, run {}, max file size {} bytes",
                LOGGER_NAME,
                dir,
                config.run_number,
                config.max_file_size
            ),
            None => tracing::info!("{} configured: logging disabled", LOGGER_NAME),
        }

        self.config = config;
        self.configured = true;
        Ok(())
    }

    fn unconfigure(&mut self) {
        self.config = LoggerConfig::default();
        self.configured = false;
    }

    fn start(&mut self) -> Result<()> {
        if !self.configured {
            return Err(DaqError::Config("logger started before configure".to_string()));
        }

        // Leftovers from an aborted run
        self.close_sink()?;

        if let (true, Some(dir)) = (self.config.logging, self.config.dir_name.as_ref()) {
            self.sink = Some(FileSink::open(FileSinkConfig {
                directory: dir.clone(),
                run_number: self.config.run_number,
                max_file_size: self.config.max_file_size,
            })?);
        }

        self.stats.start();
        Ok(())
    }

    fn run(&mut self, ctx: &mut ComponentContext) -> Result<()> {
        let bytes = match self.in_port.read() {
            PortRead::Block(bytes) => bytes,
            PortRead::Timeout => {
                Self::release_if_stopping(ctx);
                return Ok(());
            }
            PortRead::Fatal => {
                if Self::release_if_stopping(ctx) {
                    return Ok(());
                }
                return Err(DaqError::InPort);
            }
        };

        let event = match decode(&bytes)? {
            Decoded::Empty => return Ok(()),
            Decoded::Event(event) => event,
        };

        let expected = self.stats.sequence_count() as u32;
        if event.sequence != expected {
            return Err(FrameError::SequenceMismatch {
                expected,
                found: event.sequence,
            }
            .into());
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.write(event.payload)?;
        }

        self.stats.record(event.payload.len());
        if self.stats.sequence_count() % self.config.mon_rate == 0 {
            self.log_progress();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<RunReport> {
        let closed = self.close_sink().context("closing data files at stop");

        let drained = self.in_port.drain();
        if drained > 0 {
            tracing::info!("{} drained {} blocks at stop", LOGGER_NAME, drained);
        }

        Ok(self
            .stats
            .report(LOGGER_NAME)
            .with_files(closed?)
            .with_drained(drained as u64)
            .with_event_size(self.config.event_byte_size))
    }

    fn abort(&mut self) {
        if let Err(e) = self.close_sink() {
            tracing::error!("{} failed to close data file: {}", LOGGER_NAME, e);
        }
    }

    fn statistics(&self) -> &RunStatistics {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalKind;
    use crate::port::{port_pair, ChannelOutPort, MockInPort, OutPort};
    use crate::protocol::{encode_with_sequence, FramedBlock};
    use std::time::Duration;
    use tempfile::TempDir;

    fn logging_params(dir: &TempDir) -> ParamList {
        ParamList::from_pairs([
            ("isLogging", "yes"),
            ("dirName", dir.path().to_str().unwrap()),
            ("runNumber", "12"),
        ])
    }

    fn pipeline() -> (ChannelOutPort, LoggerPipeline<crate::port::ChannelInPort>) {
        let (out_port, in_port) = port_pair(16, Duration::from_millis(1));
        (out_port, LoggerPipeline::new(in_port))
    }

    fn send(out_port: &mut ChannelOutPort, payload: &[u8], sequence: u32) {
        out_port.write(&encode_with_sequence(payload, sequence));
    }

    #[test]
    fn test_configure_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let (_out, mut logger) = pipeline();

        let params = ParamList::from_pairs([
            ("isLogging", "yes"),
            ("dirName", missing.to_str().unwrap()),
        ]);
        let err = logger.configure(&params).unwrap_err();
        assert_eq!(err.kind(), FatalKind::BadDirectory);
    }

    #[test]
    fn test_logs_payloads_to_file() {
        let dir = TempDir::new().unwrap();
        let (mut out_port, mut logger) = pipeline();
        logger.configure(&logging_params(&dir)).unwrap();
        logger.start().unwrap();
        assert!(logger
            .current_file()
            .unwrap()
            .ends_with("run000012_000.dat"));

        send(&mut out_port, b"first", 0);
        send(&mut out_port, b"second", 1);
        let mut ctx = ComponentContext::new();
        logger.run(&mut ctx).unwrap();
        logger.run(&mut ctx).unwrap();

        let report = logger.stop().unwrap();
        assert_eq!(report.sequence_count, 2);
        assert_eq!(report.total_bytes, 11);
        assert_eq!(report.files_written.len(), 1);
        assert_eq!(
            std::fs::read(&report.files_written[0]).unwrap(),
            b"firstsecond"
        );
        assert!(logger.current_file().is_none());
    }

    #[test]
    fn test_counts_without_logging() {
        let (mut out_port, mut logger) = pipeline();
        logger.configure(&ParamList::new()).unwrap();
        logger.start().unwrap();
        assert!(logger.current_file().is_none());

        send(&mut out_port, &[1u8; 100], 0);
        logger.run(&mut ComponentContext::new()).unwrap();

        let report = logger.stop().unwrap();
        assert_eq!(report.total_bytes, 100);
        assert!(report.files_written.is_empty());
    }

    #[test]
    fn test_heartbeat_is_noop() {
        let (mut out_port, mut logger) = pipeline();
        logger.configure(&ParamList::new()).unwrap();
        logger.start().unwrap();

        out_port.write(&FramedBlock::heartbeat());
        logger.run(&mut ComponentContext::new()).unwrap();
        assert_eq!(logger.statistics().sequence_count(), 0);
        assert_eq!(logger.statistics().total_bytes(), 0);
    }

    #[test]
    fn test_corrupt_block_is_fatal_and_not_written() {
        let dir = TempDir::new().unwrap();
        let (mut out_port, mut logger) = pipeline();
        logger.configure(&logging_params(&dir)).unwrap();
        logger.start().unwrap();

        let mut bytes = encode_with_sequence(b"payload", 0).into_bytes();
        bytes[0] = 0;
        out_port.write(&FramedBlock::from_bytes(bytes));

        let err = logger.run(&mut ComponentContext::new()).unwrap_err();
        assert_eq!(err.kind(), FatalKind::FramingError);

        logger.abort();
        let file = dir.path().join("run000012_000.dat");
        assert_eq!(std::fs::metadata(file).unwrap().len(), 0);
    }

    #[test]
    fn test_sequence_gap_is_fatal() {
        let (mut out_port, mut logger) = pipeline();
        logger.configure(&ParamList::new()).unwrap();
        logger.start().unwrap();

        send(&mut out_port, b"a", 0);
        send(&mut out_port, b"c", 2);
        let mut ctx = ComponentContext::new();
        logger.run(&mut ctx).unwrap();
        let err = logger.run(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            DaqError::Framing(FrameError::SequenceMismatch {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_stop_request_released_when_port_idle() {
        let (_out_port, mut logger) = pipeline();
        logger.configure(&ParamList::new()).unwrap();
        logger.start().unwrap();

        let mut ctx = ComponentContext::new();
        ctx.request_stop();
        logger.run(&mut ctx).unwrap();
        assert!(ctx.is_stop_released());
    }

    #[test]
    fn test_in_port_fatal() {
        let mut in_port = MockInPort::new();
        in_port.expect_read().return_const(PortRead::Fatal);
        let mut logger = LoggerPipeline::new(in_port);
        logger.configure(&ParamList::new()).unwrap();
        logger.start().unwrap();

        let err = logger.run(&mut ComponentContext::new()).unwrap_err();
        assert_eq!(err.kind(), FatalKind::InPortError);

        // While stopping, a dead port just lets the stop through
        let mut ctx = ComponentContext::new();
        ctx.request_stop();
        logger.run(&mut ctx).unwrap();
        assert!(ctx.is_stop_released());
    }

    #[test]
    fn test_stop_drains_port() {
        let (mut out_port, mut logger) = pipeline();
        logger.configure(&ParamList::new()).unwrap();
        logger.start().unwrap();

        for seq in 0..4 {
            send(&mut out_port, b"late", seq);
        }
        let report = logger.stop().unwrap();
        assert_eq!(report.drained_blocks, 4);
        assert_eq!(report.sequence_count, 0);
        assert_eq!(logger.in_port().buffered(), 0);
    }

    #[test]
    fn test_event_count_in_report() {
        let (mut out_port, mut logger) = pipeline();
        let params = ParamList::from_pairs([("eventByteSize", "4")]);
        logger.configure(&params).unwrap();
        logger.start().unwrap();

        send(&mut out_port, &[0u8; 64], 0);
        logger.run(&mut ComponentContext::new()).unwrap();
        assert_eq!(logger.stop().unwrap().events, Some(16));
    }

    #[test]
    fn test_rotation_within_run() {
        let dir = TempDir::new().unwrap();
        let (mut out_port, mut logger) = pipeline();
        let params = logging_params(&dir).with("maxFileSizeInMegaByte", "1");
        logger.configure(&params).unwrap();
        logger.start().unwrap();

        let chunk = vec![0xEEu8; 400 * 1024];
        let mut ctx = ComponentContext::new();
        for seq in 0..3 {
            send(&mut out_port, &chunk, seq);
            logger.run(&mut ctx).unwrap();
        }

        let report = logger.stop().unwrap();
        assert_eq!(report.files_written.len(), 2);
        assert_eq!(
            std::fs::metadata(&report.files_written[0]).unwrap().len(),
            800 * 1024
        );
        assert_eq!(
            std::fs::metadata(&report.files_written[1]).unwrap().len(),
            400 * 1024
        );
    }

    #[test]
    fn test_restart_with_same_run_number_fails() {
        let dir = TempDir::new().unwrap();
        let (_out_port, mut logger) = pipeline();
        logger.configure(&logging_params(&dir)).unwrap();
        logger.start().unwrap();
        logger.stop().unwrap();

        let err = logger.start().unwrap_err();
        assert_eq!(err.kind(), FatalKind::CannotOpenFile);
    }
}
