//! Per-run statistics and the run-end report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Throughput in MiB per second. A non-positive elapsed time gives 0.0.
pub fn throughput_mb_per_sec(total_bytes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    total_bytes as f64 / elapsed_secs / BYTES_PER_MB
}

/// Byte and block counters for one run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    total_bytes: u64,
    sequence: u64,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self {
            total_bytes: 0,
            sequence: 0,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

impl RunStatistics {
    /// Reset the counters and restart the clock
    pub fn start(&mut self) {
        *self = Self::default();
    }

    /// Account one successfully transferred block
    pub fn record(&mut self, bytes: usize) {
        self.total_bytes += bytes as u64;
        self.sequence += 1;
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Blocks transferred so far
    pub fn sequence_count(&self) -> u64 {
        self.sequence
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Snapshot the counters into a report for `component`
    pub fn report(&self, component: impl Into<String>) -> RunReport {
        let elapsed_secs = self.elapsed().as_secs_f64();
        RunReport {
            component: component.into(),
            started_at: self.started_at,
            elapsed_secs,
            total_bytes: self.total_bytes,
            sequence_count: self.sequence,
            throughput_mb_s: throughput_mb_per_sec(self.total_bytes, elapsed_secs),
            files_written: Vec::new(),
            discarded_blocks: 0,
            drained_blocks: 0,
            events: None,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub component: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub total_bytes: u64,
    pub sequence_count: u64,
    pub throughput_mb_s: f64,
    /// Data files produced during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_written: Vec<PathBuf>,
    /// Block held back by backpressure and dropped at stop
    #[serde(default)]
    pub discarded_blocks: u64,
    /// Blocks left on the input port and discarded at stop
    #[serde(default)]
    pub drained_blocks: u64,
    /// Events written, when the event size is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<u64>,
}

impl RunReport {
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files_written = files;
        self
    }

    pub fn with_discarded(mut self, discarded: u64) -> Self {
        self.discarded_blocks = discarded;
        self
    }

    pub fn with_drained(mut self, drained: u64) -> Self {
        self.drained_blocks = drained;
        self
    }

    /// Derive the event count from a fixed event size
    pub fn with_event_size(mut self, event_byte_size: u32) -> Self {
        if event_byte_size > 0 {
            self.events = Some(self.total_bytes / event_byte_size as u64);
        }
        self
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} blocks, {} bytes in {:.3} s ({:.3} MB/s)",
            self.component,
            self.sequence_count,
            self.total_bytes,
            self.elapsed_secs,
            self.throughput_mb_s
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        assert_eq!(throughput_mb_per_sec(104_857_600, 2.0), 50.0);
        assert_eq!(throughput_mb_per_sec(1024 * 1024, 0.5), 2.0);
    }

    #[test]
    fn test_throughput_zero_elapsed() {
        assert_eq!(throughput_mb_per_sec(1000, 0.0), 0.0);
        assert_eq!(throughput_mb_per_sec(1000, -1.0), 0.0);
    }

    #[test]
    fn test_record_and_reset() {
        let mut stats = RunStatistics::default();
        stats.record(100);
        stats.record(28);
        assert_eq!(stats.total_bytes(), 128);
        assert_eq!(stats.sequence_count(), 2);

        stats.start();
        assert_eq!(stats.total_bytes(), 0);
        assert_eq!(stats.sequence_count(), 0);
    }

    #[test]
    fn test_report_fields() {
        let mut stats = RunStatistics::default();
        stats.record(64);
        let report = stats
            .report("EtherLogger")
            .with_event_size(16)
            .with_drained(3);

        assert_eq!(report.component, "EtherLogger");
        assert_eq!(report.total_bytes, 64);
        assert_eq!(report.sequence_count, 1);
        assert_eq!(report.events, Some(4));
        assert_eq!(report.drained_blocks, 3);
        assert!(report.elapsed_secs >= 0.0);
    }

    #[test]
    fn test_unknown_event_size_has_no_event_count() {
        let report = RunStatistics::default().report("x").with_event_size(0);
        assert_eq!(report.events, None);
    }

    #[test]
    fn test_report_serializes() {
        let report = RunStatistics::default().report("EtherReader");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["component"], "EtherReader");
        assert_eq!(json["total_bytes"], 0);
        assert!(json.get("events").is_none());
        assert!(json.get("files_written").is_none());
    }
}
