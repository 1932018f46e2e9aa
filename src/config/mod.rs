//! Configuration for the acquisition stages
//!
//! Stages receive their configuration as a flat, ordered list of string
//! key/value pairs ([`ParamList`]) at Configure time. Each stage resolves the
//! list once into a validated struct:
//!
//! - [`ReaderConfig`] - `srcAddr`, `srcPort`, `bufsize_kb`
//! - [`LoggerConfig`] - `isLogging`, `dirName`, `maxFileSizeInMegaByte`,
//!   `runNumber`, `eventByteSize`, `monRate`
//!
//! Keys are case-sensitive. Integers are parsed strictly; a malformed value is
//! an [`DaqError::InvalidParameter`] rather than a silent default.
//!
//! The binary additionally reads a TOML settings file, see [`settings`].
//!
//! # Example
//!
//! ```ignore
//! use etherdaq::config::{ParamList, ReaderConfig};
//!
//! let params = ParamList::from_pairs([("srcAddr", "127.0.0.1"), ("srcPort", "9000")]);
//! let config = ReaderConfig::from_params(&params)?;
//! assert_eq!(config.bufsize, 1024);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{DaqError, Result};
use crate::protocol::MAX_PAYLOAD_SIZE;
use std::path::PathBuf;
use std::str::FromStr;

/// Reader parameter: data source host name or address
pub const PARAM_SRC_ADDR: &str = "srcAddr";

/// Reader parameter: data source TCP port
pub const PARAM_SRC_PORT: &str = "srcPort";

/// Reader parameter: read size per tick in KiB
pub const PARAM_BUFSIZE_KB: &str = "bufsize_kb";

/// Logger parameter: `yes` or `no`
pub const PARAM_IS_LOGGING: &str = "isLogging";

/// Logger parameter: destination directory
pub const PARAM_DIR_NAME: &str = "dirName";

/// Logger parameter: per-file size cap in MiB, 0 disables rotation
pub const PARAM_MAX_FILE_SIZE_MB: &str = "maxFileSizeInMegaByte";

/// Logger parameter: run identifier used in file names
pub const PARAM_RUN_NUMBER: &str = "runNumber";

/// Logger parameter: size of one event in bytes, 0 if unknown
pub const PARAM_EVENT_BYTE_SIZE: &str = "eventByteSize";

/// Logger parameter: progress is logged every this many blocks
pub const PARAM_MON_RATE: &str = "monRate";

/// Default read size in KiB when `bufsize_kb` is absent
pub const DEFAULT_BUFSIZE_KB: usize = 1;

/// Default monitoring print rate
pub const DEFAULT_MON_RATE: u64 = 100;

const BYTES_PER_KB: usize = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;

// ==================== Parameter List ====================

/// Ordered key/value parameters delivered at Configure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamList(Vec<(String, String)>);

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from anything yielding string-like pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Append a parameter
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Builder-style [`ParamList::push`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Value of `key`. When a key repeats, the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `key` as an integer. Absent keys give `Ok(None)`.
    pub fn parse_int<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| DaqError::invalid_parameter(key, raw, e.to_string())),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for ParamList
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ==================== Reader Config ====================

/// Validated reader configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Data source address
    pub src_addr: String,
    /// Data source port
    pub src_port: u16,
    /// Bytes read from the source per tick
    pub bufsize: usize,
}

impl ReaderConfig {
    pub fn from_params(params: &ParamList) -> Result<Self> {
        let src_addr = params
            .get(PARAM_SRC_ADDR)
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .ok_or(DaqError::NoSourceAddress)?
            .to_string();

        let src_port = params
            .parse_int::<u16>(PARAM_SRC_PORT)?
            .ok_or(DaqError::NoSourcePort)?;

        let bufsize_kb = params
            .parse_int::<usize>(PARAM_BUFSIZE_KB)?
            .unwrap_or(DEFAULT_BUFSIZE_KB);
        if bufsize_kb == 0 {
            return Err(DaqError::invalid_parameter(
                PARAM_BUFSIZE_KB,
                "0",
                "must be greater than zero",
            ));
        }
        let bufsize = bufsize_kb.checked_mul(BYTES_PER_KB).ok_or_else(|| {
            DaqError::invalid_parameter(PARAM_BUFSIZE_KB, bufsize_kb.to_string(), "too large")
        })?;
        if bufsize > MAX_PAYLOAD_SIZE {
            return Err(DaqError::invalid_parameter(
                PARAM_BUFSIZE_KB,
                bufsize_kb.to_string(),
                "exceeds 32-bit length field",
            ));
        }

        Ok(Self {
            src_addr,
            src_port,
            bufsize,
        })
    }
}

// ==================== Logger Config ====================

/// Validated logger configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Whether payloads are written to disk
    pub logging: bool,
    /// Destination directory, always set when `logging` is true
    pub dir_name: Option<PathBuf>,
    /// Per-file size cap in bytes, 0 = no rotation
    pub max_file_size: u64,
    /// Run identifier used in file names
    pub run_number: u32,
    /// Size of one event in bytes, 0 = unknown
    pub event_byte_size: u32,
    /// Progress is logged every `mon_rate` blocks
    pub mon_rate: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            logging: false,
            dir_name: None,
            max_file_size: 0,
            run_number: 0,
            event_byte_size: 0,
            mon_rate: DEFAULT_MON_RATE,
        }
    }
}

impl LoggerConfig {
    /// Resolve the logger parameters.
    ///
    /// Only checks presence and syntax; directory usability is checked by the
    /// logger at Configure.
    pub fn from_params(params: &ParamList) -> Result<Self> {
        let logging = match params.get(PARAM_IS_LOGGING) {
            None => false,
            Some(raw) => parse_yes_no(PARAM_IS_LOGGING, raw)?,
        };

        let mut config = Self {
            logging,
            ..Self::default()
        };

        if logging {
            let dir = params
                .get(PARAM_DIR_NAME)
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .ok_or_else(|| DaqError::BadDirectory {
                    path: PathBuf::new(),
                    reason: format!("{} not specified", PARAM_DIR_NAME),
                })?;
            config.dir_name = Some(PathBuf::from(dir));

            let max_mb = params
                .parse_int::<u64>(PARAM_MAX_FILE_SIZE_MB)?
                .unwrap_or(0);
            config.max_file_size = max_mb.checked_mul(BYTES_PER_MB).ok_or_else(|| {
                DaqError::invalid_parameter(PARAM_MAX_FILE_SIZE_MB, max_mb.to_string(), "too large")
            })?;

            config.run_number = params.parse_int(PARAM_RUN_NUMBER)?.unwrap_or(0);
        }

        config.event_byte_size = params.parse_int(PARAM_EVENT_BYTE_SIZE)?.unwrap_or(0);
        config.mon_rate = params
            .parse_int(PARAM_MON_RATE)?
            .unwrap_or(DEFAULT_MON_RATE);
        if config.mon_rate == 0 {
            return Err(DaqError::invalid_parameter(
                PARAM_MON_RATE,
                "0",
                "must be greater than zero",
            ));
        }

        Ok(config)
    }
}

fn parse_yes_no(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(DaqError::invalid_parameter(key, raw, "expected yes or no")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FatalKind;

    fn reader_params() -> ParamList {
        ParamList::from_pairs([("srcAddr", "127.0.0.1"), ("srcPort", "9000")])
    }

    #[test]
    fn test_param_list_last_wins() {
        let params = ParamList::new().with("a", "1").with("b", "2").with("a", "3");
        assert_eq!(params.get("a"), Some("3"));
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.get("A"), None);
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_parse_int_is_strict() {
        let params = ParamList::from_pairs([("n", "12x")]);
        let err = params.parse_int::<u32>("n").unwrap_err();
        assert_eq!(err.kind(), FatalKind::InvalidParameter);
        assert_eq!(params.parse_int::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn test_reader_config_defaults() {
        let config = ReaderConfig::from_params(&reader_params()).unwrap();
        assert_eq!(config.src_addr, "127.0.0.1");
        assert_eq!(config.src_port, 9000);
        assert_eq!(config.bufsize, 1024);
    }

    #[test]
    fn test_reader_config_bufsize() {
        let params = reader_params().with("bufsize_kb", "64");
        assert_eq!(ReaderConfig::from_params(&params).unwrap().bufsize, 65536);

        let params = reader_params().with("bufsize_kb", "0");
        assert_eq!(
            ReaderConfig::from_params(&params).unwrap_err().kind(),
            FatalKind::InvalidParameter
        );
    }

    #[test]
    fn test_reader_config_bufsize_fits_length_field() {
        // 4 GiB - 1 KiB is the largest whole-KiB size the header can carry
        let largest = (MAX_PAYLOAD_SIZE / BYTES_PER_KB).to_string();
        let params = reader_params().with("bufsize_kb", largest.as_str());
        assert!(ReaderConfig::from_params(&params).unwrap().bufsize <= MAX_PAYLOAD_SIZE);

        let params = reader_params().with("bufsize_kb", "4194304");
        let err = ReaderConfig::from_params(&params).unwrap_err();
        assert_eq!(err.kind(), FatalKind::InvalidParameter);
        assert!(err.to_string().contains("32-bit length field"));
    }

    #[test]
    fn test_reader_config_missing_source() {
        let params = ParamList::from_pairs([("srcPort", "9000")]);
        assert_eq!(
            ReaderConfig::from_params(&params).unwrap_err().kind(),
            FatalKind::NoSourceAddress
        );

        let params = ParamList::from_pairs([("srcAddr", "localhost")]);
        assert_eq!(
            ReaderConfig::from_params(&params).unwrap_err().kind(),
            FatalKind::NoSourcePort
        );
    }

    #[test]
    fn test_reader_config_port_out_of_range() {
        let params = ParamList::from_pairs([("srcAddr", "localhost"), ("srcPort", "70000")]);
        assert_eq!(
            ReaderConfig::from_params(&params).unwrap_err().kind(),
            FatalKind::InvalidParameter
        );
    }

    #[test]
    fn test_logger_config_disabled_by_default() {
        let config = LoggerConfig::from_params(&ParamList::new()).unwrap();
        assert_eq!(config, LoggerConfig::default());
        assert!(!config.logging);
        assert_eq!(config.mon_rate, 100);
    }

    #[test]
    fn test_logger_config_enabled() {
        let params = ParamList::from_pairs([
            ("isLogging", "YES"),
            ("dirName", "/data"),
            ("maxFileSizeInMegaByte", "2"),
            ("runNumber", "42"),
            ("eventByteSize", "16"),
            ("monRate", "10"),
        ]);
        let config = LoggerConfig::from_params(&params).unwrap();
        assert!(config.logging);
        assert_eq!(config.dir_name, Some(PathBuf::from("/data")));
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
        assert_eq!(config.run_number, 42);
        assert_eq!(config.event_byte_size, 16);
        assert_eq!(config.mon_rate, 10);
    }

    #[test]
    fn test_logger_config_requires_dir_when_logging() {
        let params = ParamList::from_pairs([("isLogging", "yes")]);
        assert_eq!(
            LoggerConfig::from_params(&params).unwrap_err().kind(),
            FatalKind::BadDirectory
        );
    }

    #[test]
    fn test_logger_config_rejects_bad_values() {
        let params = ParamList::from_pairs([("isLogging", "maybe")]);
        assert_eq!(
            LoggerConfig::from_params(&params).unwrap_err().kind(),
            FatalKind::InvalidParameter
        );

        let params = ParamList::from_pairs([("monRate", "0")]);
        assert!(LoggerConfig::from_params(&params).is_err());
    }
}
