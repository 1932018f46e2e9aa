//! Settings file for the `etherdaq` binary
//!
//! The binary wires a reader and a logger together in one process. Everything
//! it needs beyond the stage parameters lives in a TOML file:
//!
//! ```toml
//! tick_interval_ms = 1
//! run_seconds = 10
//!
//! [port]
//! capacity = 64
//! timeout_ms = 10
//!
//! [reader]
//! source = "tcp"
//!
//! [reader.params]
//! srcAddr = "127.0.0.1"
//! srcPort = 9000
//! bufsize_kb = 64
//!
//! [logger.params]
//! isLogging = "yes"
//! dirName = "/data/run"
//! ```
//!
//! Parameter tables accept strings, integers and booleans and are flattened
//! into a [`ParamList`] before being handed to a stage.

use super::ParamList;
use crate::error::{DaqError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for per-user directories
pub const APP_ID: &str = "etherdaq";

/// Default settings filename
pub const SETTINGS_FILE: &str = "etherdaq.toml";

/// Default scheduler tick interval in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1;

/// Default run length of the binary in seconds
pub const DEFAULT_RUN_SECONDS: u64 = 10;

/// Default socket connect/read timeout in milliseconds
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 2000;

/// Path of the per-user settings file, if the platform has a config dir
pub fn default_settings_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(SETTINGS_FILE))
}

/// Where the reader gets its data from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// TCP connection to `srcAddr:srcPort`
    #[default]
    Tcp,
    /// Generated data, no network
    Mock,
}

/// In-process port between reader and logger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortSettings {
    /// Blocks buffered before writes time out
    pub capacity: usize,
    /// Time a port read or write may block
    pub timeout_ms: u64,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            capacity: crate::port::DEFAULT_PORT_CAPACITY,
            timeout_ms: crate::port::DEFAULT_PORT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PortSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Reader stage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    pub source: SourceKind,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    /// Parameters passed at Configure
    pub params: BTreeMap<String, toml::Value>,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        let mut params = BTreeMap::new();
        params.insert(
            super::PARAM_SRC_ADDR.to_string(),
            toml::Value::String("127.0.0.1".to_string()),
        );
        params.insert(super::PARAM_SRC_PORT.to_string(), toml::Value::Integer(9000));

        Self {
            source: SourceKind::default(),
            connect_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            params,
        }
    }
}

impl ReaderSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn param_list(&self) -> Result<ParamList> {
        to_param_list(&self.params)
    }
}

/// Logger stage settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// Parameters passed at Configure
    pub params: BTreeMap<String, toml::Value>,
}

impl LoggerSettings {
    pub fn param_list(&self) -> Result<ParamList> {
        to_param_list(&self.params)
    }
}

/// Top-level settings of the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Scheduler tick interval of each host
    pub tick_interval_ms: u64,
    /// How long the binary keeps the run going
    pub run_seconds: u64,
    /// Directory for rolling log files, none = stderr only
    pub log_dir: Option<PathBuf>,
    pub port: PortSettings,
    pub reader: ReaderSettings,
    pub logger: LoggerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            run_seconds: DEFAULT_RUN_SECONDS,
            log_dir: None,
            port: PortSettings::default(),
            reader: ReaderSettings::default(),
            logger: LoggerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DaqError::Config(format!("Failed to read settings {:?}: {}", path, e))
        })?;

        Self::from_toml(&content).with_context(|| format!("Failed to parse settings {:?}", path))
    }

    /// Load settings, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DaqError::Config(e.to_string()))
    }

    /// Save settings as TOML, creating the parent directory
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DaqError::Config(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DaqError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            DaqError::Config(format!("Failed to write settings {:?}: {}", path, e))
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_seconds)
    }
}

fn to_param_list(table: &BTreeMap<String, toml::Value>) -> Result<ParamList> {
    table
        .iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Boolean(true) => "yes".to_string(),
                toml::Value::Boolean(false) => "no".to_string(),
                other => {
                    return Err(DaqError::invalid_parameter(
                        key.as_str(),
                        other.to_string(),
                        "expected a string, integer or boolean",
                    ))
                }
            };
            Ok((key.clone(), text))
        })
        .collect()
}
