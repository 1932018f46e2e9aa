//! Parameter builders for the reader and logger stages

use etherdaq::config::ParamList;
use std::path::Path;

/// Builder for reader parameters
pub struct ReaderParamsBuilder {
    addr: String,
    port: u16,
    bufsize_kb: Option<usize>,
}

impl ReaderParamsBuilder {
    pub fn new(port: u16) -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port,
            bufsize_kb: None,
        }
    }

    pub fn addr(mut self, addr: &str) -> Self {
        self.addr = addr.to_string();
        self
    }

    pub fn bufsize_kb(mut self, bufsize_kb: usize) -> Self {
        self.bufsize_kb = Some(bufsize_kb);
        self
    }

    pub fn build(self) -> ParamList {
        let mut params = ParamList::new()
            .with("srcAddr", self.addr)
            .with("srcPort", self.port.to_string());
        if let Some(kb) = self.bufsize_kb {
            params.push("bufsize_kb", kb.to_string());
        }
        params
    }
}

/// Builder for logger parameters
#[derive(Default)]
pub struct LoggerParamsBuilder {
    dir: Option<String>,
    run_number: Option<u32>,
    max_file_size_mb: Option<u64>,
    event_byte_size: Option<u32>,
}

impl LoggerParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable logging into `dir`
    pub fn logging_to(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_string_lossy().into_owned());
        self
    }

    pub fn run_number(mut self, run_number: u32) -> Self {
        self.run_number = Some(run_number);
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size_mb = Some(mb);
        self
    }

    pub fn event_byte_size(mut self, size: u32) -> Self {
        self.event_byte_size = Some(size);
        self
    }

    pub fn build(self) -> ParamList {
        let mut params = ParamList::new();
        match self.dir {
            Some(dir) => {
                params.push("isLogging", "yes");
                params.push("dirName", dir);
            }
            None => params.push("isLogging", "no"),
        }
        if let Some(run) = self.run_number {
            params.push("runNumber", run.to_string());
        }
        if let Some(mb) = self.max_file_size_mb {
            params.push("maxFileSizeInMegaByte", mb.to_string());
        }
        if let Some(size) = self.event_byte_size {
            params.push("eventByteSize", size.to_string());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_params_builder() {
        let params = ReaderParamsBuilder::new(9000).bufsize_kb(64).build();
        assert_eq!(params.get("srcAddr"), Some("127.0.0.1"));
        assert_eq!(params.get("srcPort"), Some("9000"));
        assert_eq!(params.get("bufsize_kb"), Some("64"));
    }

    #[test]
    fn test_logger_params_builder() {
        let params = LoggerParamsBuilder::new().run_number(3).build();
        assert_eq!(params.get("isLogging"), Some("no"));
        assert_eq!(params.get("runNumber"), Some("3"));
    }
}
