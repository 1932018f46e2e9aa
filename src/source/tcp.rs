//! Blocking TCP data source with bounded connect and read timeouts.

use super::{EventSource, ReadStatus};
use crate::error::{DaqError, Result};
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Default time allowed for establishing the connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time a single `read_all` may block in total
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// TCP client reading raw event data from a data server
#[derive(Debug)]
pub struct TcpEventSource {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    read_timeout: Duration,
    bytes_read: u64,
}

impl Default for TcpEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpEventSource {
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            stream: None,
            connect_timeout,
            read_timeout,
            bytes_read: 0,
        }
    }

    /// Bytes received since the last connect
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl EventSource for TcpEventSource {
    fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        self.disconnect();

        let addrs = (address, port)
            .to_socket_addrs()
            .map_err(|e| DaqError::Socket(format!("cannot resolve {}:{}: {}", address, port, e)))?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(self.read_timeout))
                        .map_err(|e| DaqError::Socket(format!("set_read_timeout: {}", e)))?;
                    let _ = stream.set_nodelay(true);

                    tracing::info!("Connected to data server {}", addr);
                    self.stream = Some(stream);
                    self.bytes_read = 0;
                    return Ok(());
                }
                Err(e) => last_error = Some(format!("{}: {}", addr, e)),
            }
        }

        Err(DaqError::Socket(format!(
            "cannot connect to {}:{}: {}",
            address,
            port,
            last_error.unwrap_or_else(|| "no address resolved".to_string())
        )))
    }

    fn read_all(&mut self, buf: &mut [u8]) -> ReadStatus {
        let Some(stream) = self.stream.as_mut() else {
            return ReadStatus::Fatal;
        };

        // One deadline for the whole call, so a trickling peer cannot stretch it
        let deadline = Instant::now() + self.read_timeout;
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!("read_all timed out after {} of {} bytes", filled, buf.len());
                return ReadStatus::Timeout;
            }
            if let Err(e) = stream.set_read_timeout(Some(remaining)) {
                tracing::error!("Socket set_read_timeout failed: {}", e);
                return ReadStatus::Fatal;
            }

            match stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    tracing::warn!("Data server closed the connection");
                    return ReadStatus::Fatal;
                }
                Ok(n) => {
                    filled += n;
                    self.bytes_read += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    tracing::debug!("read_all timed out after {} of {} bytes", filled, buf.len());
                    return ReadStatus::Timeout;
                }
                Err(e) => {
                    tracing::error!("Socket read failed: {}", e);
                    return ReadStatus::Fatal;
                }
            }
        }

        ReadStatus::Ok
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            tracing::info!("Disconnected from data server");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpEventSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}
