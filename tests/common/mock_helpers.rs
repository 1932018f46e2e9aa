//! Loopback data server and stage construction helpers

use etherdaq::component::ComponentHost;
use etherdaq::port::{port_pair, ChannelInPort, ChannelOutPort};
use etherdaq::source::TcpEventSource;
use etherdaq::stages::{LoggerPipeline, ReaderPipeline};
use std::io::Write;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type TcpReader = ReaderPipeline<TcpEventSource, ChannelOutPort>;
pub type ChannelLogger = LoggerPipeline<ChannelInPort>;

/// One-shot TCP data server on a loopback port
pub struct DataServer {
    pub port: u16,
    thread: JoinHandle<()>,
}

impl DataServer {
    /// Accept one client, send `chunks` back to back, then hold the
    /// connection open for `linger`
    pub fn serve(chunks: Vec<Vec<u8>>, linger: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let thread = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            for chunk in chunks {
                // The client may already have gone away
                if conn.write_all(&chunk).is_err() {
                    return;
                }
            }
            let _ = conn.flush();
            thread::sleep(linger);
        });

        Self { port, thread }
    }

    pub fn join(self) {
        self.thread.join().unwrap();
    }
}

/// Socket source with timeouts short enough for tests
pub fn fast_tcp_source() -> TcpEventSource {
    TcpEventSource::with_timeouts(Duration::from_millis(500), Duration::from_millis(500))
}

/// Reader and logger hosts joined by a port of `capacity` blocks
pub fn create_test_stages(
    capacity: usize,
) -> (ComponentHost<TcpReader>, ComponentHost<ChannelLogger>, etherdaq::HostHandle, etherdaq::HostHandle) {
    let (out_port, in_port) = port_pair(capacity, Duration::from_millis(5));
    let (reader, reader_handle) =
        ComponentHost::new(ReaderPipeline::new(fast_tcp_source(), out_port), Duration::ZERO);
    let (logger, logger_handle) = ComponentHost::new(LoggerPipeline::new(in_port), Duration::ZERO);
    (reader, logger, reader_handle, logger_handle)
}
