//! etherdaq - Main Entry Point
//!
//! Runs a reader and a logger in one process, connected by an in-process
//! port, for a fixed amount of time and prints both run reports as JSON.
//!
//! ```text
//! etherdaq [settings.toml]
//! ```

use anyhow::{bail, Context};
use etherdaq::{
    component::{ComponentHost, DaqComponent, HostHandle, HostMessage, RunReport, RunState},
    config::{default_settings_path, Settings, SourceKind},
    port::port_pair,
    source::{ScriptedSource, TcpEventSource},
    stages::{LoggerPipeline, ReaderPipeline},
};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long to wait for a host to acknowledge a command
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval at which the run is checked for fatal reports
const WATCH_INTERVAL: Duration = Duration::from_millis(100);

type HostThread = JoinHandle<Option<RunReport>>;

fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    let _guard = init_tracing(&settings);

    tracing::info!("Starting etherdaq");

    let (out_port, in_port) = port_pair(settings.port.capacity, settings.port.timeout());
    let tick = settings.tick_interval();

    let (logger, logger_thread) = spawn_host(LoggerPipeline::new(in_port), tick)?;
    let (reader, reader_thread) = match settings.reader.source {
        SourceKind::Tcp => {
            let source = TcpEventSource::with_timeouts(
                settings.reader.connect_timeout(),
                settings.reader.read_timeout(),
            );
            spawn_host(ReaderPipeline::new(source, out_port), tick)?
        }
        SourceKind::Mock => spawn_host(ReaderPipeline::new(ScriptedSource::new(), out_port), tick)?,
    };

    let result = run_session(&settings, &reader, &logger);

    reader.shutdown();
    logger.shutdown();
    let reports = [join_host(reader_thread), join_host(logger_thread)];

    for report in reports.iter().flatten() {
        println!("{}", serde_json::to_string_pretty(report)?);
    }

    tracing::info!("Shutting down...");
    result
}

fn load_settings() -> anyhow::Result<Settings> {
    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            Settings::load(&path).with_context(|| format!("loading settings from {:?}", path))
        }
        None => Ok(default_settings_path()
            .filter(|path| path.exists())
            .map(Settings::load_or_default)
            .unwrap_or_default()),
    }
}

fn init_tracing(settings: &Settings) -> Option<WorkerGuard> {
    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "etherdaq.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,etherdaq=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn spawn_host<C>(component: C, tick: Duration) -> anyhow::Result<(HostHandle, HostThread)>
where
    C: DaqComponent + 'static,
{
    let name = component.name().to_string();
    let (mut host, handle) = ComponentHost::new(component, tick);

    let thread = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            host.run();
            host.last_report().cloned()
        })
        .with_context(|| format!("spawning {} thread", name))?;

    Ok((handle, thread))
}

fn join_host(thread: HostThread) -> Option<RunReport> {
    thread.join().unwrap_or_else(|_| {
        tracing::error!("Host thread panicked");
        None
    })
}

/// Configure and start both stages, let the run go, then stop them
fn run_session(settings: &Settings, reader: &HostHandle, logger: &HostHandle) -> anyhow::Result<()> {
    logger.configure(settings.logger.param_list()?);
    await_state(logger, RunState::Configured)?;
    reader.configure(settings.reader.param_list()?);
    await_state(reader, RunState::Configured)?;

    // Consumer first so nothing the reader sends is missed
    logger.start();
    await_state(logger, RunState::Running)?;
    reader.start();
    await_state(reader, RunState::Running)?;

    tracing::info!("Run started for {} s", settings.run_seconds);
    let watch = watch_run(settings.run_duration(), &[reader, logger]);

    reader.stop();
    await_state(reader, RunState::Stopped)?;
    logger.stop();
    await_state(logger, RunState::Stopped)?;

    watch
}

/// Wait for `state`, failing early on a fatal report
fn await_state(handle: &HostHandle, state: RunState) -> anyhow::Result<()> {
    let msg = handle.wait_for(COMMAND_TIMEOUT, |msg| match msg {
        HostMessage::Fatal(_) => true,
        HostMessage::StateChanged { state: s, .. } => *s == state,
        _ => false,
    });

    match msg {
        Some(HostMessage::Fatal(report)) => bail!("{}", report),
        Some(_) => Ok(()),
        None => bail!("timed out waiting for {}", state),
    }
}

/// Sleep through the run, returning early if either stage reports a fatal error
fn watch_run(duration: Duration, handles: &[&HostHandle]) -> anyhow::Result<()> {
    let deadline = Instant::now() + duration;

    while Instant::now() < deadline {
        std::thread::sleep(WATCH_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));

        for handle in handles {
            for msg in handle.drain() {
                if let HostMessage::Fatal(report) = msg {
                    tracing::error!("Run aborted: {}", report);
                    return Err(anyhow::anyhow!("{}", report));
                }
            }
        }
    }

    Ok(())
}
