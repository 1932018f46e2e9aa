//! Component host: command channel, fatal funnel and scheduler loop.
//!
//! The host plays the part of the external lifecycle framework for one
//! component. It owns the component and talks to the outside world only
//! through crossbeam channels:
//!
//! - commands flow in through [`HostHandle`] (bounded, blocking send)
//! - state changes, fatal reports and run reports flow out as
//!   [`HostMessage`]s (bounded, `try_send`; messages that do not fit are
//!   counted and dropped so the scheduler never blocks on a slow operator)
//!
//! [`ComponentHost::execute`] is one scheduler step. [`ComponentHost::run`]
//! calls it on a fixed cadence until the handle shuts the host down.

use super::{Command, ComponentContext, DaqComponent, RunReport, RunState};
use crate::config::ParamList;
use crate::error::{DaqError, FatalKind, FatalReport};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity of the command channel
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the message channel
const MESSAGE_CHANNEL_CAPACITY: usize = 1024;

/// Messages published by a host
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// The component entered a new state
    StateChanged { component: String, state: RunState },
    /// An unrecoverable error; the data path is halted until the next
    /// successful configure or start
    Fatal(FatalReport),
    /// Run-end report, published at stop
    Report(RunReport),
    /// The scheduler loop has exited
    Shutdown,
}

/// Drives one [`DaqComponent`] through its lifecycle
pub struct ComponentHost<C: DaqComponent> {
    component: C,
    state: RunState,
    ctx: ComponentContext,
    /// Set by a fatal error, cleared by a successful configure/start
    fault: Option<FatalKind>,
    last_report: Option<RunReport>,
    command_rx: Receiver<Command>,
    message_tx: Sender<HostMessage>,
    running: Arc<AtomicBool>,
    tick_interval: Duration,
    last_tick: Instant,
    dropped_messages: u64,
}

impl<C: DaqComponent> ComponentHost<C> {
    /// Create a host and the handle used to control it
    pub fn new(component: C, tick_interval: Duration) -> (Self, HostHandle) {
        let (command_tx, command_rx) = bounded(COMMAND_CHANNEL_CAPACITY);
        let (message_tx, message_rx) = bounded(MESSAGE_CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let host = Self {
            component,
            state: RunState::default(),
            ctx: ComponentContext::new(),
            fault: None,
            last_report: None,
            command_rx,
            message_tx,
            running: running.clone(),
            tick_interval,
            last_tick: Instant::now(),
            dropped_messages: 0,
        };

        let handle = HostHandle {
            command_tx,
            message_rx,
            running,
        };

        (host, handle)
    }

    /// Scheduler loop; returns once the handle shuts the host down or is dropped
    pub fn run(&mut self) {
        tracing::info!("{} host started", self.component.name());

        while self.running.load(Ordering::SeqCst) {
            self.execute();
            self.rate_limit();
        }

        if self.state.is_active() {
            tracing::warn!(
                "{} shut down while {}, aborting run",
                self.component.name(),
                self.state
            );
            self.component.abort();
        }

        self.try_send_message(HostMessage::Shutdown);
        tracing::info!("{} host stopped", self.component.name());
    }

    /// One scheduler step: apply pending commands, then run one tick
    pub fn execute(&mut self) {
        self.process_commands();
        self.run_tick();
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Category of the fatal error that halted the data path, if any
    pub fn fault(&self) -> Option<FatalKind> {
        self.fault
    }

    /// Whether a stop is waiting for the component to release it
    pub fn is_stop_pending(&self) -> bool {
        self.ctx.is_stop_pending()
    }

    /// Report of the last completed run
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn component(&self) -> &C {
        &self.component
    }

    pub fn component_mut(&mut self) -> &mut C {
        &mut self.component
    }

    /// Messages dropped because the message channel was full
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        if self.ctx.is_stop_pending() {
            tracing::warn!(
                "{}: ignoring {} while a stop is in progress",
                self.component.name(),
                cmd.name()
            );
            return;
        }

        let next = match self.state.transition(&cmd) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!("{}: {}", self.component.name(), e);
                return;
            }
        };

        match cmd {
            Command::Configure(params) => self.handle_configure(&params, next),
            Command::Unconfigure => {
                self.component.unconfigure();
                self.set_state(next);
            }
            Command::Start => {
                self.ctx.reset();
                match self.component.start() {
                    Ok(()) => {
                        self.fault = None;
                        self.set_state(next);
                    }
                    Err(e) => self.report_fatal(e),
                }
            }
            Command::Stop => {
                if self.state == RunState::Running && self.fault.is_none() {
                    // Completed by the component releasing the lock in run()
                    tracing::debug!("{}: stop requested", self.component.name());
                    self.ctx.request_stop();
                } else {
                    self.finish_stop();
                }
            }
            Command::Pause => {
                self.component.pause();
                self.set_state(next);
            }
            Command::Resume => {
                self.component.resume();
                self.set_state(next);
            }
        }
    }

    fn handle_configure(&mut self, params: &ParamList, next: RunState) {
        match self.component.configure(params) {
            Ok(()) => {
                self.fault = None;
                self.set_state(next);
            }
            Err(e) => self.report_fatal(e),
        }
    }

    fn run_tick(&mut self) {
        if self.state != RunState::Running {
            return;
        }

        if self.fault.is_none() {
            if let Err(e) = self.component.run(&mut self.ctx) {
                self.report_fatal(e);
            }
        }

        // A faulted component will never release the lock itself
        if self.ctx.is_stop_released() || (self.ctx.is_stop_pending() && self.fault.is_some()) {
            self.finish_stop();
        }
    }

    fn finish_stop(&mut self) {
        self.ctx.reset();

        match self.component.stop() {
            Ok(report) => {
                tracing::info!("{}", report);
                self.last_report = Some(report.clone());
                self.try_send_message(HostMessage::Report(report));
            }
            Err(e) => self.report_fatal(e),
        }

        self.set_state(RunState::Stopped);
    }

    /// Single exit point for every error raised by the component
    fn report_fatal(&mut self, error: DaqError) {
        let report = FatalReport::from_error(self.component.name(), &error);
        if report.configuration {
            tracing::error!(configuration = true, "{}; reconfigure to recover", report);
        } else {
            tracing::error!("{}", report);
        }

        self.fault = Some(report.kind);
        self.component.abort();
        self.try_send_message(HostMessage::Fatal(report));
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            tracing::info!("{}: {} -> {}", self.component.name(), self.state, state);
        }
        self.state = state;
        self.try_send_message(HostMessage::StateChanged {
            component: self.component.name().to_string(),
            state,
        });
    }

    fn rate_limit(&mut self) {
        if self.tick_interval.is_zero() {
            std::thread::yield_now();
            return;
        }

        let elapsed = self.last_tick.elapsed();
        if elapsed < self.tick_interval {
            std::thread::sleep(self.tick_interval - elapsed);
        }

        self.last_tick = Instant::now();
    }

    /// Send without blocking; count drops
    fn try_send_message(&mut self, msg: HostMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.dropped_messages += 1;
        }
    }
}

/// Operator side of a [`ComponentHost`]
#[derive(Debug)]
pub struct HostHandle {
    command_tx: Sender<Command>,
    message_rx: Receiver<HostMessage>,
    running: Arc<AtomicBool>,
}

impl HostHandle {
    /// Queue a command; false if the host is gone
    pub fn send_command(&self, cmd: Command) -> bool {
        self.command_tx.send(cmd).is_ok()
    }

    pub fn configure(&self, params: ParamList) -> bool {
        self.send_command(Command::Configure(params))
    }

    pub fn unconfigure(&self) -> bool {
        self.send_command(Command::Unconfigure)
    }

    pub fn start(&self) -> bool {
        self.send_command(Command::Start)
    }

    pub fn stop(&self) -> bool {
        self.send_command(Command::Stop)
    }

    pub fn pause(&self) -> bool {
        self.send_command(Command::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send_command(Command::Resume)
    }

    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<HostMessage> {
        self.message_rx.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<HostMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.message_rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<HostMessage> {
        self.message_rx.recv_timeout(timeout).ok()
    }

    /// Wait for the first message matching `pred`.
    ///
    /// Messages that do not match are consumed and discarded.
    pub fn wait_for<F>(&self, timeout: Duration, mut pred: F) -> Option<HostMessage>
    where
        F: FnMut(&HostMessage) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.message_rx.recv_timeout(remaining) {
                Ok(msg) if pred(&msg) => return Some(msg),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    /// Wait until the component reports `state`
    pub fn wait_for_state(&self, state: RunState, timeout: Duration) -> bool {
        self.wait_for(timeout, |msg| {
            matches!(msg, HostMessage::StateChanged { state: s, .. } if *s == state)
        })
        .is_some()
    }

    /// Ask the scheduler loop to exit
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
