//! Component lifecycle
//!
//! A stage implements [`DaqComponent`]: one hook per lifecycle action plus a
//! `run()` tick. A [`ComponentHost`] owns the component, applies
//! [`RunState::transition`] to incoming [`Command`]s, calls the hooks and
//! funnels every error into a single fatal report.
//!
//! # Stop handshake
//!
//! A Stop received while running does not stop the component right away. The
//! host sets the stop lock in the [`ComponentContext`]; the component sees it
//! at the top of its next `run()` tick, finishes whatever it must, and calls
//! [`ComponentContext::release_stop`]. Only then does the host call `stop()`.
//! A blocked producer therefore never loses the block it is holding halfway
//! through a tick.

pub mod host;
pub mod state;
pub mod stats;

pub use host::{ComponentHost, HostHandle, HostMessage};
pub use state::{Command, RunState, TransitionError};
pub use stats::{throughput_mb_per_sec, RunReport, RunStatistics};

use crate::config::ParamList;
use crate::error::Result;

/// Lifecycle hooks of a pipeline stage
///
/// Hooks are only called for valid transitions. `configure` and `start` may
/// fail; the host then reports the error and leaves the state unchanged.
pub trait DaqComponent: Send {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Resolve parameters and allocate per-configuration resources
    fn configure(&mut self, params: &ParamList) -> Result<()>;

    /// Release everything `configure` allocated
    fn unconfigure(&mut self) {}

    /// Acquire run resources and reset statistics
    fn start(&mut self) -> Result<()>;

    /// One scheduler tick while running
    fn run(&mut self, ctx: &mut ComponentContext) -> Result<()>;

    /// Release run resources and produce the run-end report
    fn stop(&mut self) -> Result<RunReport>;

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    /// Release run resources after a fatal error
    fn abort(&mut self) {}

    /// Counters of the current or last run
    fn statistics(&self) -> &RunStatistics;
}

/// Stop lock shared between host and component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum StopLock {
    #[default]
    Unlocked,
    Locked,
    Released,
}

/// Per-tick view of host state handed to [`DaqComponent::run`]
#[derive(Debug, Default)]
pub struct ComponentContext {
    stop_lock: StopLock,
}

impl ComponentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the host is waiting for this component to wind down
    pub fn stop_requested(&self) -> bool {
        self.stop_lock == StopLock::Locked
    }

    /// Let the pending stop proceed
    pub fn release_stop(&mut self) {
        if self.stop_lock == StopLock::Locked {
            self.stop_lock = StopLock::Released;
        }
    }

    pub(crate) fn request_stop(&mut self) {
        self.stop_lock = StopLock::Locked;
    }

    pub(crate) fn is_stop_released(&self) -> bool {
        self.stop_lock == StopLock::Released
    }

    pub(crate) fn is_stop_pending(&self) -> bool {
        self.stop_lock != StopLock::Unlocked
    }

    pub(crate) fn reset(&mut self) {
        self.stop_lock = StopLock::Unlocked;
    }
}
