//! Run-control state machine.
//!
//! [`RunState::transition`] is a pure function of the current state and a
//! command. The host applies it before running the component's action, so a
//! command that is not valid in the current state never reaches the component.

use crate::config::ParamList;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Unconfigured,
    Configured,
    Running,
    Paused,
    Stopped,
}

impl RunState {
    /// State reached by applying `command`, or why it is not allowed
    pub fn transition(self, command: &Command) -> Result<RunState, TransitionError> {
        use Command::*;
        use RunState::*;

        let next = match (self, command) {
            (Unconfigured | Configured | Stopped, Configure(_)) => Configured,
            (Configured | Stopped, Unconfigure) => Unconfigured,
            (Configured | Stopped, Start) => Running,
            (Running, Pause) => Paused,
            (Paused, Resume) => Running,
            (Running | Paused, Stop) => Stopped,
            (from, command) => {
                return Err(TransitionError::Invalid {
                    from,
                    command: command.name(),
                })
            }
        };
        Ok(next)
    }

    /// Whether a run is in progress (running or paused)
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Unconfigured => write!(f, "Unconfigured"),
            RunState::Configured => write!(f, "Configured"),
            RunState::Running => write!(f, "Running"),
            RunState::Paused => write!(f, "Paused"),
            RunState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Transition requests delivered on the command channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Configure(ParamList),
    Unconfigure,
    Start,
    Stop,
    Pause,
    Resume,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Configure(_) => "configure",
            Command::Unconfigure => "unconfigure",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Pause => "pause",
            Command::Resume => "resume",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {command} while {from}")]
    Invalid { from: RunState, command: &'static str },
}
