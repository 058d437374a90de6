use serde::Serialize;
use std::fmt;

/// Lifecycle of a polling worker. `Stopped` is terminal and carries the
/// fatal error message when the loop died on a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Idle,
    Running,
    Paused,
    Stopped(Option<String>),
}

impl WorkerState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, WorkerState::Stopped(_))
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            WorkerState::Stopped(err) => err.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Running => write!(f, "running"),
            WorkerState::Paused => write!(f, "paused"),
            WorkerState::Stopped(None) => write!(f, "stopped"),
            WorkerState::Stopped(Some(err)) => write!(f, "stopped: {err}"),
        }
    }
}
