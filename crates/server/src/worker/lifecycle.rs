//! Worker lifecycle states and their allowed transitions.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;
use wardrobe_sw_core::Error;

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    /// Activated and controlling clients.
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }

    /// Whether the lifecycle may move from `self` to `next`.
    ///
    /// Any live state may become redundant; otherwise states only advance
    /// one step at a time.
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Parsed | Installing | Installed | Activating | Activated, Redundant)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of a worker, guarded for concurrent event handlers.
#[derive(Debug)]
pub struct Lifecycle {
    version: String,
    state: Mutex<WorkerState>,
}

impl Lifecycle {
    pub fn new(version: impl Into<String>) -> Self {
        Self { version: version.into(), state: Mutex::new(WorkerState::Parsed) }
    }

    pub fn current(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next`, returning the previous state.
    pub fn advance(&self, next: WorkerState) -> Result<WorkerState, Error> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let previous = *state;
        if !previous.can_transition_to(next) {
            return Err(Error::InvalidState(format!(
                "worker {} cannot go from {} to {}",
                self.version, previous, next
            )));
        }
        *state = next;
        tracing::info!(version = %self.version, from = %previous, to = %next, "worker state changed");
        Ok(previous)
    }

    /// Make the worker redundant under one lock. Returns false if it already was.
    pub fn retire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == WorkerState::Redundant {
            return false;
        }
        let previous = std::mem::replace(&mut *state, WorkerState::Redundant);
        tracing::info!(version = %self.version, from = %previous, to = %WorkerState::Redundant, "worker state changed");
        true
    }
}
