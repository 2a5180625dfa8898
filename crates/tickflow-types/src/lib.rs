//! `tickflow-types` – shared vocabulary for the tickflow engine.
//!
//! - [`Status`]: the five-valued outcome of a single behavior-node tick.
//! - [`TickflowError`]: graph-construction and step-time faults.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The outcome of evaluating a behavior node once.
///
/// `Running` means "tick me again before treating me as resolved".  `Kill`
/// is an abort signal: composites and decorators pass it upward untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Never ticked, or reset since the last tick.
    #[default]
    Idle,
    /// Started but not finished; resume on the next tick.
    Running,
    /// Completed successfully.
    Success,
    /// Completed with an ordinary negative outcome.
    Failure,
    /// Abnormal abort requested by a leaf.
    Kill,
}

impl Status {
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failure)
    }

    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, Status::Running)
    }

    #[inline]
    pub fn is_kill(self) -> bool {
        matches!(self, Status::Kill)
    }

    /// Returns `true` for every status that resolves the node
    /// (`Success`, `Failure`, `Kill`).
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, Status::Success | Status::Failure | Status::Kill)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Idle => "idle",
            Status::Running => "running",
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Kill => "kill",
        };
        f.write_str(s)
    }
}

/// Errors raised while building or stepping a state machine.
///
/// `Failure` and `Kill` are ordinary [`Status`] values and never appear here.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickflowError {
    #[error("Duplicate state name: {0}")]
    DuplicateState(String),

    #[error("Unknown state: {0}")]
    UnknownState(String),

    #[error("State machine has no states")]
    EmptyMachine,

    /// Transition resolution inside one `step()` did not settle.
    #[error("Transitions did not settle after {limit} hops: {}", path.join(" -> "))]
    CascadeLimitExceeded { limit: usize, path: Vec<String> },

    #[error("Configuration Error: {0}")]
    Config(String),
}
