//! Task-set lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a task set.
///
/// `Ready → Working → Finished`, with `Working → Error` on stop or device
/// failure. A set whose selection is empty goes straight `Ready → Finished`
/// when it would be activated. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSetStatus {
    /// Waiting to be run
    #[default]
    Ready,
    /// Being run
    Working,
    /// Every queued task was handled
    Finished,
    /// Terminated by a stop or a device failure
    Error,
}

impl TaskSetStatus {
    /// `Finished` and `Error` are never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskSetStatus::Finished | TaskSetStatus::Error)
    }

    /// Whether moving to `next` is allowed.
    pub fn can_transition_to(self, next: TaskSetStatus) -> bool {
        use TaskSetStatus::*;
        matches!(
            (self, next),
            (Ready, Working) | (Ready, Finished) | (Working, Finished) | (Working, Error)
        )
    }
}

impl fmt::Display for TaskSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskSetStatus::Ready => "Ready",
            TaskSetStatus::Working => "Working",
            TaskSetStatus::Finished => "Finished",
            TaskSetStatus::Error => "Error",
        };
        f.write_str(s)
    }
}
