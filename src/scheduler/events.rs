//! Progress events broadcast by the scheduler actor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::taskset::TaskSetStatus;

/// Progress notifications published by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A task was handed to the worker
    TaskStarted {
        set_index: usize,
        set_name: String,
        ordinal: usize,
        label: String,
    },
    /// A task finished and was credited
    TaskCompleted {
        set_index: usize,
        set_name: String,
        ordinal: usize,
        progress: f64,
        result: PathBuf,
    },
    /// Worker reported a failure; the task is not credited.
    TaskFailed {
        set_index: usize,
        set_name: String,
        ordinal: usize,
        error: String,
    },
    /// Completion arrived after a stop request; the task is not credited.
    TaskAbandoned {
        set_index: usize,
        set_name: String,
        ordinal: usize,
    },
    /// A task set changed status
    StatusChanged {
        set_index: usize,
        set_name: String,
        status: TaskSetStatus,
    },
    /// Nothing is in flight any more. `paused` tells a pause halt apart from
    /// the end of the work (or a stop).
    Idle { paused: bool },
}
