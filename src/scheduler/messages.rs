//! Commands accepted by the scheduler actor.
//!
//! Client requests carry a `oneshot` sender for the reply. `TaskFinished` is
//! sent by the spawned worker future into the same queue, so completions and
//! control actions are applied strictly one after the other.

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::AppResult;
use crate::scheduler::state::SchedulerSnapshot;
use crate::taskset::{TaskSetConfig, TaskSetSummary};
use crate::worker::TaskOutcome;

/// Commands processed by the [`SchedulerActor`](crate::scheduler::SchedulerActor).
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Expand and append a task set
    AddTaskSet {
        config: TaskSetConfig,
        response: oneshot::Sender<AppResult<TaskSetSummary>>,
    },

    /// Remove a task set (confirmation already given by the caller)
    RemoveTaskSet {
        uid: Uuid,
        response: oneshot::Sender<AppResult<TaskSetSummary>>,
    },

    /// Enable or disable one generated task of a not-yet-active set
    SetTaskEnabled {
        uid: Uuid,
        ordinal: usize,
        enabled: bool,
        response: oneshot::Sender<AppResult<()>>,
    },

    /// Start or resume
    Play {
        response: oneshot::Sender<()>,
    },

    /// Hold at the next task boundary
    Pause {
        response: oneshot::Sender<()>,
    },

    /// Terminate the current set at the next task boundary
    Stop {
        response: oneshot::Sender<()>,
    },

    /// Read the current state
    Snapshot {
        response: oneshot::Sender<SchedulerSnapshot>,
    },

    /// Worker report for the in-flight task
    TaskFinished { outcome: TaskOutcome },

    /// Stop the actor loop
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

impl SchedulerCommand {
    /// Create an add command and its reply channel.
    pub fn add_task_set(
        config: TaskSetConfig,
    ) -> (Self, oneshot::Receiver<AppResult<TaskSetSummary>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::AddTaskSet {
                config,
                response: tx,
            },
            rx,
        )
    }

    /// Create a remove command and its reply channel.
    pub fn remove_task_set(uid: Uuid) -> (Self, oneshot::Receiver<AppResult<TaskSetSummary>>) {
        let (tx, rx) = oneshot::channel();
        (Self::RemoveTaskSet { uid, response: tx }, rx)
    }

    /// Create a task toggle command and its reply channel.
    pub fn set_task_enabled(
        uid: Uuid,
        ordinal: usize,
        enabled: bool,
    ) -> (Self, oneshot::Receiver<AppResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::SetTaskEnabled {
                uid,
                ordinal,
                enabled,
                response: tx,
            },
            rx,
        )
    }

    /// Create a play command and its reply channel.
    pub fn play() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Play { response: tx }, rx)
    }

    /// Create a pause command and its reply channel.
    pub fn pause() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Pause { response: tx }, rx)
    }

    /// Create a stop command and its reply channel.
    pub fn stop() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Stop { response: tx }, rx)
    }

    /// Create a snapshot request and its reply channel.
    pub fn snapshot() -> (Self, oneshot::Receiver<SchedulerSnapshot>) {
        let (tx, rx) = oneshot::channel();
        (Self::Snapshot { response: tx }, rx)
    }

    /// Create a shutdown command and its reply channel.
    pub fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}
