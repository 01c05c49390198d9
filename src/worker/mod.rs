//! Device worker abstraction.
//!
//! A worker owns the instrument for the duration of exactly one task. The
//! scheduler hands it a [`Dispatch`] and the shared [`ControlFlags`]; the
//! worker checks the flags at its own step boundaries and eventually reports
//! a result location or a [`WorkerError`].

pub mod mock;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::scheduler::Dispatch;

pub use mock::SimulatedMicroscope;

/// Pause/stop signals shared between the scheduler and the worker.
///
/// Cloning shares the underlying flags.
#[derive(Debug, Clone, Default)]
pub struct ControlFlags {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl ControlFlags {
    /// Flags with neither pause nor stop set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pause is requested.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Whether a stop is requested.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Set or clear the pause request.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Set or clear the stop request.
    pub fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::SeqCst);
    }
}

/// Failures reported by a worker for one task.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The instrument reported a failure
    #[error("Device error: {0}")]
    Device(String),

    /// The task was abandoned after a stop request
    #[error("Acquisition aborted by stop request")]
    Aborted,

    /// Writing the result failed
    #[error("Failed to write result: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the result failed
    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What a finished dispatch reports back to the scheduler.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Result location (e.g. directory holding the image files)
    Completed(PathBuf),
    /// The task could not be acquired
    Failed(WorkerError),
}

impl From<Result<PathBuf, WorkerError>> for TaskOutcome {
    fn from(result: Result<PathBuf, WorkerError>) -> Self {
        match result {
            Ok(path) => TaskOutcome::Completed(path),
            Err(e) => TaskOutcome::Failed(e),
        }
    }
}

/// Executes one task against the instrument.
#[async_trait]
pub trait TaskWorker: Send + Sync {
    /// Run `dispatch` to completion. Implementations must check `flags` at
    /// their internal step boundaries: wait while paused and may return
    /// [`WorkerError::Aborted`] once stopped.
    async fn execute(&self, dispatch: &Dispatch, flags: &ControlFlags)
        -> Result<PathBuf, WorkerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_shared_between_clones() {
        let flags = ControlFlags::new();
        let worker_side = flags.clone();
        flags.set_paused(true);
        assert!(worker_side.is_paused());
        worker_side.set_stopped(true);
        assert!(flags.is_stopped());
        flags.set_paused(false);
        assert!(!worker_side.is_paused());
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: TaskOutcome = Ok(PathBuf::from("/tmp/x")).into();
        assert!(matches!(ok, TaskOutcome::Completed(_)));
        let err: TaskOutcome = Err(WorkerError::Aborted).into();
        assert!(matches!(err, TaskOutcome::Failed(WorkerError::Aborted)));
    }
}
