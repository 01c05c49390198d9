//! Play/pause/stop state machine driving one task at a time.
//!
//! [`Scheduler`] is synchronous and owns no runtime: every control operation
//! and every completion report returns the next [`Dispatch`] (if any) for the
//! owner to hand to the worker, and queues [`SchedulerEvent`]s that the owner
//! drains with [`Scheduler::drain_events`]. Pause and stop only set flags; they
//! take effect at the next completion boundary.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bounds::InstrumentLimits;
use crate::config::FailurePolicy;
use crate::error::{AppResult, TaskError};
use crate::scheduler::events::SchedulerEvent;
use crate::taskset::{Task, TaskSet, TaskSetConfig, TaskSetList, TaskSetStatus, TaskSetSummary};
use crate::worker::TaskOutcome;

/// A task handed to the worker, tagged with the set it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Position of the set in the list at dispatch time
    pub set_index: usize,
    /// Stable id of the set
    pub set_uid: Uuid,
    /// Set name, used for result paths
    pub set_name: String,
    /// The task to execute
    pub task: Task,
}

/// Point-in-time view of the scheduler for status displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// A task set is being worked on
    pub running: bool,
    /// Pause requested
    pub paused: bool,
    /// Stop requested and not yet applied
    pub stopped: bool,
    /// Index of the active set
    pub current_set: Option<usize>,
    /// Task handed to the worker and not yet reported
    pub in_flight: Option<Dispatch>,
    /// One summary per set, in list order
    pub sets: Vec<TaskSetSummary>,
}

/// Single-worker task-set scheduler.
///
/// Control calls and completions return the next [`Dispatch`], if any, which
/// the owner must hand to the worker. Progress is buffered as events; see
/// [`Scheduler::drain_events`].
#[derive(Debug)]
pub struct Scheduler {
    sets: TaskSetList,
    policy: FailurePolicy,
    running: bool,
    paused: bool,
    stopped: bool,
    current: Option<usize>,
    in_flight: Option<Dispatch>,
    events: Vec<SchedulerEvent>,
}

impl Scheduler {
    /// Empty scheduler.
    pub fn new(limits: InstrumentLimits, policy: FailurePolicy) -> Self {
        Self {
            sets: TaskSetList::new(limits),
            policy,
            running: false,
            paused: false,
            stopped: false,
            current: None,
            in_flight: None,
            events: Vec::new(),
        }
    }

    /// Whether a set is being worked on.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a pause is pending or holding.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a stop is pending.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Configured failure policy.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// All task sets in run order.
    pub fn sets(&self) -> &TaskSetList {
        &self.sets
    }

    /// Index of the active task set.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// The set being worked on, if any.
    pub fn current_set(&self) -> Option<&TaskSet> {
        self.current.and_then(|i| self.sets.get(i))
    }

    /// The dispatched task whose completion has not been reported yet.
    pub fn in_flight(&self) -> Option<&Dispatch> {
        self.in_flight.as_ref()
    }

    /// Append a task set (clamped to the instrument limits and expanded).
    pub fn add(&mut self, config: TaskSetConfig) -> AppResult<TaskSetSummary> {
        self.sets.add(config).map(TaskSet::summary)
    }

    /// Remove a set after `confirm` agrees. The active set cannot be removed.
    pub fn remove<F>(&mut self, index: usize, confirm: F) -> AppResult<TaskSet>
    where
        F: FnOnce(&TaskSet) -> bool,
    {
        if self.current == Some(index) {
            let name = self
                .sets
                .get(index)
                .map(|s| s.name().to_string())
                .unwrap_or_default();
            return Err(TaskError::TaskSetActive(name));
        }

        let removed = self.sets.remove(index, confirm)?;
        if let Some(current) = self.current.filter(|&c| c > index) {
            self.current = Some(current - 1);
        }
        if let Some(dispatch) = self.in_flight.as_mut().filter(|d| d.set_index > index) {
            dispatch.set_index -= 1;
        }
        Ok(removed)
    }

    /// Enable or disable one task of the set at `index`.
    pub fn set_task_enabled(&mut self, index: usize, ordinal: usize, enabled: bool) -> AppResult<()> {
        self.sets
            .get_mut(index)
            .ok_or(TaskError::TaskSetNotFound(index))?
            .set_task_enabled(ordinal, enabled)
    }

    /// Start, or continue after a pause.
    ///
    /// Clears the pause flag. Does nothing else while a task is in flight;
    /// otherwise picks the active set (or the first runnable one) and
    /// dispatches its next task.
    pub fn play(&mut self) -> Option<Dispatch> {
        if self.paused {
            info!("Resuming scheduler");
            self.paused = false;
        }
        if self.running {
            return None;
        }
        self.start_next()
    }

    /// Same as [`Scheduler::play`].
    pub fn resume(&mut self) -> Option<Dispatch> {
        self.play()
    }

    /// Hold after the in-flight task; it is not cancelled.
    pub fn pause(&mut self) {
        if !self.paused {
            info!(running = self.running, "Pause requested");
            self.paused = true;
        }
    }

    /// Terminate the active set at the next completion boundary.
    ///
    /// While idle there is no boundary left to wait for: an active (paused)
    /// set is terminated at once, and with nothing active this is a no-op.
    pub fn stop(&mut self) {
        if self.running {
            info!("Stop requested; takes effect when the current task reports back");
            self.stopped = true;
            return;
        }
        if self.current.is_some() {
            info!("Stop requested while idle");
            self.terminate_current();
        }
        self.stopped = false;
    }

    /// Handle the worker's report for the in-flight task.
    pub fn on_task_complete(&mut self, outcome: TaskOutcome) -> Option<Dispatch> {
        let Some(dispatch) = self.in_flight.take() else {
            warn!("Completion reported with no task in flight");
            return None;
        };
        let index = dispatch.set_index;
        let ordinal = dispatch.task.ordinal();
        let Some(set) = self.sets.get_mut(index) else {
            warn!(index, "Completion for a task set that no longer exists");
            self.current = None;
            self.go_idle();
            return None;
        };
        debug_assert_eq!(set.front().map(Task::ordinal), Some(ordinal));

        let set_name = set.name().to_string();
        let mut advance = false;
        let mut abort = false;

        if self.stopped {
            set.drop_front();
            info!(task_set = %set_name, ordinal, "Task abandoned after stop request");
            self.events.push(SchedulerEvent::TaskAbandoned {
                set_index: index,
                set_name: set_name.clone(),
                ordinal,
            });
        } else {
            match outcome {
                TaskOutcome::Completed(result) => {
                    set.complete_front();
                    let progress = set.progress();
                    debug!(
                        task_set = %set_name,
                        ordinal,
                        progress,
                        result = %result.display(),
                        "Task completed"
                    );
                    self.events.push(SchedulerEvent::TaskCompleted {
                        set_index: index,
                        set_name: set_name.clone(),
                        ordinal,
                        progress,
                        result,
                    });
                    advance = true;
                }
                TaskOutcome::Failed(error) => {
                    set.drop_front();
                    warn!(task_set = %set_name, ordinal, error = %error, "Task failed");
                    self.events.push(SchedulerEvent::TaskFailed {
                        set_index: index,
                        set_name: set_name.clone(),
                        ordinal,
                        error: error.to_string(),
                    });
                    match self.policy {
                        FailurePolicy::Abort => abort = true,
                        FailurePolicy::Skip => advance = true,
                    }
                }
            }
        }

        if abort {
            self.terminate_current();
            self.stopped = false;
            self.go_idle();
            return None;
        }

        if advance && set.remaining() == 0 {
            if set.transition(TaskSetStatus::Finished) {
                info!(task_set = %set_name, index, "Task set finished");
                self.events.push(SchedulerEvent::StatusChanged {
                    set_index: index,
                    set_name,
                    status: TaskSetStatus::Finished,
                });
            }
            self.current = self.activate_from(index + 1);
        }

        if self.paused {
            info!("Paused; holding before the next task");
            self.go_idle();
            return None;
        }
        if self.stopped {
            self.terminate_current();
            self.stopped = false;
            self.go_idle();
            return None;
        }
        self.dispatch_current()
    }

    /// Take the events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Point-in-time view for status displays.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            running: self.running,
            paused: self.paused,
            stopped: self.stopped,
            current_set: self.current,
            in_flight: self.in_flight.clone(),
            sets: self.sets.iter().map(TaskSet::summary).collect(),
        }
    }

    fn start_next(&mut self) -> Option<Dispatch> {
        debug_assert!(self.in_flight.is_none());
        if self.stopped {
            // Stop arrived together with a pause; the pause halt came first.
            self.terminate_current();
            self.stopped = false;
            self.go_idle();
            return None;
        }
        if self.current.is_none() {
            self.current = self.activate_from(0);
        }
        self.dispatch_current()
    }

    /// Activate the first runnable set at or after `start`. Sets whose
    /// selection turns out empty are finished on the spot and skipped.
    fn activate_from(&mut self, start: usize) -> Option<usize> {
        let mut from = start;
        while let Some(index) = self.sets.first_runnable_from(from) {
            let set = self.sets.get_mut(index)?;
            if !set.is_activated() {
                let queued = set.activate();
                info!(task_set = %set.name(), index, queued, "Activated task set");
            }
            if set.remaining() > 0 {
                return Some(index);
            }
            if set.transition(TaskSetStatus::Finished) {
                info!(task_set = %set.name(), index, "Nothing selected; task set finished");
                self.events.push(SchedulerEvent::StatusChanged {
                    set_index: index,
                    set_name: set.name().to_string(),
                    status: TaskSetStatus::Finished,
                });
            }
            from = index + 1;
        }
        None
    }

    fn dispatch_current(&mut self) -> Option<Dispatch> {
        debug_assert!(self.in_flight.is_none());
        let Some(index) = self.current else {
            self.go_idle();
            return None;
        };
        let Some(set) = self.sets.get_mut(index) else {
            self.current = None;
            self.go_idle();
            return None;
        };
        let Some(task) = set.front().cloned() else {
            warn!(task_set = %set.name(), "Active task set has no remaining work");
            self.current = None;
            self.go_idle();
            return None;
        };

        let set_name = set.name().to_string();
        let label = set.task_label(task.ordinal()).unwrap_or_default();
        if set.transition(TaskSetStatus::Working) {
            self.events.push(SchedulerEvent::StatusChanged {
                set_index: index,
                set_name: set_name.clone(),
                status: TaskSetStatus::Working,
            });
        }

        let dispatch = Dispatch {
            set_index: index,
            set_uid: set.uid(),
            set_name: set_name.clone(),
            task,
        };
        debug!(task_set = %set_name, ordinal = dispatch.task.ordinal(), %label, "Dispatching task");
        self.events.push(SchedulerEvent::TaskStarted {
            set_index: index,
            set_name,
            ordinal: dispatch.task.ordinal(),
            label,
        });
        self.running = true;
        self.in_flight = Some(dispatch.clone());
        Some(dispatch)
    }

    /// End the active set early: a set that already ran goes to `Error`, one
    /// that was activated but never dispatched is released back to `Ready`.
    fn terminate_current(&mut self) {
        let Some(index) = self.current.take() else {
            return;
        };
        let Some(set) = self.sets.get_mut(index) else {
            return;
        };
        match set.status() {
            TaskSetStatus::Working => {
                if set.transition(TaskSetStatus::Error) {
                    warn!(task_set = %set.name(), index, "Task set terminated");
                    self.events.push(SchedulerEvent::StatusChanged {
                        set_index: index,
                        set_name: set.name().to_string(),
                        status: TaskSetStatus::Error,
                    });
                }
            }
            TaskSetStatus::Ready => {
                set.release();
                debug!(task_set = %set.name(), index, "Released task set that never started");
            }
            TaskSetStatus::Finished | TaskSetStatus::Error => {}
        }
    }

    fn go_idle(&mut self) {
        self.running = false;
        debug!(paused = self.paused, "Scheduler idle");
        self.events.push(SchedulerEvent::Idle {
            paused: self.paused,
        });
    }
}
