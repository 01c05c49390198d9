//! Runtime task set: generated tasks, user selection and the remaining-work
//! queue consumed by the scheduler.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppResult, TaskError};
use crate::taskset::config::{SweepParameter, TaskSetConfig};
use crate::taskset::status::TaskSetStatus;
use crate::taskset::sweep::{self, Estimate};
use crate::taskset::task::{ScanFrame, Task};

/// One batch of tasks sharing a base configuration.
///
/// Tasks are generated once, when the set is created. The remaining-work
/// queue is only built on activation, from whatever selection the user has
/// left at that moment.
#[derive(Debug, Clone)]
pub struct TaskSet {
    uid: Uuid,
    index: usize,
    config: TaskSetConfig,
    tasks: Vec<Task>,
    selected: Vec<bool>,
    queue: VecDeque<usize>,
    selected_count: usize,
    activated: bool,
    status: TaskSetStatus,
    estimate: Estimate,
}

impl TaskSet {
    /// Expand `config` into a new `Ready` set stored at list position `index`.
    pub fn new(config: TaskSetConfig, index: usize) -> AppResult<Self> {
        let tasks = sweep::expand(&config)?;
        let estimate = sweep::estimate(&config)?;
        let selected = vec![true; tasks.len()];
        Ok(Self {
            uid: Uuid::new_v4(),
            index,
            config,
            tasks,
            selected,
            queue: VecDeque::new(),
            selected_count: 0,
            activated: false,
            status: TaskSetStatus::Ready,
            estimate,
        })
    }

    /// Stable identity, unaffected by reindexing.
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    /// Position in the owning list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Task-set name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Clamped configuration the tasks were generated from.
    pub fn config(&self) -> &TaskSetConfig {
        &self.config
    }

    /// All generated tasks, selected or not.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Current status.
    pub fn status(&self) -> TaskSetStatus {
        self.status
    }

    /// Precomputed size and duration estimate.
    pub fn estimate(&self) -> Estimate {
        self.estimate
    }

    /// Whether the task queue has been built.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Tasks still waiting in the remaining-work queue.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Number of tasks queued at activation.
    pub fn selected_count(&self) -> usize {
        self.selected_count
    }

    /// Whether the task with `ordinal` is selected to run.
    pub fn is_task_enabled(&self, ordinal: usize) -> bool {
        self.selected.get(ordinal).copied().unwrap_or(false)
    }

    /// Enable or disable a generated task before the set is activated.
    pub fn set_task_enabled(&mut self, ordinal: usize, enabled: bool) -> AppResult<()> {
        if self.activated {
            return Err(TaskError::SelectionLocked(self.config.name.clone()));
        }
        match self.selected.get_mut(ordinal) {
            Some(slot) => {
                *slot = enabled;
                Ok(())
            }
            None => Err(TaskError::TaskNotFound {
                name: self.config.name.clone(),
                ordinal,
            }),
        }
    }

    /// Build the remaining-work queue from the current selection, in ordinal
    /// order. Returns the number of queued tasks.
    pub(crate) fn activate(&mut self) -> usize {
        self.queue = self
            .tasks
            .iter()
            .filter(|t| self.selected[t.ordinal()] && !t.is_completed())
            .map(Task::ordinal)
            .collect();
        self.selected_count = self.queue.len();
        self.activated = true;
        self.selected_count
    }

    /// Undo an activation that never dispatched anything, unlocking the
    /// selection again. Only a `Ready` set can be released.
    pub(crate) fn release(&mut self) -> bool {
        if self.status != TaskSetStatus::Ready {
            return false;
        }
        self.queue.clear();
        self.selected_count = 0;
        self.activated = false;
        true
    }

    /// Next task to run.
    pub fn front(&self) -> Option<&Task> {
        self.queue.front().map(|&i| &self.tasks[i])
    }

    /// Credit the front task and pop it from the queue.
    pub(crate) fn complete_front(&mut self) -> Option<&Task> {
        let ordinal = self.queue.pop_front()?;
        self.selected[ordinal] = false;
        let task = &mut self.tasks[ordinal];
        task.mark_completed();
        Some(&*task)
    }

    /// Pop the front task without crediting it.
    pub(crate) fn drop_front(&mut self) -> Option<&Task> {
        let ordinal = self.queue.pop_front()?;
        self.selected[ordinal] = false;
        Some(&self.tasks[ordinal])
    }

    /// Move to `next`, ignoring transitions the state machine does not allow.
    pub(crate) fn transition(&mut self, next: TaskSetStatus) -> bool {
        if self.status == next {
            return false;
        }
        if !self.status.can_transition_to(next) {
            warn!(
                task_set = %self.config.name,
                from = %self.status,
                to = %next,
                "Ignoring invalid task set transition"
            );
            return false;
        }
        self.status = next;
        if next == TaskSetStatus::Error {
            self.queue.clear();
        }
        true
    }

    /// Number of credited tasks.
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_completed()).count()
    }

    /// Fraction of the selected tasks that completed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.selected_count == 0 {
            return if self.status == TaskSetStatus::Finished {
                1.0
            } else {
                0.0
            };
        }
        (self.completed_count() as f64 / self.selected_count as f64).min(1.0)
    }

    /// Scan areas to preview: every task of a size sweep, otherwise only the
    /// first task (all frames coincide).
    pub fn preview_frames(&self) -> Vec<ScanFrame> {
        let take = if self.config.sweep.parameter == SweepParameter::Size {
            self.tasks.len()
        } else {
            1
        };
        self.tasks
            .iter()
            .take(take)
            .map(|t| t.params().frame())
            .collect()
    }

    /// List entry for a task, e.g. `Bias: 200 mV`, or the set name when
    /// nothing is swept.
    pub fn task_label(&self, ordinal: usize) -> Option<String> {
        let task = self.tasks.get(ordinal)?;
        Some(if self.config.sweep.is_none() {
            self.config.name.clone()
        } else {
            task.label(self.config.sweep.parameter)
        })
    }

    /// Summary for status displays.
    pub fn summary(&self) -> TaskSetSummary {
        TaskSetSummary {
            uid: self.uid,
            index: self.index,
            name: self.config.name.clone(),
            status: self.status,
            progress: self.progress(),
            total_tasks: self.tasks.len(),
            selected_tasks: if self.activated {
                self.selected_count
            } else {
                self.selected.iter().filter(|&&s| s).count()
            },
            completed_tasks: self.completed_count(),
            remaining_tasks: self.queue.len(),
            estimate: self.estimate,
        }
    }
}

/// Status line of one task set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSetSummary {
    /// Stable id
    pub uid: Uuid,
    /// Position in the list
    pub index: usize,
    /// Set name
    pub name: String,
    /// Current status
    pub status: TaskSetStatus,
    /// Completed / selected, in `[0, 1]`
    pub progress: f64,
    /// Generated tasks
    pub total_tasks: usize,
    /// Tasks enabled for running
    pub selected_tasks: usize,
    /// Credited tasks
    pub completed_tasks: usize,
    /// Tasks still queued
    pub remaining_tasks: usize,
    /// Size and duration estimate
    pub estimate: Estimate,
}
