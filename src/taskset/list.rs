//! Ordered, editable list of task sets.

use tracing::{debug, info};
use uuid::Uuid;

use crate::bounds::InstrumentLimits;
use crate::error::{AppResult, TaskError};
use crate::taskset::config::TaskSetConfig;
use crate::taskset::set::TaskSet;
use crate::taskset::status::TaskSetStatus;

/// Ordered task sets; list order is execution order.
///
/// Every set's stored index equals its position, including after removals.
#[derive(Debug, Clone, Default)]
pub struct TaskSetList {
    sets: Vec<TaskSet>,
    limits: InstrumentLimits,
}

impl TaskSetList {
    /// Empty list clamping to `limits`.
    pub fn new(limits: InstrumentLimits) -> Self {
        Self {
            sets: Vec::new(),
            limits,
        }
    }

    /// Limits applied by [`TaskSetList::add`].
    pub fn limits(&self) -> &InstrumentLimits {
        &self.limits
    }

    /// Clamp `config` to the instrument limits, expand it and append the set.
    pub fn add(&mut self, config: TaskSetConfig) -> AppResult<&TaskSet> {
        let config = config.clamped(&self.limits);
        let index = self.sets.len();
        let set = TaskSet::new(config, index)?;
        info!(
            task_set = %set.name(),
            index,
            tasks = set.tasks().len(),
            "Added task set"
        );
        self.sets.push(set);
        Ok(&self.sets[index])
    }

    /// Remove the set at `index` once `confirm` agrees.
    ///
    /// A set that is currently `Working` cannot be removed.
    pub fn remove<F>(&mut self, index: usize, confirm: F) -> AppResult<TaskSet>
    where
        F: FnOnce(&TaskSet) -> bool,
    {
        let set = self.sets.get(index).ok_or(TaskError::TaskSetNotFound(index))?;
        if set.status() == TaskSetStatus::Working {
            return Err(TaskError::TaskSetActive(set.name().to_string()));
        }
        if !confirm(set) {
            return Err(TaskError::RemovalDeclined(set.name().to_string()));
        }

        let removed = self.sets.remove(index);
        for (i, set) in self.sets.iter_mut().enumerate().skip(index) {
            set.set_index(i);
        }
        debug!(task_set = %removed.name(), index, "Removed task set");
        Ok(removed)
    }

    /// Set at `index`.
    pub fn get(&self, index: usize) -> Option<&TaskSet> {
        self.sets.get(index)
    }

    /// Mutable set at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut TaskSet> {
        self.sets.get_mut(index)
    }

    /// Index of the set with `uid`.
    pub fn position(&self, uid: Uuid) -> Option<usize> {
        self.sets.iter().position(|s| s.uid() == uid)
    }

    /// Number of sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Sets in run order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskSet> {
        self.sets.iter()
    }

    /// First set at or after `start` that has not reached a terminal state.
    pub fn first_runnable_from(&self, start: usize) -> Option<usize> {
        self.sets
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, s)| !s.status().is_terminal())
            .map(|(i, _)| i)
    }
}
