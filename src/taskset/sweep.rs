//! Sweep expansion and run-time estimates.
//!
//! [`expand`] turns a [`TaskSetConfig`] into its ordered task list: one task
//! without a sweep, otherwise one task per sweep element with the swept
//! parameter replaced by the quantized element. [`estimate`] derives the
//! image count and the expected acquisition time shown next to each set.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppResult;
use crate::taskset::config::TaskSetConfig;
use crate::taskset::task::{ImageParams, Task};

/// Expand a configuration into ordered task descriptors (ordinals `0..N`).
pub fn expand(config: &TaskSetConfig) -> AppResult<Vec<Task>> {
    config.validate()?;
    let base = ImageParams::from(config);

    if config.sweep.is_none() {
        return Ok(vec![Task::new(0, base)]);
    }

    let parameter = config.sweep.parameter;
    Ok(config
        .sweep
        .values()?
        .into_iter()
        .enumerate()
        .map(|(ordinal, value)| {
            let mut params = base.clone();
            parameter.write(&mut params, value);
            Task::new(ordinal, params)
        })
        .collect())
}

/// Task/image counts and expected duration of one task set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Sweep elements (1 without a sweep)
    pub task_count: usize,
    /// `task_count × repetitions`
    pub image_count: u64,
    /// `2 × line_time × lines_per_frame × image_count`
    pub total_seconds: f64,
}

impl Estimate {
    /// Expected duration split into days, hours, minutes and seconds.
    pub fn breakdown(&self) -> DurationBreakdown {
        DurationBreakdown::from_seconds(self.total_seconds)
    }
}

/// Estimate the acquisition time of a configuration.
pub fn estimate(config: &TaskSetConfig) -> AppResult<Estimate> {
    config.validate()?;
    let task_count = config.sweep.len()?;
    let image_count = task_count as u64 * u64::from(config.repetitions);
    let total_seconds = 2.0
        * config.line_time.to_real()
        * f64::from(config.lines_per_frame)
        * image_count as f64;
    Ok(Estimate {
        task_count,
        image_count,
        total_seconds,
    })
}

/// Whole days/hours/minutes/seconds of a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DurationBreakdown {
    /// Whole days
    pub days: u64,
    /// Hours
    pub hours: u64,
    /// Minutes
    pub minutes: u64,
    /// Seconds
    pub seconds: u64,
}

impl DurationBreakdown {
    /// Split by successive floor division (86400, 3600, 60).
    pub fn from_seconds(total: f64) -> Self {
        let total = if total.is_finite() && total > 0.0 {
            total.floor() as u64
        } else {
            0
        };
        let days = total / 86_400;
        let hours = total / 3_600 - 24 * days;
        let minutes = total / 60 - 60 * 24 * days - 60 * hours;
        let seconds = total - 86_400 * days - 3_600 * hours - 60 * minutes;
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

/// `1d 2h 3m 4s`, or `2h 3m 4s` when there are no whole days.
impl fmt::Display for DurationBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.days > 0 {
            write!(f, "{}d ", self.days)?;
        }
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}
