//! Plan files: batches of task-set configurations in TOML.
//!
//! ```toml
//! [[task_set]]
//! name = "bias series"
//! size = "100 nm"
//! x_offset = 0
//! y_offset = 0
//! bias = "300 mV"
//! set_point = "100 pA"
//! line_time = "1 s"
//! lines_per_frame = 256
//!
//! [task_set.sweep]
//! parameter = "bias"
//! start = "100 mV"
//! stop = "500 mV"
//! step = "100 mV"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AppResult, TaskError};
use crate::taskset::{estimate, Estimate, TaskSetConfig};

/// A batch of task-set configurations, run in file order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// `[[task_set]]` tables
    #[serde(rename = "task_set", default)]
    pub task_sets: Vec<TaskSetConfig>,
}

impl Plan {
    /// Parse and validate a plan.
    pub fn from_toml_str(text: &str) -> AppResult<Self> {
        let plan: Plan = toml::from_str(text)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Read, parse and validate a plan file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Every set must expand, and names must be unique (they name the
    /// result directories).
    pub fn validate(&self) -> AppResult<()> {
        let mut names = std::collections::HashSet::new();
        for config in &self.task_sets {
            if !names.insert(config.name.as_str()) {
                return Err(TaskError::InvalidConfig(format!(
                    "Duplicate task set name: '{}'",
                    config.name
                )));
            }
            config.validate()?;
        }
        Ok(())
    }

    /// Per-set estimates in plan order.
    pub fn estimates(&self) -> AppResult<Vec<(String, Estimate)>> {
        self.task_sets
            .iter()
            .map(|c| Ok((c.name.clone(), estimate(c)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taskset::SweepParameter;

    const PLAN: &str = r#"
        [[task_set]]
        name = "overview"
        size = "1 um"
        x_offset = 0
        y_offset = 0
        bias = "1 V"
        set_point = "50 pA"
        line_time = "500 ms"
        lines_per_frame = 128

        [[task_set]]
        name = "zoom"
        size = "100 nm"
        x_offset = "200 nm"
        y_offset = "-100 nm"
        bias = "300 mV"
        set_point = "100 pA"
        line_time = "1 s"
        lines_per_frame = 256
        repetitions = 2

        [task_set.sweep]
        parameter = "size"
        start = "50 nm"
        stop = "150 nm"
        step = "50 nm"
    "#;

    #[test]
    fn test_parse_plan() {
        let plan = Plan::from_toml_str(PLAN).unwrap();
        assert_eq!(plan.task_sets.len(), 2);
        assert!(plan.task_sets[0].sweep.is_none());
        assert_eq!(plan.task_sets[1].sweep.parameter, SweepParameter::Size);

        let estimates = plan.estimates().unwrap();
        assert_eq!(estimates[0].1.image_count, 1);
        assert_eq!(estimates[1].1.task_count, 3);
        assert_eq!(estimates[1].1.image_count, 6);
        assert!((estimates[1].1.total_seconds - 3072.0).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let text = r#"
            [[task_set]]
            name = "a"
            size = "1 um"
            x_offset = 0
            y_offset = 0
            bias = "1 V"
            set_point = "50 pA"
            line_time = "1 s"
            lines_per_frame = 16

            [[task_set]]
            name = "a"
            size = "1 um"
            x_offset = 0
            y_offset = 0
            bias = "1 V"
            set_point = "50 pA"
            line_time = "1 s"
            lines_per_frame = 16
        "#;
        assert!(matches!(
            Plan::from_toml_str(text),
            Err(TaskError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_bad_sweep_rejected_at_load() {
        let text = PLAN.replace("step = \"50 nm\"", "step = 0");
        assert!(matches!(
            Plan::from_toml_str(&text),
            Err(TaskError::InvalidSweep(_))
        ));
    }

    #[test]
    fn test_nan_value_rejected_at_load() {
        let text = PLAN.replace("bias = \"1 V\"", "bias = nan");
        assert!(matches!(
            Plan::from_toml_str(&text),
            Err(TaskError::Plan(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.toml");
        std::fs::write(&path, PLAN).unwrap();
        assert_eq!(Plan::load(&path).unwrap().task_sets.len(), 2);
        assert!(matches!(
            Plan::load(&dir.path().join("missing.toml")),
            Err(TaskError::Io(_))
        ));
    }
}
