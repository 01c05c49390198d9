//! Simulated scanning tunnelling microscope.
//!
//! Acquires line by line with tokio timers: each line takes a forward and a
//! backward pass of `line_time`, scaled by `time_scale` (0 runs as fast as
//! the runtime allows). Pause is honoured between lines, stop aborts at the
//! next line boundary. A finished task leaves a JSON record under
//! `output_dir/<task set>/<ordinal>.json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::WorkerSettings;
use crate::quantity::Quantity;
use crate::scheduler::Dispatch;
use crate::taskset::{ImageParams, ScanFrame};
use crate::worker::{ControlFlags, TaskWorker, WorkerError};

/// Where the simulated tip and feedback loop currently are.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeState {
    /// Applied bias
    pub bias: Quantity,
    /// Applied set-point
    pub set_point: Quantity,
    /// Tip position, x
    pub x_offset: Quantity,
    /// Tip position, y
    pub y_offset: Quantity,
    /// Lines scanned since creation
    pub lines_acquired: u64,
}

/// Result file written for every completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    /// Task set name
    pub task_set: String,
    /// Task ordinal
    pub ordinal: usize,
    /// Parameters the image was taken with
    pub params: ImageParams,
    /// Scanned area
    pub frame: ScanFrame,
    /// Lines acquired
    pub lines: u64,
    /// Acquisition start
    pub started_at: DateTime<Utc>,
    /// Acquisition end
    pub finished_at: DateTime<Utc>,
}

/// Simulated STM that scans line by line and writes a JSON record per task.
pub struct SimulatedMicroscope {
    probe: Mutex<ProbeState>,
    output_dir: PathBuf,
    time_scale: f64,
    pause_poll: Duration,
    fail_on: HashSet<(String, usize)>,
}

impl SimulatedMicroscope {
    /// Simulator writing records under `output_dir`, running in real time.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            probe: Mutex::new(ProbeState::default()),
            output_dir: output_dir.into(),
            time_scale: 1.0,
            pause_poll: Duration::from_millis(50),
            fail_on: HashSet::new(),
        }
    }

    /// Simulator configured from `[worker]` settings.
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self::new(&settings.output_dir)
            .with_time_scale(settings.time_scale)
            .with_pause_poll(settings.pause_poll)
    }

    /// Simulation speed factor; 0 skips all waiting.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    /// Set how often a paused acquisition re-checks the flags.
    pub fn with_pause_poll(mut self, pause_poll: Duration) -> Self {
        self.pause_poll = pause_poll;
        self
    }

    /// Make the task `ordinal` of set `task_set` fail with a device error.
    pub fn fail_on(mut self, task_set: impl Into<String>, ordinal: usize) -> Self {
        self.fail_on.insert((task_set.into(), ordinal));
        self
    }

    /// Directory records are written under.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Current probe state.
    pub async fn probe(&self) -> ProbeState {
        *self.probe.lock().await
    }

    fn line_duration(&self, params: &ImageParams) -> Duration {
        let seconds = 2.0 * params.line_time.to_real() * self.time_scale;
        if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        }
    }

    async fn wait_while_paused(&self, flags: &ControlFlags) {
        while flags.is_paused() && !flags.is_stopped() {
            sleep(self.pause_poll).await;
        }
    }

    async fn write_record(&self, record: &AcquisitionRecord) -> Result<PathBuf, WorkerError> {
        let dir = self.output_dir.join(sanitize(&record.task_set));
        tokio::fs::create_dir_all(&dir).await?;
        let file = dir.join(format!("{:04}.json", record.ordinal));
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&file, json).await?;
        debug!(path = %file.display(), "Wrote acquisition record");
        Ok(dir)
    }
}

#[async_trait]
impl TaskWorker for SimulatedMicroscope {
    async fn execute(
        &self,
        dispatch: &Dispatch,
        flags: &ControlFlags,
    ) -> Result<PathBuf, WorkerError> {
        // Exclusive for the whole acquisition.
        let mut probe = self.probe.lock().await;
        let params = dispatch.task.params();
        let started_at = Utc::now();

        probe.bias = params.bias;
        probe.set_point = params.set_point;
        probe.x_offset = params.x_offset;
        probe.y_offset = params.y_offset;

        if self
            .fail_on
            .contains(&(dispatch.set_name.clone(), dispatch.task.ordinal()))
        {
            return Err(WorkerError::Device(format!(
                "feedback loop lost contact during '{}' #{}",
                dispatch.set_name,
                dispatch.task.ordinal()
            )));
        }

        let line = self.line_duration(params);
        let lines = u64::from(params.lines_per_frame) * u64::from(params.repetitions);
        for _ in 0..lines {
            self.wait_while_paused(flags).await;
            if flags.is_stopped() {
                info!(
                    task_set = %dispatch.set_name,
                    ordinal = dispatch.task.ordinal(),
                    "Acquisition stopped at line boundary"
                );
                return Err(WorkerError::Aborted);
            }
            if line.is_zero() {
                tokio::task::yield_now().await;
            } else {
                sleep(line).await;
            }
            probe.lines_acquired += 1;
        }

        let record = AcquisitionRecord {
            task_set: dispatch.set_name.clone(),
            ordinal: dispatch.task.ordinal(),
            params: params.clone(),
            frame: params.frame(),
            lines,
            started_at,
            finished_at: Utc::now(),
        };
        self.write_record(&record).await
    }
}

/// Directory-safe form of a task-set name.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taskset::{Task, TaskSetConfig};

    fn dispatch(name: &str, lines: u32) -> Dispatch {
        let config = TaskSetConfig::new(name).with_lines(Quantity::from_real(1e-3), lines);
        Dispatch {
            set_index: 0,
            set_uid: uuid::Uuid::new_v4(),
            set_name: name.to_string(),
            task: Task::new(2, ImageParams::from(&config)),
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("bias series 1"), "bias_series_1");
        assert_eq!(sanitize("a/b"), "a_b");
        assert_eq!(sanitize(""), "unnamed");
    }

    #[tokio::test]
    async fn test_execute_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let scope = SimulatedMicroscope::new(dir.path()).with_time_scale(0.0);
        let flags = ControlFlags::new();

        let result = scope.execute(&dispatch("terrace", 8), &flags).await.unwrap();
        assert_eq!(result, dir.path().join("terrace"));

        let text = std::fs::read_to_string(result.join("0002.json")).unwrap();
        let record: AcquisitionRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(record.ordinal, 2);
        assert_eq!(record.lines, 8);
        assert_eq!(scope.probe().await.lines_acquired, 8);
    }

    #[tokio::test]
    async fn test_stop_aborts_at_line_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let scope = SimulatedMicroscope::new(dir.path()).with_time_scale(0.0);
        let flags = ControlFlags::new();
        flags.set_stopped(true);

        let err = scope.execute(&dispatch("stopped", 8), &flags).await.unwrap_err();
        assert!(matches!(err, WorkerError::Aborted));
        assert!(!dir.path().join("stopped").exists());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scope = SimulatedMicroscope::new(dir.path())
            .with_time_scale(0.0)
            .fail_on("broken", 2);
        let err = scope
            .execute(&dispatch("broken", 4), &ControlFlags::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Device(_)));
    }

    #[tokio::test]
    async fn test_pause_holds_acquisition_until_resumed() {
        let dir = tempfile::tempdir().unwrap();
        let scope = std::sync::Arc::new(
            SimulatedMicroscope::new(dir.path())
                .with_time_scale(0.0)
                .with_pause_poll(Duration::from_millis(5)),
        );
        let flags = ControlFlags::new();
        flags.set_paused(true);

        let task = {
            let scope = scope.clone();
            let flags = flags.clone();
            tokio::spawn(async move { scope.execute(&dispatch("held", 4), &flags).await })
        };
        sleep(Duration::from_millis(40)).await;
        assert!(!task.is_finished());

        flags.set_paused(false);
        let result = task.await.unwrap();
        assert!(result.is_ok());
    }
}
