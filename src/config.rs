//! Application settings loaded with figment.
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. A TOML file (optional)
//! 3. Environment variables prefixed with `STM_`, nested keys split on `__`
//!
//! ```text
//! STM_APPLICATION__LOG_LEVEL=debug
//! STM_SCHEDULER__FAILURE_POLICY=skip
//! STM_WORKER__TIME_SCALE=0.01
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bounds::InstrumentLimits;
use crate::error::{AppResult, TaskError};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// What the scheduler does when the worker reports a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Terminate the set with `Error` and go idle.
    #[default]
    Abort,
    /// Leave the task uncredited and continue with the next one.
    Skip,
}

/// Application settings, see [`Settings::load`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Name and logging
    pub application: ApplicationSettings,
    /// Scheduler actor
    pub scheduler: SchedulerSettings,
    /// Simulated worker
    pub worker: WorkerSettings,
    /// Per-input clamp limits
    pub limits: InstrumentLimits,
}

/// `[application]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Application name used in logs
    pub name: String,
    /// trace, debug, info, warn or error
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub log_json: bool,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            name: "STM Task Scheduler".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// What to do when a task fails
    pub failure_policy: FailurePolicy,
    /// Command mailbox capacity of the scheduler actor
    pub command_capacity: usize,
    /// Buffered progress events per subscriber
    pub event_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            command_capacity: 64,
            event_capacity: 256,
        }
    }
}

/// `[worker]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Root directory for acquisition records
    pub output_dir: PathBuf,
    /// Simulation speed factor (1.0 = real time, 0 = no waiting)
    pub time_scale: f64,
    /// How often a paused acquisition re-checks its flags
    #[serde(with = "humantime_serde")]
    pub pause_poll: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            time_scale: 1.0,
            pause_poll: Duration::from_millis(50),
        }
    }
}

impl Settings {
    /// Load defaults, then `path` (if given), then `STM_*` variables.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(TaskError::InvalidConfig(format!(
                    "settings file {} does not exist",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let settings: Settings = figment.merge(Env::prefixed("STM_").split("__")).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> AppResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.application.log_level.as_str()) {
            return Err(TaskError::InvalidConfig(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }
        if self.scheduler.command_capacity == 0 {
            return Err(TaskError::InvalidConfig(
                "scheduler.command_capacity must be at least 1".to_string(),
            ));
        }
        if self.scheduler.event_capacity == 0 {
            return Err(TaskError::InvalidConfig(
                "scheduler.event_capacity must be at least 1".to_string(),
            ));
        }
        let scale = self.worker.time_scale;
        if !scale.is_finite() || scale < 0.0 {
            return Err(TaskError::InvalidConfig(format!(
                "worker.time_scale must be a non-negative number, got {}",
                scale
            )));
        }
        if self.worker.pause_poll.is_zero() {
            return Err(TaskError::InvalidConfig(
                "worker.pause_poll must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults_are_valid() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.scheduler.failure_policy, FailurePolicy::Abort);
        assert_eq!(settings.worker.pause_poll, Duration::from_millis(50));
        assert_eq!(settings.limits, InstrumentLimits::default());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = write_settings(
            r#"
            [application]
            log_level = "debug"

            [scheduler]
            failure_policy = "skip"

            [worker]
            output_dir = "/tmp/stm"
            time_scale = 0.0
            pause_poll = "10ms"

            [limits]
            bias = { lower = "-2 V", upper = "2 V" }
            "#,
        );
        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.application.log_level, "debug");
        assert_eq!(settings.application.name, "STM Task Scheduler");
        assert_eq!(settings.scheduler.failure_policy, FailurePolicy::Skip);
        assert_eq!(settings.worker.pause_poll, Duration::from_millis(10));
        assert_eq!(settings.worker.time_scale, 0.0);
        assert!((settings.limits.bias.upper().to_real() - 2.0).abs() < 1e-12);
        assert_eq!(settings.limits.size, InstrumentLimits::default().size);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_settings("[scheduler]\nfailure_policy = \"abort\"\n");
        std::env::set_var("STM_SCHEDULER__FAILURE_POLICY", "skip");
        std::env::set_var("STM_APPLICATION__LOG_LEVEL", "warn");
        let result = Settings::load(Some(file.path()));
        std::env::remove_var("STM_SCHEDULER__FAILURE_POLICY");
        std::env::remove_var("STM_APPLICATION__LOG_LEVEL");

        let settings = result.unwrap();
        assert_eq!(settings.scheduler.failure_policy, FailurePolicy::Skip);
        assert_eq!(settings.application.log_level, "warn");
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_values() {
        let file = write_settings("[application]\nlog_level = \"loud\"\n");
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(TaskError::InvalidConfig(_))
        ));

        let file = write_settings("[worker]\ntime_scale = -1.0\n");
        assert!(Settings::load(Some(file.path())).is_err());

        let file = write_settings("[limits]\nbias = { lower = \"1 V\", upper = \"-1 V\" }\n");
        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(TaskError::Settings(_))
        ));
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }
}
