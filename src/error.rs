//! Custom error types for the task-set scheduler.
//!
//! `TaskError` is the single error type surfaced by the library. It covers the
//! configuration side (malformed sweeps, invalid bounds, unreadable settings or
//! plan files) and the editing side of a task-set list (unknown indices,
//! locked selections, removals that were declined).
//!
//! ## Error Hierarchy
//!
//! - **`InvalidSweep`**: a sweep range that cannot be expanded (`step = 0`, a
//!   range that yields no elements, non-finite values). Always rejected before
//!   any task is generated.
//! - **`InvalidConfig`**: semantic validation failures in a task-set
//!   configuration or in the application settings.
//! - **`Settings`** / **`Plan`**: wrap the `figment` and `toml` parsers.
//! - **`TaskSetNotFound`**, **`UnknownTaskSet`**, **`TaskNotFound`**, **`SelectionLocked`**,
//!   **`TaskSetActive`**, **`RemovalDeclined`**: editing errors on the list.
//! - **`SchedulerUnavailable`**: the scheduler actor is gone (its command
//!   channel closed).
//!
//! Device failures are not part of this enum: they travel as
//! [`WorkerError`](crate::worker::WorkerError) inside completion messages and
//! are resolved into task-set status by the scheduler.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type AppResult<T> = std::result::Result<T, TaskError>;

/// Errors raised by task-set editing, configuration and the scheduler handle.
#[derive(Error, Debug)]
pub enum TaskError {
    /// Sweep range or step cannot produce tasks
    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),

    /// Semantic validation failure of a config or settings value
    #[error("Configuration validation error: {0}")]
    InvalidConfig(String),

    /// Range with `lower > upper`
    #[error("Invalid bounds: lower {lower} exceeds upper {upper}")]
    InvalidBounds { lower: String, upper: String },

    /// Text that is not a quantity
    #[error("Cannot parse quantity '{0}'")]
    QuantityParse(String),

    /// Index outside the task-set list
    #[error("No task set at index {0}")]
    TaskSetNotFound(usize),

    /// No task set with this uid
    #[error("No task set with id {0}")]
    UnknownTaskSet(uuid::Uuid),

    /// Ordinal outside a task set
    #[error("Task set '{name}' has no task with ordinal {ordinal}")]
    TaskNotFound { name: String, ordinal: usize },

    /// Task toggled after the set was activated
    #[error("Task selection of '{0}' is locked once the set has started")]
    SelectionLocked(String),

    /// Removal of the set being run
    #[error("Task set '{0}' is currently running and cannot be removed")]
    TaskSetActive(String),

    /// Removal not confirmed
    #[error("Removal of task set '{0}' was not confirmed")]
    RemovalDeclined(String),

    /// Settings extraction failed
    #[error("Settings error: {0}")]
    Settings(#[from] figment::Error),

    /// Plan file is not valid TOML for a plan
    #[error("Plan file error: {0}")]
    Plan(#[from] toml::de::Error),

    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scheduler actor is gone
    #[error("Scheduler is not running")]
    SchedulerUnavailable,
}
