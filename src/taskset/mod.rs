//! Task-set model: configuration, sweep expansion, runtime sets and the
//! ordered list the scheduler consumes.

pub mod config;
pub mod list;
pub mod set;
pub mod status;
pub mod sweep;
pub mod task;

pub use config::{Sweep, SweepParameter, TaskSetConfig, MAX_SWEEP_TASKS};
pub use list::TaskSetList;
pub use set::{TaskSet, TaskSetSummary};
pub use status::TaskSetStatus;
pub use sweep::{estimate, expand, DurationBreakdown, Estimate};
pub use task::{ImageParams, ScanFrame, Task};
