//! Task-set scheduling for unattended scanning tunnelling microscope runs.
//!
//! A task set is a named batch of topography images sharing one base
//! configuration, optionally sweeping one parameter (bias, set-point, size
//! or scan offset). The [`scheduler`] runs the sets in list order, one task
//! at a time, against a [`worker::TaskWorker`], with cooperative pause and
//! stop.
//!
//! - [`quantity`]: significand/decade values snapped to SI prefixes
//! - [`bounds`]: inclusive ranges and the instrument's input limits
//! - [`taskset`]: configurations, sweep expansion, runtime sets
//! - [`scheduler`]: state machine, events and the actor front-end
//! - [`worker`]: the device abstraction and a simulated microscope
//! - [`config`], [`plan`], [`logging`]: settings, plan files, tracing setup

pub mod bounds;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod quantity;
pub mod scheduler;
pub mod taskset;
pub mod worker;

pub use error::{AppResult, TaskError};
