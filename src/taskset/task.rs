//! Concrete task descriptors produced by sweep expansion.

use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;
use crate::taskset::config::{SweepParameter, TaskSetConfig};

/// Fully resolved parameters for one topography image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    /// Scan area edge length (m)
    pub size: Quantity,
    /// Scan centre, x (m)
    pub x_offset: Quantity,
    /// Scan centre, y (m)
    pub y_offset: Quantity,
    /// Sample bias (V)
    pub bias: Quantity,
    /// Tunnelling current set-point (A)
    pub set_point: Quantity,
    /// Time per scan line (s)
    pub line_time: Quantity,
    /// Scan lines per image
    pub lines_per_frame: u32,
    /// Images per task
    pub repetitions: u32,
}

impl From<&TaskSetConfig> for ImageParams {
    fn from(config: &TaskSetConfig) -> Self {
        Self {
            size: config.size,
            x_offset: config.x_offset,
            y_offset: config.y_offset,
            bias: config.bias,
            set_point: config.set_point,
            line_time: config.line_time,
            lines_per_frame: config.lines_per_frame,
            repetitions: config.repetitions,
        }
    }
}

impl ImageParams {
    /// Forward and backward pass over every line, for every repetition.
    pub fn acquisition_seconds(&self) -> f64 {
        2.0 * self.line_time.to_real()
            * f64::from(self.lines_per_frame)
            * f64::from(self.repetitions)
    }

    /// Scan area in nanometres.
    pub fn frame(&self) -> ScanFrame {
        let size_nm = self.size.to_real() * 1e9;
        ScanFrame {
            x_nm: self.x_offset.to_real() * 1e9 - size_nm / 2.0,
            y_nm: self.y_offset.to_real() * 1e9 - size_nm / 2.0,
            size_nm,
        }
    }
}

/// Square scan area: top-left corner and edge length, in nanometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanFrame {
    /// Left edge (nm)
    pub x_nm: f64,
    /// Top edge (nm)
    pub y_nm: f64,
    /// Edge length (nm)
    pub size_nm: f64,
}

/// One unit of instrument work inside a task set.
///
/// Parameters never change after expansion; the completion flag flips once,
/// when the task's acquisition is credited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    ordinal: usize,
    params: ImageParams,
    completed: bool,
}

impl Task {
    /// Task with `ordinal` in its set, not yet completed.
    pub fn new(ordinal: usize, params: ImageParams) -> Self {
        Self {
            ordinal,
            params,
            completed: false,
        }
    }

    /// Position of the task inside its set.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Instrument parameters of this task.
    pub fn params(&self) -> &ImageParams {
        &self.params
    }

    /// Whether the task was credited.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn mark_completed(&mut self) {
        debug_assert!(!self.completed, "task {} credited twice", self.ordinal);
        self.completed = true;
    }

    /// Short description for lists, e.g. `Bias: 200 mV`.
    pub fn label(&self, parameter: SweepParameter) -> String {
        match parameter.read(&self.params) {
            Some(value) => format!("{}: {}", parameter.label(), value.with_unit(parameter.unit())),
            None => format!("Image #{}", self.ordinal),
        }
    }
}
