//! Task-set configuration: fixed instrument parameters plus an optional sweep.

use serde::{Deserialize, Serialize};

use crate::bounds::{Bounds, InstrumentLimits};
use crate::error::{AppResult, TaskError};
use crate::quantity::Quantity;
use crate::taskset::task::ImageParams;

/// Upper limit on tasks generated by one sweep.
pub const MAX_SWEEP_TASKS: usize = 100_000;

/// Tolerance applied before flooring the sweep length, so decimal ranges
/// such as `0.1..=0.3` step `0.1` keep their last element.
const SWEEP_EPSILON: f64 = 1e-9;

/// Which instrument parameter a sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParameter {
    /// No sweep
    #[default]
    None,
    /// Sample bias
    Bias,
    /// Tunnelling current set-point
    SetPoint,
    /// Scan area edge length
    Size,
    /// Scan centre, x
    XOffset,
    /// Scan centre, y
    YOffset,
}

impl SweepParameter {
    /// Human-readable parameter name.
    pub fn label(self) -> &'static str {
        match self {
            SweepParameter::None => "None",
            SweepParameter::Bias => "Bias",
            SweepParameter::SetPoint => "Set point",
            SweepParameter::Size => "Size",
            SweepParameter::XOffset => "X offset",
            SweepParameter::YOffset => "Y offset",
        }
    }

    /// SI unit symbol of the swept quantity.
    pub fn unit(self) -> &'static str {
        match self {
            SweepParameter::None => "",
            SweepParameter::Bias => "V",
            SweepParameter::SetPoint => "A",
            SweepParameter::Size | SweepParameter::XOffset | SweepParameter::YOffset => "m",
        }
    }

    /// Input limits that apply to the swept quantity.
    pub fn bounds(self, limits: &InstrumentLimits) -> Option<Bounds> {
        match self {
            SweepParameter::None => None,
            SweepParameter::Bias => Some(limits.bias),
            SweepParameter::SetPoint => Some(limits.set_point),
            SweepParameter::Size => Some(limits.size),
            SweepParameter::XOffset => Some(limits.x_offset),
            SweepParameter::YOffset => Some(limits.y_offset),
        }
    }

    /// Current value of this parameter in `params`.
    pub fn read(self, params: &ImageParams) -> Option<Quantity> {
        match self {
            SweepParameter::None => None,
            SweepParameter::Bias => Some(params.bias),
            SweepParameter::SetPoint => Some(params.set_point),
            SweepParameter::Size => Some(params.size),
            SweepParameter::XOffset => Some(params.x_offset),
            SweepParameter::YOffset => Some(params.y_offset),
        }
    }

    /// Replace this parameter in `params`. No-op for `None`.
    pub fn write(self, params: &mut ImageParams, value: Quantity) {
        match self {
            SweepParameter::None => {}
            SweepParameter::Bias => params.bias = value,
            SweepParameter::SetPoint => params.set_point = value,
            SweepParameter::Size => params.size = value,
            SweepParameter::XOffset => params.x_offset = value,
            SweepParameter::YOffset => params.y_offset = value,
        }
    }
}

/// Arithmetic progression over one parameter, inclusive of both ends.
///
/// `start`, `stop` and `step` are ignored when `parameter` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sweep {
    /// Swept parameter
    pub parameter: SweepParameter,
    /// First value
    pub start: Quantity,
    /// Last value, inclusive when reached exactly
    pub stop: Quantity,
    /// Increment, negative for downward sweeps
    pub step: Quantity,
}

impl Sweep {
    /// No sweep: one task with the fixed parameters.
    pub fn none() -> Self {
        Self::default()
    }

    /// Sweep over `parameter` from `start` to `stop`.
    pub fn new(parameter: SweepParameter, start: Quantity, stop: Quantity, step: Quantity) -> Self {
        Self {
            parameter,
            start,
            stop,
            step,
        }
    }

    /// Whether no parameter is swept.
    pub fn is_none(&self) -> bool {
        self.parameter == SweepParameter::None
    }

    /// Number of sweep elements, `floor((stop - start) / step) + 1`, computed
    /// on resolved values. Always 1 without a sweep.
    pub fn len(&self) -> AppResult<usize> {
        if self.is_none() {
            return Ok(1);
        }
        let (start, stop, step) = (self.start.to_real(), self.stop.to_real(), self.step.to_real());
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(TaskError::InvalidSweep(
                "start, stop and step must be finite".to_string(),
            ));
        }
        if step == 0.0 {
            return Err(TaskError::InvalidSweep("step must be non-zero".to_string()));
        }

        let ratio = (stop - start) / step;
        if ratio < -SWEEP_EPSILON {
            return Err(TaskError::InvalidSweep(format!(
                "range {} .. {} with step {} produces no elements",
                self.start, self.stop, self.step
            )));
        }
        let count = (ratio + SWEEP_EPSILON).floor() + 1.0;
        if count > MAX_SWEEP_TASKS as f64 {
            return Err(TaskError::InvalidSweep(format!(
                "sweep produces {} tasks (max {})",
                count, MAX_SWEEP_TASKS
            )));
        }
        Ok(count as usize)
    }

    /// Quantized sweep values in order. Each element is computed as
    /// `start + i * step` and quantized on its own.
    pub fn values(&self) -> AppResult<Vec<Quantity>> {
        let count = self.len()?;
        if self.is_none() {
            return Ok(Vec::new());
        }
        let (start, step) = (self.start.to_real(), self.step.to_real());
        Ok((0..count)
            .map(|i| Quantity::from_real(start + i as f64 * step))
            .collect())
    }
}

/// Everything needed to generate one task set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSetConfig {
    /// Unique name, also names the result directory
    pub name: String,
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
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    /// Optional parameter sweep
    #[serde(default)]
    pub sweep: Sweep,
}

fn default_repetitions() -> u32 {
    1
}

impl TaskSetConfig {
    /// Front-panel defaults: 100 nm frame at the origin, 300 mV, 100 pA,
    /// 1 s per line, 256 lines.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: Quantity::from_real(100e-9),
            x_offset: Quantity::zero(),
            y_offset: Quantity::zero(),
            bias: Quantity::from_real(0.3),
            set_point: Quantity::from_real(100e-12),
            line_time: Quantity::from_real(1.0),
            lines_per_frame: 256,
            repetitions: 1,
            sweep: Sweep::none(),
        }
    }

    /// Replace the sweep.
    pub fn with_sweep(mut self, sweep: Sweep) -> Self {
        self.sweep = sweep;
        self
    }

    /// Set the line time and frame height.
    pub fn with_lines(mut self, line_time: Quantity, lines_per_frame: u32) -> Self {
        self.line_time = line_time;
        self.lines_per_frame = lines_per_frame;
        self
    }

    /// Set the number of images per task.
    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Check the configuration before any task is generated.
    pub fn validate(&self) -> AppResult<()> {
        if self.lines_per_frame == 0 {
            return Err(TaskError::InvalidConfig(format!(
                "task set '{}': lines_per_frame must be at least 1",
                self.name
            )));
        }
        if self.repetitions == 0 {
            return Err(TaskError::InvalidConfig(format!(
                "task set '{}': repetitions must be at least 1",
                self.name
            )));
        }
        let fixed = [
            ("size", self.size),
            ("x_offset", self.x_offset),
            ("y_offset", self.y_offset),
            ("bias", self.bias),
            ("set_point", self.set_point),
        ];
        if let Some((field, _)) = fixed.iter().find(|(_, v)| !v.to_real().is_finite()) {
            return Err(TaskError::InvalidConfig(format!(
                "task set '{}': {} must be finite",
                self.name, field
            )));
        }
        let line_time = self.line_time.to_real();
        if !line_time.is_finite() || line_time <= 0.0 {
            return Err(TaskError::InvalidConfig(format!(
                "task set '{}': line_time must be positive",
                self.name
            )));
        }
        self.sweep.len().map(|_| ())
    }

    /// Copy with every value clamped to `limits` and the set-point polarity
    /// aligned with the bias.
    pub fn clamped(&self, limits: &InstrumentLimits) -> Self {
        let bias = limits.bias.clamp(self.bias);
        let mut set_point = limits.set_point.clamp(self.set_point);
        if bias.signum() * set_point.signum() < 0 {
            set_point = -set_point;
        }

        let sweep = match self.sweep.parameter.bounds(limits) {
            Some(bounds) => Sweep {
                parameter: self.sweep.parameter,
                start: bounds.clamp(self.sweep.start),
                stop: bounds.clamp(self.sweep.stop),
                step: self.sweep.step,
            },
            None => self.sweep,
        };

        Self {
            name: self.name.clone(),
            size: limits.size.clamp(self.size),
            x_offset: limits.x_offset.clamp(self.x_offset),
            y_offset: limits.y_offset.clamp(self.y_offset),
            bias,
            set_point,
            line_time: limits.line_time.clamp(self.line_time),
            lines_per_frame: self.lines_per_frame,
            repetitions: self.repetitions,
            sweep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(x: f64) -> Quantity {
        Quantity::from_real(x)
    }

    #[test]
    fn test_sweep_len_inclusive() {
        let sweep = Sweep::new(SweepParameter::Bias, q(0.1), q(0.3), q(0.1));
        assert_eq!(sweep.len().unwrap(), 3);

        let sweep = Sweep::new(SweepParameter::Bias, q(0.2), q(1.0), q(0.1));
        assert_eq!(sweep.len().unwrap(), 9);

        let sweep = Sweep::new(SweepParameter::Bias, q(0.1), q(0.35), q(0.1));
        assert_eq!(sweep.len().unwrap(), 3);
    }

    #[test]
    fn test_sweep_downward() {
        let sweep = Sweep::new(SweepParameter::Bias, q(0.3), q(-0.3), q(-0.3));
        let values: Vec<f64> = sweep.values().unwrap().into_iter().map(|v| v.to_real()).collect();
        assert_eq!(values.len(), 3);
        assert!((values[1]).abs() < 1e-12);
        assert!((values[2] + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_sweep_rejects_zero_step() {
        let sweep = Sweep::new(SweepParameter::Size, q(10e-9), q(50e-9), Quantity::zero());
        assert!(matches!(sweep.len(), Err(TaskError::InvalidSweep(_))));
    }

    #[test]
    fn test_sweep_rejects_empty_range() {
        let sweep = Sweep::new(SweepParameter::Bias, q(1.0), q(0.5), q(0.1));
        assert!(matches!(sweep.len(), Err(TaskError::InvalidSweep(_))));
    }

    #[test]
    fn test_sweep_rejects_oversized_range() {
        let sweep = Sweep::new(SweepParameter::Bias, q(-5.0), q(5.0), q(1e-9));
        assert!(matches!(sweep.len(), Err(TaskError::InvalidSweep(_))));
    }

    #[test]
    fn test_none_ignores_range() {
        let sweep = Sweep::new(SweepParameter::None, q(1.0), q(0.5), Quantity::zero());
        assert_eq!(sweep.len().unwrap(), 1);
        assert!(sweep.values().unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_lines() {
        let config = TaskSetConfig::new("frame").with_lines(q(1.0), 0);
        assert!(matches!(config.validate(), Err(TaskError::InvalidConfig(_))));
        let config = TaskSetConfig::new("frame").with_repetitions(0);
        assert!(config.validate().is_err());
        assert!(TaskSetConfig::new("frame").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_values() {
        let mut config = TaskSetConfig::new("nan bias");
        config.bias = Quantity::from_real(f64::NAN);
        assert!(matches!(config.validate(), Err(TaskError::InvalidConfig(msg)) if msg.contains("bias")));

        let mut config = TaskSetConfig::new("inf offset");
        config.x_offset = Quantity::from_real(f64::INFINITY);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamped_keeps_nan_inside_limits() {
        let limits = InstrumentLimits::default();
        let mut config = TaskSetConfig::new("nan");
        config.bias = Quantity::from_real(f64::NAN);
        config.size = Quantity::from_real(f64::NAN);
        let clamped = config.clamped(&limits);
        assert!(limits.bias.contains(clamped.bias));
        assert!(limits.size.contains(clamped.size));
    }

    #[test]
    fn test_clamped_respects_limits_and_polarity() {
        let limits = InstrumentLimits::default();
        let mut config = TaskSetConfig::new("edge");
        config.bias = q(-8.0);
        config.set_point = q(100e-12);
        config.size = q(10e-6);
        config.sweep = Sweep::new(SweepParameter::Bias, q(-9.0), q(9.0), q(1.0));

        let clamped = config.clamped(&limits);
        assert_eq!(clamped.bias, q(-5.0));
        assert!(clamped.set_point.to_real() < 0.0);
        assert_eq!(clamped.size, q(3e-6));
        assert_eq!(clamped.sweep.start, q(-5.0));
        assert_eq!(clamped.sweep.stop, q(5.0));
        assert_eq!(clamped.sweep.len().unwrap(), 11);
    }

    #[test]
    fn test_parameter_read_write() {
        let mut params = ImageParams::from(&TaskSetConfig::new("rw"));
        SweepParameter::XOffset.write(&mut params, q(50e-9));
        assert_eq!(SweepParameter::XOffset.read(&params), Some(q(50e-9)));
        SweepParameter::None.write(&mut params, q(1.0));
        assert_eq!(SweepParameter::None.read(&params), None);
    }

    #[test]
    fn test_config_from_toml() {
        let config: TaskSetConfig = toml::from_str(
            r#"
            name = "bias series"
            size = "100 nm"
            x_offset = 0
            y_offset = "-20 nm"
            bias = "300 mV"
            set_point = "100 pA"
            line_time = "500 ms"
            lines_per_frame = 128

            [sweep]
            parameter = "bias"
            start = "100 mV"
            stop = "300 mV"
            step = "100 mV"
            "#,
        )
        .unwrap();
        assert_eq!(config.repetitions, 1);
        assert_eq!(config.sweep.parameter, SweepParameter::Bias);
        assert_eq!(config.sweep.len().unwrap(), 3);
        assert!((config.y_offset.to_real() + 20e-9).abs() < 1e-18);
    }
}
