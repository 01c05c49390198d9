//! Inclusive value ranges over [`Quantity`] and the instrument's input limits.

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, TaskError};
use crate::quantity::{Decade, Quantity};

/// Inclusive range `[lower, upper]`, compared on resolved values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
pub struct Bounds {
    lower: Quantity,
    upper: Quantity,
}

#[derive(Deserialize)]
struct RawBounds {
    lower: Quantity,
    upper: Quantity,
}

impl TryFrom<RawBounds> for Bounds {
    type Error = TaskError;

    fn try_from(raw: RawBounds) -> Result<Self, Self::Error> {
        Bounds::new(raw.lower, raw.upper)
    }
}

impl Bounds {
    /// Create a range, rejecting `lower > upper`.
    pub fn new(lower: Quantity, upper: Quantity) -> AppResult<Self> {
        if lower.to_real() > upper.to_real() {
            return Err(TaskError::InvalidBounds {
                lower: lower.to_string(),
                upper: upper.to_string(),
            });
        }
        Ok(Self { lower, upper })
    }

    const fn fixed(lower: Quantity, upper: Quantity) -> Self {
        Self { lower, upper }
    }

    /// Lower bound.
    pub fn lower(&self) -> Quantity {
        self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> Quantity {
        self.upper
    }

    /// Clamp `value` into the range. Out-of-range values are replaced by a
    /// copy of the nearest bound; in-range values are returned untouched.
    /// NaN snaps to the lower bound.
    pub fn clamp(&self, value: Quantity) -> Quantity {
        let v = value.to_real();
        if v.is_nan() || v < self.lower.to_real() {
            self.lower
        } else if v > self.upper.to_real() {
            self.upper
        } else {
            value
        }
    }

    /// Whether `value` lies inside the range, bounds included.
    pub fn contains(&self, value: Quantity) -> bool {
        let v = value.to_real();
        self.lower.to_real() <= v && v <= self.upper.to_real()
    }

    /// Increment the significand by `delta` and clamp the result.
    pub fn step(&self, value: Quantity, delta: f64) -> Quantity {
        self.clamp(value.increment(delta))
    }
}

/// Per-input limits of the microscope front panel.
///
/// Every configuration value handed to sweep expansion is clamped to these
/// first (see [`TaskSetConfig::clamped`](crate::taskset::TaskSetConfig::clamped)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentLimits {
    /// Sample bias (V)
    pub bias: Bounds,
    /// Tunnelling current set-point (A)
    pub set_point: Bounds,
    /// Scan area edge length (m)
    pub size: Bounds,
    /// Scan centre, x (m)
    pub x_offset: Bounds,
    /// Scan centre, y (m)
    pub y_offset: Bounds,
    /// Acquisition time per line (s)
    pub line_time: Bounds,
}

impl Default for InstrumentLimits {
    fn default() -> Self {
        let offset = Bounds::fixed(
            Quantity::new(-1.5, Decade::Micro),
            Quantity::new(1.5, Decade::Micro),
        );
        Self {
            bias: Bounds::fixed(
                Quantity::new(-5.0, Decade::Unit),
                Quantity::new(5.0, Decade::Unit),
            ),
            set_point: Bounds::fixed(
                Quantity::new(-500.0, Decade::Nano),
                Quantity::new(500.0, Decade::Nano),
            ),
            size: Bounds::fixed(
                Quantity::new(2.5, Decade::Pico),
                Quantity::new(3.0, Decade::Micro),
            ),
            x_offset: offset,
            y_offset: offset,
            line_time: Bounds::fixed(
                Quantity::new(2.5, Decade::Pico),
                Quantity::new(1000.0, Decade::Unit),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volts(x: f64) -> Quantity {
        Quantity::from_real(x)
    }

    #[test]
    fn test_clamp_inside_and_outside() {
        let b = InstrumentLimits::default().bias;
        assert_eq!(b.clamp(volts(0.3)), volts(0.3));
        assert_eq!(b.clamp(volts(7.0)), volts(5.0));
        assert_eq!(b.clamp(volts(-12.0)), volts(-5.0));
    }

    #[test]
    fn test_clamp_is_idempotent_and_in_range() {
        let b = InstrumentLimits::default().size;
        for x in [1e-15, 2.5e-12, 1e-9, 3e-6, 1.0, -1.0] {
            let once = b.clamp(volts(x));
            let twice = b.clamp(once);
            assert_eq!(once, twice);
            assert!(b.lower().to_real() <= once.to_real());
            assert!(once.to_real() <= b.upper().to_real());
            assert!(b.contains(once));
        }
    }

    #[test]
    fn test_clamp_non_finite_lands_on_a_bound() {
        let b = InstrumentLimits::default().bias;
        let nan = b.clamp(Quantity::from_real(f64::NAN));
        assert_eq!(nan, b.lower());
        assert!(b.contains(nan));
        assert_eq!(b.clamp(Quantity::from_real(f64::INFINITY)), b.upper());
        assert_eq!(b.clamp(Quantity::from_real(f64::NEG_INFINITY)), b.lower());
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        let err = Bounds::new(volts(1.0), volts(-1.0)).unwrap_err();
        assert!(matches!(err, TaskError::InvalidBounds { .. }));
        assert!(Bounds::new(volts(1.0), volts(1.0)).is_ok());
    }

    #[test]
    fn test_step_clamps_after_increment() {
        let b = InstrumentLimits::default().bias;
        let stepped = b.step(Quantity::new(4.5, Decade::Unit), 1.0);
        assert_eq!(stepped, volts(5.0));
        let stepped = b.step(Quantity::new(300.0, Decade::Milli), 100.0);
        assert_eq!(stepped, volts(0.4));
    }

    #[test]
    fn test_limits_deserialize_partial_override() {
        let limits: InstrumentLimits = toml::from_str(
            r#"
            bias = { lower = "-1 V", upper = "1 V" }
            "#,
        )
        .unwrap();
        assert_eq!(limits.bias.upper(), volts(1.0));
        assert_eq!(limits.size, InstrumentLimits::default().size);

        let inverted: Result<InstrumentLimits, _> = toml::from_str(
            r#"
            bias = { lower = "1 V", upper = "-1 V" }
            "#,
        );
        assert!(inverted.is_err());
    }
}
