//! Quantized physical quantities (significand × 10^exponent).
//!
//! Every instrument parameter handled by the scheduler is a [`Quantity`]: a
//! significand paired with one of six SI decades ([`Decade`]). Because the
//! decade is an enum, a quantity outside the supported range cannot be
//! constructed, and the SI prefix lookup is total.
//!
//! # Quantization
//!
//! [`Quantity::from_real`] derives an order of magnitude `e` from the decimal
//! representation of the value (`floor(log10|x|) - 2`, i.e. the number of
//! integer digits minus three) and snaps it to a decade:
//!
//! ```text
//! e in (0, 3)    -> 3      e in (-9, -6)  -> -6
//! e in (-3, 0)   -> 0      e in (-12, -9) -> -6
//! e in (-6, -3)  -> -3     e < -12        -> -12
//! exact decade boundaries keep their own decade, e > 3 -> 3
//! ```
//!
//! The significand is then rounded to three decimal places. For most values
//! this is engineering notation with a significand in `[1, 1000)`; values in
//! `[1e-9, 1e-7)` land in the micro decade with a small significand.
//!
//! # Example
//!
//! ```
//! use stm_tasks::quantity::{Decade, Quantity};
//!
//! let bias = Quantity::from_real(0.3);
//! assert_eq!(bias.decade(), Decade::Milli);
//! assert_eq!(bias.with_unit("V").to_string(), "300 mV");
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use crate::error::TaskError;

/// One of the six SI decades a [`Quantity`] may live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Decade {
    /// 10^-12 (p)
    Pico,
    /// 10^-9 (n)
    Nano,
    /// 10^-6 (μ)
    Micro,
    /// 10^-3 (m)
    Milli,
    /// 10^0
    Unit,
    /// 10^3 (k)
    Kilo,
}

impl Decade {
    /// All decades in ascending order.
    pub const ALL: [Decade; 6] = [
        Decade::Pico,
        Decade::Nano,
        Decade::Micro,
        Decade::Milli,
        Decade::Unit,
        Decade::Kilo,
    ];

    /// Base-10 exponent of this decade.
    pub const fn exponent(self) -> i32 {
        match self {
            Decade::Pico => -12,
            Decade::Nano => -9,
            Decade::Micro => -6,
            Decade::Milli => -3,
            Decade::Unit => 0,
            Decade::Kilo => 3,
        }
    }

    /// Decade for an exact exponent, `None` outside the supported set.
    pub fn from_exponent(exponent: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.exponent() == exponent)
    }

    /// SI prefix symbol. The unit decade maps to a single space.
    pub const fn prefix(self) -> &'static str {
        match self {
            Decade::Pico => "p",
            Decade::Nano => "n",
            Decade::Micro => "\u{03BC}",
            Decade::Milli => "m",
            Decade::Unit => " ",
            Decade::Kilo => "k",
        }
    }

    /// Next decade up, `None` at kilo.
    pub fn up(self) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.exponent() == self.exponent() + 3)
    }

    /// Next decade down, `None` at pico.
    pub fn down(self) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.exponent() == self.exponent() - 3)
    }

    /// Snap an order of magnitude onto a decade.
    ///
    /// The `-11..=-10` band maps to micro, not nano.
    fn for_magnitude(e: i32) -> Self {
        match e {
            e if e > 0 => Decade::Kilo,
            -2..=0 => Decade::Unit,
            -5..=-3 => Decade::Milli,
            -8..=-6 => Decade::Micro,
            -9 => Decade::Nano,
            -11..=-10 => Decade::Micro,
            _ => Decade::Pico,
        }
    }

    fn from_prefix_char(c: char) -> Option<Self> {
        match c {
            'p' => Some(Decade::Pico),
            'n' => Some(Decade::Nano),
            'u' | '\u{03BC}' | '\u{00B5}' => Some(Decade::Micro),
            'm' => Some(Decade::Milli),
            'k' => Some(Decade::Kilo),
            _ => None,
        }
    }

    /// Express `x` in units of this decade.
    fn scale_into(self, x: f64) -> f64 {
        let e = self.exponent();
        if e >= 0 {
            x / 10f64.powi(e)
        } else {
            x * 10f64.powi(-e)
        }
    }

    /// Inverse of [`Decade::scale_into`].
    fn scale_out(self, significand: f64) -> f64 {
        let e = self.exponent();
        if e >= 0 {
            significand * 10f64.powi(e)
        } else {
            significand / 10f64.powi(-e)
        }
    }
}

/// A physical value as `significand × 10^exponent`, quantized to SI decades.
///
/// Equality and ordering compare the resolved real value, never the raw
/// fields: `Quantity::new(0.3, Decade::Unit) == Quantity::new(300.0, Decade::Milli)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "QuantityRepr", into = "QuantityParts")]
pub struct Quantity {
    significand: f64,
    decade: Decade,
}

impl Quantity {
    /// Build a quantity from explicit parts.
    pub const fn new(significand: f64, decade: Decade) -> Self {
        Self {
            significand,
            decade,
        }
    }

    /// Build a quantity from a raw exponent, `None` if the exponent is not
    /// one of the six supported decades.
    pub fn from_parts(significand: f64, exponent: i32) -> Option<Self> {
        Decade::from_exponent(exponent).map(|decade| Self::new(significand, decade))
    }

    /// Zero in the unit decade.
    pub const fn zero() -> Self {
        Self::new(0.0, Decade::Unit)
    }

    /// Quantize an arbitrary real value (see the module docs for the rules).
    ///
    /// Zero and non-finite values are kept as-is in the unit decade.
    pub fn from_real(x: f64) -> Self {
        if x == 0.0 || !x.is_finite() {
            return Self::new(x, Decade::Unit);
        }
        let decade = Decade::for_magnitude(order_of_magnitude(x) - 2);
        let significand = round_to_thousandths(decade.scale_into(x));
        Self::new(significand, decade)
    }

    /// Resolved real value.
    pub fn to_real(self) -> f64 {
        self.decade.scale_out(self.significand)
    }

    /// Raw significand.
    pub fn significand(self) -> f64 {
        self.significand
    }

    /// Base-10 exponent of the decade.
    pub fn exponent(self) -> i32 {
        self.decade.exponent()
    }

    /// SI decade.
    pub fn decade(self) -> Decade {
        self.decade
    }

    /// SI prefix for the decade (`" "` for the unit decade).
    pub fn si_prefix(self) -> &'static str {
        self.decade.prefix()
    }

    /// Add `step` to the significand, renormalising into the neighbouring
    /// decade when the significand leaves `[1, 1000]` in magnitude.
    ///
    /// At the edge decades the significand is left unnormalised instead of
    /// leaving the supported range.
    pub fn increment(self, step: f64) -> Self {
        let significand = self.significand + step;
        let magnitude = significand.abs();
        if magnitude > 1000.0 {
            if let Some(up) = self.decade.up() {
                return Self::new(significand / 1000.0, up);
            }
        } else if magnitude > 0.0 && magnitude < 1.0 - 1e-4 {
            if let Some(down) = self.decade.down() {
                return Self::new(significand * 1000.0, down);
            }
        }
        Self::new(significand, self.decade)
    }

    /// Move to the neighbouring decade keeping the significand, which scales
    /// the value by 1000 (or 1/1000). No-op at the edge decades.
    pub fn shift_decade(self, up: bool) -> Self {
        let next = if up { self.decade.up() } else { self.decade.down() };
        Self::new(self.significand, next.unwrap_or(self.decade))
    }

    /// Sign of the resolved value: -1, 0 or 1.
    pub fn signum(self) -> i8 {
        if self.significand > 0.0 {
            1
        } else if self.significand < 0.0 {
            -1
        } else {
            0
        }
    }

    /// Display adapter that appends a unit symbol (`300 mV`).
    pub fn with_unit(self, unit: &str) -> WithUnit<'_> {
        WithUnit {
            quantity: self,
            unit,
        }
    }

    fn significand_text(self) -> String {
        let text = format!("{:.3}", self.significand);
        let text = text.trim_end_matches('0').trim_end_matches('.');
        if text == "-0" {
            "0".to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.to_real() == other.to_real()
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.to_real().partial_cmp(&other.to_real())
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Self::Output {
        Self::new(-self.significand, self.decade)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decade {
            Decade::Unit => write!(f, "{}", self.significand_text()),
            decade => write!(f, "{} {}", self.significand_text(), decade.prefix()),
        }
    }
}

/// See [`Quantity::with_unit`].
pub struct WithUnit<'a> {
    quantity: Quantity,
    unit: &'a str,
}

impl fmt::Display for WithUnit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.quantity.si_prefix().trim();
        write!(
            f,
            "{} {}{}",
            self.quantity.significand_text(),
            prefix,
            self.unit
        )
    }
}

/// Parses `"<number>[ ][prefix][unit]"`, e.g. `"300 mV"`, `"2.5pm"`, `"-1.5"`.
///
/// A prefix letter followed by anything (or standing alone) is read as a
/// prefix, so `"5 m"` is five milli-units. Trailing unit text is not checked,
/// but prefixes outside the six decades (`"5 MV"`, `"2 GHz"`) are rejected.
/// Without a prefix the number is quantized with [`Quantity::from_real`].
impl FromStr for Quantity {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let split = text
            .char_indices()
            .find(|&(i, c)| !is_number_char(text, i, c))
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let (number, rest) = text.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| TaskError::QuantityParse(s.to_string()))?;
        if !value.is_finite() {
            return Err(TaskError::QuantityParse(s.to_string()));
        }

        let rest = rest.trim_start();
        if has_unsupported_prefix(rest) {
            return Err(TaskError::QuantityParse(s.to_string()));
        }
        match rest.chars().next().and_then(Decade::from_prefix_char) {
            Some(decade) => Ok(Self::new(value, decade)),
            None if rest.chars().all(|c| c.is_alphabetic() || c == '/') => {
                Ok(Self::from_real(value))
            }
            None => Err(TaskError::QuantityParse(s.to_string())),
        }
    }
}

/// Prefixes outside the six decades (`M`, `G`, `T`, `P`, `E` before a unit
/// symbol) and the misspelled kilo `K`.
fn has_unsupported_prefix(rest: &str) -> bool {
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some('K'), _) => true,
        (Some('M' | 'G' | 'T' | 'P' | 'E'), Some(next)) => next.is_alphabetic(),
        _ => false,
    }
}

fn is_number_char(text: &str, index: usize, c: char) -> bool {
    match c {
        '0'..='9' | '.' => true,
        '+' | '-' => index == 0 || matches!(text[..index].chars().last(), Some('e' | 'E')),
        'e' | 'E' => text[index + 1..]
            .chars()
            .next()
            .is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+'),
        _ => false,
    }
}

/// Decimal exponent of the leading digit of `x` (`floor(log10|x|)`), taken
/// from the shortest round-trip representation to avoid `log10` drift at
/// exact powers of ten.
fn order_of_magnitude(x: f64) -> i32 {
    format!("{:e}", x.abs())
        .split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

fn round_to_thousandths(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Serialized form: always explicit parts.
#[derive(Serialize)]
struct QuantityParts {
    significand: f64,
    exponent: i32,
}

impl From<Quantity> for QuantityParts {
    fn from(q: Quantity) -> Self {
        Self {
            significand: q.significand,
            exponent: q.exponent(),
        }
    }
}

/// Accepted input forms: `{ significand, exponent }`, a bare number in base
/// units, or text such as `"300 mV"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuantityRepr {
    Parts { significand: f64, exponent: i32 },
    Real(f64),
    Text(String),
}

impl TryFrom<QuantityRepr> for Quantity {
    type Error = TaskError;

    fn try_from(repr: QuantityRepr) -> Result<Self, Self::Error> {
        match repr {
            QuantityRepr::Parts {
                significand,
                exponent,
            } => Quantity::from_parts(significand, exponent)
                .filter(|_| significand.is_finite())
                .ok_or_else(|| TaskError::QuantityParse(format!("{significand}e{exponent}"))),
            QuantityRepr::Real(x) if x.is_finite() => Ok(Quantity::from_real(x)),
            QuantityRepr::Real(x) => Err(TaskError::QuantityParse(x.to_string())),
            QuantityRepr::Text(text) => text.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_parts(q: Quantity, significand: f64, exponent: i32) {
        assert!(
            (q.significand() - significand).abs() < 1e-9,
            "significand {} != {}",
            q.significand(),
            significand
        );
        assert_eq!(q.exponent(), exponent, "exponent of {:?}", q);
    }

    #[test]
    fn test_from_real_engineering_decades() {
        assert_parts(Quantity::from_real(0.3), 300.0, -3);
        assert_parts(Quantity::from_real(1.5), 1.5, 0);
        assert_parts(Quantity::from_real(1500.0), 1.5, 3);
        assert_parts(Quantity::from_real(-0.25), -250.0, -3);
        assert_parts(Quantity::from_real(3e-6), 3.0, -6);
        assert_parts(Quantity::from_real(100e-9), 100.0, -9);
        assert_parts(Quantity::from_real(2.5e-12), 2.5, -12);
    }

    #[test]
    fn test_from_real_boundaries_keep_their_decade() {
        assert_parts(Quantity::from_real(1.0), 1.0, 0);
        assert_parts(Quantity::from_real(0.1), 100.0, -3);
        assert_parts(Quantity::from_real(1e-3), 1.0, -3);
        assert_parts(Quantity::from_real(1e-7), 100.0, -9);
        assert_parts(Quantity::from_real(5e-10), 500.0, -12);
    }

    #[test]
    fn test_from_real_low_nano_band_maps_to_micro() {
        let q = Quantity::from_real(5e-8);
        assert_eq!(q.decade(), Decade::Micro);
        assert_parts(q, 0.05, -6);
    }

    #[test]
    fn test_from_real_clamps_large_values_to_kilo() {
        let q = Quantity::from_real(2.5e6);
        assert_eq!(q.decade(), Decade::Kilo);
        assert!((q.to_real() - 2.5e6).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_precision() {
        let samples = [
            1.234, -4.999, 0.5, 0.123_456, 12.5, 999.9, 1500.0, 2e-3, 7.77e-5, 3.3e-6,
            2.5e-7, 4.2e-10, 9.9e-12, 2.5e-12,
        ];
        for x in samples {
            let back = Quantity::from_real(x).to_real();
            let rel = ((back - x) / x).abs();
            assert!(rel <= 5e-4, "{} -> {} (rel {})", x, back, rel);
        }
    }

    #[test]
    fn test_zero_and_negation() {
        let zero = Quantity::from_real(0.0);
        assert_eq!(zero.exponent(), 0);
        assert_eq!(zero.to_real(), 0.0);

        let q = Quantity::from_real(0.3);
        let n = -q;
        assert_eq!(n.exponent(), q.exponent());
        assert!((n.to_real() + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_comparison_uses_resolved_value() {
        let a = Quantity::new(0.3, Decade::Unit);
        let b = Quantity::new(300.0, Decade::Milli);
        assert_eq!(a, b);
        assert!(Quantity::new(1.0, Decade::Nano) < Quantity::new(2.0, Decade::Micro));
        assert!(Quantity::new(999.0, Decade::Pico) < Quantity::new(1.0, Decade::Nano));
        assert!(Quantity::new(-5.0, Decade::Unit) < Quantity::new(1.0, Decade::Pico));
    }

    #[test]
    fn test_si_prefix_table() {
        let prefixes: Vec<&str> = Decade::ALL.iter().map(|d| d.prefix()).collect();
        assert_eq!(prefixes, vec!["p", "n", "\u{03BC}", "m", " ", "k"]);
        assert!(Decade::from_exponent(-15).is_none());
        assert!(Quantity::from_parts(1.0, 6).is_none());
        assert_eq!(Quantity::from_parts(1.0, -9).map(|q| q.si_prefix()), Some("n"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Quantity::from_real(0.3).to_string(), "300 m");
        assert_eq!(Quantity::from_real(1.5).to_string(), "1.5");
        assert_eq!(Quantity::from_real(0.3).with_unit("V").to_string(), "300 mV");
        assert_eq!(Quantity::from_real(1.5).with_unit("V").to_string(), "1.5 V");
        assert_eq!(Quantity::from_real(100e-9).with_unit("m").to_string(), "100 nm");
    }

    #[test]
    fn test_parse() {
        let q: Quantity = "300 mV".parse().unwrap();
        assert_parts(q, 300.0, -3);
        let q: Quantity = "2.5pm".parse().unwrap();
        assert_parts(q, 2.5, -12);
        let q: Quantity = "5 um".parse().unwrap();
        assert_eq!(q.decade(), Decade::Micro);
        let q: Quantity = "-1.5 V".parse().unwrap();
        assert_parts(q, -1.5, 0);
        let q: Quantity = "1e-3".parse().unwrap();
        assert_parts(q, 1.0, -3);
        let q: Quantity = "100 nA".parse().unwrap();
        assert_parts(q, 100.0, -9);

        assert!("abc".parse::<Quantity>().is_err());
        assert!("".parse::<Quantity>().is_err());
        assert!("5 V 3".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_parse_rejects_unsupported_prefixes() {
        for text in ["5 MV", "5 K", "2 GHz", "1 TA", "5 Pm"] {
            let parsed = text.parse::<Quantity>();
            assert!(
                matches!(parsed, Err(TaskError::QuantityParse(_))),
                "{text} parsed as {parsed:?}"
            );
        }
        // Unit symbols on their own are still fine.
        assert_parts("5 V".parse().unwrap(), 5.0, 0);
        assert_parts("2 A".parse().unwrap(), 2.0, 0);
    }

    #[test]
    fn test_increment_renormalises() {
        let q = Quantity::new(999.0, Decade::Milli).increment(2.0);
        assert_eq!(q.decade(), Decade::Unit);
        assert!((q.significand() - 1.001).abs() < 1e-9);

        let q = Quantity::new(1.0, Decade::Unit).increment(-0.5);
        assert_eq!(q.decade(), Decade::Milli);
        assert!((q.significand() - 500.0).abs() < 1e-9);

        let q = Quantity::new(999.0, Decade::Kilo).increment(10.0);
        assert_eq!(q.decade(), Decade::Kilo);
        assert!((q.significand() - 1009.0).abs() < 1e-9);
    }

    #[test]
    fn test_shift_decade_stays_in_range() {
        let q = Quantity::new(2.0, Decade::Kilo).shift_decade(true);
        assert_eq!(q.decade(), Decade::Kilo);
        let q = Quantity::new(2.0, Decade::Pico).shift_decade(false);
        assert_eq!(q.decade(), Decade::Pico);
        let q = Quantity::new(2.0, Decade::Nano).shift_decade(true);
        assert_eq!(q.decade(), Decade::Micro);
    }

    #[test]
    fn test_serde_forms() {
        #[derive(Deserialize)]
        struct Holder {
            a: Quantity,
            b: Quantity,
            c: Quantity,
        }
        let holder: Holder = toml::from_str(
            r#"
            a = 0.3
            b = "100 nm"
            c = { significand = 2.5, exponent = -12 }
            "#,
        )
        .unwrap();
        assert_parts(holder.a, 300.0, -3);
        assert_parts(holder.b, 100.0, -9);
        assert_parts(holder.c, 2.5, -12);

        let bad: Result<Holder, _> = toml::from_str(
            r#"
            a = 1
            b = 2
            c = { significand = 1.0, exponent = 6 }
            "#,
        );
        assert!(bad.is_err());

        for text in ["a = nan\nb = 1\nc = 2", "a = 1\nb = inf\nc = 2"] {
            assert!(toml::from_str::<Holder>(text).is_err(), "{text}");
        }
        let bad: Result<Holder, _> = toml::from_str(
            r#"
            a = 1
            b = 2
            c = { significand = nan, exponent = -3 }
            "#,
        );
        assert!(bad.is_err());

        let json = serde_json::to_string(&Quantity::from_real(0.3)).unwrap();
        assert_eq!(json, r#"{"significand":300.0,"exponent":-3}"#);
    }
}
