//! Unit normalization for extracted values.
//!
//! A raw value is first coerced to a float (numbers directly, booleans to 1/0,
//! readiness words to 1/0, other strings parsed as decimals, null to 0), then
//! scaled by the declared unit.

use crate::error::CoercionError;
use crate::path::RawValue;

/// Declared unit of a metric value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Unit {
    /// `ms`, exported as seconds.
    Milliseconds,
    /// `microsec`, exported as seconds.
    Microseconds,
    /// `Mb`, exported as bytes (decimal megabytes).
    Megabytes,
    /// `MiB`, exported as bytes.
    Mebibytes,
    Bytes,
    #[default]
    Count,
    /// Any tag not listed above; values pass through unchanged.
    Other(String),
}

impl Unit {
    /// Parses a unit tag. Tags are case-sensitive (`Mb` and `MiB` differ).
    pub fn parse(tag: &str) -> Self {
        match tag {
            "ms" => Unit::Milliseconds,
            "microsec" => Unit::Microseconds,
            "Mb" => Unit::Megabytes,
            "MiB" => Unit::Mebibytes,
            "bytes" => Unit::Bytes,
            "count" | "" => Unit::Count,
            other => Unit::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Unit::Milliseconds => "ms",
            Unit::Microseconds => "microsec",
            Unit::Megabytes => "Mb",
            Unit::Mebibytes => "MiB",
            Unit::Bytes => "bytes",
            Unit::Count => "count",
            Unit::Other(tag) => tag,
        }
    }

    /// Applies the unit's multiplicative scale. Never fails.
    pub fn scale(&self, value: f64) -> f64 {
        match self {
            Unit::Milliseconds => value / 1_000.0,
            Unit::Microseconds => value / 1_000_000.0,
            Unit::Megabytes => value * 1_000_000.0,
            Unit::Mebibytes => value * 1_048_576.0,
            Unit::Bytes | Unit::Count | Unit::Other(_) => value,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Coerces a raw value to a float.
pub fn coerce(raw: &RawValue<'_>) -> Result<f64, CoercionError> {
    match raw {
        RawValue::Number(n) => n.as_f64().ok_or_else(|| CoercionError {
            shape: format!("number {n}"),
        }),
        RawValue::Bool(true) => Ok(1.0),
        RawValue::Bool(false) => Ok(0.0),
        RawValue::Null => Ok(0.0),
        RawValue::String(s) => coerce_str(s),
        other => Err(CoercionError {
            shape: other.shape().to_string(),
        }),
    }
}

fn coerce_str(s: &str) -> Result<f64, CoercionError> {
    match s.to_lowercase().as_str() {
        "true" | "ready" => Ok(1.0),
        "false" | "notready" => Ok(0.0),
        lowered => lowered.parse::<f64>().map_err(|_| CoercionError {
            shape: format!("string {s:?}"),
        }),
    }
}

/// Coerces then scales, reporting coercion failures to the caller.
pub fn try_normalize(raw: &RawValue<'_>, unit: &Unit) -> Result<f64, CoercionError> {
    coerce(raw).map(|value| unit.scale(value))
}

/// Coerces then scales; an uncoercible value becomes 0.0.
pub fn normalize(raw: &RawValue<'_>, unit: &Unit) -> f64 {
    try_normalize(raw, unit).unwrap_or(0.0)
}
