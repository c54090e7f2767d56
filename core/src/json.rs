//! Tolerant readers over `serde_json::Value` trees.
//!
//! Elasticsearch omits fields, nulls them out, or switches between numbers
//! and numeric strings depending on endpoint and version. Everything here
//! collapses those cases into `None`, which the canonical shapes render as
//! [`ABSENT`].

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Placeholder substituted for every field that is missing or null at the source.
pub const ABSENT: &str = "-";

/// A reported value that may be absent at the source.
///
/// Serializes as the inner value, or as [`ABSENT`] when missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reported<T>(pub Option<T>);

#[cfg(test)]
impl<T> Reported<T> {
    pub fn absent() -> Self {
        Self(None)
    }

    pub fn value(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        Self(value)
    }
}

impl<T: Serialize> Serialize for Reported<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_str(ABSENT),
        }
    }
}

/// Walk `keys` from `root`. Missing parents, non-object nodes and trailing
/// nulls all yield `None`.
pub fn lookup<'a>(root: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .try_fold(root, |node, key| node.get(key))
        .filter(|value| !value.is_null())
}

pub fn read_u64(value: Option<&Value>) -> Option<u64> {
    let raw = value?;
    if let Some(number) = raw.as_u64() {
        return Some(number);
    }
    if let Some(number) = raw.as_f64() {
        return (number >= 0.0 && number.fract() == 0.0).then_some(number as u64);
    }
    raw.as_str().and_then(|raw| raw.trim().parse::<u64>().ok())
}

pub fn read_i64(value: Option<&Value>) -> Option<i64> {
    let raw = value?;
    if let Some(number) = raw.as_i64() {
        return Some(number);
    }
    if let Some(number) = raw.as_f64() {
        return (number.fract() == 0.0).then_some(number as i64);
    }
    raw.as_str().and_then(|raw| raw.trim().parse::<i64>().ok())
}

pub fn read_f64(value: Option<&Value>) -> Option<f64> {
    let raw = value?;
    if let Some(number) = raw.as_f64() {
        return Some(number);
    }
    raw.as_str().and_then(|raw| raw.trim().parse::<f64>().ok())
}

pub fn read_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(ToString::to_string)
}

/// Render any scalar as display text; null, missing and nested values become [`ABSENT`].
pub fn display_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => ABSENT.to_string(),
    }
}

/// Whole numbers keep one decimal place (`100.0`), everything else uses the
/// shortest round-trip form.
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
