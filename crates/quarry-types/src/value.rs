//! Typed values as emitted by the generator.
//!
//! Values cross the engine as (type family, rendered string) pairs. The
//! family prefix keeps distinct families from colliding in value-keyed
//! maps: the number `1` and the string `"1"` must never share a bitmap,
//! and neither must `"1"` and `"01"` once numbers are normalized.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Type family of a generated value.
///
/// Families are coarse on purpose: the truth store only needs enough
/// resolution to keep value keys collision-free across column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeFamily {
    /// Integer and floating-point columns.
    Number,
    /// Character and text columns.
    String,
    /// Date, time, datetime, and timestamp columns.
    Time,
    /// Boolean-ish columns (TINYINT(1) and friends).
    Bool,
    /// Everything else (enum, set, json, spatial, ...).
    Other,
}

impl TypeFamily {
    /// Stable key prefix for this family.
    pub fn prefix(self) -> &'static str {
        match self {
            TypeFamily::Number => "number",
            TypeFamily::String => "string",
            TypeFamily::Time => "time",
            TypeFamily::Bool => "bool",
            TypeFamily::Other => "other",
        }
    }
}

impl fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A single generated value: a type family plus its rendered form.
///
/// `repr == None` is SQL NULL; it renders as the literal `NULL` under its
/// family, so a NULL number and a NULL string still key differently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypedValue {
    /// Type family of the column this value belongs to.
    pub family: TypeFamily,
    /// Rendered value; `None` is SQL NULL.
    pub repr: Option<String>,
}

impl TypedValue {
    /// An integer value.
    pub fn number(v: i64) -> Self {
        Self {
            family: TypeFamily::Number,
            repr: Some(v.to_string()),
        }
    }

    /// A floating-point value rendered with Rust's shortest-roundtrip form.
    pub fn float(v: f64) -> Self {
        Self {
            family: TypeFamily::Number,
            repr: Some(v.to_string()),
        }
    }

    /// A string value.
    pub fn string(v: impl Into<String>) -> Self {
        Self {
            family: TypeFamily::String,
            repr: Some(v.into()),
        }
    }

    /// A timestamp value, rendered as RFC 3339 with nanosecond precision.
    pub fn time(v: DateTime<Utc>) -> Self {
        Self {
            family: TypeFamily::Time,
            repr: Some(v.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        }
    }

    /// A raw time-family value (already rendered, e.g. a DATE literal).
    pub fn time_raw(v: impl Into<String>) -> Self {
        Self {
            family: TypeFamily::Time,
            repr: Some(v.into()),
        }
    }

    /// A boolean value, rendered as `1` / `0`.
    pub fn boolean(v: bool) -> Self {
        Self {
            family: TypeFamily::Bool,
            repr: Some(if v { "1" } else { "0" }.to_string()),
        }
    }

    /// A value of the catch-all family.
    pub fn other(v: impl Into<String>) -> Self {
        Self {
            family: TypeFamily::Other,
            repr: Some(v.into()),
        }
    }

    /// SQL NULL under the given family.
    pub fn null(family: TypeFamily) -> Self {
        Self { family, repr: None }
    }

    /// Whether this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        self.repr.is_none()
    }

    /// Rendered form; NULL renders as the literal `NULL`.
    pub fn render(&self) -> &str {
        self.repr.as_deref().unwrap_or("NULL")
    }

    /// Family-prefixed key for value-keyed maps, e.g. `number:42`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.family.prefix(), self.render())
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.render())
    }
}
