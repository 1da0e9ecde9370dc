//! Stable JSON encoding.
//!
//! Two-space indent, a trailing newline, and no HTML escaping (serde
//! never escapes `<`/`>`/`&`, unlike some encoders). Map keys are sorted
//! by construction: every map in the summary model is a `BTreeMap`, so
//! encoding a decoded value reproduces the original bytes.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;

use crate::{ReportError, Result};

/// Encodes a value with the reporter's canonical formatting.
pub fn encode_stable<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

/// Writes a value to `path` with canonical formatting.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = encode_stable(value)?;
    fs::write(path, bytes).map_err(ReportError::io(path.display().to_string()))
}
