//! Row signatures.
//!
//! A signature is an order-insensitive fingerprint of a result set: the
//! row count plus a checksum over the sorted rendered rows. Two queries
//! that must return the same bag of rows must produce the same signature.

use quarry_types::Rows;

/// Field and NULL markers chosen so that rendered rows cannot collide
/// across cell boundaries for ordinary data.
const FIELD_SEP: &str = "\u{1f}";
const NULL_MARK: &str = "\u{0}NULL";

/// Computes `(count, checksum)` for a result set.
pub fn row_signature(rows: &Rows) -> (u64, String) {
    let mut rendered: Vec<String> = rows
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_deref().unwrap_or(NULL_MARK))
                .collect::<Vec<_>>()
                .join(FIELD_SEP)
        })
        .collect();
    rendered.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for row in &rendered {
        hasher.update(row.as_bytes());
        hasher.update(b"\n");
    }
    (rows.rows.len() as u64, hasher.finalize().to_hex().to_string())
}
