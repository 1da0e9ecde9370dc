//! EXPLAIN output helpers.
//!
//! TiDB reports row estimates in an `estRows` column; vanilla MySQL uses
//! `rows`. The plan-estimation oracle and the minimizer's `plan_rows`
//! replay predicate both read whichever is present.

use quarry_types::Rows;

/// Extracts the root operator's row estimate from an EXPLAIN result set.
///
/// Looks for an `estRows` column first, then `rows`; returns the value of
/// the first row, which is the plan root in both TiDB and MySQL layouts.
pub fn plan_rows(rows: &Rows) -> Option<f64> {
    let idx = find_column(rows, "estRows").or_else(|| find_column(rows, "rows"))?;
    let first = rows.rows.first()?;
    first.get(idx)?.as_deref()?.trim().parse::<f64>().ok()
}

/// A stable signature of the plan shape: the operator names from the `id`
/// column, top to bottom, stripped of tree-drawing characters and
/// instance suffixes (`HashJoin_8` and `HashJoin_12` sign identically).
pub fn plan_signature(rows: &Rows) -> String {
    let Some(idx) = find_column(rows, "id") else {
        return String::new();
    };
    let mut parts = Vec::new();
    for row in &rows.rows {
        let Some(Some(cell)) = row.get(idx) else {
            continue;
        };
        let name = cell
            .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
            .trim();
        let name = name.split('_').next().unwrap_or(name);
        if !name.is_empty() {
            parts.push(name.to_string());
        }
    }
    parts.join(">")
}

fn find_column(rows: &Rows, name: &str) -> Option<usize> {
    rows.columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
}
