//! Join cardinality evaluation.
//!
//! Both modes walk the extracted edge list in order. Bitmap mode counts
//! distinct wide rows and is an over-approximation for anything but INNER
//! joins; exact mode evaluates true row multiplicity over stored tuples,
//! bounded by caps so a pathological cross product cannot eat the worker.

use std::collections::BTreeMap;
use std::collections::HashMap;

use quarry_types::{JoinEdge, JoinKind, TypedValue};
use tracing::debug;

use crate::bitmap::Bitmap;
use crate::store::{SchemaTruth, TableRows};

/// Why an evaluation was skipped instead of producing a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A participating table has no stored tuples (exact) or no truth
    /// data at all (bitmap).
    MissingRows,
    /// A participating table exceeds the per-table cap.
    TableRowsExceeded,
    /// An intermediate composite set would strictly exceed the join cap.
    JoinRowsExceeded,
    /// An edge shape the mode cannot evaluate.
    UnsupportedJoin,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::MissingRows => "missing_rows",
            SkipReason::TableRowsExceeded => "table_rows_exceeded",
            SkipReason::JoinRowsExceeded => "join_rows_exceeded",
            SkipReason::UnsupportedJoin => "unsupported_join",
        }
    }
}

/// Outcome of a join cardinality evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinCount {
    Count(u64),
    Skipped(SkipReason),
}

impl JoinCount {
    /// The computed count, if the evaluation ran.
    pub fn count(self) -> Option<u64> {
        match self {
            JoinCount::Count(n) => Some(n),
            JoinCount::Skipped(_) => None,
        }
    }
}

/// Caps for exact-mode evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalCaps {
    /// Maximum rows per participating table.
    pub table_cap: usize,
    /// Maximum intermediate composite count.
    pub join_cap: usize,
}

impl Default for EvalCaps {
    fn default() -> Self {
        Self {
            table_cap: 256,
            join_cap: 100_000,
        }
    }
}

// ============================================================================
// Bitmap mode
// ============================================================================

/// Counts distinct wide rows surviving the join chain.
///
/// Outer joins are folded as union-with-the-other-side, which cannot
/// materialize null-extended rows; callers must restrict themselves to
/// INNER joins on simple keys before trusting this count.
pub fn bitmap_count(truth: &SchemaTruth, edges: &[JoinEdge]) -> JoinCount {
    if edges.is_empty() {
        return JoinCount::Skipped(SkipReason::UnsupportedJoin);
    }

    let universe = truth.row_count() as usize;
    let mut running = Bitmap::full(universe);

    for edge in edges {
        let Some(left) = truth.table(&edge.left_table) else {
            return JoinCount::Skipped(SkipReason::MissingRows);
        };
        let Some(right) = truth.table(&edge.right_table) else {
            return JoinCount::Skipped(SkipReason::MissingRows);
        };

        match edge.kind {
            JoinKind::Inner | JoinKind::Semi => {
                if !edge.has_keys() {
                    return JoinCount::Skipped(SkipReason::UnsupportedJoin);
                }
                let joined = join_rows(left, right, &edge.left_keys, &edge.right_keys);
                running = running.and(&joined);
            }
            JoinKind::Left => running.or_with(&left.all_rows()),
            JoinKind::Right | JoinKind::Cross => running.or_with(&right.all_rows()),
            JoinKind::Anti => {
                if !edge.has_keys() {
                    return JoinCount::Skipped(SkipReason::UnsupportedJoin);
                }
                let joined = join_rows(left, right, &edge.left_keys, &edge.right_keys);
                running = running.and(&left.all_rows()).sub(&joined);
            }
        }
    }

    JoinCount::Count(running.count())
}

/// Rows whose key columns hold equal values on both sides: the union over
/// shared value keys of `left AND right`, intersected across key pairs.
fn join_rows(left: &TableRows, right: &TableRows, left_keys: &[String], right_keys: &[String]) -> Bitmap {
    let mut result: Option<Bitmap> = None;
    for (lk, rk) in left_keys.iter().zip(right_keys.iter()) {
        let left_map = left.values_for(lk);
        let right_map = right.values_for(rk);
        let mut pair = Bitmap::new();
        for (key, left_bits) in left_map.iter() {
            if let Some(right_bits) = right_map.get(key) {
                pair.or_with(&left_bits.and(right_bits));
            }
        }
        result = Some(match result {
            Some(acc) => acc.and(&pair),
            None => pair,
        });
    }
    result.unwrap_or_default()
}

// ============================================================================
// Exact mode
// ============================================================================

/// A partial join result: table name → tuple index into that table's
/// stored row data.
type Composite = BTreeMap<String, usize>;

/// Evaluates exact join row multiplicity over stored tuples.
pub fn exact_count(truth: &SchemaTruth, edges: &[JoinEdge], caps: &EvalCaps) -> JoinCount {
    if edges.is_empty() {
        return JoinCount::Skipped(SkipReason::UnsupportedJoin);
    }

    // Validate every participating table up front.
    for edge in edges {
        for table in [&edge.left_table, &edge.right_table] {
            let Some(rows) = truth.table(table) else {
                return JoinCount::Skipped(SkipReason::MissingRows);
            };
            if !rows.has_tuples() {
                return JoinCount::Skipped(SkipReason::MissingRows);
            }
            if rows.tuples().len() > caps.table_cap {
                return JoinCount::Skipped(SkipReason::TableRowsExceeded);
            }
        }
    }

    let first_left = truth
        .table(&edges[0].left_table)
        .expect("validated above");
    let mut composites: Vec<Composite> = (0..first_left.tuples().len())
        .map(|i| {
            let mut c = Composite::new();
            c.insert(edges[0].left_table.clone(), i);
            c
        })
        .collect();

    for edge in edges {
        match step_edge(truth, edge, &composites, caps) {
            Ok(next) => composites = next,
            Err(reason) => {
                debug!(
                    left = %edge.left_table,
                    right = %edge.right_table,
                    kind = edge.kind.tag(),
                    reason = reason.as_str(),
                    "exact join evaluation skipped"
                );
                return JoinCount::Skipped(reason);
            }
        }
    }

    JoinCount::Count(composites.len() as u64)
}

fn step_edge(
    truth: &SchemaTruth,
    edge: &JoinEdge,
    composites: &[Composite],
    caps: &EvalCaps,
) -> Result<Vec<Composite>, SkipReason> {
    let left_rows = truth.table(&edge.left_table).expect("validated");
    let right_rows = truth.table(&edge.right_table).expect("validated");
    let right_tuples = right_rows.tuples();

    if edge.kind == JoinKind::Cross {
        let mut next = Vec::new();
        for composite in composites {
            for right_idx in 0..right_tuples.len() {
                push_capped(&mut next, extend(composite, &edge.right_table, right_idx), caps)?;
            }
        }
        return Ok(next);
    }

    if !edge.has_keys() {
        return Err(SkipReason::UnsupportedJoin);
    }

    // Index the right side by its key; NULL keys never enter the index,
    // so they can never match.
    let mut index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (i, tuple) in right_tuples.iter().enumerate() {
        if let Some(key) = tuple_key(tuple, &edge.right_keys) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut next = Vec::new();

    if edge.kind == JoinKind::Right {
        // Reversed roles: every right tuple survives, matched or not.
        let mut left_index: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
        for (i, composite) in composites.iter().enumerate() {
            let Some(&left_idx) = composite.get(&edge.left_table) else {
                return Err(SkipReason::UnsupportedJoin);
            };
            if let Some(key) = tuple_key(&left_rows.tuples()[left_idx], &edge.left_keys) {
                left_index.entry(key).or_default().push(i);
            }
        }
        for (right_idx, tuple) in right_tuples.iter().enumerate() {
            let matches = tuple_key(tuple, &edge.right_keys)
                .and_then(|key| left_index.get(&key))
                .cloned()
                .unwrap_or_default();
            if matches.is_empty() {
                let mut c = Composite::new();
                c.insert(edge.right_table.clone(), right_idx);
                push_capped(&mut next, c, caps)?;
            } else {
                for composite_idx in matches {
                    push_capped(
                        &mut next,
                        extend(&composites[composite_idx], &edge.right_table, right_idx),
                        caps,
                    )?;
                }
            }
        }
        return Ok(next);
    }

    for composite in composites {
        let Some(&left_idx) = composite.get(&edge.left_table) else {
            return Err(SkipReason::UnsupportedJoin);
        };
        let key = tuple_key(&left_rows.tuples()[left_idx], &edge.left_keys);
        let matches: &[usize] = key
            .as_ref()
            .and_then(|k| index.get(k))
            .map_or(&[], Vec::as_slice);

        match edge.kind {
            JoinKind::Inner => {
                for &right_idx in matches {
                    push_capped(&mut next, extend(composite, &edge.right_table, right_idx), caps)?;
                }
            }
            JoinKind::Left => {
                if matches.is_empty() {
                    push_capped(&mut next, composite.clone(), caps)?;
                } else {
                    for &right_idx in matches {
                        push_capped(
                            &mut next,
                            extend(composite, &edge.right_table, right_idx),
                            caps,
                        )?;
                    }
                }
            }
            JoinKind::Semi => {
                if !matches.is_empty() {
                    push_capped(&mut next, composite.clone(), caps)?;
                }
            }
            JoinKind::Anti => {
                if matches.is_empty() {
                    push_capped(&mut next, composite.clone(), caps)?;
                }
            }
            JoinKind::Right | JoinKind::Cross => unreachable!("handled above"),
        }
    }

    Ok(next)
}

fn extend(composite: &Composite, table: &str, idx: usize) -> Composite {
    let mut next = composite.clone();
    next.insert(table.to_string(), idx);
    next
}

fn push_capped(
    next: &mut Vec<Composite>,
    composite: Composite,
    caps: &EvalCaps,
) -> Result<(), SkipReason> {
    next.push(composite);
    if next.len() > caps.join_cap {
        return Err(SkipReason::JoinRowsExceeded);
    }
    Ok(())
}

/// Renders a tuple's join key; `None` when any component is NULL or the
/// column is absent from the tuple.
fn tuple_key(tuple: &BTreeMap<String, TypedValue>, columns: &[String]) -> Option<Vec<String>> {
    let mut key = Vec::with_capacity(columns.len());
    for column in columns {
        let value = tuple.get(column)?;
        if value.is_null() {
            return None;
        }
        key.push(value.key());
    }
    Some(key)
}
