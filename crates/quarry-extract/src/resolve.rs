//! Shared resolution core for both extractors.
//!
//! Works on plain column references so the typed-tree and parsed-SQL
//! walks can feed the same machinery.

use quarry_types::{JoinEdge, JoinKind, SchemaState, reason};

/// A column reference as it appeared in the source, possibly unqualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

/// One `left = right` (or `<=>`) candidate before resolution.
#[derive(Debug, Clone)]
pub(crate) struct EqCandidate {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// Result of candidate collection over an ON expression.
#[derive(Debug)]
pub(crate) enum Collected {
    Candidates(Vec<EqCandidate>),
    /// No acceptable equality; `no_columns` is set when equalities were
    /// seen but none mentioned a column, which gets its own reason.
    NoEqual { no_columns: bool },
}

/// Builds the edge for one ON join from collected candidates.
///
/// `left_tables` is the running left-side list, base table first; the
/// innermost (last) entry anchors unresolved edges.
pub(crate) fn build_on_edge(
    schema: &SchemaState,
    left_tables: &[String],
    kind: JoinKind,
    right_table: &str,
    collected: Collected,
) -> JoinEdge {
    let innermost = left_tables.last().map_or("", String::as_str);

    let candidates = match collected {
        Collected::NoEqual { no_columns: false } => {
            return JoinEdge::unresolved(kind, innermost, right_table, reason::NO_EQUAL_CANDIDATES);
        }
        Collected::NoEqual { no_columns: true } => {
            return JoinEdge::unresolved(
                kind,
                innermost,
                right_table,
                reason::NO_EQUAL_CANDIDATES_NO_COLUMNS,
            );
        }
        Collected::Candidates(c) if c.is_empty() => {
            return JoinEdge::unresolved(kind, innermost, right_table, reason::NO_EQUAL_CANDIDATES);
        }
        Collected::Candidates(c) => c,
    };

    // Resolve unqualified columns against the candidate tables.
    let mut resolved = Vec::new();
    let mut failures = 0usize;
    for candidate in candidates {
        let left = resolve_ref(schema, left_tables, right_table, &candidate.left);
        let right = resolve_ref(schema, left_tables, right_table, &candidate.right);
        match (left, right) {
            (Some(l), Some(r)) => resolved.push((l, r)),
            _ => failures += 1,
        }
    }
    if resolved.is_empty() {
        let why = if failures > 0 {
            reason::UNRESOLVED_COLUMNS
        } else {
            reason::NO_EQUAL_CANDIDATES
        };
        return JoinEdge::unresolved(kind, innermost, right_table, why);
    }

    // Side assignment: the right-hand column must live in the join's
    // right table; one swap is allowed, anything else is dropped.
    let mut assigned = Vec::new();
    for (l, r) in resolved {
        if table_eq(&r.0, right_table) {
            assigned.push((l, r));
        } else if table_eq(&l.0, right_table) {
            assigned.push((r, l));
        }
    }
    if assigned.is_empty() {
        return JoinEdge::unresolved(kind, innermost, right_table, reason::EMPTY_GROUP);
    }

    // Group by left table; most candidates wins, lexicographic tie-break.
    let mut best: Option<(&str, Vec<&(ResolvedRef, ResolvedRef)>)> = None;
    let mut tables: Vec<&str> = assigned.iter().map(|(l, _)| l.0.as_str()).collect();
    tables.sort_unstable();
    tables.dedup();
    for table in tables {
        let group: Vec<_> = assigned.iter().filter(|(l, _)| l.0 == table).collect();
        let better = match &best {
            None => true,
            Some((_, current)) => group.len() > current.len(),
        };
        if better {
            best = Some((table, group));
        }
    }
    let (left_table, group) = best.expect("assigned is non-empty");

    let left_keys = group.iter().map(|(l, _)| l.1.clone()).collect();
    let right_keys = group.iter().map(|(_, r)| r.1.clone()).collect();
    JoinEdge::resolved(kind, left_table, right_table, left_keys, right_keys)
}

/// Builds the edge for one USING join.
///
/// Each named column binds to the innermost left table whose schema
/// carries it; columns binding to a different left table than the chosen
/// group are dropped silently.
pub(crate) fn build_using_edge(
    schema: &SchemaState,
    left_tables: &[String],
    kind: JoinKind,
    right_table: &str,
    columns: &[String],
) -> JoinEdge {
    let innermost = left_tables.last().map_or("", String::as_str);

    // Bind each column to its innermost owning left table.
    let mut bound: Vec<(String, String)> = Vec::new();
    for column in columns {
        if !schema.table(right_table).is_some_and(|t| t.has_column(column)) {
            continue;
        }
        let owner = left_tables
            .iter()
            .rev()
            .find(|t| schema.table(t).is_some_and(|t| t.has_column(column)));
        if let Some(owner) = owner {
            bound.push((owner.clone(), column.clone()));
        }
    }
    if bound.is_empty() {
        return JoinEdge::unresolved(kind, innermost, right_table, reason::USING_NO_MATCH);
    }

    // Largest owner group wins; ties break lexicographically.
    let mut owners: Vec<&str> = bound.iter().map(|(t, _)| t.as_str()).collect();
    owners.sort_unstable();
    owners.dedup();
    let mut chosen = owners[0];
    let mut chosen_count = 0usize;
    for owner in owners {
        let count = bound.iter().filter(|(t, _)| t == owner).count();
        if count > chosen_count {
            chosen = owner;
            chosen_count = count;
        }
    }

    let keys: Vec<String> = bound
        .iter()
        .filter(|(t, _)| t == chosen)
        .map(|(_, c)| c.clone())
        .collect();
    JoinEdge::resolved(kind, chosen, right_table, keys.clone(), keys)
}

/// A column reference pinned to a table: (table, column).
type ResolvedRef = (String, String);

/// Resolves a reference: qualified ones are taken as given; unqualified
/// ones must match exactly one candidate table.
fn resolve_ref(
    schema: &SchemaState,
    left_tables: &[String],
    right_table: &str,
    column: &ColumnRef,
) -> Option<ResolvedRef> {
    if let Some(table) = &column.table {
        return Some((table.clone(), column.column.clone()));
    }
    let mut owner = None;
    for table in left_tables.iter().map(String::as_str).chain([right_table]) {
        if schema.table(table).is_some_and(|t| t.has_column(&column.column)) {
            if owner.is_some() {
                return None; // ambiguous
            }
            owner = Some(table.to_string());
        }
    }
    owner.map(|t| (t, column.column.clone()))
}

fn table_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
