//! Edge refinement.
//!
//! The typed tree is authoritative for join order and kinds, but its ON
//! expressions occasionally defeat key recovery where the rendered SQL
//! does not. The refiner reruns extraction over the SQL text and swaps in
//! that result only when it is a strict improvement on the same shape.

use tracing::debug;

use quarry_types::{JoinEdge, SchemaState};

use crate::sql::extract_sql;

/// Replaces `tree_edges` with SQL-extracted edges when the SQL path
/// recovers strictly more keys over the same number of edges.
pub fn refine(schema: &SchemaState, sql: &str, tree_edges: Vec<JoinEdge>) -> Vec<JoinEdge> {
    let tree_missing = missing(&tree_edges);
    if tree_missing == 0 {
        return tree_edges;
    }

    match extract_sql(schema, sql) {
        Ok(sql_edges) if sql_edges.len() == tree_edges.len() => {
            let sql_missing = missing(&sql_edges);
            if sql_missing < tree_missing {
                debug!(
                    tree_missing,
                    sql_missing, "replacing tree edges with SQL-extracted edges"
                );
                sql_edges
            } else {
                tree_edges
            }
        }
        _ => tree_edges,
    }
}

fn missing(edges: &[JoinEdge]) -> usize {
    edges.iter().filter(|e| e.missing_keys()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::{ColumnState, JoinKind, TableState, TypeFamily, reason};

    fn schema() -> SchemaState {
        SchemaState::new(vec![
            TableState::new("t0", vec![ColumnState::new("a", TypeFamily::Number)]),
            TableState::new("t1", vec![ColumnState::new("b", TypeFamily::Number)]),
        ])
    }

    fn unresolved() -> JoinEdge {
        JoinEdge::unresolved(JoinKind::Inner, "t0", "t1", reason::NO_EQUAL_CANDIDATES)
    }

    #[test]
    fn complete_tree_edges_are_kept() {
        let edges = vec![JoinEdge::resolved(
            JoinKind::Inner,
            "t0",
            "t1",
            vec!["a".to_string()],
            vec!["b".to_string()],
        )];
        let refined = refine(&schema(), "SELECT * FROM t0 JOIN t1 ON t0.a = t1.b", edges.clone());
        assert_eq!(refined, edges);
    }

    #[test]
    fn sql_edges_win_when_strictly_better() {
        let refined = refine(
            &schema(),
            "SELECT * FROM t0 JOIN t1 ON t0.a = t1.b",
            vec![unresolved()],
        );
        assert!(refined[0].has_keys());
        assert_eq!(refined[0].left_keys, vec!["a"]);
    }

    #[test]
    fn mismatched_edge_count_keeps_tree() {
        // SQL has two joins; the tree recorded one. Shape mismatch.
        let refined = refine(
            &schema(),
            "SELECT * FROM t0 JOIN t1 ON t0.a = t1.b JOIN t0 AS x ON x.a = t1.b",
            vec![unresolved()],
        );
        assert_eq!(refined, vec![unresolved()]);
    }

    #[test]
    fn unparsable_sql_keeps_tree() {
        let refined = refine(&schema(), "SELECT FROM WHERE", vec![unresolved()]);
        assert_eq!(refined, vec![unresolved()]);
    }
}
