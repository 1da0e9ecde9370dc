//! Join-edge extraction from the generator's typed query tree.

use quarry_types::{
    GenBinaryOp, GenExpr, GenQuery, GenUnaryOp, JoinEdge, JoinKind, SchemaState, reason,
};

use crate::resolve::{Collected, ColumnRef, EqCandidate, build_on_edge, build_using_edge};

/// Extracts one edge per join step, walking `FROM` left to right.
///
/// The running left-table list is the base table plus every
/// already-processed right table, innermost last.
pub fn extract_tree(schema: &SchemaState, query: &GenQuery) -> Vec<JoinEdge> {
    let mut left_tables = vec![query.from.base.clone()];
    let mut edges = Vec::with_capacity(query.from.joins.len());

    for join in &query.from.joins {
        let innermost = left_tables.last().map_or("", String::as_str);
        let edge = if join.kind == JoinKind::Cross {
            JoinEdge::cross(innermost, &join.table)
        } else if !join.using_columns.is_empty() {
            build_using_edge(schema, &left_tables, join.kind, &join.table, &join.using_columns)
        } else if let Some(on) = &join.on {
            build_on_edge(schema, &left_tables, join.kind, &join.table, collect(on))
        } else {
            // Constraint-free non-CROSS join: nothing to recover.
            JoinEdge::unresolved(join.kind, innermost, &join.table, reason::NO_EQUAL_CANDIDATES)
        };
        edges.push(edge);
        left_tables.push(join.table.clone());
    }

    edges
}

/// Collects column-equality candidates by recursive descent through AND.
fn collect(on: &GenExpr) -> Collected {
    let mut candidates = Vec::new();
    let mut saw_eq = false;
    let mut saw_column = false;
    walk(on, &mut candidates, &mut saw_eq, &mut saw_column);

    if candidates.is_empty() {
        Collected::NoEqual {
            no_columns: saw_eq && !saw_column,
        }
    } else {
        Collected::Candidates(candidates)
    }
}

fn walk(expr: &GenExpr, out: &mut Vec<EqCandidate>, saw_eq: &mut bool, saw_column: &mut bool) {
    let (core, nots) = strip(expr);
    if nots % 2 == 1 {
        // An odd count of NOT disqualifies the predicate.
        return;
    }
    match core {
        GenExpr::Binary {
            op: GenBinaryOp::And,
            left,
            right,
        } => {
            walk(left, out, saw_eq, saw_column);
            walk(right, out, saw_eq, saw_column);
        }
        GenExpr::Binary {
            op: GenBinaryOp::Eq | GenBinaryOp::NullSafeEq,
            left,
            right,
        } => {
            *saw_eq = true;
            let l = operand_column(left);
            let r = operand_column(right);
            if l.is_some() || r.is_some() {
                *saw_column = true;
            }
            if let (Some(left), Some(right)) = (l, r) {
                out.push(EqCandidate { left, right });
            }
        }
        _ => {}
    }
}

/// Peels parenthesization, unary `+`, NOT (counted), and the column-
/// wrapping function allow-list.
fn strip(expr: &GenExpr) -> (&GenExpr, usize) {
    let mut current = expr;
    let mut nots = 0;
    loop {
        match current {
            GenExpr::Paren(inner) => current = inner,
            GenExpr::Unary {
                op: GenUnaryOp::Plus,
                operand,
            } => current = operand,
            GenExpr::Unary {
                op: GenUnaryOp::Not,
                operand,
            } => {
                nots += 1;
                current = operand;
            }
            GenExpr::Func { name, args } if args.len() == 1 && is_wrapper_fn(name) => {
                current = &args[0];
            }
            _ => return (current, nots),
        }
    }
}

fn is_wrapper_fn(name: &str) -> bool {
    name.eq_ignore_ascii_case("cast")
        || name.eq_ignore_ascii_case("convert")
        || name.eq_ignore_ascii_case("binary")
}

fn operand_column(expr: &GenExpr) -> Option<ColumnRef> {
    let (core, nots) = strip(expr);
    if nots != 0 {
        return None;
    }
    match core {
        GenExpr::Column { table, name } => Some(ColumnRef {
            table: table.clone(),
            column: name.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_types::{ColumnState, GenFrom, GenJoin, TableState, TypeFamily, TypedValue};

    fn schema(tables: &[(&str, &[&str])]) -> SchemaState {
        SchemaState::new(
            tables
                .iter()
                .map(|(name, cols)| {
                    TableState::new(
                        *name,
                        cols.iter()
                            .map(|c| ColumnState::new(*c, TypeFamily::Number))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    fn query_with_join(base: &str, join: GenJoin) -> GenQuery {
        GenQuery {
            from: GenFrom {
                base: base.to_string(),
                joins: vec![join],
            },
            ..GenQuery::scan(base)
        }
    }

    /// USING picks the shared column and silently drops the one only the
    /// right side owns.
    #[test]
    fn using_picks_shared_column() {
        let schema = schema(&[("t0", &["a"]), ("t1", &["a", "b"])]);
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec!["b".to_string(), "a".to_string()],
                on: None,
            },
        );
        let edges = extract_tree(&schema, &query);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].left_keys, vec!["a"]);
        assert_eq!(edges[0].right_keys, vec!["a"]);
        assert_eq!(edges[0].kind, JoinKind::Inner);
    }

    /// USING over a composite key keeps both columns in order.
    #[test]
    fn using_composite_key() {
        let schema = schema(&[("t0", &["a", "b"]), ("t1", &["a", "b"])]);
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec!["a".to_string(), "b".to_string()],
                on: None,
            },
        );
        let edges = extract_tree(&schema, &query);
        assert_eq!(edges[0].left_keys, vec!["a", "b"]);
        assert_eq!(edges[0].right_keys, vec!["a", "b"]);
    }

    /// `ON id = id` with both tables owning `id` is ambiguous.
    #[test]
    fn ambiguous_on_column_rejected() {
        let schema = schema(&[("t0", &["id"]), ("t1", &["id"])]);
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec![],
                on: Some(GenExpr::binary(
                    GenBinaryOp::Eq,
                    GenExpr::column(None, "id"),
                    GenExpr::column(None, "id"),
                )),
            },
        );
        let edges = extract_tree(&schema, &query);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].left_keys.is_empty());
        assert_eq!(edges[0].reason, reason::UNRESOLVED_COLUMNS);
    }

    /// Double NOT and the null-safe equal survive unwrapping.
    #[test]
    fn double_not_and_null_safe_equal_unwrap() {
        let schema = schema(&[("t0", &["k0"]), ("t1", &["k0"])]);
        let on = GenExpr::not(GenExpr::not(GenExpr::paren(GenExpr::binary(
            GenBinaryOp::NullSafeEq,
            GenExpr::column(Some("t0"), "k0"),
            GenExpr::column(Some("t1"), "k0"),
        ))));
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec![],
                on: Some(on),
            },
        );
        let edges = extract_tree(&schema, &query);
        assert_eq!(edges[0].left_keys, vec!["k0"]);
        assert_eq!(edges[0].right_keys, vec!["k0"]);
    }

    /// A single NOT disqualifies the predicate.
    #[test]
    fn odd_not_disqualifies() {
        let schema = schema(&[("t0", &["k0"]), ("t1", &["k0"])]);
        let on = GenExpr::not(GenExpr::binary(
            GenBinaryOp::Eq,
            GenExpr::column(Some("t0"), "k0"),
            GenExpr::column(Some("t1"), "k0"),
        ));
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec![],
                on: Some(on),
            },
        );
        assert_eq!(extract_tree(&schema, &query)[0].reason, reason::NO_EQUAL_CANDIDATES);
    }

    /// Equalities over literals only get the `:no_columns` flavor.
    #[test]
    fn literal_equality_reports_no_columns() {
        let schema = schema(&[("t0", &["k0"]), ("t1", &["k0"])]);
        let on = GenExpr::binary(
            GenBinaryOp::Eq,
            GenExpr::Literal(TypedValue::number(1)),
            GenExpr::Literal(TypedValue::number(1)),
        );
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec![],
                on: Some(on),
            },
        );
        assert_eq!(
            extract_tree(&schema, &query)[0].reason,
            reason::NO_EQUAL_CANDIDATES_NO_COLUMNS
        );
    }

    /// CROSS joins emit a keyless edge without a reason.
    #[test]
    fn cross_join_edge() {
        let schema = schema(&[("t0", &["a"]), ("t1", &["a"])]);
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Cross,
                table: "t1".to_string(),
                using_columns: vec![],
                on: None,
            },
        );
        let edges = extract_tree(&schema, &query);
        assert_eq!(edges[0].kind, JoinKind::Cross);
        assert!(edges[0].left_keys.is_empty());
        assert!(edges[0].reason.is_empty());
    }

    /// CAST around a column operand unwraps.
    #[test]
    fn cast_wrapper_unwraps() {
        let schema = schema(&[("t0", &["k0"]), ("t1", &["k1"])]);
        let on = GenExpr::binary(
            GenBinaryOp::Eq,
            GenExpr::Func {
                name: "CAST".to_string(),
                args: vec![GenExpr::column(Some("t0"), "k0")],
            },
            GenExpr::column(Some("t1"), "k1"),
        );
        let query = query_with_join(
            "t0",
            GenJoin {
                kind: JoinKind::Inner,
                table: "t1".to_string(),
                using_columns: vec![],
                on: Some(on),
            },
        );
        let edges = extract_tree(&schema, &query);
        assert_eq!(edges[0].left_keys, vec!["k0"]);
        assert_eq!(edges[0].right_keys, vec!["k1"]);
    }
}
