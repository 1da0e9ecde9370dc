//! AST-directed statement shrinking.
//!
//! Generates a bounded set of smaller variants of one statement. The
//! minimizer accepts any variant that still reproduces and iterates to a
//! fixed point; variants that render invalid SQL are simply rejected by
//! the replay's validator, so the generator can be optimistic.

use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, JoinConstraint, JoinOperator, Query, Select, SelectItem,
    SetExpr, Statement, Value,
};

use quarry_sql::parse_statement;

/// Produces shrink candidates for `sql`, most aggressive first. The
/// original statement is never among them.
pub fn shrink_candidates(sql: &str) -> Vec<String> {
    let Ok(statement) = parse_statement(sql) else {
        return Vec::new();
    };
    let Statement::Query(_) = &statement else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut push = |candidate: Option<String>| {
        if let Some(candidate) = candidate
            && candidate != sql
            && !out.contains(&candidate)
        {
            out.push(candidate);
        }
    };

    // Whole-clause drops.
    push(edit_query(&statement, |q| {
        let had = q.order_by.is_some();
        q.order_by = None;
        had
    }));
    push(edit_query(&statement, |q| {
        let had = q.limit.is_some();
        q.limit = None;
        had
    }));
    push(edit_select(&statement, |s| {
        let had = s.distinct.is_some();
        s.distinct = None;
        had
    }));
    push(edit_select(&statement, |s| {
        let had = s.having.is_some();
        s.having = None;
        had
    }));
    push(edit_select(&statement, |s| {
        let had = !group_by_items(s).is_empty();
        s.group_by = GroupByExpr::Expressions(Vec::new(), Vec::new());
        had
    }));
    push(edit_select(&statement, |s| {
        let had = s.selection.is_some();
        s.selection = None;
        had
    }));

    // Predicate simplifications: one side of the top AND/OR, or a literal.
    for pick_left in [true, false] {
        push(edit_select(&statement, move |s| {
            simplify_predicate(&mut s.selection, pick_left)
        }));
        push(edit_select(&statement, move |s| {
            simplify_predicate(&mut s.having, pick_left)
        }));
    }
    push(edit_select(&statement, |s| {
        if s.selection.is_some() {
            s.selection = Some(Expr::Value(Value::Number("1".to_string(), false)));
            true
        } else {
            false
        }
    }));

    // Projection: drop items one at a time, or collapse to `1`.
    let projection_len = projection_len(&statement);
    if projection_len > 1 {
        for idx in 0..projection_len {
            push(edit_select(&statement, move |s| {
                s.projection.remove(idx);
                true
            }));
        }
    }
    push(edit_select(&statement, |s| {
        let literal =
            SelectItem::UnnamedExpr(Expr::Value(Value::Number("1".to_string(), false)));
        if s.projection.len() == 1 && matches!(&s.projection[0], SelectItem::UnnamedExpr(Expr::Value(_)))
        {
            return false;
        }
        s.projection = vec![literal];
        true
    }));

    // Item-level drops for GROUP BY and ORDER BY.
    for idx in 0..group_by_len(&statement) {
        push(edit_select(&statement, move |s| {
            if let GroupByExpr::Expressions(exprs, _) = &mut s.group_by {
                exprs.remove(idx);
                true
            } else {
                false
            }
        }));
    }
    for idx in 0..order_by_len(&statement) {
        push(edit_query(&statement, move |q| {
            if let Some(order_by) = &mut q.order_by {
                order_by.exprs.remove(idx);
                if order_by.exprs.is_empty() {
                    q.order_by = None;
                }
                true
            } else {
                false
            }
        }));
    }

    // Join demotions: CROSS with no condition, LEFT with no condition.
    for join_idx in 0..join_len(&statement) {
        push(edit_select(&statement, move |s| {
            s.from[0].joins[join_idx].join_operator = JoinOperator::CrossJoin;
            true
        }));
        push(edit_select(&statement, move |s| {
            s.from[0].joins[join_idx].join_operator = JoinOperator::LeftOuter(JoinConstraint::None);
            true
        }));
    }

    out
}

/// Replaces a predicate with one side of its top-level AND/OR.
fn simplify_predicate(slot: &mut Option<Expr>, pick_left: bool) -> bool {
    let Some(Expr::BinaryOp {
        op: BinaryOperator::And | BinaryOperator::Or,
        left,
        right,
    }) = slot
    else {
        return false;
    };
    let side = if pick_left {
        left.as_ref().clone()
    } else {
        right.as_ref().clone()
    };
    *slot = Some(side);
    true
}

fn edit_query(statement: &Statement, edit: impl FnOnce(&mut Query) -> bool) -> Option<String> {
    let mut cloned = statement.clone();
    let Statement::Query(query) = &mut cloned else {
        return None;
    };
    if !edit(query) {
        return None;
    }
    Some(cloned.to_string())
}

fn edit_select(statement: &Statement, edit: impl FnOnce(&mut Select) -> bool) -> Option<String> {
    let mut cloned = statement.clone();
    let Statement::Query(query) = &mut cloned else {
        return None;
    };
    let SetExpr::Select(select) = query.body.as_mut() else {
        return None;
    };
    if !edit(select) {
        return None;
    }
    Some(cloned.to_string())
}

fn with_select<T>(statement: &Statement, read: impl FnOnce(&Select) -> T, default: T) -> T {
    if let Statement::Query(query) = statement
        && let SetExpr::Select(select) = query.body.as_ref()
    {
        return read(select);
    }
    default
}

fn projection_len(statement: &Statement) -> usize {
    with_select(statement, |s| s.projection.len(), 0)
}

fn group_by_len(statement: &Statement) -> usize {
    with_select(statement, |s| group_by_items(s).len(), 0)
}

fn group_by_items(select: &Select) -> &[Expr] {
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => exprs,
        GroupByExpr::All(_) => &[],
    }
}

fn order_by_len(statement: &Statement) -> usize {
    if let Statement::Query(query) = statement {
        query.order_by.as_ref().map_or(0, |ob| ob.exprs.len())
    } else {
        0
    }
}

fn join_len(statement: &Statement) -> usize {
    with_select(
        statement,
        |s| s.from.first().map_or(0, |twj| twj.joins.len()),
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_each_clause() {
        let candidates = shrink_candidates(
            "SELECT DISTINCT a, b FROM t0 WHERE a < 1 AND b > 2 \
             GROUP BY a, b HAVING a > 0 ORDER BY a LIMIT 5",
        );
        let has = |needle: &str| candidates.iter().any(|c| c == needle);

        assert!(has(
            "SELECT DISTINCT a, b FROM t0 WHERE a < 1 AND b > 2 GROUP BY a, b HAVING a > 0 ORDER BY a"
        ));
        assert!(has(
            "SELECT a, b FROM t0 WHERE a < 1 AND b > 2 GROUP BY a, b HAVING a > 0 ORDER BY a LIMIT 5"
        ));
        assert!(has(
            "SELECT DISTINCT a, b FROM t0 GROUP BY a, b HAVING a > 0 ORDER BY a LIMIT 5"
        ));
    }

    #[test]
    fn simplifies_predicate_to_either_side() {
        let candidates = shrink_candidates("SELECT a FROM t0 WHERE a < 1 AND b > 2");
        assert!(candidates.contains(&"SELECT a FROM t0 WHERE a < 1".to_string()));
        assert!(candidates.contains(&"SELECT a FROM t0 WHERE b > 2".to_string()));
        assert!(candidates.contains(&"SELECT a FROM t0 WHERE 1".to_string()));
    }

    #[test]
    fn drops_individual_projection_items() {
        let candidates = shrink_candidates("SELECT a, b FROM t0");
        assert!(candidates.contains(&"SELECT b FROM t0".to_string()));
        assert!(candidates.contains(&"SELECT a FROM t0".to_string()));
        assert!(candidates.contains(&"SELECT 1 FROM t0".to_string()));
    }

    #[test]
    fn demotes_joins() {
        let candidates = shrink_candidates("SELECT a FROM t0 JOIN t1 ON t0.a = t1.a");
        assert!(candidates.contains(&"SELECT a FROM t0 CROSS JOIN t1".to_string()));
    }

    #[test]
    fn non_queries_yield_nothing() {
        assert!(shrink_candidates("INSERT INTO t0 VALUES (1)").is_empty());
        assert!(shrink_candidates("not sql at all").is_empty());
    }

    #[test]
    fn original_is_never_a_candidate() {
        let sql = "SELECT a FROM t0 WHERE a < 1";
        assert!(!shrink_candidates(sql).contains(&sql.to_string()));
    }
}
