//! Stage 1: statement normalization.
//!
//! Prepares a SELECT or set-op for mutation by removing everything that
//! would break the partial-order contract between a query and its
//! mutants: window functions, non-deterministic calls, bare aggregates,
//! outer ORDER BY, and LIMIT outside of ordered subqueries. Outer joins
//! can be demoted to plain joins where configuration allows (MySQL treats
//! `JOIN`, `INNER JOIN`, and `CROSS JOIN` identically).
//!
//! Normalization is idempotent: a normalized statement passes through
//! unchanged.

use sqlparser::ast::{
    Expr, GroupByExpr, JoinConstraint, JoinOperator, Query, Select, SelectItem, SetExpr,
    Statement, TableFactor, Value,
};

use quarry_sql::parse_statement;

use crate::visit::LIMIT_CAP;
use crate::{MutateError, Result};

/// What the normalizer is allowed to rewrite.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Rewrite LEFT/RIGHT JOIN to a plain (cross-equivalent) join.
    pub rewrite_outer_joins: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            rewrite_outer_joins: true,
        }
    }
}

/// A normalized statement and its rendered SQL.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub statement: Statement,
    pub sql: String,
}

/// Normalizes a SELECT / set-op statement.
///
/// Recursive CTEs are rejected with [`MutateError::RecursiveCte`];
/// non-query statements with [`MutateError::Unsupported`].
pub fn normalize(sql: &str, options: &NormalizeOptions) -> Result<Normalized> {
    let mut statement = parse_statement(sql)?;
    let Statement::Query(query) = &mut statement else {
        return Err(MutateError::Unsupported(
            "only SELECT statements are normalized".to_string(),
        ));
    };
    if query.with.as_ref().is_some_and(|w| w.recursive) {
        return Err(MutateError::RecursiveCte);
    }

    normalize_query(query, false, options);
    let sql = statement.to_string();
    Ok(Normalized { statement, sql })
}

fn normalize_query(query: &mut Query, in_subquery: bool, options: &NormalizeOptions) {
    if let Some(with) = &mut query.with {
        for cte in &mut with.cte_tables {
            normalize_query(&mut cte.query, true, options);
        }
    }

    if in_subquery {
        if let Some(order_by) = &mut query.order_by {
            for item in &mut order_by.exprs {
                scrub_expr(&mut item.expr, true, options);
            }
        }
    } else {
        query.order_by = None;
    }

    normalize_set_expr(&mut query.body, in_subquery, options);

    let ordered = query
        .order_by
        .as_ref()
        .is_some_and(|ob| !ob.exprs.is_empty());
    let keep_limit = in_subquery && ordered;
    if !keep_limit && query.limit.is_some() {
        query.limit = Some(Expr::Value(Value::Number(LIMIT_CAP.to_string(), false)));
    }
}

fn normalize_set_expr(body: &mut SetExpr, in_subquery: bool, options: &NormalizeOptions) {
    match body {
        SetExpr::Select(select) => normalize_select(select, options),
        SetExpr::SetOperation { left, right, .. } => {
            normalize_set_expr(left, in_subquery, options);
            normalize_set_expr(right, in_subquery, options);
        }
        SetExpr::Query(inner) => normalize_query(inner, in_subquery, options),
        _ => {}
    }
}

fn normalize_select(select: &mut Select, options: &NormalizeOptions) {
    // Aggregates survive only in a SELECT that was grouped (or filtered
    // by HAVING) to begin with.
    let keep_aggregates = !group_by_is_empty(select) || select.having.is_some();

    select.named_window.clear();

    for item in &mut select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                scrub_expr(expr, keep_aggregates, options);
            }
            _ => {}
        }
    }

    if let Some(selection) = &mut select.selection {
        scrub_expr(selection, keep_aggregates, options);
    }

    if keep_aggregates {
        if let Some(having) = &mut select.having {
            scrub_expr(having, true, options);
        }
        if let GroupByExpr::Expressions(exprs, _) = &mut select.group_by {
            for expr in exprs {
                scrub_expr(expr, true, options);
            }
        }
    } else {
        select.group_by = GroupByExpr::Expressions(Vec::new(), Vec::new());
        select.having = None;
    }

    for twj in &mut select.from {
        if let TableFactor::Derived { subquery, .. } = &mut twj.relation {
            normalize_query(subquery, true, options);
        }
        for join in &mut twj.joins {
            if let TableFactor::Derived { subquery, .. } = &mut join.relation {
                normalize_query(subquery, true, options);
            }
            if options.rewrite_outer_joins {
                demote_outer_join(&mut join.join_operator);
            }
            if let Some(on) = crate::path::join_on_mut(&mut join.join_operator) {
                scrub_expr(on, keep_aggregates, options);
            }
        }
    }
}

/// LEFT/RIGHT JOIN become a plain join; with no constraint they become an
/// explicit CROSS JOIN.
fn demote_outer_join(operator: &mut JoinOperator) {
    let constraint = match operator {
        JoinOperator::LeftOuter(c) | JoinOperator::RightOuter(c) => std::mem::replace(
            c,
            JoinConstraint::None,
        ),
        _ => return,
    };
    *operator = match constraint {
        JoinConstraint::None => JoinOperator::CrossJoin,
        other => JoinOperator::Inner(other),
    };
}

/// Replaces window calls, non-deterministic calls, and (when not kept)
/// aggregate calls with literal 1, then recurses.
fn scrub_expr(expr: &mut Expr, keep_aggregates: bool, options: &NormalizeOptions) {
    if should_replace(expr, keep_aggregates) {
        *expr = Expr::Value(Value::Number("1".to_string(), false));
        return;
    }

    match expr {
        Expr::BinaryOp { left, right, .. } => {
            scrub_expr(left, keep_aggregates, options);
            scrub_expr(right, keep_aggregates, options);
        }
        Expr::UnaryOp { expr: inner, .. }
        | Expr::Nested(inner)
        | Expr::IsTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsNotFalse(inner)
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner) => scrub_expr(inner, keep_aggregates, options),
        Expr::InList { expr: inner, list, .. } => {
            scrub_expr(inner, keep_aggregates, options);
            for item in list {
                scrub_expr(item, keep_aggregates, options);
            }
        }
        Expr::Between {
            expr: inner,
            low,
            high,
            ..
        } => {
            scrub_expr(inner, keep_aggregates, options);
            scrub_expr(low, keep_aggregates, options);
            scrub_expr(high, keep_aggregates, options);
        }
        Expr::InSubquery {
            expr: inner,
            subquery,
            ..
        } => {
            scrub_expr(inner, keep_aggregates, options);
            normalize_query(subquery, true, options);
        }
        Expr::Exists { subquery, .. } => normalize_query(subquery, true, options),
        Expr::Subquery(subquery) => normalize_query(subquery, true, options),
        Expr::AnyOp { left, right, .. } | Expr::AllOp { left, right, .. } => {
            scrub_expr(left, keep_aggregates, options);
            scrub_expr(right, keep_aggregates, options);
        }
        Expr::Function(func) => {
            use sqlparser::ast::{FunctionArg, FunctionArgExpr, FunctionArguments};
            if let FunctionArguments::List(list) = &mut func.args {
                for arg in &mut list.args {
                    if let FunctionArg::Unnamed(FunctionArgExpr::Expr(inner))
                    | FunctionArg::Named {
                        arg: FunctionArgExpr::Expr(inner),
                        ..
                    } = arg
                    {
                        scrub_expr(inner, keep_aggregates, options);
                    }
                }
            }
        }
        _ => {}
    }
}

fn should_replace(expr: &Expr, keep_aggregates: bool) -> bool {
    let Expr::Function(func) = expr else {
        return false;
    };
    if func.over.is_some() {
        return true;
    }
    let name = func.name.to_string().to_uppercase();
    if NONDETERMINISTIC.contains(&name.as_str()) {
        return true;
    }
    !keep_aggregates && AGGREGATES.contains(&name.as_str())
}

const AGGREGATES: &[&str] = &[
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "GROUP_CONCAT",
    "BIT_AND",
    "BIT_OR",
    "BIT_XOR",
    "STD",
    "STDDEV",
    "STDDEV_POP",
    "STDDEV_SAMP",
    "VAR_POP",
    "VAR_SAMP",
    "VARIANCE",
    "JSON_ARRAYAGG",
    "JSON_OBJECTAGG",
];

const NONDETERMINISTIC: &[&str] = &[
    "RAND",
    "UUID",
    "UUID_SHORT",
    "NOW",
    "SYSDATE",
    "CURDATE",
    "CURTIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "UNIX_TIMESTAMP",
    "CONNECTION_ID",
    "LAST_INSERT_ID",
    "VERSION",
    "USER",
    "CURRENT_USER",
    "DATABASE",
    "FOUND_ROWS",
    "ROW_COUNT",
    "SLEEP",
    "BENCHMARK",
];

fn group_by_is_empty(select: &Select) -> bool {
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => exprs.is_empty(),
        GroupByExpr::All(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn norm(sql: &str) -> String {
        normalize(sql, &NormalizeOptions::default()).unwrap().sql
    }

    #[test]
    fn recursive_cte_is_rejected_distinctly() {
        let err = normalize(
            "WITH RECURSIVE c AS (SELECT 1) SELECT * FROM c",
            &NormalizeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MutateError::RecursiveCte));
    }

    #[test]
    fn non_query_is_unsupported() {
        let err = normalize("INSERT INTO t0 VALUES (1)", &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, MutateError::Unsupported(_)));
    }

    #[test]
    fn outer_order_by_is_removed() {
        assert_eq!(norm("SELECT a FROM t0 ORDER BY a"), "SELECT a FROM t0");
    }

    #[test]
    fn subquery_order_by_is_kept() {
        assert_eq!(
            norm("SELECT * FROM t0 WHERE a IN (SELECT b FROM t1 ORDER BY b LIMIT 3)"),
            "SELECT * FROM t0 WHERE a IN (SELECT b FROM t1 ORDER BY b LIMIT 3)"
        );
    }

    #[test]
    fn outer_limit_is_capped() {
        assert_eq!(
            norm("SELECT a FROM t0 LIMIT 5"),
            "SELECT a FROM t0 LIMIT 2147483647"
        );
    }

    #[test]
    fn unordered_subquery_limit_is_capped() {
        assert_eq!(
            norm("SELECT * FROM t0 WHERE a IN (SELECT b FROM t1 LIMIT 3)"),
            "SELECT * FROM t0 WHERE a IN (SELECT b FROM t1 LIMIT 2147483647)"
        );
    }

    #[test]
    fn bare_aggregate_is_replaced() {
        assert_eq!(norm("SELECT COUNT(*) FROM t0"), "SELECT 1 FROM t0");
    }

    #[test]
    fn grouped_aggregate_is_kept() {
        assert_eq!(
            norm("SELECT a, COUNT(*) FROM t0 GROUP BY a"),
            "SELECT a, COUNT(*) FROM t0 GROUP BY a"
        );
    }

    #[test]
    fn window_call_is_replaced() {
        assert_eq!(
            norm("SELECT ROW_NUMBER() OVER (ORDER BY a) FROM t0"),
            "SELECT 1 FROM t0"
        );
    }

    #[test_case("SELECT RAND() FROM t0", "SELECT 1 FROM t0"; "rand")]
    #[test_case("SELECT NOW() FROM t0", "SELECT 1 FROM t0"; "now")]
    #[test_case("SELECT a FROM t0 WHERE a < RAND()", "SELECT a FROM t0 WHERE a < 1"; "in predicate")]
    fn nondeterministic_calls_are_replaced(sql: &str, expected: &str) {
        assert_eq!(norm(sql), expected);
    }

    #[test]
    fn left_join_is_demoted() {
        assert_eq!(
            norm("SELECT * FROM t0 LEFT JOIN t1 ON t0.a = t1.a"),
            "SELECT * FROM t0 JOIN t1 ON t0.a = t1.a"
        );
    }

    #[test]
    fn left_join_survives_when_disallowed() {
        let options = NormalizeOptions {
            rewrite_outer_joins: false,
        };
        let normalized = normalize("SELECT * FROM t0 LEFT JOIN t1 ON t0.a = t1.a", &options)
            .unwrap()
            .sql;
        assert_eq!(normalized, "SELECT * FROM t0 LEFT JOIN t1 ON t0.a = t1.a");
    }

    #[test_case("SELECT a FROM t0 ORDER BY a LIMIT 3"; "order and limit")]
    #[test_case("SELECT a, COUNT(*) FROM t0 GROUP BY a HAVING COUNT(*) > 1"; "grouped")]
    #[test_case("SELECT * FROM t0 WHERE EXISTS (SELECT MAX(b) FROM t1)"; "subquery aggregate")]
    #[test_case("SELECT a FROM t0 UNION ALL SELECT a FROM t1 ORDER BY a"; "set operation")]
    fn normalization_is_idempotent(sql: &str) {
        let once = norm(sql);
        assert_eq!(norm(&once), once);
    }
}
