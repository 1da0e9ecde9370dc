//! Path resolution against a mutable statement.
//!
//! The visitor records where a candidate lives as a [`Step`] sequence;
//! the applicator replays that sequence against the mutable AST to reach
//! the node. Resolution failures are programming errors (the tree cannot
//! have changed between enumeration and application).

use sqlparser::ast::{
    Expr, JoinConstraint, JoinOperator, Query, Select, SetExpr, Statement, TableFactor,
};

use crate::candidate::Step;
use crate::{MutateError, Result};

/// A resolved mutation site.
#[derive(Debug)]
pub(crate) enum SiteMut<'a> {
    Query(&'a mut Query),
    SetExpr(&'a mut SetExpr),
    Select(&'a mut Select),
    Expr(&'a mut Expr),
}

/// Walks `path` from the statement root.
pub(crate) fn resolve<'a>(root: &'a mut Statement, path: &[Step]) -> Result<SiteMut<'a>> {
    let Statement::Query(query) = root else {
        return Err(MutateError::Unsupported(
            "mutation targets must be queries".to_string(),
        ));
    };

    let mut site = SiteMut::Query(&mut **query);
    for (idx, step) in path.iter().enumerate() {
        let bad = |what: &str| MutateError::BadPath(format!("step {idx} ({step:?}): {what}"));
        site = match (site, step) {
            (SiteMut::Query(q), Step::Body) => SiteMut::SetExpr(&mut *q.body),
            (SiteMut::SetExpr(se), Step::SetLeft) => match se {
                SetExpr::SetOperation { left, .. } => SiteMut::SetExpr(&mut **left),
                _ => return Err(bad("not a set operation")),
            },
            (SiteMut::SetExpr(se), Step::SetRight) => match se {
                SetExpr::SetOperation { right, .. } => SiteMut::SetExpr(&mut **right),
                _ => return Err(bad("not a set operation")),
            },
            (SiteMut::SetExpr(se), Step::IntoSelect) => match se {
                SetExpr::Select(select) => SiteMut::Select(&mut **select),
                _ => return Err(bad("not a SELECT body")),
            },
            (SiteMut::SetExpr(se), Step::InnerQuery) => match se {
                SetExpr::Query(q) => SiteMut::Query(&mut **q),
                _ => return Err(bad("not a nested query body")),
            },
            (SiteMut::Select(s), Step::Selection) => match &mut s.selection {
                Some(expr) => SiteMut::Expr(expr),
                None => return Err(bad("no WHERE clause")),
            },
            (SiteMut::Select(s), Step::Having) => match &mut s.having {
                Some(expr) => SiteMut::Expr(expr),
                None => return Err(bad("no HAVING clause")),
            },
            (SiteMut::Select(s), Step::JoinOn(i, j)) => {
                let join = s
                    .from
                    .get_mut(*i)
                    .and_then(|twj| twj.joins.get_mut(*j))
                    .ok_or_else(|| {
                        MutateError::BadPath(format!("step {idx}: join [{i}][{j}] out of range"))
                    })?;
                match join_on_mut(&mut join.join_operator) {
                    Some(expr) => SiteMut::Expr(expr),
                    None => return Err(bad("join has no ON constraint")),
                }
            }
            (SiteMut::Select(s), Step::Derived(i, j)) => {
                let factor = match j {
                    None => s.from.get_mut(*i).map(|twj| &mut twj.relation),
                    Some(j) => s
                        .from
                        .get_mut(*i)
                        .and_then(|twj| twj.joins.get_mut(*j))
                        .map(|join| &mut join.relation),
                };
                match factor {
                    Some(TableFactor::Derived { subquery, .. }) => SiteMut::Query(&mut **subquery),
                    _ => return Err(bad("not a derived table")),
                }
            }
            (SiteMut::Expr(e), Step::Left) => match e {
                Expr::BinaryOp { left, .. }
                | Expr::AnyOp { left, .. }
                | Expr::AllOp { left, .. } => SiteMut::Expr(&mut **left),
                _ => return Err(bad("no left operand")),
            },
            (SiteMut::Expr(e), Step::Right) => match e {
                Expr::BinaryOp { right, .. }
                | Expr::AnyOp { right, .. }
                | Expr::AllOp { right, .. } => SiteMut::Expr(&mut **right),
                _ => return Err(bad("no right operand")),
            },
            (SiteMut::Expr(e), Step::Operand) => match e {
                Expr::UnaryOp { expr, .. }
                | Expr::Nested(expr)
                | Expr::IsTrue(expr)
                | Expr::IsFalse(expr)
                | Expr::IsNotTrue(expr)
                | Expr::IsNotFalse(expr) => SiteMut::Expr(&mut **expr),
                _ => return Err(bad("no unary operand")),
            },
            (SiteMut::Expr(e), Step::Subquery) => match e {
                Expr::Subquery(q)
                | Expr::InSubquery { subquery: q, .. }
                | Expr::Exists { subquery: q, .. } => SiteMut::Query(&mut **q),
                _ => return Err(bad("no subquery")),
            },
            (_, step) => {
                return Err(MutateError::BadPath(format!(
                    "step {idx} ({step:?}) does not apply to this node"
                )));
            }
        };
    }
    Ok(site)
}

/// The ON expression of a join, for every constraint-bearing operator.
pub(crate) fn join_on_mut(operator: &mut JoinOperator) -> Option<&mut Expr> {
    let constraint = match operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c) => c,
        _ => return None,
    };
    match constraint {
        JoinConstraint::On(expr) => Some(expr),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_sql::parse_statement;

    #[test]
    fn resolves_where_expression() {
        let mut stmt = parse_statement("SELECT * FROM t0 WHERE a < 1").unwrap();
        let site = resolve(
            &mut stmt,
            &[Step::Body, Step::IntoSelect, Step::Selection],
        )
        .unwrap();
        assert!(matches!(site, SiteMut::Expr(Expr::BinaryOp { .. })));
    }

    #[test]
    fn resolves_join_on() {
        let mut stmt = parse_statement("SELECT * FROM t0 JOIN t1 ON t0.a = t1.a").unwrap();
        let site = resolve(
            &mut stmt,
            &[Step::Body, Step::IntoSelect, Step::JoinOn(0, 0)],
        )
        .unwrap();
        assert!(matches!(site, SiteMut::Expr(_)));
    }

    #[test]
    fn resolves_subquery_query() {
        let mut stmt =
            parse_statement("SELECT * FROM t0 WHERE a IN (SELECT a FROM t1 ORDER BY a)").unwrap();
        let site = resolve(
            &mut stmt,
            &[
                Step::Body,
                Step::IntoSelect,
                Step::Selection,
                Step::Subquery,
            ],
        )
        .unwrap();
        assert!(matches!(site, SiteMut::Query(_)));
    }

    #[test]
    fn bad_step_is_reported() {
        let mut stmt = parse_statement("SELECT * FROM t0").unwrap();
        let err = resolve(&mut stmt, &[Step::Body, Step::IntoSelect, Step::Having]).unwrap_err();
        assert!(matches!(err, MutateError::BadPath(_)));
    }
}
