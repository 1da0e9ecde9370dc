//! Stage 3: mutation applicators.
//!
//! One applicator per mutation kind, all following the same protocol:
//! resolve the candidate's path, swap the addressed field for its mutated
//! form (keeping the original as an owned snapshot), serialize the whole
//! statement, then write the snapshot back. Nothing fallible runs between
//! the swap and the restore, so the restore executes on every exit path
//! and the AST compares equal to its pre-call state afterwards.

use std::mem;

use sqlparser::ast::{
    BinaryOperator, Distinct, Expr, OrderBy, Query, SetExpr, SetQuantifier, Statement, Value,
};

use quarry_sql::parse_query;

use crate::candidate::{Candidate, MutationKind};
use crate::path::{SiteMut, resolve};
use crate::visit::{LIMIT_CAP, integer_literal, literal_limit};
use crate::{MutateError, Result};

/// Applies one candidate and returns the mutated SQL.
///
/// The statement is restored before returning; callers may apply any
/// number of candidates against the same root sequentially. Not safe for
/// concurrent use on one statement.
pub fn apply(root: &mut Statement, candidate: &Candidate) -> Result<String> {
    let snapshot = swap_in(root, candidate)?;
    let sql = root.to_string();
    swap_back(root, candidate, snapshot)?;
    Ok(sql)
}

/// The owned original of a swapped field.
enum Snapshot {
    Expr(Expr),
    Distinct(Option<Distinct>),
    Quantifier(SetQuantifier),
    Body(Box<SetExpr>),
    OrderBy(Option<OrderBy>),
    Limit(Option<Expr>),
    Subquery(Box<Query>),
}

fn mismatch(kind: MutationKind) -> MutateError {
    MutateError::NodeMismatch { kind: kind.name() }
}

fn number(n: impl ToString) -> Expr {
    Expr::Value(Value::Number(n.to_string(), false))
}

fn swap_in(root: &mut Statement, candidate: &Candidate) -> Result<Snapshot> {
    let kind = candidate.kind;
    let site = resolve(root, &candidate.path)?;
    match (kind, site) {
        (MutationKind::DistinctU, SiteMut::Select(select)) => {
            if select.distinct.is_none() {
                return Err(mismatch(kind));
            }
            Ok(Snapshot::Distinct(select.distinct.take()))
        }
        (MutationKind::DistinctL, SiteMut::Select(select)) => {
            if select.distinct.is_some() {
                return Err(mismatch(kind));
            }
            select.distinct = Some(Distinct::Distinct);
            Ok(Snapshot::Distinct(None))
        }

        (MutationKind::UnionAllU, SiteMut::SetExpr(SetExpr::SetOperation { set_quantifier, .. })) => {
            if !matches!(set_quantifier, SetQuantifier::None | SetQuantifier::Distinct) {
                return Err(mismatch(kind));
            }
            Ok(Snapshot::Quantifier(mem::replace(
                set_quantifier,
                SetQuantifier::All,
            )))
        }
        (MutationKind::UnionAllL, SiteMut::SetExpr(SetExpr::SetOperation { set_quantifier, .. })) => {
            if !matches!(set_quantifier, SetQuantifier::All) {
                return Err(mismatch(kind));
            }
            Ok(Snapshot::Quantifier(mem::replace(
                set_quantifier,
                SetQuantifier::None,
            )))
        }

        (
            MutationKind::WhereTrueU | MutationKind::HavingTrueU | MutationKind::OnTrueU,
            SiteMut::Expr(expr),
        ) => Ok(Snapshot::Expr(mem::replace(expr, number(1)))),
        (
            MutationKind::WhereFalseL | MutationKind::HavingFalseL | MutationKind::OnFalseL,
            SiteMut::Expr(expr),
        ) => Ok(Snapshot::Expr(mem::replace(expr, number(0)))),

        (MutationKind::CmpOpU | MutationKind::CmpOpL, SiteMut::Expr(expr)) => {
            let snapshot = expr.clone();
            let op = match expr {
                Expr::BinaryOp { op, .. } => op,
                Expr::AnyOp { compare_op, .. } | Expr::AllOp { compare_op, .. } => compare_op,
                _ => return Err(mismatch(kind)),
            };
            let new_op = match (kind, &*op) {
                (MutationKind::CmpOpU, BinaryOperator::Lt) => BinaryOperator::LtEq,
                (MutationKind::CmpOpU, BinaryOperator::Gt) => BinaryOperator::GtEq,
                (MutationKind::CmpOpL, BinaryOperator::LtEq) => BinaryOperator::Lt,
                (MutationKind::CmpOpL, BinaryOperator::GtEq) => BinaryOperator::Gt,
                _ => return Err(mismatch(kind)),
            };
            *op = new_op;
            Ok(Snapshot::Expr(snapshot))
        }

        (MutationKind::QuantifierU, SiteMut::Expr(expr)) => {
            let Expr::AllOp {
                left,
                compare_op,
                right,
            } = expr.clone()
            else {
                return Err(mismatch(kind));
            };
            Ok(Snapshot::Expr(mem::replace(
                expr,
                Expr::AnyOp {
                    left,
                    compare_op,
                    right,
                    is_some: false,
                },
            )))
        }
        (MutationKind::QuantifierL, SiteMut::Expr(expr)) => {
            let Expr::AnyOp {
                left,
                compare_op,
                right,
                ..
            } = expr.clone()
            else {
                return Err(mismatch(kind));
            };
            Ok(Snapshot::Expr(mem::replace(
                expr,
                Expr::AllOp {
                    left,
                    compare_op,
                    right,
                },
            )))
        }

        (MutationKind::InListU, SiteMut::Expr(expr)) => {
            let snapshot = expr.clone();
            let Expr::InList { list, .. } = expr else {
                return Err(mismatch(kind));
            };
            let new_element = list
                .iter()
                .rev()
                .find_map(grown_element)
                .ok_or_else(|| mismatch(kind))?;
            list.push(new_element);
            Ok(Snapshot::Expr(snapshot))
        }
        (MutationKind::InListL, SiteMut::Expr(expr)) => {
            let snapshot = expr.clone();
            let Expr::InList { list, .. } = expr else {
                return Err(mismatch(kind));
            };
            if list.len() < 2 {
                return Err(mismatch(kind));
            }
            list.pop();
            Ok(Snapshot::Expr(snapshot))
        }

        (MutationKind::BetweenU | MutationKind::BetweenL, SiteMut::Expr(expr)) => {
            let snapshot = expr.clone();
            let Expr::Between { low, high, .. } = expr else {
                return Err(mismatch(kind));
            };
            let (low_n, high_n) = match (integer_literal(low), integer_literal(high)) {
                (Some(l), Some(h)) => (l, h),
                _ => return Err(mismatch(kind)),
            };
            let (new_low, new_high) = if kind == MutationKind::BetweenU {
                (low_n.saturating_sub(1), high_n.saturating_add(1))
            } else {
                (low_n.saturating_add(1), high_n.saturating_sub(1))
            };
            **low = signed_number(new_low);
            **high = signed_number(new_high);
            Ok(Snapshot::Expr(snapshot))
        }

        (MutationKind::ExistsU | MutationKind::ExistsL, SiteMut::Expr(expr)) => {
            let Expr::Exists { subquery, .. } = expr else {
                return Err(mismatch(kind));
            };
            // Parsing the replacement cannot fail after the swap: it runs
            // first, so an error here leaves the tree untouched.
            let replacement = if kind == MutationKind::ExistsU {
                parse_query("SELECT 1")?
            } else {
                parse_query("SELECT 1 WHERE 1=0")?
            };
            Ok(Snapshot::Subquery(mem::replace(subquery, replacement)))
        }

        (MutationKind::UnionRemoveL, SiteMut::Query(query)) => {
            let SetExpr::SetOperation { left, .. } = query.body.as_ref() else {
                return Err(mismatch(kind));
            };
            if !matches!(left.as_ref(), SetExpr::Select(_)) {
                return Err(mismatch(kind));
            }
            let new_body = left.clone();
            Ok(Snapshot::Body(mem::replace(&mut query.body, new_body)))
        }

        (MutationKind::OrderByRemoveL, SiteMut::Query(query)) => {
            if query.order_by.is_none() {
                return Err(mismatch(kind));
            }
            Ok(Snapshot::OrderBy(query.order_by.take()))
        }

        (MutationKind::LimitExpandU, SiteMut::Query(query)) => {
            let n = literal_limit(query).ok_or_else(|| mismatch(kind))?;
            if n >= LIMIT_CAP {
                return Err(mismatch(kind));
            }
            let snapshot = Snapshot::Limit(query.limit.take());
            query.limit = Some(number((n + 1).min(LIMIT_CAP)));
            Ok(snapshot)
        }

        _ => Err(mismatch(kind)),
    }
}

fn swap_back(root: &mut Statement, candidate: &Candidate, snapshot: Snapshot) -> Result<()> {
    let restore_failed = || MutateError::RestoreFailed {
        kind: candidate.kind.name(),
    };
    let site = resolve(root, &candidate.path).map_err(|_| restore_failed())?;
    match (site, snapshot) {
        (SiteMut::Expr(expr), Snapshot::Expr(old)) => *expr = old,
        (SiteMut::Expr(Expr::Exists { subquery, .. }), Snapshot::Subquery(old)) => *subquery = old,
        (SiteMut::Select(select), Snapshot::Distinct(old)) => select.distinct = old,
        (SiteMut::SetExpr(SetExpr::SetOperation { set_quantifier, .. }), Snapshot::Quantifier(old)) => {
            *set_quantifier = old;
        }
        (SiteMut::Query(query), Snapshot::Body(old)) => query.body = old,
        (SiteMut::Query(query), Snapshot::OrderBy(old)) => query.order_by = old,
        (SiteMut::Query(query), Snapshot::Limit(old)) => query.limit = old,
        _ => return Err(restore_failed()),
    }
    Ok(())
}

/// Derives the element `InListU` appends: +1 on a numeric literal, an
/// `_x` suffix on a string, NULL for anything else.
fn grown_element(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::Value(Value::Number(n, long)) => Some(match n.parse::<i128>() {
            Ok(v) => Expr::Value(Value::Number(v.saturating_add(1).to_string(), *long)),
            Err(_) => Expr::Value(Value::Null),
        }),
        Expr::Value(Value::SingleQuotedString(s)) => Some(Expr::Value(
            Value::SingleQuotedString(format!("{s}_x")),
        )),
        Expr::Value(_) => Some(Expr::Value(Value::Null)),
        _ => None,
    }
}

fn signed_number(n: i128) -> Expr {
    if n < 0 {
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr: Box::new(number(-n)),
        }
    } else {
        number(n)
    }
}
