//! Stage 2: the mutation visitor.
//!
//! Walks a SELECT or set-op statement carrying the direction parity bit
//! and records every applicable upper/lower candidate together with the
//! path to its node. The walk is deterministic, so candidate order is
//! stable for a given statement.
//!
//! Recursion policy: descend into AND, OR, NOT, IS [NOT] TRUE/FALSE,
//! parens, subquery bridges, and WHERE/HAVING/ON; record-but-stop at
//! numeric comparisons; stop cold at XOR, arithmetic, CASE/IF, function
//! calls, and anything unrecognized.

use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, JoinConstraint, JoinOperator, Query, Select, SetExpr,
    SetOperator, SetQuantifier, Statement, TableFactor, Value,
};

use crate::candidate::{Candidate, MutationKind, NodePath, Step};
use crate::{MutateError, Result};

/// LIMIT expansion never exceeds this.
pub(crate) const LIMIT_CAP: i64 = i32::MAX as i64;

/// How DISTINCT toggling applies to a SELECT.
enum DistinctMode {
    /// Top-level SELECT; the L variant needs the statement free of ORDER
    /// BY and CTEs (MySQL rejects `ORDER BY col` under DISTINCT when the
    /// column is not selected).
    TopLevel { has_order_by: bool, has_cte: bool },
    /// Nested subquery; toggling is safe only for a bare SELECT.
    Subquery { eligible: bool },
    /// Set-operation arm; no DISTINCT candidates.
    Disallowed,
}

/// Enumerates mutation candidates for a statement.
///
/// The parity bit starts at 1; every polarity-inverting wrapper flips it.
/// The visitor is single-use state on the stack and must not be shared
/// across threads.
pub fn enumerate(statement: &Statement) -> Result<Vec<Candidate>> {
    let Statement::Query(query) = statement else {
        return Err(MutateError::Unsupported(
            "only SELECT and set-op statements are mutated".to_string(),
        ));
    };

    let mut visitor = Visitor {
        candidates: Vec::new(),
    };
    visitor.query(query, &NodePath::new(), true, false);
    Ok(visitor.candidates)
}

struct Visitor {
    candidates: Vec<Candidate>,
}

impl Visitor {
    fn emit(&mut self, kind: MutationKind, path: &NodePath, flag: bool) {
        self.candidates.push(Candidate::new(kind, path.clone(), flag));
    }

    fn query(&mut self, query: &Query, path: &NodePath, flag: bool, is_subquery: bool) {
        let has_cte = query.with.is_some();
        let has_order_by = query
            .order_by
            .as_ref()
            .is_some_and(|ob| !ob.exprs.is_empty());
        let has_limit = query.limit.is_some();

        match query.body.as_ref() {
            SetExpr::Select(select) => {
                let windowless = select.named_window.is_empty();

                if is_subquery && has_order_by && !has_limit && !has_cte && windowless {
                    self.emit(MutationKind::OrderByRemoveL, path, flag);
                }
                if is_subquery
                    && has_order_by
                    && !has_cte
                    && windowless
                    && literal_limit(query).is_some_and(|n| n < LIMIT_CAP)
                {
                    self.emit(MutationKind::LimitExpandU, path, flag);
                }

                let distinct_mode = if is_subquery {
                    DistinctMode::Subquery {
                        eligible: !has_order_by
                            && !has_limit
                            && !has_cte
                            && windowless
                            && select.having.is_none()
                            && group_by_is_empty(select),
                    }
                } else {
                    DistinctMode::TopLevel {
                        has_order_by,
                        has_cte,
                    }
                };

                let mut select_path = path.clone();
                select_path.push(Step::Body);
                select_path.push(Step::IntoSelect);
                self.select(select, &select_path, flag, &distinct_mode);
            }
            SetExpr::SetOperation {
                op: SetOperator::Union,
                set_quantifier,
                left,
                right,
            } => {
                let mut body_path = path.clone();
                body_path.push(Step::Body);

                match set_quantifier {
                    SetQuantifier::All => self.emit(MutationKind::UnionAllL, &body_path, flag),
                    SetQuantifier::None | SetQuantifier::Distinct => {
                        self.emit(MutationKind::UnionAllU, &body_path, flag);
                    }
                    _ => {}
                }

                if matches!(left.as_ref(), SetExpr::Select(_))
                    && matches!(right.as_ref(), SetExpr::Select(_))
                {
                    self.emit(MutationKind::UnionRemoveL, path, flag);
                }

                for (arm, step) in [(left, Step::SetLeft), (right, Step::SetRight)] {
                    if let SetExpr::Select(select) = arm.as_ref() {
                        let mut arm_path = body_path.clone();
                        arm_path.push(step);
                        arm_path.push(Step::IntoSelect);
                        self.select(select, &arm_path, flag, &DistinctMode::Disallowed);
                    }
                }
            }
            SetExpr::Query(inner) => {
                let mut inner_path = path.clone();
                inner_path.push(Step::Body);
                inner_path.push(Step::InnerQuery);
                self.query(inner, &inner_path, flag, is_subquery);
            }
            _ => {}
        }
    }

    fn select(&mut self, select: &Select, path: &NodePath, flag: bool, mode: &DistinctMode) {
        let toggle = match mode {
            DistinctMode::TopLevel {
                has_order_by,
                has_cte,
            } => {
                if select.distinct.is_some() {
                    Some(MutationKind::DistinctU)
                } else if !has_order_by && !has_cte {
                    Some(MutationKind::DistinctL)
                } else {
                    None
                }
            }
            DistinctMode::Subquery { eligible: true } => Some(if select.distinct.is_some() {
                MutationKind::DistinctU
            } else {
                MutationKind::DistinctL
            }),
            _ => None,
        };
        if let Some(kind) = toggle {
            self.emit(kind, path, flag);
        }

        if select.selection.is_some() {
            let mut where_path = path.clone();
            where_path.push(Step::Selection);
            self.emit(MutationKind::WhereTrueU, &where_path, flag);
            self.emit(MutationKind::WhereFalseL, &where_path, flag);
            self.expr(select.selection.as_ref().unwrap(), &where_path, flag);
        }

        if select.having.is_some() {
            let mut having_path = path.clone();
            having_path.push(Step::Having);
            self.emit(MutationKind::HavingTrueU, &having_path, flag);
            self.emit(MutationKind::HavingFalseL, &having_path, flag);
            self.expr(select.having.as_ref().unwrap(), &having_path, flag);
        }

        for (i, twj) in select.from.iter().enumerate() {
            if let TableFactor::Derived { subquery, .. } = &twj.relation {
                let mut derived_path = path.clone();
                derived_path.push(Step::Derived(i, None));
                self.query(subquery, &derived_path, flag, true);
            }
            for (j, join) in twj.joins.iter().enumerate() {
                if let TableFactor::Derived { subquery, .. } = &join.relation {
                    let mut derived_path = path.clone();
                    derived_path.push(Step::Derived(i, Some(j)));
                    self.query(subquery, &derived_path, flag, true);
                }
                if let Some(on) = join_on(&join.join_operator) {
                    let mut on_path = path.clone();
                    on_path.push(Step::JoinOn(i, j));
                    self.emit(MutationKind::OnTrueU, &on_path, flag);
                    self.emit(MutationKind::OnFalseL, &on_path, flag);
                    self.expr(on, &on_path, flag);
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr, path: &NodePath, flag: bool) {
        match expr {
            Expr::BinaryOp {
                op: BinaryOperator::And | BinaryOperator::Or,
                left,
                right,
            } => {
                let mut left_path = path.clone();
                left_path.push(Step::Left);
                self.expr(left, &left_path, flag);
                let mut right_path = path.clone();
                right_path.push(Step::Right);
                self.expr(right, &right_path, flag);
            }
            Expr::BinaryOp { op, .. } => {
                // Comparisons record a candidate but are not descended.
                if let Some(kind) = cmp_kind(op) {
                    self.emit(kind, path, flag);
                }
            }
            Expr::UnaryOp {
                op: sqlparser::ast::UnaryOperator::Not,
                expr: inner,
            } => {
                let mut inner_path = path.clone();
                inner_path.push(Step::Operand);
                self.expr(inner, &inner_path, !flag);
            }
            Expr::Nested(inner) => {
                let mut inner_path = path.clone();
                inner_path.push(Step::Operand);
                self.expr(inner, &inner_path, flag);
            }
            Expr::IsTrue(inner) | Expr::IsNotFalse(inner) => {
                let mut inner_path = path.clone();
                inner_path.push(Step::Operand);
                self.expr(inner, &inner_path, flag);
            }
            Expr::IsFalse(inner) | Expr::IsNotTrue(inner) => {
                let mut inner_path = path.clone();
                inner_path.push(Step::Operand);
                self.expr(inner, &inner_path, !flag);
            }
            Expr::InList { list, negated, .. } => {
                let node_flag = flag != *negated;
                if list.iter().any(is_literal) {
                    self.emit(MutationKind::InListU, path, node_flag);
                }
                if list.len() > 1 {
                    self.emit(MutationKind::InListL, path, node_flag);
                }
            }
            Expr::Between {
                negated, low, high, ..
            } => {
                let node_flag = flag != *negated;
                if integer_literal(low).is_some() && integer_literal(high).is_some() {
                    self.emit(MutationKind::BetweenU, path, node_flag);
                    self.emit(MutationKind::BetweenL, path, node_flag);
                }
            }
            Expr::InSubquery {
                subquery, negated, ..
            } => {
                let node_flag = flag != *negated;
                let mut sub_path = path.clone();
                sub_path.push(Step::Subquery);
                self.query(subquery, &sub_path, node_flag, true);
            }
            Expr::Exists { subquery, negated } => {
                let node_flag = flag != *negated;
                self.emit(MutationKind::ExistsU, path, node_flag);
                self.emit(MutationKind::ExistsL, path, node_flag);
                let mut sub_path = path.clone();
                sub_path.push(Step::Subquery);
                self.query(subquery, &sub_path, node_flag, true);
            }
            Expr::AnyOp {
                compare_op, right, ..
            } => {
                if let Some(kind) = cmp_kind(compare_op) {
                    self.emit(kind, path, flag);
                }
                self.emit(MutationKind::QuantifierL, path, flag);
                let mut right_path = path.clone();
                right_path.push(Step::Right);
                self.expr(right, &right_path, flag);
            }
            Expr::AllOp {
                compare_op, right, ..
            } => {
                if let Some(kind) = cmp_kind(compare_op) {
                    self.emit(kind, path, flag);
                }
                self.emit(MutationKind::QuantifierU, path, flag);
                // ALL inverts the subquery's monotonicity.
                let mut right_path = path.clone();
                right_path.push(Step::Right);
                self.expr(right, &right_path, !flag);
            }
            Expr::Subquery(query) => {
                let mut sub_path = path.clone();
                sub_path.push(Step::Subquery);
                self.query(query, &sub_path, flag, true);
            }
            // XOR lands in the comparison arm above (it is a BinaryOp);
            // CASE/IF, function calls, and unknown shapes stop the walk.
            _ => {}
        }
    }
}

fn group_by_is_empty(select: &Select) -> bool {
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => exprs.is_empty(),
        GroupByExpr::All(_) => false,
    }
}

fn cmp_kind(op: &BinaryOperator) -> Option<MutationKind> {
    match op {
        BinaryOperator::Lt | BinaryOperator::Gt => Some(MutationKind::CmpOpU),
        BinaryOperator::LtEq | BinaryOperator::GtEq => Some(MutationKind::CmpOpL),
        _ => None,
    }
}

fn is_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Value(_))
}

/// The literal LIMIT count of a query, when it is a plain number.
pub(crate) fn literal_limit(query: &Query) -> Option<i64> {
    match query.limit.as_ref()? {
        Expr::Value(Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}

/// An integer literal's value, through an optional unary minus.
pub(crate) fn integer_literal(expr: &Expr) -> Option<i128> {
    match expr {
        Expr::Value(Value::Number(n, _)) => n.parse().ok(),
        Expr::UnaryOp {
            op: sqlparser::ast::UnaryOperator::Minus,
            expr,
        } => match expr.as_ref() {
            Expr::Value(Value::Number(n, _)) => n.parse::<i128>().ok().map(|v| -v),
            _ => None,
        },
        _ => None,
    }
}

fn join_on(operator: &JoinOperator) -> Option<&Expr> {
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
