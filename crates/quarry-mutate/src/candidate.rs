//! Mutation candidates.
//!
//! A candidate pairs a mutation kind with the path of the AST node it
//! mutates and the direction parity observed at that node. Candidates are
//! produced by the visitor and consumed by the applicator; they never
//! outlive the statement they were enumerated from.

use std::fmt;

/// The fixed enumeration of mutation kinds.
///
/// The trailing letter is the direction bit: `U` mutations may only grow
/// the result set, `L` mutations may only shrink it (before context
/// parity is applied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Remove DISTINCT from a SELECT.
    DistinctU,
    /// Add DISTINCT to a SELECT.
    DistinctL,
    /// Promote UNION to UNION ALL.
    UnionAllU,
    /// Demote UNION ALL to UNION.
    UnionAllL,
    /// Replace a WHERE predicate with literal 1.
    WhereTrueU,
    /// Replace a WHERE predicate with literal 0.
    WhereFalseL,
    /// Replace a HAVING predicate with literal 1.
    HavingTrueU,
    /// Replace a HAVING predicate with literal 0.
    HavingFalseL,
    /// Replace a join ON predicate with literal 1.
    OnTrueU,
    /// Replace a join ON predicate with literal 0.
    OnFalseL,
    /// Relax a strict comparison (`<` to `<=`, `>` to `>=`).
    CmpOpU,
    /// Tighten a non-strict comparison (`<=` to `<`, `>=` to `>`).
    CmpOpL,
    /// Turn an ALL subquery comparison into ANY.
    QuantifierU,
    /// Turn an ANY subquery comparison into ALL.
    QuantifierL,
    /// Append an element to an IN list.
    InListU,
    /// Drop the last element of an IN list.
    InListL,
    /// Widen literal BETWEEN bounds by one.
    BetweenU,
    /// Tighten literal BETWEEN bounds by one.
    BetweenL,
    /// Replace an EXISTS subquery with `SELECT 1`.
    ExistsU,
    /// Replace an EXISTS subquery with `SELECT 1 WHERE 1=0`.
    ExistsL,
    /// Drop the right arm of a two-select UNION / UNION ALL.
    UnionRemoveL,
    /// Drop a subquery's ORDER BY.
    OrderByRemoveL,
    /// Increase a subquery's literal LIMIT by one.
    LimitExpandU,
}

impl MutationKind {
    /// The candidate name; always suffixed with its direction letter.
    pub fn name(self) -> &'static str {
        match self {
            MutationKind::DistinctU => "DistinctU",
            MutationKind::DistinctL => "DistinctL",
            MutationKind::UnionAllU => "UnionAllU",
            MutationKind::UnionAllL => "UnionAllL",
            MutationKind::WhereTrueU => "WhereTrueU",
            MutationKind::WhereFalseL => "WhereFalseL",
            MutationKind::HavingTrueU => "HavingTrueU",
            MutationKind::HavingFalseL => "HavingFalseL",
            MutationKind::OnTrueU => "OnTrueU",
            MutationKind::OnFalseL => "OnFalseL",
            MutationKind::CmpOpU => "CmpOpU",
            MutationKind::CmpOpL => "CmpOpL",
            MutationKind::QuantifierU => "QuantifierU",
            MutationKind::QuantifierL => "QuantifierL",
            MutationKind::InListU => "InListU",
            MutationKind::InListL => "InListL",
            MutationKind::BetweenU => "BetweenU",
            MutationKind::BetweenL => "BetweenL",
            MutationKind::ExistsU => "ExistsU",
            MutationKind::ExistsL => "ExistsL",
            MutationKind::UnionRemoveL => "UnionRemoveL",
            MutationKind::OrderByRemoveL => "OrderByRemoveL",
            MutationKind::LimitExpandU => "LimitExpandU",
        }
    }

    /// Direction bit from the name suffix.
    pub fn u_bit(self) -> bool {
        self.name().ends_with('U')
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One navigation step from a node to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Query → its body.
    Body,
    /// Set operation → left arm.
    SetLeft,
    /// Set operation → right arm.
    SetRight,
    /// `SetExpr::Select` → the SELECT.
    IntoSelect,
    /// `SetExpr::Query` → the parenthesized query.
    InnerQuery,
    /// SELECT → WHERE expression.
    Selection,
    /// SELECT → HAVING expression.
    Having,
    /// SELECT → `from[i].joins[j]`'s ON expression.
    JoinOn(usize, usize),
    /// SELECT → derived-table subquery at `from[i]` (join `j` when set).
    Derived(usize, Option<usize>),
    /// Binary / quantified comparison → left operand.
    Left,
    /// Binary / quantified comparison → right operand.
    Right,
    /// Unary wrapper (NOT, parens, IS [NOT] TRUE/FALSE) → operand.
    Operand,
    /// Subquery-bearing expression → its query.
    Subquery,
}

/// A path from the statement root to a mutation site.
pub type NodePath = Vec<Step>;

/// One enumerated mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: MutationKind,
    pub path: NodePath,
    /// Direction bit; always equals `kind.u_bit()`.
    pub u: bool,
    /// The direction parity at the mutation site (1 at the root).
    pub flag: bool,
}

impl Candidate {
    pub(crate) fn new(kind: MutationKind, path: NodePath, flag: bool) -> Self {
        Self {
            kind,
            path,
            u: kind.u_bit(),
            flag,
        }
    }

    /// Effective direction: `((U XOR flag) XOR 1) == 1`, i.e. whether the
    /// mutated query's result set must not shrink relative to baseline.
    pub fn is_upper(&self) -> bool {
        self.u == self.flag
    }
}
