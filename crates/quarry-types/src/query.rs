//! The typed query tree the generator emits.
//!
//! The generator renders SQL text for execution, but it also hands over
//! this tree so the join-edge extractor can recover join keys without
//! re-parsing. The tree is a faithful mirror of what was generated, not a
//! general SQL AST: only the shapes the generator produces are present.

use serde::{Deserialize, Serialize};

use crate::value::TypedValue;

/// Join type tag, shared between the generated tree and extracted edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
    Semi,
    Anti,
}

impl JoinKind {
    /// Stable lowercase tag, used in join signatures.
    pub fn tag(self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Cross => "cross",
            JoinKind::Semi => "semi",
            JoinKind::Anti => "anti",
        }
    }
}

/// Binary operators that can appear in a generated ON / WHERE expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenBinaryOp {
    And,
    Or,
    Xor,
    Eq,
    /// MySQL `<=>`, the null-safe equality.
    NullSafeEq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Mul,
    Div,
}

/// Unary operators that can appear in a generated expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenUnaryOp {
    Not,
    Plus,
    Minus,
}

/// A generated scalar expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GenExpr {
    /// Column reference, optionally table-qualified.
    Column {
        table: Option<String>,
        name: String,
    },
    /// Literal value.
    Literal(TypedValue),
    Binary {
        op: GenBinaryOp,
        left: Box<GenExpr>,
        right: Box<GenExpr>,
    },
    Unary {
        op: GenUnaryOp,
        operand: Box<GenExpr>,
    },
    /// Function call; the extractor only unwraps CAST / CONVERT / BINARY.
    Func { name: String, args: Vec<GenExpr> },
    Paren(Box<GenExpr>),
}

impl GenExpr {
    pub fn column(table: Option<&str>, name: &str) -> Self {
        GenExpr::Column {
            table: table.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn binary(op: GenBinaryOp, left: GenExpr, right: GenExpr) -> Self {
        GenExpr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(operand: GenExpr) -> Self {
        GenExpr::Unary {
            op: GenUnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    pub fn paren(inner: GenExpr) -> Self {
        GenExpr::Paren(Box::new(inner))
    }
}

/// One join step in a generated FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenJoin {
    pub kind: JoinKind,
    /// The join's right table.
    pub table: String,
    /// Column names of a USING clause; empty when the join uses ON.
    pub using_columns: Vec<String>,
    /// ON expression; `None` for CROSS and USING joins.
    pub on: Option<GenExpr>,
}

/// A generated FROM clause: base table plus ordered joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenFrom {
    pub base: String,
    pub joins: Vec<GenJoin>,
}

/// One generated ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenOrderItem {
    pub expr: GenExpr,
    pub ascending: bool,
}

/// One generated common table expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenCte {
    pub name: String,
    pub query: Box<GenQuery>,
}

/// The generated query tree (spec'd subset of a SELECT).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenQuery {
    pub ctes: Vec<GenCte>,
    pub distinct: bool,
    pub from: GenFrom,
    pub where_clause: Option<GenExpr>,
    pub group_by: Vec<GenExpr>,
    pub having: Option<GenExpr>,
    pub order_by: Vec<GenOrderItem>,
    pub limit: Option<u64>,
}

impl GenQuery {
    /// A bare `SELECT * FROM <base>` tree, the common test scaffold.
    pub fn scan(base: impl Into<String>) -> Self {
        Self {
            ctes: Vec::new(),
            distinct: false,
            from: GenFrom {
                base: base.into(),
                joins: Vec::new(),
            },
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Appends a join step.
    pub fn join(mut self, join: GenJoin) -> Self {
        self.from.joins.push(join);
        self
    }

    /// Stable signature of the join shape: base table plus ordered
    /// `(joinType:rightTable)` entries. Used to group mismatches.
    pub fn join_signature(&self) -> String {
        let mut sig = self.from.base.clone();
        for join in &self.from.joins {
            sig.push_str(&format!("|{}:{}", join.kind.tag(), join.table));
        }
        sig
    }
}
