//! Join-edge extraction from parsed SQL.
//!
//! The analogue of the typed-tree walk, over the sqlparser join tree. It
//! exists because the tree path occasionally cannot recover keys that are
//! plainly visible in the rendered SQL; the refiner arbitrates.

use sqlparser::ast::{
    BinaryOperator, Expr, JoinConstraint, JoinOperator, SetExpr, TableFactor, UnaryOperator,
};

use quarry_sql::{Result, SqlError, parse_query};
use quarry_types::{JoinEdge, JoinKind, SchemaState, reason};

use crate::resolve::{Collected, ColumnRef, EqCandidate, build_on_edge, build_using_edge};

/// Extracts join edges from a SQL text.
///
/// Only plain `SELECT ... FROM base JOIN ...` shapes are supported; set
/// operations and derived tables return an error, which the refiner
/// treats as "keep the tree edges".
pub fn extract_sql(schema: &SchemaState, sql: &str) -> Result<Vec<JoinEdge>> {
    let query = parse_query(sql)?;
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(SqlError::Unsupported(
            "join extraction requires a plain SELECT".to_string(),
        ));
    };
    let [twj] = select.from.as_slice() else {
        return Err(SqlError::Unsupported(
            "join extraction requires a single FROM item".to_string(),
        ));
    };

    let base = factor_table(&twj.relation)?;
    let mut left_tables = vec![base];
    let mut edges = Vec::with_capacity(twj.joins.len());

    for join in &twj.joins {
        let right = factor_table(&join.relation)?;
        let (kind, constraint) = match &join.join_operator {
            JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
            JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
            JoinOperator::RightOuter(c) => (JoinKind::Right, Some(c)),
            JoinOperator::LeftSemi(c) | JoinOperator::RightSemi(c) => (JoinKind::Semi, Some(c)),
            JoinOperator::LeftAnti(c) | JoinOperator::RightAnti(c) => (JoinKind::Anti, Some(c)),
            JoinOperator::CrossJoin => (JoinKind::Cross, None),
            other => {
                return Err(SqlError::Unsupported(format!(
                    "join operator not supported: {other:?}"
                )));
            }
        };

        let innermost = left_tables.last().map_or("", String::as_str);
        let edge = match (kind, constraint) {
            (JoinKind::Cross, _) => JoinEdge::cross(innermost, &right),
            (_, Some(JoinConstraint::Using(columns))) => {
                let names: Vec<String> = columns.iter().map(|i| i.value.clone()).collect();
                build_using_edge(schema, &left_tables, kind, &right, &names)
            }
            (_, Some(JoinConstraint::On(on))) => {
                build_on_edge(schema, &left_tables, kind, &right, collect(on))
            }
            _ => JoinEdge::unresolved(kind, innermost, &right, reason::NO_EQUAL_CANDIDATES),
        };
        edges.push(edge);
        left_tables.push(right);
    }

    Ok(edges)
}

fn factor_table(factor: &TableFactor) -> Result<String> {
    match factor {
        TableFactor::Table { name, .. } => Ok(name
            .0
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default()),
        other => Err(SqlError::Unsupported(format!(
            "table factor not supported: {other}"
        ))),
    }
}

fn collect(on: &Expr) -> Collected {
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

fn walk(expr: &Expr, out: &mut Vec<EqCandidate>, saw_eq: &mut bool, saw_column: &mut bool) {
    let (core, nots) = strip(expr);
    if nots % 2 == 1 {
        return;
    }
    match core {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            walk(left, out, saw_eq, saw_column);
            walk(right, out, saw_eq, saw_column);
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq | BinaryOperator::Spaceship,
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

/// Peels parens, unary `+`, NOT (counted), CAST/CONVERT, and the BINARY
/// collation wrapper.
fn strip(expr: &Expr) -> (&Expr, usize) {
    let mut current = expr;
    let mut nots = 0;
    loop {
        match current {
            Expr::Nested(inner) => current = inner,
            Expr::UnaryOp {
                op: UnaryOperator::Plus,
                expr,
            } => current = expr,
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => {
                nots += 1;
                current = expr;
            }
            Expr::Cast { expr, .. } => current = expr,
            Expr::Convert { expr, .. } => current = expr,
            Expr::Function(func)
                if func.name.to_string().eq_ignore_ascii_case("binary") =>
            {
                match single_function_arg(func) {
                    Some(inner) => current = inner,
                    None => return (current, nots),
                }
            }
            _ => return (current, nots),
        }
    }
}

fn single_function_arg(func: &sqlparser::ast::Function) -> Option<&Expr> {
    use sqlparser::ast::{FunctionArg, FunctionArgExpr, FunctionArguments};
    match &func.args {
        FunctionArguments::List(list) if list.args.len() == 1 => match &list.args[0] {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr),
            _ => None,
        },
        _ => None,
    }
}

fn operand_column(expr: &Expr) -> Option<ColumnRef> {
    let (core, nots) = strip(expr);
    if nots != 0 {
        return None;
    }
    match core {
        Expr::Identifier(ident) => Some(ColumnRef {
            table: None,
            column: ident.value.clone(),
        }),
        Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
            let column = idents[idents.len() - 1].value.clone();
            let table = idents[idents.len() - 2].value.clone();
            Some(ColumnRef {
                table: Some(table),
                column,
            })
        }
        _ => None,
    }
}
