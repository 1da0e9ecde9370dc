//! Log-level reduction passes.
//!
//! These are the cheap passes that run before ddmin: they only look at
//! statement structure, never at the database. Statements that fail to
//! parse are kept as-is; dropping something we cannot understand is how
//! reproducers get lost.

use std::collections::{BTreeSet, HashSet};

use sqlparser::ast::{SetExpr, Statement};

use quarry_sql::{parse_statement, referenced_tables};

/// Keeps only inserts whose target table is referenced by any of the
/// failing statements.
pub fn filter_inserts(inserts: &[String], failing: &[String]) -> Vec<String> {
    let mut referenced = BTreeSet::new();
    for sql in failing {
        if let Ok(tables) = referenced_tables(sql) {
            referenced.extend(tables);
        }
    }
    if referenced.is_empty() {
        return inserts.to_vec();
    }

    inserts
        .iter()
        .filter(|insert| match insert_target(insert) {
            Some(table) => referenced.contains(&table),
            None => true,
        })
        .cloned()
        .collect()
}

/// Splits every multi-row INSERT into one INSERT per row.
pub fn explode_inserts(inserts: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(inserts.len());
    for sql in inserts {
        match explode_one(sql) {
            Some(rows) => out.extend(rows),
            None => out.push(sql.clone()),
        }
    }
    out
}

fn explode_one(sql: &str) -> Option<Vec<String>> {
    let statement = parse_statement(sql).ok()?;
    let Statement::Insert(insert) = &statement else {
        return None;
    };
    let source = insert.source.as_ref()?;
    let SetExpr::Values(values) = source.body.as_ref() else {
        return None;
    };
    if values.rows.len() < 2 {
        return None;
    }

    let mut out = Vec::with_capacity(values.rows.len());
    for row in &values.rows {
        let mut single = statement.clone();
        let Statement::Insert(insert) = &mut single else {
            unreachable!("cloned from an INSERT");
        };
        let source = insert.source.as_mut().expect("checked above");
        let SetExpr::Values(values) = source.body.as_mut() else {
            unreachable!("cloned from VALUES");
        };
        values.rows = vec![row.clone()];
        out.push(single.to_string());
    }
    Some(out)
}

/// Case-insensitive exact dedup, keeping first occurrences in order.
pub fn dedup_statements(statements: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    statements
        .iter()
        .filter(|sql| seen.insert(sql.to_lowercase()))
        .cloned()
        .collect()
}

/// Merges consecutive single-row INSERTs that share a target table and
/// column list back into multi-row INSERTs.
pub fn merge_inserts(inserts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(inserts.len());
    let mut pending: Option<(String, Statement)> = None;

    for sql in inserts {
        let parsed = single_row_insert(sql);
        match (parsed, &mut pending) {
            (Some((key, statement)), Some((pending_key, accumulated))) if key == *pending_key => {
                let row = first_row(&statement);
                if let (Some(row), Statement::Insert(insert)) = (row, accumulated) {
                    if let Some(source) = insert.source.as_mut()
                        && let SetExpr::Values(values) = source.body.as_mut()
                    {
                        values.rows.push(row);
                        continue;
                    }
                }
                out.push(sql.clone());
            }
            (Some((key, statement)), _) => {
                flush(&mut pending, &mut out);
                pending = Some((key, statement));
            }
            (None, _) => {
                flush(&mut pending, &mut out);
                out.push(sql.clone());
            }
        }
    }
    flush(&mut pending, &mut out);
    out
}

fn flush(pending: &mut Option<(String, Statement)>, out: &mut Vec<String>) {
    if let Some((_, statement)) = pending.take() {
        out.push(statement.to_string());
    }
}

/// Parses a single-row INSERT; the key identifies its mergeable prefix.
fn single_row_insert(sql: &str) -> Option<(String, Statement)> {
    let statement = parse_statement(sql).ok()?;
    let Statement::Insert(insert) = &statement else {
        return None;
    };
    let source = insert.source.as_ref()?;
    let SetExpr::Values(values) = source.body.as_ref() else {
        return None;
    };
    if values.rows.len() != 1 {
        return None;
    }
    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();
    let key = format!("{}({})", insert.table_name.to_string().to_lowercase(), columns.join(","));
    Some((key, statement))
}

fn first_row(statement: &Statement) -> Option<Vec<sqlparser::ast::Expr>> {
    let Statement::Insert(insert) = statement else {
        return None;
    };
    let SetExpr::Values(values) = insert.source.as_ref()?.body.as_ref() else {
        return None;
    };
    values.rows.first().cloned()
}

fn insert_target(sql: &str) -> Option<String> {
    match parse_statement(sql).ok()? {
        Statement::Insert(insert) => Some(
            insert
                .table_name
                .0
                .last()
                .map(|i| i.value.to_lowercase())
                .unwrap_or_default(),
        ),
        _ => None,
    }
}
