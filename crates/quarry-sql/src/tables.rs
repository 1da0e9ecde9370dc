//! Referenced-table-name extraction.
//!
//! The minimizer filters the insert log down to tables the failing SQL
//! actually touches; this walk recovers those names from the AST. CTE
//! names are excluded since they never correspond to physical tables.

use std::collections::BTreeSet;

use sqlparser::ast::{
    Expr, FromTable, ObjectName, Query, SetExpr, Statement, TableFactor, TableWithJoins,
};

use crate::{Result, parse_statement};

/// Collects the physical table names a SQL statement references,
/// lowercased and deduplicated.
pub fn referenced_tables(sql: &str) -> Result<BTreeSet<String>> {
    let statement = parse_statement(sql)?;
    let mut walker = TableWalker::default();
    walker.statement(&statement);
    walker.finish()
}

#[derive(Default)]
struct TableWalker {
    tables: BTreeSet<String>,
    cte_names: BTreeSet<String>,
}

impl TableWalker {
    fn finish(self) -> Result<BTreeSet<String>> {
        let TableWalker { tables, cte_names } = self;
        Ok(tables.difference(&cte_names).cloned().collect())
    }

    fn add(&mut self, name: &ObjectName) {
        // Keep only the table part of `db.table`.
        if let Some(last) = name.0.last() {
            self.tables.insert(last.value.to_lowercase());
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => {
                self.add(&insert.table_name);
                if let Some(source) = &insert.source {
                    self.query(source);
                }
            }
            Statement::Update {
                table,
                from,
                selection,
                ..
            } => {
                self.table_with_joins(table);
                if let Some(from) = from {
                    self.table_with_joins(from);
                }
                if let Some(selection) = selection {
                    self.expr(selection);
                }
            }
            Statement::Delete(delete) => {
                for name in &delete.tables {
                    self.add(name);
                }
                match &delete.from {
                    FromTable::WithFromKeyword(list) | FromTable::WithoutKeyword(list) => {
                        for twj in list {
                            self.table_with_joins(twj);
                        }
                    }
                }
                if let Some(using) = &delete.using {
                    for twj in using {
                        self.table_with_joins(twj);
                    }
                }
                if let Some(selection) = &delete.selection {
                    self.expr(selection);
                }
            }
            Statement::Drop { names, .. } => {
                for name in names {
                    self.add(name);
                }
            }
            Statement::CreateTable(create) => {
                self.add(&create.name);
                if let Some(query) = &create.query {
                    self.query(query);
                }
            }
            Statement::CreateView { name, query, .. } => {
                self.add(name);
                self.query(query);
            }
            _ => {}
        }
    }

    fn query(&mut self, query: &Query) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.cte_names.insert(cte.alias.name.value.to_lowercase());
                self.query(&cte.query);
            }
        }
        self.set_expr(&query.body);
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for twj in &select.from {
                    self.table_with_joins(twj);
                }
                if let Some(selection) = &select.selection {
                    self.expr(selection);
                }
                if let Some(having) = &select.having {
                    self.expr(having);
                }
            }
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.set_expr(left);
                self.set_expr(right);
            }
            _ => {}
        }
    }

    fn table_with_joins(&mut self, twj: &TableWithJoins) {
        self.table_factor(&twj.relation);
        for join in &twj.joins {
            self.table_factor(&join.relation);
        }
    }

    fn table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, .. } => self.add(name),
            TableFactor::Derived { subquery, .. } => self.query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.table_with_joins(table_with_joins),
            _ => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Nested(expr)
            | Expr::IsTrue(expr)
            | Expr::IsFalse(expr)
            | Expr::IsNotTrue(expr)
            | Expr::IsNotFalse(expr)
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr) => self.expr(expr),
            Expr::InList { expr, list, .. } => {
                self.expr(expr);
                for item in list {
                    self.expr(item);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.expr(expr);
                self.expr(low);
                self.expr(high);
            }
            Expr::InSubquery { expr, subquery, .. } => {
                self.expr(expr);
                self.query(subquery);
            }
            Expr::Exists { subquery, .. } => self.query(subquery),
            Expr::Subquery(subquery) => self.query(subquery),
            Expr::AnyOp { left, right, .. } | Expr::AllOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            _ => {}
        }
    }
}
