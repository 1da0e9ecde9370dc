//! Scripted executor for tests.
//!
//! Implements [`DbExecutor`] over canned responses keyed by exact SQL
//! text. Crates downstream of the oracles reuse it to exercise replay
//! logic without a live server.

use std::collections::HashMap;

use quarry_types::{DbError, DbExecutor, Deadline, ExecResult, Rows};

/// A [`DbExecutor`] that answers from scripted responses.
#[derive(Debug, Default)]
pub struct ScriptedDb {
    counts: HashMap<String, u64>,
    rows: HashMap<String, Rows>,
    errors: HashMap<String, DbError>,
    affected: HashMap<String, u64>,
    /// Every statement seen, in order.
    pub executed: Vec<String>,
    version: String,
}

impl ScriptedDb {
    pub fn new() -> Self {
        Self {
            version: "8.0.11-TiDB-v7.5.0".to_string(),
            ..Self::default()
        }
    }

    /// Scripts a `query_count` response.
    pub fn with_count(mut self, sql: &str, count: u64) -> Self {
        self.counts.insert(sql.to_string(), count);
        self
    }

    /// Scripts a `query` / `query_row` response.
    pub fn with_rows(mut self, sql: &str, rows: Rows) -> Self {
        self.rows.insert(sql.to_string(), rows);
        self
    }

    /// Scripts an error for any operation on `sql`.
    pub fn with_error(mut self, sql: &str, error: DbError) -> Self {
        self.errors.insert(sql.to_string(), error);
        self
    }

    /// Scripts an `exec` affected-row count.
    pub fn with_affected(mut self, sql: &str, rows: u64) -> Self {
        self.affected.insert(sql.to_string(), rows);
        self
    }

    fn check(&mut self, sql: &str, deadline: Deadline) -> Result<(), DbError> {
        if deadline.expired() {
            return Err(DbError::Cancelled);
        }
        self.executed.push(sql.to_string());
        match self.errors.get(sql) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl DbExecutor for ScriptedDb {
    fn exec(&mut self, sql: &str, deadline: Deadline) -> Result<ExecResult, DbError> {
        self.check(sql, deadline)?;
        Ok(ExecResult {
            rows_affected: self.affected.get(sql).copied().unwrap_or(0),
        })
    }

    fn query(&mut self, sql: &str, deadline: Deadline) -> Result<Rows, DbError> {
        self.check(sql, deadline)?;
        self.rows
            .get(sql)
            .cloned()
            .ok_or_else(|| DbError::Execution(format!("unscripted query: {sql}")))
    }

    fn query_row(
        &mut self,
        sql: &str,
        deadline: Deadline,
    ) -> Result<Option<Vec<Option<String>>>, DbError> {
        Ok(self.query(sql, deadline)?.rows.into_iter().next())
    }

    fn query_count(&mut self, sql: &str, deadline: Deadline) -> Result<u64, DbError> {
        self.check(sql, deadline)?;
        if let Some(count) = self.counts.get(sql) {
            return Ok(*count);
        }
        if let Some(rows) = self.rows.get(sql) {
            return Ok(rows.len() as u64);
        }
        Err(DbError::Execution(format!("unscripted count: {sql}")))
    }

    fn server_version(&mut self) -> Result<String, DbError> {
        Ok(self.version.clone())
    }
}
