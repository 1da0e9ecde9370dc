//! The database interface the engine drives.
//!
//! The actual driver lives outside this workspace; oracles and the
//! minimizer see only this trait. The error taxonomy is part of the
//! contract: a schema-column-missing error signals drift between the
//! generator's schema state and the live database and is treated as a
//! confirmed failure, never as a skippable hiccup.

use crate::deadline::Deadline;

/// Errors surfaced by a [`DbExecutor`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum DbError {
    /// The database reports a column the generator believes exists is
    /// missing. Distinct from all other runtime errors by contract.
    #[error("schema column missing: {0}")]
    SchemaColumnMissing(String),

    /// The statement executed and the server rejected it (syntax,
    /// constraint violation, type error, ...).
    #[error("execution error: {0}")]
    Execution(String),

    /// Connection-level failure; the case is skipped, not reported.
    #[error("transient error: {0}")]
    Transient(String),

    /// The deadline passed before the call completed.
    #[error("cancelled by deadline")]
    Cancelled,

    /// The server crashed or the connection died in a way that indicates a
    /// crash. Preserved verbatim so the minimizer can match panic-class
    /// events against each other.
    #[error("server panic: {0}")]
    Panic(String),
}

impl DbError {
    /// Whether this error is the schema-drift kind.
    pub fn is_schema_drift(&self) -> bool {
        matches!(self, DbError::SchemaColumnMissing(_))
    }

    /// Whether the case should be skipped rather than reported.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Transient(_) | DbError::Cancelled)
    }

    /// Whether this is a panic-class event.
    pub fn is_panic(&self) -> bool {
        matches!(self, DbError::Panic(_))
    }
}

/// Result of a DDL/DML execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
}

/// A result set in text form, the way the MySQL text protocol delivers it.
///
/// `None` cells are SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Rows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// The typed operations the engine needs from a database connection.
///
/// Implementations acquire a single-use connection per logical operation
/// and release it on all exit paths. Every call accepts a [`Deadline`];
/// an expired deadline must surface as [`DbError::Cancelled`] without
/// leaving a connection behind.
pub trait DbExecutor {
    /// Executes a DDL or DML statement.
    fn exec(&mut self, sql: &str, deadline: Deadline) -> Result<ExecResult, DbError>;

    /// Runs a query and returns the full result set.
    fn query(&mut self, sql: &str, deadline: Deadline) -> Result<Rows, DbError>;

    /// Runs a query expected to return at most one row.
    fn query_row(&mut self, sql: &str, deadline: Deadline)
    -> Result<Option<Vec<Option<String>>>, DbError>;

    /// Runs a query whose single cell is an integer count.
    fn query_count(&mut self, sql: &str, deadline: Deadline) -> Result<u64, DbError>;

    /// The server version string, recorded in summaries.
    fn server_version(&mut self) -> Result<String, DbError>;
}
