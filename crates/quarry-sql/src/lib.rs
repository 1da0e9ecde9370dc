//! # quarry-sql: SQL parsing utilities
//!
//! Thin layer over `sqlparser` shared by the extractor, the mutation
//! pipeline, and the minimizer:
//!
//! - a per-thread parser pool with scoped checkouts,
//! - the statement validator every replayed DDL/DML passes through,
//! - referenced-table-name extraction for insert-log filtering,
//! - EXPLAIN output helpers (row estimates and plan signatures).
//!
//! All parsing uses the MySQL dialect; the engine targets MySQL-compatible
//! servers only.

mod explain;
mod pool;
mod tables;
mod validate;

pub use explain::{plan_rows, plan_signature};
pub use pool::{parse_query, parse_statement, parse_statements};
pub use tables::referenced_tables;
pub use validate::validate;

/// Errors from SQL parsing and validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SqlError {
    /// The parser rejected the text.
    #[error("parse error: {0}")]
    Parse(String),

    /// The text parsed to an unexpected number of statements.
    #[error("expected exactly 1 statement, got {0}")]
    NotSingleStatement(usize),

    /// Parsed, but not a shape the caller supports.
    #[error("unsupported construct: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, SqlError>;
