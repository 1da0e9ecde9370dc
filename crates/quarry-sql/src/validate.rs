//! The SQL validator.
//!
//! Every DDL/DML statement the minimizer replays passes through here
//! first; anything the parser rejects never reaches the database.

use crate::{Result, parse_statements};

/// Validates that `sql` parses as one or more statements.
pub fn validate(sql: &str) -> Result<()> {
    parse_statements(sql).map(|_| ())
}
