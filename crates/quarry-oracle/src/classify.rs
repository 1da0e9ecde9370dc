//! Database-error classification.
//!
//! The taxonomy from the executor contract, folded into what an oracle
//! does next: schema drift inside a validated region is a confirmed
//! failure, transient errors skip the case, panics are preserved verbatim
//! for the minimizer's panic-class matching.

use quarry_types::DbError;

/// How an oracle treats a database error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Schema-column-missing inside a validated region: the generator and
    /// the database disagree about the schema. Reported as a bug.
    SchemaDrift(String),
    /// Connection trouble, deadline, cancellation: skip with a reason.
    Skip(String),
    /// Server crash indication; the message is kept verbatim.
    Panic(String),
    /// Ordinary execution error; oracle-specific handling.
    Execution(String),
}

/// Classifies a [`DbError`] per the engine's error policy.
pub fn classify_db_error(error: &DbError) -> Classification {
    match error {
        DbError::SchemaColumnMissing(msg) => Classification::SchemaDrift(msg.clone()),
        DbError::Transient(msg) => Classification::Skip(format!("transient: {msg}")),
        DbError::Cancelled => Classification::Skip("cancelled".to_string()),
        DbError::Panic(msg) => Classification::Panic(msg.clone()),
        DbError::Execution(msg) => Classification::Execution(msg.clone()),
    }
}
