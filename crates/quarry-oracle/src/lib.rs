//! # quarry-oracle: oracle runners
//!
//! Each oracle is a decidable hypothesis about SQL the engine can hold a
//! database to:
//!
//! - [`MutationOracle`]: every upper mutant returns at least as many rows
//!   as the baseline, every lower mutant at most as many.
//! - [`CardinalityOracle`]: the database's join row count matches the
//!   in-memory ground truth.
//! - [`PlanOracle`]: a session-variable change must not regress the
//!   optimizer's row estimate beyond a tolerance.
//! - [`AffectedRowsOracle`]: a DML reports exactly the affected-row count
//!   the engine pre-computed.
//!
//! A violated hypothesis surfaces as a [`Mismatch`] carrying everything
//! the minimizer and reporter need: the SQL pair, a [`ReplaySpec`], and a
//! sorted details map. Oracles never try to recover from a mismatch.

mod affected;
mod cardinality;
mod classify;
mod mutation;
mod plan;
mod replay;
mod signature;
mod summary;
pub mod testing;

pub use affected::AffectedRowsOracle;
pub use cardinality::{CardinalityOracle, TruthRow};
pub use classify::{Classification, classify_db_error};
pub use mutation::{MutationOracle, count_wrap};
pub use plan::PlanOracle;
pub use replay::{ReplayKind, ReplaySpec};
pub use signature::row_signature;
pub use summary::{GroundTruthRecord, Summary};

use std::collections::BTreeMap;

use quarry_types::DbError;

/// Errors from oracle execution.
///
/// Transient database failures never surface here; they become
/// [`Outcome::Skipped`]. What does surface is unrecoverable: a broken
/// mutation pipeline or an executor misbehaving outside its contract.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error(transparent)]
    Mutate(#[from] quarry_mutate::MutateError),

    #[error("database error outside oracle contract: {0}")]
    Db(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;

/// What one oracle invocation concluded.
#[derive(Debug)]
pub enum Outcome {
    /// Hypothesis held.
    Ok,
    /// The case could not be judged; the reason string is recorded
    /// unchanged by the reporter.
    Skipped { reason: String },
    /// Hypothesis violated.
    Mismatch(Box<Mismatch>),
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, Outcome::Mismatch(_))
    }
}

/// One confirmed oracle violation.
#[derive(Debug, Clone)]
pub struct Mismatch {
    /// Name of the violated oracle.
    pub oracle: String,
    /// The statements involved, baseline first.
    pub sql: Vec<String>,
    pub expected: String,
    pub actual: String,
    /// Error text when the violation is an error-class event.
    pub error: String,
    /// Sorted key/value detail map, serialized into the summary.
    pub details: BTreeMap<String, serde_json::Value>,
    /// How the minimizer re-checks that a reduced input still fails.
    pub replay: ReplaySpec,
    /// Ground-truth context, for the cardinality oracle.
    pub ground_truth: Option<GroundTruthRecord>,
}
