//! # quarry-reduce: case minimization
//!
//! Shrinks an offending case (schema DDL, insert log, failing statements)
//! while preserving the *reason* it failed, as recorded in a
//! [`ReplaySpec`](quarry_oracle::ReplaySpec). The reducer combines:
//!
//! - log-level passes: filter inserts to referenced tables, explode
//!   multi-row INSERTs, dedup;
//! - ddmin over the insert log (and over case statements for
//!   error-class cases);
//! - AST-directed shrinking of individual statements to a fixed point;
//! - an optional merge-back of single-row INSERT runs.
//!
//! Every replay runs against a freshly dropped-and-recreated scratch
//! database, pre-validated by the SQL parser, and under the case's
//! wall-clock deadline: once the budget is spent, every further replay
//! reports "not reproduced" and the best reduction so far is committed.

mod ddmin;
mod minimize;
mod passes;
mod replay;
mod shrink;

pub use ddmin::ddmin;
pub use minimize::{MinimizeConfig, MinimizeOutcome, MinimizeStatus, Minimizer};
pub use passes::{dedup_statements, explode_inserts, filter_inserts, merge_inserts};
pub use replay::{Replayer, ReproCase};
pub use shrink::shrink_candidates;
