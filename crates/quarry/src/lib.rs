//! # quarry: differential testing for MySQL-compatible databases
//!
//! quarry takes the output of a random schema/query generator, applies a
//! family of semantic oracles against a live database, and minimizes
//! every violation into a reproducible case directory.
//!
//! This crate is the facade: it wires the pipeline together for one
//! worker and re-exports the pieces. The harness that spawns workers,
//! owns connections, and drives the generator lives outside.
//!
//! ## Pipeline
//!
//! Within a worker, strictly ordered per generated query:
//!
//! 1. **Oracle evaluation** ([`quarry_oracle`]): mutation partial-order,
//!    ground-truth cardinality, plan estimation, affected rows.
//! 2. **Minimization** ([`quarry_reduce`]): delta debugging and AST
//!    shrinking under a wall-clock deadline.
//! 3. **Reporting** ([`quarry_report`]): case directory plus
//!    `case.tar.zst` archive.
//!
//! Workers share nothing mutable; one [`Worker`] owns its oracles, its
//! minimizer, and its reporter.

mod worker;

pub use worker::{CaseInput, Worker, WorkerError};

pub use quarry_config::{ConfigLoader, QuarryConfig};
pub use quarry_extract::{extract_sql, extract_tree, refine};
pub use quarry_mutate::{Candidate, MutationKind, NormalizeOptions, apply, enumerate, normalize};
pub use quarry_oracle::{
    AffectedRowsOracle, CardinalityOracle, Mismatch, MutationOracle, Outcome, PlanOracle,
    ReplayKind, ReplaySpec, Summary, TruthRow,
};
pub use quarry_reduce::{MinimizeConfig, MinimizeStatus, Minimizer, ReproCase};
pub use quarry_report::{CaseRecord, Reporter, SchemaDdl, TableData};
pub use quarry_truth::{Bitmap, EvalCaps, JoinCount, SchemaTruth};
pub use quarry_types::{
    DbError, DbExecutor, Deadline, GenQuery, JoinEdge, JoinKind, SchemaState, TypeFamily,
    TypedValue,
};
