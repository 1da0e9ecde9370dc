//! # quarry-types: shared data model for the quarry engine
//!
//! This crate defines the vocabulary the rest of the workspace speaks:
//!
//! - [`TypedValue`] and [`TypeFamily`]: values as the generator hands them
//!   over, rendered to stable strings keyed by type family.
//! - [`SchemaState`]: the generator's view of the schema under test.
//! - [`GenQuery`]: the typed query tree the generator emits alongside the
//!   SQL text it rendered.
//! - [`DbExecutor`]: the narrow database interface the oracles and the
//!   minimizer drive, with an error taxonomy that keeps schema drift,
//!   transient failures, and server panics distinguishable.
//! - [`Deadline`]: a wall-clock cancellation token threaded through every
//!   replay and database call.
//!
//! The crate deliberately knows nothing about SQL parsing, bitmaps, or
//! oracles; it only carries data across crate boundaries.

mod deadline;
mod edge;
mod executor;
mod query;
mod schema;
mod value;

pub use deadline::Deadline;
pub use edge::{JoinEdge, reason};
pub use executor::{DbError, DbExecutor, ExecResult, Rows};
pub use query::{
    GenBinaryOp, GenCte, GenExpr, GenFrom, GenJoin, GenOrderItem, GenQuery, GenUnaryOp, JoinKind,
};
pub use schema::{ColumnState, IndexState, SchemaState, TableState};
pub use value::{TypeFamily, TypedValue};
