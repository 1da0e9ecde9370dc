//! # quarry-truth: in-memory join ground truth
//!
//! An independent evaluator for join cardinality, used to cross-check the
//! row counts a database reports. Two layers:
//!
//! - [`Bitmap`] over wide-table row ids, with the usual set algebra.
//! - [`SchemaTruth`]: per-table column→value→bitmap maps over a shared
//!   row universe, plus optional per-table row tuples for exact
//!   multiplicity.
//!
//! Two evaluation modes:
//!
//! - **Bitmap mode** ([`bitmap_count`]) counts distinct wide rows that
//!   survive the join chain. It deliberately over-approximates outer
//!   joins (it cannot materialize null-extended rows) and is only trusted
//!   when the caller restricts itself to INNER joins on simple keys.
//! - **Exact mode** ([`exact_count`]) evaluates row multiplicity over the
//!   stored tuples, bounded by per-table and intermediate-size caps.

mod bitmap;
mod evaluate;
mod store;

pub use bitmap::Bitmap;
pub use evaluate::{EvalCaps, JoinCount, SkipReason, bitmap_count, exact_count};
pub use store::{RowIdMap, SchemaTruth, TableRows};
