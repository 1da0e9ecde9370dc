//! # quarry-extract: join-edge recovery
//!
//! Two parallel extractors emit the same [`JoinEdge`] shape:
//!
//! - [`extract_tree`] walks the generator's typed query tree, which is
//!   cheap and available for every generated query.
//! - [`extract_sql`] walks the parsed SQL, which can see through renderer
//!   quirks the tree path cannot.
//!
//! The [`refine`] pass runs the SQL extractor only when the tree path left
//! edges with missing keys, and swaps in its result only when it strictly
//! recovers more.
//!
//! Both extractors share one resolution core: candidate collection finds
//! column equalities, resolution binds unqualified columns to exactly one
//! candidate table, and side assignment pins the right-hand column to the
//! join's right table before grouping by left table.

mod refine;
mod resolve;
mod sql;
mod tree;

pub use refine::refine;
pub use sql::extract_sql;
pub use tree::extract_tree;
