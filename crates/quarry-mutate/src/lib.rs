//! # quarry-mutate: the mutation oracle pipeline
//!
//! Three stages turn a generated SELECT into a family of ordered
//! mutations:
//!
//! 1. [`normalize`] strips features that would break the partial-order
//!    contract: window functions, non-deterministic calls, outer ORDER
//!    BY/LIMIT, and (optionally) rewrites outer joins to CROSS.
//! 2. [`enumerate`] walks the normalized AST carrying a direction parity
//!    bit and records upper/lower [`Candidate`]s with a path to the node
//!    they mutate.
//! 3. [`apply`] materializes one candidate: it swaps the addressed field
//!    in place, serializes the whole statement, restores the field, and
//!    hands back the mutated SQL. The AST compares equal to its pre-call
//!    state on every exit path.
//!
//! A mutation whose name ends in `U` must not shrink the result set; `L`
//! must not grow it. The parity bit flips under every polarity-inverting
//! wrapper (`NOT`, `NOT IN`, `NOT BETWEEN`, `NOT EXISTS`, `IS FALSE`,
//! `IS NOT TRUE`, `ALL`), and the effective direction a runner enforces
//! is `(U XOR flag) XOR 1`.

mod apply;
mod candidate;
mod normalize;
mod path;
mod visit;

pub use apply::apply;
pub use candidate::{Candidate, MutationKind, NodePath, Step};
pub use normalize::{NormalizeOptions, Normalized, normalize};
pub use visit::enumerate;

use quarry_sql::SqlError;

/// Errors from the mutation pipeline.
///
/// `NodeMismatch`, `BadPath`, and `RestoreFailed` are programming errors:
/// the visitor produced a candidate the applicator cannot honor. Callers
/// treat them as fatal rather than as skippable cases.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MutateError {
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// Stage 1 rejects recursive CTEs with a distinguished error.
    #[error("recursive CTEs are not supported")]
    RecursiveCte,

    #[error("unsupported statement: {0}")]
    Unsupported(String),

    #[error("mutation {kind} does not match the node at its path")]
    NodeMismatch { kind: &'static str },

    #[error("candidate path could not be resolved: {0}")]
    BadPath(String),

    #[error("restore failed after applying {kind}")]
    RestoreFailed { kind: &'static str },
}

pub type Result<T> = std::result::Result<T, MutateError>;
