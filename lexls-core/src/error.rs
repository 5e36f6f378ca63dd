//! Error types for problem setup and solving.

use thiserror::Error;

/// Errors surfaced by the setup API and the equality solver.
///
/// Runtime termination reasons (budget exhausted, cycling resolved, normal
/// convergence) are *not* errors; they are reported through
/// [`SolveStatus`](crate::problem::SolveStatus).
#[derive(Error, Debug)]
pub enum SolverError {
    /// Data rows or widths inconsistent with the declared dimensions, or an
    /// objective-type mismatch.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A row with lower bound strictly greater than its upper bound.
    #[error("Constraint {ctr}: lower bound {lower} exceeds upper bound {upper}")]
    InvalidBounds {
        /// Row index within the objective.
        ctr: usize,
        /// Offending lower bound.
        lower: f64,
        /// Offending upper bound.
        upper: f64,
    },

    /// A simple-bounds variable index appears more than once.
    #[error("Duplicate variable index {index} in simple-bounds objective")]
    DuplicateVariableIndex {
        /// The repeated index.
        index: usize,
    },

    /// An objective, constraint or variable index is out of range.
    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        /// What kind of index was passed.
        what: &'static str,
        /// The offending value.
        index: usize,
        /// Exclusive upper limit.
        limit: usize,
    },

    /// The factorization cannot proceed even with regularization.
    #[error("Numerical failure: {0}")]
    NumericalFailure(String),
}

/// Result alias for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
