//! Lexicographic least-squares solver with inequality constraints.
//!
//! Given a prioritized list of objectives, each a set of linear equality or
//! two-sided inequality constraints on a shared decision vector, the solver
//! finds the vector that minimizes the residual norm of the highest
//! priority, then, subject to that, the next, and so on:
//!
//! ```text
//! lex min  ||w_0||, ||w_1||, ..., ||w_{p-1}||
//!   x
//! s.t.     lb_k <= A_k x - w_k <= ub_k     (level k)
//! ```
//!
//! # Algorithm
//!
//! An active-set method drives an inner equality-constrained solver
//! ([`LexLse`]) built on a hierarchical rank-revealing factorization:
//!
//! - **Blocking constraints**: steps toward the equality solution are
//!   scaled back when an inactive constraint would be violated; the
//!   blocking constraint joins the working set.
//! - **Sensitivity analysis**: Lagrange multipliers per level identify
//!   active constraints whose sign indicates a descent direction for a
//!   higher-or-equal priority; such constraints leave the working set.
//! - **Anti-cycling**: repeated add/remove toggles of the same constraint
//!   are detected and resolved by relaxing the offending bound.
//!
//! # Example
//!
//! ```ignore
//! use lexls_core::{LexLsi, ObjectiveType, SolveStatus};
//! use nalgebra::DMatrix;
//!
//! // priority 0: x <= 1;  priority 1: x = 3
//! let mut solver = LexLsi::new(
//!     1,
//!     &[1, 1],
//!     &[ObjectiveType::General, ObjectiveType::General],
//! )?;
//! solver.set_data_general(0, &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]))?;
//! solver.set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 3.0, 3.0]))?;
//!
//! let status = solver.solve();
//! assert_eq!(status, SolveStatus::Solved);
//! assert!((solver.get_x()[0] - 1.0).abs() < 1e-10);
//! ```

#![warn(clippy::all)]

pub mod cycling;
pub mod error;
pub mod lexlse;
pub mod objective;
pub mod problem;
pub mod solver;
pub mod trace;

pub use error::{SolverError, SolverResult};
pub use lexlse::LexLse;
pub use objective::Objective;
pub use problem::{
    ConstraintId, ConstraintType, ObjectiveType, Operation, RegularizationKind, SolveStatus,
    SolverSettings,
};
pub use solver::LexLsi;
