//! Shared solver types and configuration.
//!
//! This module defines the vocabulary used across the solver: objective and
//! constraint kinds, the per-iteration working-set operation, termination
//! statuses, and the settings struct.

use std::fmt;
use std::path::PathBuf;

/// Kind of a priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveType {
    /// Dense constraint matrix with per-row lower/upper bounds.
    General,

    /// Bounds on a subset of the decision variables, identified by an index
    /// array. Only meaningful as the highest priority level: its active
    /// bounds are folded into the equality solver as fixed variables.
    SimpleBounds,
}

/// Activation state of a single constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    /// Not in the working set.
    Inactive,

    /// In the working set because lower == upper; never removed.
    ActiveEqual,

    /// Active at its lower bound.
    ActiveLower,

    /// Active at its upper bound.
    ActiveUpper,

    /// Sign of the Lagrange multiplier is acceptable (used when classifying
    /// active constraints during sensitivity analysis; ties around zero
    /// count as acceptable).
    Correct,
}

impl ConstraintType {
    /// Numeric code used in the iteration trace output.
    pub fn as_code(self) -> usize {
        match self {
            ConstraintType::Inactive => 0,
            ConstraintType::ActiveLower => 1,
            ConstraintType::ActiveUpper => 2,
            ConstraintType::ActiveEqual => 3,
            ConstraintType::Correct => 4,
        }
    }
}

/// Working-set operation performed during one active-set iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A blocking constraint was activated.
    Add,

    /// An active constraint with a wrong-signed multiplier was deactivated.
    Remove,
}

/// Identifies one constraint for the cycling handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintId {
    /// Objective (priority level) owning the constraint.
    pub obj: usize,
    /// Row index within the objective's data.
    pub ctr: usize,
    /// Activation type at the time of the operation.
    pub ctr_type: ConstraintType,
}

/// Reason the active-set loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Solve not finished (or not started).
    Unknown,

    /// No blocking constraint and no wrong-signed multiplier remain.
    Solved,

    /// Solved, but only after the cycling handler relaxed at least one
    /// bound to break a working-set toggle.
    SolvedWithRelaxation,

    /// The factorization budget was exhausted before convergence.
    MaxFactorizations,

    /// The factorization could not proceed even with regularization.
    NumericalError,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Unknown => write!(f, "Unknown"),
            SolveStatus::Solved => write!(f, "Solved"),
            SolveStatus::SolvedWithRelaxation => write!(f, "SolvedWithRelaxation"),
            SolveStatus::MaxFactorizations => write!(f, "MaxFactorizations"),
            SolveStatus::NumericalError => write!(f, "NumericalError"),
        }
    }
}

/// Regularization variety applied when a level turns out rank deficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegularizationKind {
    /// Plain truncation: deficient directions are deferred to lower levels.
    None,

    /// Tikhonov damping of the deficient level's triangular block.
    Tikhonov,

    /// Tikhonov with per-variable damping scaled by the pivot magnitudes.
    VariableWeighted,

    /// Truncated conjugate gradient on the block normal equations.
    TruncatedCg,
}

/// Solver settings and tolerances.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Hard bound on factorizations before `MaxFactorizations`.
    pub max_factorizations: usize,

    /// Column-pivot magnitude below which a column is considered linearly
    /// dependent and deferred to lower levels.
    pub tol_linear_dependence: f64,

    /// Slack when classifying a row as infeasible during the blocking check.
    pub tol_feasibility: f64,

    /// Multiplier magnitude above which its sign is considered decisive.
    pub tol_wrong_sign_lambda: f64,

    /// Dead zone around zero for multiplier signs.
    pub tol_correct_sign_lambda: f64,

    /// Regularization variety for rank-deficient levels.
    pub regularization: RegularizationKind,

    /// Iteration cap for `RegularizationKind::TruncatedCg`.
    pub max_cg_iterations: usize,

    /// Scale multiplier for `RegularizationKind::VariableWeighted`.
    pub variable_regularization_factor: f64,

    /// Toggle the anti-cycling logic.
    pub cycling_handling: bool,

    /// Number of detected re-activations before a bound is relaxed.
    pub cycling_max_counter: usize,

    /// Amount added to / subtracted from a cycling constraint's bound.
    pub cycling_relax_step: f64,

    /// Per-iteration trace file (append mode). `None` disables tracing.
    pub trace_file: Option<PathBuf>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_factorizations: 200,
            tol_linear_dependence: 1e-12,
            tol_feasibility: 1e-13,
            tol_wrong_sign_lambda: 1e-8,
            tol_correct_sign_lambda: 1e-12,
            regularization: RegularizationKind::None,
            max_cg_iterations: 10,
            variable_regularization_factor: 0.0,
            cycling_handling: false,
            cycling_max_counter: 50,
            cycling_relax_step: 1e-8,
            trace_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let s = SolverSettings::default();
        assert!(s.max_factorizations > 0);
        assert!(s.tol_linear_dependence > 0.0);
        assert!(s.tol_wrong_sign_lambda > s.tol_correct_sign_lambda);
        assert_eq!(s.regularization, RegularizationKind::None);
        assert!(!s.cycling_handling);
        assert!(s.trace_file.is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SolveStatus::Solved.to_string(), "Solved");
        assert_eq!(
            SolveStatus::MaxFactorizations.to_string(),
            "MaxFactorizations"
        );
    }

    #[test]
    fn test_ctr_type_codes_distinct() {
        let all = [
            ConstraintType::Inactive,
            ConstraintType::ActiveLower,
            ConstraintType::ActiveUpper,
            ConstraintType::ActiveEqual,
            ConstraintType::Correct,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.as_code(), b.as_code());
            }
        }
    }
}
