//! Anti-cycling handler.
//!
//! Active-set methods can toggle the same constraint in and out of the
//! working set without progress on degenerate problems. The handler keeps a
//! bounded history of working-set operations, counts add → remove → re-add
//! patterns per constraint, and past a threshold relaxes the offending
//! bound outward to break the tie.

use std::collections::VecDeque;

use crate::objective::Objective;
use crate::problem::{ConstraintId, Operation, SolveStatus};

/// Operations remembered for toggle detection.
const HISTORY_CAPACITY: usize = 32;

/// Detects working-set toggles and applies the bound-relaxation remedy.
#[derive(Debug)]
pub struct CyclingHandler {
    history: VecDeque<(Operation, ConstraintId)>,
    counter: usize,

    /// Detections before a bound is relaxed.
    pub max_counter: usize,

    /// Amount a cycling bound is widened per relaxation.
    pub relax_step: f64,
}

impl Default for CyclingHandler {
    fn default() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            counter: 0,
            max_counter: 50,
            relax_step: 1e-8,
        }
    }
}

impl CyclingHandler {
    /// Record one working-set operation.
    ///
    /// A re-activation of a constraint that was both added and removed
    /// within the history window counts as a cycle. Once `counter` reaches
    /// `max_counter`, every further detection widens the constraint's bound
    /// by `relax_step`. With `dry_run` the detection runs without mutating
    /// the objectives or the history.
    ///
    /// Returns [`SolveStatus::Unknown`]; the termination naming for a
    /// cycling-handled solve happens in the active-set loop once neither a
    /// blocking nor a removable constraint remains.
    pub fn update(
        &mut self,
        operation: Operation,
        id: ConstraintId,
        objectives: &mut [Objective],
        _iteration: usize,
        dry_run: bool,
    ) -> SolveStatus {
        let mut seen_add = false;
        let mut seen_remove = false;
        for (op, past) in &self.history {
            if *past == id {
                match op {
                    Operation::Add if !seen_add => seen_add = true,
                    Operation::Remove if seen_add => seen_remove = true,
                    _ => {}
                }
            }
        }
        let cycled = operation == Operation::Add && seen_add && seen_remove;

        if dry_run {
            return SolveStatus::Unknown;
        }

        if cycled {
            self.counter += 1;
            if self.counter >= self.max_counter {
                objectives[id.obj].relax_bound(id.ctr, id.ctr_type, self.relax_step);
            }
        }

        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back((operation, id));

        SolveStatus::Unknown
    }

    /// Number of detected re-activations.
    pub fn counter(&self) -> usize {
        self.counter
    }
}
