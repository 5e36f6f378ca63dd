//! One priority level of the lexicographic problem.
//!
//! An objective stores the constraint data of a single priority level, its
//! working set, and the current residual. The residual of every row is kept
//! relative to a fixed per-row reference value chosen at `set_data` time
//! (midpoint of finite bounds, the finite bound for one-sided rows, 0 for
//! free rows). Keeping the reference fixed means activation state changes
//! never re-base the residual; bound comparisons shift by the same
//! reference.

use nalgebra::{DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::lexlse::LexLse;
use crate::problem::{ConstraintType, ObjectiveType};

/// Bounds closer than this are collapsed into an equality constraint.
const EQUALITY_EPS: f64 = 1e-14;

/// One entry of the working set. The target bound value is resolved lazily
/// from the objective's bound data, so a relaxed bound propagates to the
/// active target without bookkeeping.
#[derive(Debug, Clone, Copy)]
struct ActiveCtr {
    ctr: usize,
    ctr_type: ConstraintType,
}

/// One priority level: constraint data, working set, residual and step.
#[derive(Debug)]
pub struct Objective {
    dim: usize,
    n_var: usize,
    obj_type: ObjectiveType,

    /// Constraint matrix (dim x n_var). Empty for simple bounds.
    a: DMatrix<f64>,

    /// Decision-variable indices of the rows. Empty for general objectives.
    var_index: Vec<usize>,

    /// Absolute bounds per row.
    lb: DVector<f64>,
    ub: DVector<f64>,

    /// Fixed per-row residual reference.
    bref: DVector<f64>,

    /// Ordered working set; `ctr` values are unique.
    active: Vec<ActiveCtr>,

    /// Per-row activation state.
    ctr_type: Vec<ConstraintType>,

    /// Residual relative to `bref` and its step along `dx`.
    v: DVector<f64>,
    dv: DVector<f64>,

    regularization_factor: f64,
    v0_is_specified: bool,
    data_is_set: bool,
}

impl Objective {
    /// Allocate an objective at its final size. Data is supplied later via
    /// [`set_data_general`](Self::set_data_general) or
    /// [`set_data_simple_bounds`](Self::set_data_simple_bounds).
    pub fn new(dim: usize, n_var: usize, obj_type: ObjectiveType) -> Self {
        let (a_rows, a_cols) = match obj_type {
            ObjectiveType::General => (dim, n_var),
            ObjectiveType::SimpleBounds => (0, 0),
        };
        Self {
            dim,
            n_var,
            obj_type,
            a: DMatrix::zeros(a_rows, a_cols),
            var_index: Vec::with_capacity(dim),
            lb: DVector::zeros(dim),
            ub: DVector::zeros(dim),
            bref: DVector::zeros(dim),
            active: Vec::with_capacity(dim),
            ctr_type: vec![ConstraintType::Inactive; dim],
            v: DVector::zeros(dim),
            dv: DVector::zeros(dim),
            regularization_factor: 0.0,
            v0_is_specified: false,
            data_is_set: false,
        }
    }

    /// Set the data of a general objective: `data = [A | lb | ub]` with
    /// `dim` rows and `n_var + 2` columns. Rows whose bounds coincide are
    /// pre-activated as equalities.
    pub fn set_data_general(&mut self, data: &DMatrix<f64>) -> SolverResult<()> {
        if self.obj_type != ObjectiveType::General {
            return Err(SolverError::ShapeMismatch(
                "set_data_general called on a simple-bounds objective".into(),
            ));
        }
        if data.nrows() != self.dim || data.ncols() != self.n_var + 2 {
            return Err(SolverError::ShapeMismatch(format!(
                "expected {}x{} data, got {}x{}",
                self.dim,
                self.n_var + 2,
                data.nrows(),
                data.ncols()
            )));
        }

        self.check_and_preactivate(data, self.n_var)?;

        self.a
            .copy_from(&data.view((0, 0), (self.dim, self.n_var)));
        for ctr in 0..self.dim {
            self.lb[ctr] = data[(ctr, self.n_var)];
            self.ub[ctr] = data[(ctr, self.n_var + 1)];
            self.bref[ctr] = reference_value(self.lb[ctr], self.ub[ctr]);
        }
        self.data_is_set = true;
        Ok(())
    }

    /// Set the data of a simple-bounds objective: `data = [lb | ub]` with
    /// `dim` rows, bounding the variables listed in `var_index`.
    pub fn set_data_simple_bounds(
        &mut self,
        var_index: &[usize],
        data: &DMatrix<f64>,
    ) -> SolverResult<()> {
        if self.obj_type != ObjectiveType::SimpleBounds {
            return Err(SolverError::ShapeMismatch(
                "set_data_simple_bounds called on a general objective".into(),
            ));
        }
        if data.nrows() != self.dim || data.ncols() != 2 {
            return Err(SolverError::ShapeMismatch(format!(
                "expected {}x2 bound data, got {}x{}",
                self.dim,
                data.nrows(),
                data.ncols()
            )));
        }
        if var_index.len() != self.dim {
            return Err(SolverError::ShapeMismatch(format!(
                "expected {} variable indices, got {}",
                self.dim,
                var_index.len()
            )));
        }
        for (k, &var) in var_index.iter().enumerate() {
            if var >= self.n_var {
                return Err(SolverError::IndexOutOfRange {
                    what: "variable",
                    index: var,
                    limit: self.n_var,
                });
            }
            // var_index is not assumed to be sorted
            for &other in &var_index[..k] {
                if other == var {
                    return Err(SolverError::DuplicateVariableIndex { index: var });
                }
            }
        }

        self.check_and_preactivate(data, 0)?;

        self.var_index.clear();
        self.var_index.extend_from_slice(var_index);
        for ctr in 0..self.dim {
            self.lb[ctr] = data[(ctr, 0)];
            self.ub[ctr] = data[(ctr, 1)];
            self.bref[ctr] = reference_value(self.lb[ctr], self.ub[ctr]);
        }
        self.data_is_set = true;
        Ok(())
    }

    /// Validate bounds stored in `data` at columns `lb_col`, `lb_col + 1`
    /// and pre-activate equality rows.
    fn check_and_preactivate(&mut self, data: &DMatrix<f64>, lb_col: usize) -> SolverResult<()> {
        for ctr in 0..self.dim {
            let bl = data[(ctr, lb_col)];
            let bu = data[(ctr, lb_col + 1)];
            if (bl - bu).abs() <= EQUALITY_EPS {
                self.activate(ctr, ConstraintType::ActiveEqual);
            } else if bl > bu {
                return Err(SolverError::InvalidBounds {
                    ctr,
                    lower: bl,
                    upper: bu,
                });
            }
        }
        Ok(())
    }

    /// Add a constraint to the working set. Already-active rows are left
    /// untouched.
    pub fn activate(&mut self, ctr: usize, ctr_type: ConstraintType) {
        debug_assert!(matches!(
            ctr_type,
            ConstraintType::ActiveLower
                | ConstraintType::ActiveUpper
                | ConstraintType::ActiveEqual
        ));
        if self.ctr_type[ctr] != ConstraintType::Inactive {
            return;
        }
        self.active.push(ActiveCtr { ctr, ctr_type });
        self.ctr_type[ctr] = ctr_type;
    }

    /// Remove the working-set entry at position `active_index`.
    pub fn deactivate(&mut self, active_index: usize) {
        let entry = self.active.remove(active_index);
        self.ctr_type[entry.ctr] = ConstraintType::Inactive;
    }

    /// Residual from the current iterate. A user-seeded residual (via
    /// [`set_v0`](Self::set_v0)) is kept as is.
    pub fn phase1(&mut self, x: &DVector<f64>) {
        if self.v0_is_specified {
            return;
        }
        match self.obj_type {
            ObjectiveType::General => {
                // v = A x - bref
                self.v.gemv(1.0, &self.a, x, 0.0);
                self.v -= &self.bref;
            }
            ObjectiveType::SimpleBounds => {
                for ctr in 0..self.dim {
                    self.v[ctr] = x[self.var_index[ctr]] - self.bref[ctr];
                }
            }
        }
    }

    /// Copy the active rows into the equality solver at `level`, advancing
    /// `row_cursor`.
    pub fn form_lexlse(&self, lexlse: &mut LexLse, row_cursor: &mut usize, level: usize) {
        for (k, entry) in self.active.iter().enumerate() {
            lexlse.set_ctr(
                *row_cursor,
                level,
                &self.a,
                entry.ctr,
                self.active_target_of(entry),
                entry.ctr_type,
                k,
            );
            *row_cursor += 1;
        }
        lexlse.set_regularization_factor(level, self.regularization_factor);
    }

    /// Populate the equality solver's fixed-variable list from the active
    /// simple bounds (highest-priority objective only).
    pub fn form_fixed(&self, lexlse: &mut LexLse) {
        for (k, entry) in self.active.iter().enumerate() {
            lexlse.fix_variable(
                self.var_index[entry.ctr],
                self.active_target_of(entry),
                entry.ctr_type,
                k,
            );
        }
    }

    /// Residual step along the decision step `dx`.
    pub fn form_step(&mut self, dx: &DVector<f64>) {
        match self.obj_type {
            ObjectiveType::General => self.dv.gemv(1.0, &self.a, dx, 0.0),
            ObjectiveType::SimpleBounds => {
                for ctr in 0..self.dim {
                    self.dv[ctr] = dx[self.var_index[ctr]];
                }
            }
        }
    }

    /// Blocking check over the inactive rows.
    ///
    /// For each inactive row the largest step fraction that keeps the row
    /// feasible is computed from the current residual and step; a row that
    /// is already beyond a bound (and whose step does not strictly retreat)
    /// blocks with fraction 0 and is activated without a step. `alpha` is
    /// shared across objectives: a candidate only takes over when it is
    /// smaller than the current value by more than `tol`, so ties resolve
    /// to the earliest (objective, row) pair.
    ///
    /// Returns `true` when this objective updated `alpha`.
    pub fn check_blocking_constraints(
        &self,
        ctr_blocking: &mut usize,
        type_blocking: &mut ConstraintType,
        alpha: &mut f64,
        tol: f64,
    ) -> bool {
        let mut updated = false;
        for ctr in 0..self.dim {
            if self.ctr_type[ctr] != ConstraintType::Inactive {
                continue;
            }
            let v = self.v[ctr];
            let dv = self.dv[ctr];
            let ub = self.ub[ctr] - self.bref[ctr];
            let lb = self.lb[ctr] - self.bref[ctr];

            if ub.is_finite() && dv >= 0.0 && v + dv > ub + tol {
                let cand = if dv > 0.0 { (ub - v) / dv } else { 0.0 };
                if cand < *alpha - tol {
                    *alpha = cand;
                    *ctr_blocking = ctr;
                    *type_blocking = ConstraintType::ActiveUpper;
                    updated = true;
                }
            } else if lb.is_finite() && dv <= 0.0 && v + dv < lb - tol {
                let cand = if dv < 0.0 { (lb - v) / dv } else { 0.0 };
                if cand < *alpha - tol {
                    *alpha = cand;
                    *ctr_blocking = ctr;
                    *type_blocking = ConstraintType::ActiveLower;
                    updated = true;
                }
            }
        }
        updated
    }

    /// Apply the scaled step to the residual.
    pub fn step(&mut self, alpha: f64) {
        self.v.axpy(alpha, &self.dv, 1.0);
    }

    /// Widen a bound outward by `step` (anti-cycling remedy). The active
    /// target follows automatically because targets are resolved from the
    /// bound data.
    pub fn relax_bound(&mut self, ctr: usize, ctr_type: ConstraintType, step: f64) {
        match ctr_type {
            ConstraintType::ActiveUpper => self.ub[ctr] += step,
            ConstraintType::ActiveLower => self.lb[ctr] -= step,
            _ => {}
        }
    }

    /// Seed the residual for warm starts; `phase1` will keep it.
    pub fn set_v0(&mut self, v0: &DVector<f64>) -> SolverResult<()> {
        if v0.len() != self.dim {
            return Err(SolverError::ShapeMismatch(format!(
                "expected residual of length {}, got {}",
                self.dim,
                v0.len()
            )));
        }
        self.v.copy_from(v0);
        self.v0_is_specified = true;
        Ok(())
    }

    pub fn set_regularization(&mut self, factor: f64) {
        self.regularization_factor = factor;
    }

    fn active_target_of(&self, entry: &ActiveCtr) -> f64 {
        match entry.ctr_type {
            ConstraintType::ActiveUpper => self.ub[entry.ctr],
            _ => self.lb[entry.ctr],
        }
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn obj_type(&self) -> ObjectiveType {
        self.obj_type
    }

    pub fn active_ctr_count(&self) -> usize {
        self.active.len()
    }

    /// Row index of the working-set entry at position `k`.
    pub fn active_ctr_index(&self, k: usize) -> usize {
        self.active[k].ctr
    }

    /// Activation type of the working-set entry at position `k`.
    pub fn active_ctr_type(&self, k: usize) -> ConstraintType {
        self.active[k].ctr_type
    }

    /// Target bound value of the working-set entry at position `k`.
    pub fn active_ctr_target(&self, k: usize) -> f64 {
        self.active_target_of(&self.active[k])
    }

    pub fn is_active(&self, ctr: usize) -> bool {
        self.ctr_type[ctr] != ConstraintType::Inactive
    }

    /// Activation state of row `ctr`.
    pub fn ctr_type(&self, ctr: usize) -> ConstraintType {
        self.ctr_type[ctr]
    }

    pub fn get_v(&self) -> &DVector<f64> {
        &self.v
    }

    pub fn get_dv(&self) -> &DVector<f64> {
        &self.dv
    }

    /// Lower/upper bound of row `ctr` shifted into the residual frame.
    pub fn bounds_rel(&self, ctr: usize) -> (f64, f64) {
        (
            self.lb[ctr] - self.bref[ctr],
            self.ub[ctr] - self.bref[ctr],
        )
    }

    pub fn data_is_set(&self) -> bool {
        self.data_is_set
    }
}

/// Fixed residual reference of a row: midpoint of finite bounds, the finite
/// bound of one-sided rows, 0 for free rows.
fn reference_value(lb: f64, ub: f64) -> f64 {
    match (lb.is_finite(), ub.is_finite()) {
        (true, true) => 0.5 * (lb + ub),
        (true, false) => lb,
        (false, true) => ub,
        (false, false) => 0.0,
    }
}
