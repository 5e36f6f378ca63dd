//! Lexicographic least-squares solver for equality-constrained levels.
//!
//! Given the active rows of each priority level (treated as equations) and a
//! set of fixed variables, this solver computes the lexicographic
//! least-squares solution
//!
//! ```text
//! lex min  ||A_0 x - b_0||, ||A_1 x - b_1||, ..., ||A_{p-1} x - b_{p-1}||
//!   x
//! ```
//!
//! by a hierarchical rank-revealing factorization:
//!
//! 1. Fixed-variable columns are eliminated into the right-hand side.
//! 2. Each level is reduced by a column-pivoted Householder QR restricted to
//!    that level's rows and the not-yet-pivoted columns. Columns whose
//!    remaining norm falls below `tol_linear_dependence` stay available to
//!    lower levels.
//! 3. The level's pivot variables are then eliminated from all lower rows by
//!    substitution through its triangular block, which restricts lower
//!    levels to the null space of everything above them.
//!
//! `solve` back-substitutes the accumulated staircase from the bottom level
//! up; never-pivoted variables are set to 0 and fixed variables are
//! re-inserted. Rank-deficient levels can be damped during the block solve
//! (Tikhonov, per-variable weighting, or truncated CG on the block normal
//! equations).
//!
//! The solver also computes Lagrange multipliers per level
//! ([`objective_sensitivity`](LexLse::objective_sensitivity)) by resolving
//! the level's residual gradient against the higher-priority rows, which is
//! what drives constraint removal in the active-set loop.

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::problem::{ConstraintType, RegularizationKind};

/// A decision variable pinned to a value (folded simple bound).
#[derive(Debug, Clone, Copy)]
struct FixedVar {
    var: usize,
    value: f64,
    ctr_type: ConstraintType,
    /// Position in the owning objective's working set.
    active_index: usize,
}

/// Outcome of a sensitivity analysis at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// An active constraint with a wrong-signed multiplier exists.
    /// `obj == -1` refers to the fixed-variable block.
    RemoveCtr {
        /// Level index, or -1 for the fixed-variable block.
        obj: isize,
        /// Position in the owning objective's working set.
        active_index: usize,
    },

    /// Multipliers are consistent and no sign is wrong.
    Optimal,

    /// The multiplier system is inconsistent: the current iterate is not
    /// stationary for the working set (only reported when the consistency
    /// gate is requested).
    Inconclusive,
}

/// Equality-constrained lexicographic solver with preallocated workspace.
#[derive(Debug)]
pub struct LexLse {
    n_var: usize,
    n_obj: usize,

    max_dims: Vec<usize>,

    dims: Vec<usize>,
    first_row: Vec<usize>,
    rank: Vec<usize>,
    rank_base: Vec<usize>,
    deficient: Vec<bool>,
    total_rows: usize,
    total_rank: usize,

    fixed: Vec<FixedVar>,
    is_fixed: Vec<bool>,

    /// Pristine assembled rows `[A | b]`, kept for sensitivity analysis.
    a0: DMatrix<f64>,
    /// Working copy, overwritten by the factorization.
    lod: DMatrix<f64>,
    row_type: Vec<ConstraintType>,
    row_active_index: Vec<usize>,

    /// Column permutation over the free columns; the first `total_rank`
    /// entries are the pivot columns in factorization order.
    col_perm: Vec<usize>,

    x: DVector<f64>,

    /// Multipliers in the layout `[fixed block | level 0 rows | level 1 ...]`.
    workspace: DVector<f64>,

    // scratch
    hh: DVector<f64>,
    ctil: DVector<f64>,
    yblock: DVector<f64>,
    sens_v: DVector<f64>,
    sens_g: DVector<f64>,

    regularization: Vec<f64>,

    tol_linear_dependence: f64,
    regularization_kind: RegularizationKind,
    max_cg_iterations: usize,
    variable_regularization_factor: f64,

    factorized: bool,
}

impl LexLse {
    /// Allocate the solver at its worst-case shape: `max_dims[level]` rows
    /// per level over `n_var` variables.
    pub fn new(n_var: usize, n_obj: usize, max_dims: &[usize]) -> Self {
        debug_assert_eq!(max_dims.len(), n_obj);
        let max_total_rows: usize = max_dims.iter().sum();
        Self {
            n_var,
            n_obj,
            max_dims: max_dims.to_vec(),
            dims: vec![0; n_obj],
            first_row: vec![0; n_obj],
            rank: vec![0; n_obj],
            rank_base: vec![0; n_obj],
            deficient: vec![false; n_obj],
            total_rows: 0,
            total_rank: 0,
            fixed: Vec::with_capacity(n_var),
            is_fixed: vec![false; n_var],
            a0: DMatrix::zeros(max_total_rows, n_var + 1),
            lod: DMatrix::zeros(max_total_rows, n_var + 1),
            row_type: vec![ConstraintType::Inactive; max_total_rows],
            row_active_index: vec![0; max_total_rows],
            col_perm: Vec::with_capacity(n_var),
            x: DVector::zeros(n_var),
            workspace: DVector::zeros(n_var + max_total_rows),
            hh: DVector::zeros(max_total_rows.max(1)),
            ctil: DVector::zeros(max_total_rows.max(1)),
            yblock: DVector::zeros(n_var.max(1)),
            sens_v: DVector::zeros(max_total_rows.max(1)),
            sens_g: DVector::zeros(n_var),
            regularization: vec![0.0; n_obj],
            tol_linear_dependence: 1e-12,
            regularization_kind: RegularizationKind::None,
            max_cg_iterations: 10,
            variable_regularization_factor: 0.0,
            factorized: false,
        }
    }

    /// Propagate the relevant solver settings.
    pub fn set_parameters(
        &mut self,
        tol_linear_dependence: f64,
        regularization_kind: RegularizationKind,
        max_cg_iterations: usize,
        variable_regularization_factor: f64,
    ) {
        self.tol_linear_dependence = tol_linear_dependence;
        self.regularization_kind = regularization_kind;
        self.max_cg_iterations = max_cg_iterations;
        self.variable_regularization_factor = variable_regularization_factor;
    }

    /// Set the row counts for the upcoming factorization and reset the
    /// fixed-variable list.
    pub fn set_obj_dim(&mut self, dims: &[usize]) {
        debug_assert_eq!(dims.len(), self.n_obj);
        let mut row = 0;
        for (level, &d) in dims.iter().enumerate() {
            debug_assert!(d <= self.max_dims[level]);
            self.dims[level] = d;
            self.first_row[level] = row;
            row += d;
        }
        self.total_rows = row;
        self.fixed.clear();
        self.is_fixed.fill(false);
        self.factorized = false;
    }

    /// Pin a decision variable (folded simple bound).
    pub fn fix_variable(
        &mut self,
        var: usize,
        value: f64,
        ctr_type: ConstraintType,
        active_index: usize,
    ) {
        self.fixed.push(FixedVar {
            var,
            value,
            ctr_type,
            active_index,
        });
        self.is_fixed[var] = true;
    }

    /// Write one constraint row: coefficients from row `src_row` of `a`,
    /// right-hand side `rhs`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_ctr(
        &mut self,
        row: usize,
        level: usize,
        a: &DMatrix<f64>,
        src_row: usize,
        rhs: f64,
        ctr_type: ConstraintType,
        active_index: usize,
    ) {
        debug_assert!(row >= self.first_row[level] && row < self.first_row[level] + self.dims[level]);
        self.a0
            .view_mut((row, 0), (1, self.n_var))
            .copy_from(&a.row(src_row));
        self.a0[(row, self.n_var)] = rhs;
        self.row_type[row] = ctr_type;
        self.row_active_index[row] = active_index;
    }

    /// Per-level damping factor used when the level turns out deficient.
    pub fn set_regularization_factor(&mut self, level: usize, factor: f64) {
        self.regularization[level] = factor;
    }

    /// Seed the solution buffer (used before a factorization-free
    /// sensitivity probe at a user-supplied iterate).
    pub fn seed_x(&mut self, x: &DVector<f64>) {
        self.x.copy_from(x);
    }

    /// Run the hierarchical rank-revealing factorization.
    pub fn factorize(&mut self) -> SolverResult<()> {
        let n = self.n_var;
        let rows = self.total_rows;

        if rows > 0 {
            self.lod
                .view_mut((0, 0), (rows, n + 1))
                .copy_from(&self.a0.view((0, 0), (rows, n + 1)));
        }

        // Fixed-variable substitution: move the pinned columns into the rhs.
        for f in &self.fixed {
            for r in 0..rows {
                let coeff = self.lod[(r, f.var)];
                if coeff != 0.0 {
                    self.lod[(r, n)] -= coeff * f.value;
                    self.lod[(r, f.var)] = 0.0;
                }
            }
        }

        self.col_perm.clear();
        for c in 0..n {
            if !self.is_fixed[c] {
                self.col_perm.push(c);
            }
        }
        let n_free = self.col_perm.len();

        self.total_rank = 0;
        let tol_sq = self.tol_linear_dependence * self.tol_linear_dependence;

        for level in 0..self.n_obj {
            let r0 = self.first_row[level];
            let r1 = r0 + self.dims[level];
            self.rank_base[level] = self.total_rank;
            let mut level_rank = 0;

            while r0 + level_rank < r1 && self.total_rank < n_free {
                let seg0 = r0 + level_rank;

                // Column pivoting: largest remaining norm over the level's
                // unprocessed rows. Ties resolve to the earliest column.
                let mut best = self.total_rank;
                let mut best_sq = 0.0;
                for t in self.total_rank..n_free {
                    let col = self.col_perm[t];
                    let mut sq = 0.0;
                    for r in seg0..r1 {
                        let val = self.lod[(r, col)];
                        sq += val * val;
                    }
                    if sq > best_sq {
                        best_sq = sq;
                        best = t;
                    }
                }
                if best_sq <= tol_sq {
                    break;
                }
                self.col_perm.swap(self.total_rank, best);
                let pcol = self.col_perm[self.total_rank];

                // Householder reflection over the column segment.
                let m = r1 - seg0;
                let hh = &mut self.hh;
                let lod = &mut self.lod;
                for i in 0..m {
                    hh[i] = lod[(seg0 + i, pcol)];
                }
                let norm = best_sq.sqrt();
                let alpha = if hh[0] >= 0.0 { -norm } else { norm };
                hh[0] -= alpha;
                let mut vtv = 0.0;
                for i in 0..m {
                    vtv += hh[i] * hh[i];
                }
                if vtv > 0.0 {
                    let tau = 2.0 / vtv;
                    for t in (self.total_rank + 1)..n_free {
                        let col = self.col_perm[t];
                        let mut s = 0.0;
                        for i in 0..m {
                            s += hh[i] * lod[(seg0 + i, col)];
                        }
                        if s != 0.0 {
                            let ts = tau * s;
                            for i in 0..m {
                                lod[(seg0 + i, col)] -= ts * hh[i];
                            }
                        }
                    }
                    let mut s = 0.0;
                    for i in 0..m {
                        s += hh[i] * lod[(seg0 + i, n)];
                    }
                    if s != 0.0 {
                        let ts = tau * s;
                        for i in 0..m {
                            lod[(seg0 + i, n)] -= ts * hh[i];
                        }
                    }
                }
                lod[(seg0, pcol)] = alpha;
                for i in 1..m {
                    lod[(seg0 + i, pcol)] = 0.0;
                }

                level_rank += 1;
                self.total_rank += 1;
            }

            self.rank[level] = level_rank;
            self.deficient[level] = level_rank < self.dims[level];

            // Eliminate this level's pivot variables from all lower rows by
            // substitution through the triangular block. Lower levels are
            // thereby restricted to the null space of this level.
            if level_rank > 0 && r1 < rows {
                let base = self.rank_base[level];
                for r in r1..rows {
                    for k in 0..level_rank {
                        let prow = r0 + k;
                        let pcol = self.col_perm[base + k];
                        let rkk = self.lod[(prow, pcol)];
                        let f = self.lod[(r, pcol)] / rkk;
                        if f != 0.0 {
                            for t in (base + k + 1)..n_free {
                                let col = self.col_perm[t];
                                let sub = f * self.lod[(prow, col)];
                                if sub != 0.0 {
                                    self.lod[(r, col)] -= sub;
                                }
                            }
                            self.lod[(r, n)] -= f * self.lod[(prow, n)];
                        }
                        self.lod[(r, pcol)] = 0.0;
                    }
                }
            }
        }

        for r in 0..rows {
            for c in 0..=n {
                if !self.lod[(r, c)].is_finite() {
                    return Err(SolverError::NumericalFailure(format!(
                        "non-finite entry at factored row {r}"
                    )));
                }
            }
        }

        self.factorized = true;
        Ok(())
    }

    /// Back-substitute the staircase factor to produce `x`.
    pub fn solve(&mut self) -> SolverResult<()> {
        if !self.factorized {
            return Err(SolverError::NumericalFailure(
                "solve called before factorize".into(),
            ));
        }
        let n = self.n_var;
        self.x.fill(0.0);

        for level in (0..self.n_obj).rev() {
            let lr = self.rank[level];
            if lr == 0 {
                continue;
            }
            let r0 = self.first_row[level];
            let base = self.rank_base[level];

            // Effective rhs: contributions of pivots resolved at lower
            // levels move to the right-hand side; never-pivoted variables
            // are zero, and higher-level pivots were eliminated from these
            // rows during the factorization.
            for k in 0..lr {
                let mut c = self.lod[(r0 + k, n)];
                for t in (base + lr)..self.total_rank {
                    let col = self.col_perm[t];
                    c -= self.lod[(r0 + k, col)] * self.x[col];
                }
                self.ctil[k] = c;
            }

            self.solve_block(level, r0, base, lr)?;

            for k in 0..lr {
                self.x[self.col_perm[base + k]] = self.yblock[k];
            }
        }

        for f in &self.fixed {
            self.x[f.var] = f.value;
        }
        Ok(())
    }

    /// Solve the level's triangular block for `yblock[..lr]` from
    /// `ctil[..lr]`, applying the configured damping when the level is
    /// rank deficient.
    fn solve_block(&mut self, level: usize, r0: usize, base: usize, lr: usize) -> SolverResult<()> {
        let damped = self.deficient[level] && self.regularization_kind != RegularizationKind::None;
        if !damped {
            self.back_substitute_block(r0, base, lr);
            return Ok(());
        }

        let factor = self.regularization[level];
        match self.regularization_kind {
            RegularizationKind::Tikhonov if factor > 0.0 => {
                let damping = |_j: usize, _rjj: f64| factor * factor;
                self.damped_block_solve(r0, base, lr, damping)
            }
            RegularizationKind::VariableWeighted
                if factor > 0.0 && self.variable_regularization_factor > 0.0 =>
            {
                let vrf = self.variable_regularization_factor;
                let damping = move |_j: usize, rjj: f64| {
                    let w = factor * vrf * rjj.abs();
                    w * w
                };
                self.damped_block_solve(r0, base, lr, damping)
            }
            RegularizationKind::TruncatedCg if self.max_cg_iterations > 0 => {
                self.cg_block_solve(r0, base, lr);
                Ok(())
            }
            _ => {
                self.back_substitute_block(r0, base, lr);
                Ok(())
            }
        }
    }

    fn back_substitute_block(&mut self, r0: usize, base: usize, lr: usize) {
        for k in (0..lr).rev() {
            let mut s = self.ctil[k];
            for j in (k + 1)..lr {
                s -= self.lod[(r0 + k, self.col_perm[base + j])] * self.yblock[j];
            }
            self.yblock[k] = s / self.lod[(r0 + k, self.col_perm[base + k])];
        }
    }

    /// Solve `(R^T R + D) y = R^T c` for the level block, `D` diagonal.
    fn damped_block_solve<F>(
        &mut self,
        r0: usize,
        base: usize,
        lr: usize,
        damping: F,
    ) -> SolverResult<()>
    where
        F: Fn(usize, f64) -> f64,
    {
        let r_block = self.triangular_block(r0, base, lr);
        let c = DVector::from_fn(lr, |k, _| self.ctil[k]);
        let mut normal = r_block.transpose() * &r_block;
        for j in 0..lr {
            normal[(j, j)] += damping(j, r_block[(j, j)]);
        }
        let rhs = r_block.transpose() * c;
        let chol = Cholesky::new(normal).ok_or_else(|| {
            SolverError::NumericalFailure("damped block factorization failed".into())
        })?;
        let y = chol.solve(&rhs);
        for k in 0..lr {
            self.yblock[k] = y[k];
        }
        Ok(())
    }

    /// Plain conjugate gradient on the block normal equations, capped at
    /// `max_cg_iterations`. Early termination acts as the regularizer.
    fn cg_block_solve(&mut self, r0: usize, base: usize, lr: usize) {
        let r_block = self.triangular_block(r0, base, lr);
        let normal = r_block.transpose() * &r_block;
        let b = r_block.transpose() * DVector::from_fn(lr, |k, _| self.ctil[k]);

        let mut y = DVector::zeros(lr);
        let mut resid = b.clone();
        let mut p = resid.clone();
        let mut rr = resid.dot(&resid);
        let stop = (self.tol_linear_dependence * self.tol_linear_dependence).max(f64::MIN_POSITIVE);

        for _ in 0..self.max_cg_iterations.min(lr.max(1) * 2) {
            if rr <= stop {
                break;
            }
            let np = &normal * &p;
            let pnp = p.dot(&np);
            if pnp <= 0.0 {
                break;
            }
            let step = rr / pnp;
            y.axpy(step, &p, 1.0);
            resid.axpy(-step, &np, 1.0);
            let rr_new = resid.dot(&resid);
            p *= rr_new / rr;
            p += &resid;
            rr = rr_new;
        }
        for k in 0..lr {
            self.yblock[k] = y[k];
        }
    }

    /// Materialize the level's upper-triangular pivot block.
    fn triangular_block(&self, r0: usize, base: usize, lr: usize) -> DMatrix<f64> {
        DMatrix::from_fn(lr, lr, |k, j| {
            if j >= k {
                self.lod[(r0 + k, self.col_perm[base + j])]
            } else {
                0.0
            }
        })
    }

    /// Lagrange multipliers of all active constraints up to and including
    /// `level`, and the highest-priority constraint whose multiplier has
    /// the wrong sign.
    ///
    /// The level's residual is evaluated on the pristine assembled rows at
    /// the current solution; its gradient is resolved against the
    /// higher-priority rows (minimum-norm transpose solve over the free
    /// columns) and the remainder lands on the fixed-variable block. The
    /// multipliers are written to the workspace in the layout
    /// `[fixed | level 0 | level 1 | ...]`; the level's own multipliers are
    /// its residual entries.
    ///
    /// With `check_stationarity` the consistency of the multiplier system
    /// is verified first; an inconsistent system (iterate not stationary
    /// for the working set) reports [`Sensitivity::Inconclusive`].
    pub fn objective_sensitivity(
        &mut self,
        level: usize,
        tol_wrong: f64,
        tol_correct: f64,
        check_stationarity: bool,
    ) -> SolverResult<Sensitivity> {
        let n = self.n_var;
        let nf = self.fixed.len();
        let k_first = self.first_row[level];
        let k_dim = self.dims[level];
        let m_rows = k_first;

        // Residual of the level's active rows at the current iterate.
        for i in 0..k_dim {
            let r = k_first + i;
            let mut v = -self.a0[(r, n)];
            for c in 0..n {
                v += self.a0[(r, c)] * self.x[c];
            }
            self.sens_v[i] = v;
        }

        // Gradient g = A_k^T v_k over all variables.
        self.sens_g.fill(0.0);
        for i in 0..k_dim {
            let r = k_first + i;
            let vi = self.sens_v[i];
            if vi != 0.0 {
                for c in 0..n {
                    self.sens_g[c] += self.a0[(r, c)] * vi;
                }
            }
        }

        // Resolve the gradient against the higher-priority rows over the
        // free columns: min-norm lambda with M^T lambda = g_free.
        let n_free = n - nf;
        let mut free_cols = Vec::with_capacity(n_free);
        for c in 0..n {
            if !self.is_fixed[c] {
                free_cols.push(c);
            }
        }
        let g_free = DVector::from_fn(free_cols.len(), |i, _| self.sens_g[free_cols[i]]);

        let lambda = if m_rows > 0 {
            let mt = DMatrix::from_fn(free_cols.len(), m_rows, |i, r| self.a0[(r, free_cols[i])]);
            let svd = mt.clone().svd(true, true);
            let lambda = svd
                .solve(&g_free, self.tol_linear_dependence)
                .map_err(|e| SolverError::NumericalFailure(e.into()))?;
            if check_stationarity {
                let resid = (&mt * &lambda) - &g_free;
                let scale = g_free.norm().max(1.0);
                if resid.norm() > tol_wrong * scale {
                    return Ok(Sensitivity::Inconclusive);
                }
            }
            lambda
        } else {
            if check_stationarity && g_free.norm() > tol_wrong {
                return Ok(Sensitivity::Inconclusive);
            }
            DVector::zeros(0)
        };

        // Fixed-variable multipliers pick up the gradient components on the
        // pinned coordinates.
        for (fi, f) in self.fixed.iter().enumerate() {
            let mut mu = self.sens_g[f.var];
            for r in 0..m_rows {
                mu -= self.a0[(r, f.var)] * lambda[r];
            }
            self.workspace[fi] = mu;
        }
        for r in 0..m_rows {
            self.workspace[nf + r] = lambda[r];
        }
        for i in 0..k_dim {
            self.workspace[nf + k_first + i] = self.sens_v[i];
        }

        // Scan block by block, highest priority first; within a block the
        // largest wrong-signed magnitude wins.
        let fixed_hit = self.scan_fixed_block(tol_wrong, tol_correct);
        if let Some(active_index) = fixed_hit {
            return Ok(Sensitivity::RemoveCtr {
                obj: -1,
                active_index,
            });
        }
        for j in 0..=level {
            let mut best_val = 0.0;
            let mut best_index = None;
            for i in 0..self.dims[j] {
                let r = self.first_row[j] + i;
                let lam = self.workspace[nf + r];
                let class = lambda_classification(self.row_type[r], lam, tol_wrong, tol_correct);
                if class != ConstraintType::Correct && lam.abs() > best_val {
                    best_val = lam.abs();
                    best_index = Some(self.row_active_index[r]);
                }
            }
            if let Some(active_index) = best_index {
                return Ok(Sensitivity::RemoveCtr {
                    obj: j as isize,
                    active_index,
                });
            }
        }
        Ok(Sensitivity::Optimal)
    }

    fn scan_fixed_block(&self, tol_wrong: f64, tol_correct: f64) -> Option<usize> {
        let mut best_val = 0.0;
        let mut best = None;
        for (fi, f) in self.fixed.iter().enumerate() {
            let mu = self.workspace[fi];
            let class = lambda_classification(f.ctr_type, mu, tol_wrong, tol_correct);
            if class != ConstraintType::Correct && mu.abs() > best_val {
                best_val = mu.abs();
                best = Some(f.active_index);
            }
        }
        best
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    pub fn get_x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Multipliers from the last sensitivity call, laid out as
    /// `[fixed block | level 0 rows | level 1 rows | ...]`.
    pub fn lambda_workspace(&self) -> &DVector<f64> {
        &self.workspace
    }

    /// Number of active rows at `level` in the current assembly.
    pub fn get_dim(&self, level: usize) -> usize {
        self.dims[level]
    }

    /// Estimated rank of `level` after the last factorization.
    pub fn get_rank(&self, level: usize) -> usize {
        self.rank[level]
    }

    pub fn fixed_variables_count(&self) -> usize {
        self.fixed.len()
    }

    /// True when every fixed variable matches the given iterate within
    /// `tol`.
    pub fn fixed_vars_consistent(&self, x: &DVector<f64>, tol: f64) -> bool {
        self.fixed.iter().all(|f| (x[f.var] - f.value).abs() <= tol)
    }

    pub fn total_active_rows(&self) -> usize {
        self.total_rows
    }

    pub fn n_levels(&self) -> usize {
        self.n_obj
    }
}

/// Classify one multiplier: returns [`ConstraintType::Correct`] when the
/// sign is acceptable (or within the dead zone), otherwise the activation
/// type whose sign test failed.
fn lambda_classification(
    ctr_type: ConstraintType,
    lambda: f64,
    tol_wrong: f64,
    tol_correct: f64,
) -> ConstraintType {
    if lambda.abs() <= tol_correct {
        return ConstraintType::Correct;
    }
    match ctr_type {
        ConstraintType::ActiveUpper if lambda > tol_wrong => ConstraintType::ActiveUpper,
        ConstraintType::ActiveLower if lambda < -tol_wrong => ConstraintType::ActiveLower,
        _ => ConstraintType::Correct,
    }
}
