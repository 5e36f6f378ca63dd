//! Active-set solver for lexicographic least-squares problems with
//! inequality constraints.
//!
//! Each iteration solves the equality-constrained problem defined by the
//! current working set, steps toward its solution until an inactive
//! constraint blocks, and otherwise consults the Lagrange multipliers to
//! release a constraint whose sign indicates a descent direction for some
//! level. Termination reasons are reported as [`SolveStatus`]; setup errors
//! are returned at the call site.

use nalgebra::{DMatrix, DVector};

use crate::cycling::CyclingHandler;
use crate::error::{SolverError, SolverResult};
use crate::lexlse::{LexLse, Sensitivity};
use crate::objective::Objective;
use crate::problem::{
    ConstraintId, ConstraintType, ObjectiveType, Operation, SolveStatus, SolverSettings,
};
use crate::trace::TraceWriter;

/// Outcome of the removal check across all levels.
enum Removal {
    Found { obj: usize, active_index: usize },
    None,
    /// Iteration-0 probe at a user iterate that is not stationary for the
    /// seeded working set; a normal factorizing iteration follows.
    Inconclusive,
}

/// Lexicographic least-squares solver with inequality constraints.
///
/// All storage is sized at construction; data is supplied via the
/// `set_data_*` methods, the working set may be seeded via
/// [`api_activate`](Self::api_activate), and [`solve`](Self::solve) runs the
/// active-set loop to termination.
#[derive(Debug)]
pub struct LexLsi {
    n_var: usize,
    n_obj: usize,

    /// 1 when objective 0 holds simple bounds (folded into the equality
    /// solver as fixed variables rather than a level), else 0.
    n_obj_offset: usize,

    parameters: SolverSettings,

    objectives: Vec<Objective>,
    lexlse: LexLse,
    cycling: CyclingHandler,

    x: DVector<f64>,
    dx: DVector<f64>,

    /// Active row counts per objective, refreshed before each assembly.
    n_active: Vec<usize>,

    status: SolveStatus,
    n_iterations: usize,
    n_activations: usize,
    n_deactivations: usize,
    n_factorizations: usize,
    step_length: f64,
    x0_is_specified: bool,
}

impl LexLsi {
    /// Create a solver for `n_var` variables and the given per-objective
    /// row counts and types. A simple-bounds objective is only accepted at
    /// the highest priority.
    pub fn new(
        n_var: usize,
        obj_dims: &[usize],
        obj_types: &[ObjectiveType],
    ) -> SolverResult<Self> {
        if obj_dims.is_empty() || obj_dims.len() != obj_types.len() {
            return Err(SolverError::ShapeMismatch(format!(
                "expected matching non-empty objective dims and types, got {} and {}",
                obj_dims.len(),
                obj_types.len()
            )));
        }
        if n_var == 0 {
            return Err(SolverError::ShapeMismatch(
                "number of variables must be positive".into(),
            ));
        }
        for (i, ty) in obj_types.iter().enumerate() {
            if *ty == ObjectiveType::SimpleBounds && i > 0 {
                return Err(SolverError::ShapeMismatch(format!(
                    "simple-bounds objective at priority {i}; only the highest priority may hold simple bounds"
                )));
            }
        }

        let n_obj = obj_dims.len();
        let n_obj_offset = usize::from(obj_types[0] == ObjectiveType::SimpleBounds);

        let objectives = obj_dims
            .iter()
            .zip(obj_types)
            .map(|(&dim, &ty)| Objective::new(dim, n_var, ty))
            .collect();

        let mut solver = Self {
            n_var,
            n_obj,
            n_obj_offset,
            parameters: SolverSettings::default(),
            objectives,
            lexlse: LexLse::new(n_var, n_obj - n_obj_offset, &obj_dims[n_obj_offset..]),
            cycling: CyclingHandler::default(),
            x: DVector::zeros(n_var),
            dx: DVector::zeros(n_var),
            n_active: vec![0; n_obj],
            status: SolveStatus::Unknown,
            n_iterations: 0,
            n_activations: 0,
            n_deactivations: 0,
            n_factorizations: 0,
            step_length: 0.0,
            x0_is_specified: false,
        };
        solver.set_parameters(SolverSettings::default());
        Ok(solver)
    }

    /// Install solver settings and propagate them to the equality solver
    /// and the cycling handler.
    pub fn set_parameters(&mut self, parameters: SolverSettings) {
        self.lexlse.set_parameters(
            parameters.tol_linear_dependence,
            parameters.regularization,
            parameters.max_cg_iterations,
            parameters.variable_regularization_factor,
        );
        if parameters.cycling_handling {
            self.cycling.max_counter = parameters.cycling_max_counter;
            self.cycling.relax_step = parameters.cycling_relax_step;
        }
        self.parameters = parameters;
    }

    /// Set the data of a general objective: `data = [A | lb | ub]`. Rows
    /// with coinciding bounds are pre-activated as equalities.
    pub fn set_data_general(&mut self, obj: usize, data: &DMatrix<f64>) -> SolverResult<()> {
        self.check_obj(obj)?;
        self.objectives[obj].set_data_general(data)
    }

    /// Set the data of the simple-bounds objective: `data = [lb | ub]`
    /// bounding the variables in `var_index`.
    pub fn set_data_simple_bounds(
        &mut self,
        obj: usize,
        var_index: &[usize],
        data: &DMatrix<f64>,
    ) -> SolverResult<()> {
        self.check_obj(obj)?;
        self.objectives[obj].set_data_simple_bounds(var_index, data)
    }

    /// Seed the initial working set with one constraint.
    ///
    /// Only lower/upper activations are accepted: equality membership is
    /// inferred from the bound data during `set_data`, so a request to
    /// activate a row as an equality is ignored with a warning.
    pub fn api_activate(
        &mut self,
        obj: usize,
        ctr: usize,
        ctr_type: ConstraintType,
    ) -> SolverResult<()> {
        self.check_obj(obj)?;
        if ctr >= self.objectives[obj].dim() {
            return Err(SolverError::IndexOutOfRange {
                what: "constraint",
                index: ctr,
                limit: self.objectives[obj].dim(),
            });
        }
        match ctr_type {
            ConstraintType::ActiveLower | ConstraintType::ActiveUpper => {
                if !self.objectives[obj].is_active(ctr) {
                    // seeding the initial working set does not count as an
                    // activation of the active-set loop
                    self.objectives[obj].activate(ctr, ctr_type);
                }
            }
            _ => {
                log::warn!(
                    "activation type {ctr_type:?} cannot be requested explicitly; \
                     equality membership is inferred from the bound data"
                );
            }
        }
        Ok(())
    }

    /// Remove the working-set entry at `active_index` of objective `obj`.
    pub fn deactivate(&mut self, obj: usize, active_index: usize) -> SolverResult<()> {
        self.check_obj(obj)?;
        if active_index >= self.objectives[obj].active_ctr_count() {
            return Err(SolverError::IndexOutOfRange {
                what: "working-set",
                index: active_index,
                limit: self.objectives[obj].active_ctr_count(),
            });
        }
        self.objectives[obj].deactivate(active_index);
        self.n_deactivations += 1;
        Ok(())
    }

    /// Supply an initial iterate.
    pub fn set_x0(&mut self, x0: &DVector<f64>) -> SolverResult<()> {
        if x0.len() != self.n_var {
            return Err(SolverError::ShapeMismatch(format!(
                "expected iterate of length {}, got {}",
                self.n_var,
                x0.len()
            )));
        }
        self.x.copy_from(x0);
        self.x0_is_specified = true;
        Ok(())
    }

    /// Seed the residual of objective `obj` (kept through phase 1).
    pub fn set_v0(&mut self, obj: usize, v0: &DVector<f64>) -> SolverResult<()> {
        self.check_obj(obj)?;
        self.objectives[obj].set_v0(v0)
    }

    /// Set the regularization factor of objective `obj`. Simple-bounds
    /// objectives are never regularized.
    pub fn set_regularization_factor(&mut self, obj: usize, factor: f64) -> SolverResult<()> {
        self.check_obj(obj)?;
        if self.objectives[obj].obj_type() == ObjectiveType::General {
            self.objectives[obj].set_regularization(factor);
        }
        Ok(())
    }

    /// Run the active-set loop to termination.
    ///
    /// Runtime outcomes (including a failed factorization) are reported as
    /// the returned status, never as an error. Calling `solve` before every
    /// objective received its data also terminates with
    /// [`SolveStatus::NumericalError`].
    pub fn solve(&mut self) -> SolveStatus {
        self.status = SolveStatus::Unknown;
        for (i, o) in self.objectives.iter().enumerate() {
            if !o.data_is_set() {
                log::warn!("objective {i} has no data; call set_data before solve");
                self.status = SolveStatus::NumericalError;
                return self.status;
            }
        }
        if let Err(e) = self.phase1() {
            log::warn!("phase 1 factorization failed: {e}");
            self.status = SolveStatus::NumericalError;
            return self.status;
        }

        let mut trace = self
            .parameters
            .trace_file
            .as_deref()
            .map(TraceWriter::create);
        if let Some(tw) = trace.as_mut() {
            self.write_phase1_trace(tw);
        }

        loop {
            let operation = self.verify_working_set();
            if let Some(tw) = trace.as_mut() {
                self.write_iteration_trace(tw, operation);
            }

            match self.status {
                SolveStatus::Solved
                | SolveStatus::SolvedWithRelaxation
                | SolveStatus::NumericalError => break,
                _ => {}
            }
            if self.n_factorizations >= self.parameters.max_factorizations {
                self.status = SolveStatus::MaxFactorizations;
                break;
            }
        }

        if let Some(tw) = trace.as_mut() {
            tw.flush();
        }
        self.status
    }

    /// Initial iterate and residuals.
    ///
    /// With active constraints and no user iterate, the equality solver
    /// provides the start; with no constraints and no iterate, a small
    /// nonzero constant avoids degenerate residuals.
    fn phase1(&mut self) -> SolverResult<()> {
        let active_exist = self.objectives.iter().any(|o| o.active_ctr_count() > 0);

        if active_exist {
            self.form_lexlse();
            if self.x0_is_specified {
                self.lexlse.seed_x(&self.x);
            } else {
                self.lexlse.factorize()?;
                self.lexlse.solve()?;
                self.x.copy_from(self.lexlse.get_x());
                self.n_factorizations += 1;
            }
        } else if !self.x0_is_specified {
            self.x.fill(0.01);
        }

        for o in &mut self.objectives {
            o.phase1(&self.x);
        }
        self.dx.fill(0.0);
        for o in &mut self.objectives {
            o.form_step(&self.dx);
        }
        Ok(())
    }

    /// Copy the working set into the equality solver. The highest-priority
    /// objective populates the fixed-variable block when it holds simple
    /// bounds.
    fn form_lexlse(&mut self) {
        for (i, o) in self.objectives.iter().enumerate() {
            self.n_active[i] = o.active_ctr_count();
        }
        self.lexlse.set_obj_dim(&self.n_active[self.n_obj_offset..]);

        let lexlse = &mut self.lexlse;
        let mut cursor = 0;
        for (i, o) in self.objectives.iter().enumerate() {
            if i < self.n_obj_offset {
                o.form_fixed(lexlse);
            } else {
                o.form_lexlse(lexlse, &mut cursor, i - self.n_obj_offset);
            }
        }
    }

    /// Step from the current iterate to the equality solver's solution.
    fn form_step(&mut self) {
        self.dx.copy_from(self.lexlse.get_x());
        self.dx -= &self.x;
        for o in &mut self.objectives {
            o.form_step(&self.dx);
        }
    }

    /// One iteration of the active-set method.
    fn verify_working_set(&mut self) -> Option<Operation> {
        let mut operation = None;
        let mut op_id = None;
        let probing = self.n_iterations == 0 && self.x0_is_specified;

        if self.n_iterations != 0 {
            self.form_lexlse();
            let factored = self.lexlse.factorize().and_then(|_| self.lexlse.solve());
            if let Err(e) = factored {
                log::warn!("factorization failed: {e}");
                self.status = SolveStatus::NumericalError;
                return None;
            }
            self.form_step();
            self.n_factorizations += 1;
        }

        // Blocking check across all objectives; alpha is shared so ties
        // resolve to the earliest (objective, row) pair.
        let mut alpha = 1.0;
        let mut ctr_blocking = 0;
        let mut type_blocking = ConstraintType::Inactive;
        let mut obj_blocking = 0;
        let mut blocked = false;
        for (i, o) in self.objectives.iter().enumerate() {
            if o.check_blocking_constraints(
                &mut ctr_blocking,
                &mut type_blocking,
                &mut alpha,
                self.parameters.tol_feasibility,
            ) {
                obj_blocking = i;
                blocked = true;
            }
        }

        if blocked {
            op_id = Some(ConstraintId {
                obj: obj_blocking,
                ctr: ctr_blocking,
                ctr_type: type_blocking,
            });
            operation = Some(Operation::Add);
            self.objectives[obj_blocking].activate(ctr_blocking, type_blocking);
            self.n_activations += 1;
        } else {
            match self.find_active_ctr_to_remove(probing) {
                Ok(Removal::Found { obj, active_index }) => {
                    op_id = Some(ConstraintId {
                        obj,
                        ctr: self.objectives[obj].active_ctr_index(active_index),
                        ctr_type: self.objectives[obj].active_ctr_type(active_index),
                    });
                    operation = Some(Operation::Remove);
                    self.objectives[obj].deactivate(active_index);
                    self.n_deactivations += 1;
                }
                Ok(Removal::None) => {
                    self.status = if self.parameters.cycling_handling && self.cycling.counter() > 0
                    {
                        SolveStatus::SolvedWithRelaxation
                    } else {
                        SolveStatus::Solved
                    };
                }
                Ok(Removal::Inconclusive) => {
                    // the next iteration factorizes and settles the question
                }
                Err(e) => {
                    log::warn!("sensitivity analysis failed: {e}");
                    self.status = SolveStatus::NumericalError;
                    return None;
                }
            }
        }

        self.step_length = if operation == Some(Operation::Add) {
            alpha
        } else {
            -1.0
        };

        if alpha > 0.0 {
            self.x.axpy(alpha, &self.dx, 1.0);
            for o in &mut self.objectives {
                o.step(alpha);
            }
        }

        if self.parameters.cycling_handling {
            if let (Some(op), Some(id)) = (operation, op_id) {
                let status =
                    self.cycling
                        .update(op, id, &mut self.objectives, self.n_iterations, false);
                if status != SolveStatus::Unknown {
                    self.status = status;
                }
            }
        }

        self.n_iterations += 1;
        operation
    }

    /// Removal check: highest level first, first descent direction wins.
    /// The equality solver's `-1` (fixed-variable block) translates to
    /// objective 0.
    fn find_active_ctr_to_remove(&mut self, probing: bool) -> SolverResult<Removal> {
        if probing
            && !self
                .lexlse
                .fixed_vars_consistent(&self.x, self.parameters.tol_feasibility)
        {
            return Ok(Removal::Inconclusive);
        }
        for level in 0..self.lexlse.n_levels() {
            let outcome = self.lexlse.objective_sensitivity(
                level,
                self.parameters.tol_wrong_sign_lambda,
                self.parameters.tol_correct_sign_lambda,
                probing,
            )?;
            match outcome {
                Sensitivity::RemoveCtr { obj, active_index } => {
                    return Ok(Removal::Found {
                        obj: (obj + self.n_obj_offset as isize) as usize,
                        active_index,
                    });
                }
                Sensitivity::Optimal => {}
                Sensitivity::Inconclusive => return Ok(Removal::Inconclusive),
            }
        }
        Ok(Removal::None)
    }

    fn check_obj(&self, obj: usize) -> SolverResult<()> {
        if obj >= self.n_obj {
            return Err(SolverError::IndexOutOfRange {
                what: "objective",
                index: obj,
                limit: self.n_obj,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // trace output
    // ------------------------------------------------------------------

    fn write_phase1_trace(&self, tw: &mut TraceWriter) {
        tw.writeln(format_args!(
            "% phase 1 (x0_is_specified = {})",
            self.x0_is_specified
        ));
        tw.write_vector("x_", 1, &self.x);
        for (i, o) in self.objectives.iter().enumerate() {
            tw.write_vector(&format!("w_{{{}}}", i + 1), 1, o.get_v());
        }
        tw.writeln(format_args!(""));
    }

    fn write_iteration_trace(&self, tw: &mut TraceWriter, operation: Option<Operation>) {
        // verify_working_set already advanced the counter
        let col = self.n_iterations + 1;
        let op_code = match operation {
            None => 0,
            Some(Operation::Add) => 1,
            Some(Operation::Remove) => 2,
        };
        tw.writeln(format_args!(
            "% ---------------------------------------------"
        ));
        tw.writeln(format_args!("% nIterations       = {}", self.n_iterations));
        tw.writeln(format_args!("% status            = {}", self.status));
        tw.writeln(format_args!(
            "% counter (cycling) = {}",
            self.cycling.counter()
        ));
        tw.writeln(format_args!("operation_({col})       = {op_code};"));
        tw.writeln(format_args!(
            "nFactorizations_({col}) = {};",
            self.n_factorizations
        ));
        tw.writeln(format_args!(
            "stepLength_({col})      = {:.15e};",
            self.step_length
        ));

        let first_iteration_skip = self.x0_is_specified && self.n_iterations == 1;
        if first_iteration_skip {
            tw.writeln(format_args!(
                "% step direction not recomputed (user-supplied x0)"
            ));
        } else {
            tw.write_vector("dx_", col, &self.dx);
            for (i, o) in self.objectives.iter().enumerate() {
                tw.write_vector(&format!("dw_{{{}}}", i + 1), col, o.get_dv());
            }
        }

        tw.write_vector("x_", col, &self.x);
        for (i, o) in self.objectives.iter().enumerate() {
            tw.write_vector(&format!("w_{{{}}}", i + 1), col, o.get_v());
        }
        if !first_iteration_skip {
            for (i, o) in self.objectives.iter().enumerate() {
                let codes: Vec<usize> = (0..o.dim()).map(|c| o.ctr_type(c).as_code()).collect();
                tw.write_codes(&format!("a_{{{}}}", i + 1), col, &codes);
            }
        }
        tw.writeln(format_args!(""));
    }

    // ------------------------------------------------------------------
    // accessors
    // ------------------------------------------------------------------

    /// The current (after [`solve`](Self::solve): final) iterate.
    pub fn get_x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Residual of objective `obj`, relative to each row's fixed reference.
    pub fn get_v(&self, obj: usize) -> &DVector<f64> {
        self.objectives[obj].get_v()
    }

    /// Lagrange multipliers of all active constraints, one column per
    /// objective. Rows are laid out as `[fixed block | level rows...]` in
    /// working-set order; the simple-bounds column (if any) occupies the
    /// head rows of every column.
    pub fn get_lambda(&mut self) -> SolverResult<DMatrix<f64>> {
        let n_fixed = self.lexlse.fixed_variables_count();
        let n_rows = n_fixed + self.lexlse.total_active_rows();
        let mut lambda = DMatrix::zeros(n_rows, self.n_obj);

        let mut meaningful = n_fixed;
        for level in 0..self.lexlse.n_levels() {
            self.lexlse.objective_sensitivity(
                level,
                self.parameters.tol_wrong_sign_lambda,
                self.parameters.tol_correct_sign_lambda,
                false,
            )?;
            meaningful += self.lexlse.get_dim(level);
            let ws = self.lexlse.lambda_workspace();
            for r in 0..meaningful {
                lambda[(r, self.n_obj_offset + level)] = ws[r];
            }
        }
        Ok(lambda)
    }

    /// Activation state per row of objective `obj`.
    pub fn get_active_ctr(&self, obj: usize) -> Vec<ConstraintType> {
        let o = &self.objectives[obj];
        (0..o.dim()).map(|c| o.ctr_type(c)).collect()
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn iterations_count(&self) -> usize {
        self.n_iterations
    }

    pub fn activations_count(&self) -> usize {
        self.n_activations
    }

    pub fn deactivations_count(&self) -> usize {
        self.n_deactivations
    }

    pub fn factorizations_count(&self) -> usize {
        self.n_factorizations
    }

    /// Number of cycling relaxations applied so far.
    pub fn cycling_counter(&self) -> usize {
        self.cycling.counter()
    }

    /// Step scaling of the last iteration (-1 on non-blocking iterations).
    pub fn step_length(&self) -> f64 {
        self.step_length
    }

    pub fn active_ctr_count(&self) -> usize {
        self.objectives.iter().map(|o| o.active_ctr_count()).sum()
    }

    pub fn objectives_count(&self) -> usize {
        self.n_obj
    }

    /// Number of constraint rows in objective `obj`.
    pub fn obj_dim(&self, obj: usize) -> usize {
        self.objectives[obj].dim()
    }
}
