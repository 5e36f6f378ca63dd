//! End-to-end tests of the active-set solver.
//!
//! Each test states the problem in comments; tolerances are explicit.

use lexls_core::{
    ConstraintType, LexLsi, ObjectiveType, RegularizationKind, SolveStatus, SolverError,
    SolverSettings,
};
use nalgebra::{DMatrix, DVector};

const TOL: f64 = 1e-10;

fn general_solver(n_var: usize, rows_per_obj: &[usize]) -> LexLsi {
    let types = vec![ObjectiveType::General; rows_per_obj.len()];
    LexLsi::new(n_var, rows_per_obj, &types).unwrap()
}

#[test]
fn test_trivial_equality() {
    // one objective, one forced equality: x0 + x1 = 2
    let mut solver = general_solver(2, &[1]);
    solver
        .set_data_general(0, &DMatrix::from_row_slice(1, 4, &[1.0, 1.0, 2.0, 2.0]))
        .unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);

    let x = solver.get_x();
    assert!(
        (x[0] + x[1] - 2.0).abs() < TOL,
        "constraint violated: x = {x}"
    );
    assert!(solver.get_v(0)[0].abs() < TOL, "residual not zero");
    assert_eq!(solver.activations_count(), 0);
    assert_eq!(solver.deactivations_count(), 0);
    assert_eq!(solver.factorizations_count(), 1);
}

#[test]
fn test_pure_simple_bounds_feasible_start() {
    // only simple bounds 0 <= x <= 1; a feasible start with an empty
    // working set is already optimal, and no factorization is needed
    let mut solver = LexLsi::new(2, &[2], &[ObjectiveType::SimpleBounds]).unwrap();
    solver
        .set_data_simple_bounds(
            0,
            &[0, 1],
            &DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 1.0]),
        )
        .unwrap();
    solver
        .set_x0(&DVector::from_vec(vec![0.5, 0.5]))
        .unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    assert!((solver.get_x()[0] - 0.5).abs() < TOL);
    assert!((solver.get_x()[1] - 0.5).abs() < TOL);
    assert_eq!(solver.active_ctr_count(), 0);
    assert_eq!(solver.factorizations_count(), 0);
}

#[test]
fn test_inequality_blocking() {
    // priority 0: x <= 1;  priority 1: x = 3.
    // The equality drags the iterate to 3, the inequality blocks and
    // becomes active at its upper bound; the unavoidable priority-1
    // residual is 2.
    let mut solver = general_solver(1, &[1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 3.0, 3.0]))
        .unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    assert!((solver.get_x()[0] - 1.0).abs() < TOL, "x = {}", solver.get_x());
    assert_eq!(
        solver.get_active_ctr(0),
        vec![ConstraintType::ActiveUpper]
    );
    assert!((solver.get_v(1)[0].abs() - 2.0).abs() < TOL);
    assert_eq!(solver.activations_count(), 1);
    assert_eq!(solver.deactivations_count(), 0);
}

#[test]
fn test_wrong_sign_removal_first() {
    // priority 0: x <= 1 seeded active; priority 1: x = 0.
    // The seeded constraint's multiplier has the wrong sign, so the first
    // operation must be a removal (never an addition).
    let mut solver = general_solver(1, &[1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 0.0, 0.0]))
        .unwrap();
    solver
        .api_activate(0, 0, ConstraintType::ActiveUpper)
        .unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    assert!(solver.get_x()[0].abs() < TOL);
    assert_eq!(solver.deactivations_count(), 1);
    assert_eq!(solver.activations_count(), 0);
    assert_eq!(solver.get_active_ctr(0), vec![ConstraintType::Inactive]);
}

#[test]
fn test_max_factorizations_exceeded() {
    // the blocking problem needs two factorizations; allow one
    let mut solver = general_solver(1, &[1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 3.0, 3.0]))
        .unwrap();
    solver.set_parameters(SolverSettings {
        max_factorizations: 1,
        ..Default::default()
    });

    assert_eq!(solver.solve(), SolveStatus::MaxFactorizations);
}

/// Degenerate three-level problem where the same upper bound toggles in and
/// out of the working set: the redundantly-active hierarchy splits the
/// lowest level's gradient across both higher-priority rows, which keeps
/// flagging the bound for removal, and the bound immediately blocks again.
fn cycling_problem() -> LexLsi {
    let mut solver = general_solver(1, &[1, 1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 0.5]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]))
        .unwrap();
    solver
        .set_data_general(2, &DMatrix::from_row_slice(1, 3, &[1.0, -5.0, -5.0]))
        .unwrap();
    solver
}

#[test]
fn test_cycling_without_handler_hits_budget() {
    let mut solver = cycling_problem();
    solver.set_parameters(SolverSettings {
        max_factorizations: 30,
        ..Default::default()
    });
    assert_eq!(solver.solve(), SolveStatus::MaxFactorizations);
}

#[test]
fn test_cycling_remedy_relaxes_bound() {
    let mut solver = cycling_problem();
    solver.set_parameters(SolverSettings {
        max_factorizations: 50,
        cycling_handling: true,
        cycling_max_counter: 3,
        cycling_relax_step: 0.6,
        ..Default::default()
    });

    let status = solver.solve();
    assert_eq!(status, SolveStatus::SolvedWithRelaxation);
    assert!(solver.cycling_counter() >= 1);
    // with the bound relaxed past 1, the priority-1 equality is reachable
    assert!((solver.get_x()[0] - 1.0).abs() < TOL, "x = {}", solver.get_x());
}

#[test]
fn test_cycling_handler_neutral_when_no_cycling() {
    // the same well-posed problem with and without cycling handling must
    // agree in both solution and status
    let solve_with = |cycling: bool| {
        let mut solver = general_solver(1, &[1, 1]);
        solver
            .set_data_general(
                0,
                &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
            )
            .unwrap();
        solver
            .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 3.0, 3.0]))
            .unwrap();
        solver.set_parameters(SolverSettings {
            cycling_handling: cycling,
            ..Default::default()
        });
        let status = solver.solve();
        (status, solver.get_x()[0])
    };

    let (status_off, x_off) = solve_with(false);
    let (status_on, x_on) = solve_with(true);
    assert_eq!(status_off, SolveStatus::Solved);
    assert_eq!(status_on, SolveStatus::Solved);
    assert!((x_off - x_on).abs() < TOL);
}

#[test]
fn test_feasible_x0_with_correct_working_set_skips_factorization() {
    // priority 0: x <= 1 active at the bound; priority 1: x = 1.
    // The seeded pair (x0, working set) is optimal: the solver must
    // terminate without factorizing.
    let mut solver = general_solver(1, &[1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]))
        .unwrap();
    solver
        .api_activate(0, 0, ConstraintType::ActiveUpper)
        .unwrap();
    solver.set_x0(&DVector::from_vec(vec![1.0])).unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    assert_eq!(solver.factorizations_count(), 0);
    assert_eq!(solver.activations_count(), 0);
    assert_eq!(solver.deactivations_count(), 0);
    assert!((solver.get_x()[0] - 1.0).abs() < TOL);
}

#[test]
fn test_non_stationary_x0_recovers() {
    // same problem, but the user iterate is not stationary for the seeded
    // working set: the probe is inconclusive and a normal factorizing
    // iteration settles it
    let mut solver = general_solver(1, &[1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]))
        .unwrap();
    solver
        .api_activate(0, 0, ConstraintType::ActiveUpper)
        .unwrap();
    solver.set_x0(&DVector::from_vec(vec![0.3])).unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    assert!((solver.get_x()[0] - 1.0).abs() < TOL);
    assert_eq!(solver.factorizations_count(), 1);
}

#[test]
fn test_invalid_bounds_surface_at_set_data() {
    let mut solver = general_solver(1, &[1]);
    let result = solver.set_data_general(0, &DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 1.0]));
    assert!(matches!(result, Err(SolverError::InvalidBounds { .. })));
}

#[test]
fn test_tikhonov_regularization_damps_deficient_level() {
    // two identical equality rows x = 2 make the single level rank
    // deficient (rank 1 of 2 rows); with Tikhonov damping the block solve
    // becomes y = R (R c) / (R^2 + mu^2), shrinking the solution
    let build = |kind: RegularizationKind, factor: f64| {
        let mut solver = general_solver(1, &[2]);
        solver
            .set_data_general(
                0,
                &DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 2.0, 1.0, 2.0, 2.0]),
            )
            .unwrap();
        solver.set_parameters(SolverSettings {
            regularization: kind,
            ..Default::default()
        });
        solver.set_regularization_factor(0, factor).unwrap();
        solver
    };

    let mut plain = build(RegularizationKind::None, 0.0);
    assert_eq!(plain.solve(), SolveStatus::Solved);
    assert!((plain.get_x()[0] - 2.0).abs() < TOL);

    // R = -sqrt(2), c folds both rows: y = R * (R * 2) / (R^2 + 1) = 4/3
    let mut damped = build(RegularizationKind::Tikhonov, 1.0);
    assert_eq!(damped.solve(), SolveStatus::Solved);
    assert!((damped.get_x()[0] - 4.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_trace_file_written() {
    let path = std::env::temp_dir().join("lexls_solver_trace_test.m");
    let _ = std::fs::remove_file(&path);

    let mut solver = general_solver(1, &[1, 1]);
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 3.0, 3.0]))
        .unwrap();
    solver.set_parameters(SolverSettings {
        trace_file: Some(path.clone()),
        ..Default::default()
    });

    assert_eq!(solver.solve(), SolveStatus::Solved);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("% phase 1 (x0_is_specified = false)"));
    assert!(contents.contains("operation_("));
    assert!(contents.contains("x_(:,"));
    assert!(contents.contains("w_{1}(:,"));
    let _ = std::fs::remove_file(&path);
}
