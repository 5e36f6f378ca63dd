//! Multi-level behavior: lexicographic ordering, the simple-bounds fold,
//! and the multiplier invariants.

use lexls_core::{ConstraintType, LexLsi, ObjectiveType, SolveStatus};
use nalgebra::{DMatrix, DVector};

const TOL: f64 = 1e-10;

#[test]
fn test_priority_order_decides_conflicts() {
    // priority 0: x0 + x1 <= 1
    // priority 1: x0 = 1
    // priority 2: x1 = 1
    // The higher priority gets its wish: x = (1, 0), priority 2 keeps a
    // residual of 1.
    let mut solver = LexLsi::new(
        2,
        &[1, 1, 1],
        &[
            ObjectiveType::General,
            ObjectiveType::General,
            ObjectiveType::General,
        ],
    )
    .unwrap();
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 4, &[1.0, 1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 4, &[1.0, 0.0, 1.0, 1.0]))
        .unwrap();
    solver
        .set_data_general(2, &DMatrix::from_row_slice(1, 4, &[0.0, 1.0, 1.0, 1.0]))
        .unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    let x = solver.get_x();
    assert!((x[0] - 1.0).abs() < TOL, "x = {x}");
    assert!(x[1].abs() < TOL, "x = {x}");
    assert_eq!(solver.get_active_ctr(0), vec![ConstraintType::ActiveUpper]);
    // priority 1 satisfied exactly, priority 2 pays |v| = 1
    assert!(solver.get_v(1)[0].abs() < TOL);
    assert!((solver.get_v(2)[0].abs() - 1.0).abs() < TOL);
}

#[test]
fn test_simple_bounds_fold_clips_general_level() {
    // priority 0: simple bounds 0 <= x0, x1 <= 1
    // priority 1: x0 = 2, x1 = 0.5
    // x0 is clipped at its upper bound, x1 is free to satisfy its row.
    let mut solver = LexLsi::new(
        2,
        &[2, 2],
        &[ObjectiveType::SimpleBounds, ObjectiveType::General],
    )
    .unwrap();
    solver
        .set_data_simple_bounds(
            0,
            &[0, 1],
            &DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(
            1,
            &DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 2.0, 2.0, 0.0, 1.0, 0.5, 0.5]),
        )
        .unwrap();

    let status = solver.solve();
    assert_eq!(status, SolveStatus::Solved);
    let x = solver.get_x();
    assert!((x[0] - 1.0).abs() < TOL, "x = {x}");
    assert!((x[1] - 0.5).abs() < TOL, "x = {x}");
    assert_eq!(
        solver.get_active_ctr(0),
        vec![ConstraintType::ActiveUpper, ConstraintType::Inactive]
    );
}

#[test]
fn test_fixed_block_removal_translates_to_objective_zero() {
    // priority 0: simple bound x <= 1 seeded active
    // priority 1: x = 0
    // The fixed-variable multiplier is wrong-signed; the removal must land
    // on objective 0 and free the variable.
    let mut solver = LexLsi::new(
        1,
        &[1, 1],
        &[ObjectiveType::SimpleBounds, ObjectiveType::General],
    )
    .unwrap();
    solver
        .set_data_simple_bounds(0, &[0], &DMatrix::from_row_slice(1, 2, &[0.0, 1.0]))
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
    assert_eq!(solver.get_active_ctr(0), vec![ConstraintType::Inactive]);
}

#[test]
fn test_multiplier_signs_after_solve() {
    // the blocking scenario: after convergence no active constraint may
    // carry a wrong-signed multiplier
    let mut solver = LexLsi::new(
        1,
        &[1, 1],
        &[ObjectiveType::General, ObjectiveType::General],
    )
    .unwrap();
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 1.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, 3.0, 3.0]))
        .unwrap();
    assert_eq!(solver.solve(), SolveStatus::Solved);

    let lambda = solver.get_lambda().unwrap();
    assert_eq!(lambda.nrows(), 2);
    assert_eq!(lambda.ncols(), 2);
    // the upper-active row of priority 0, seen from priority 1, pushes
    // downward: lambda = -2, the correct sign for an upper bound
    assert!((lambda[(0, 1)] + 2.0).abs() < 1e-9);
    // the priority-1 residual is its own multiplier
    assert!((lambda[(1, 1)] + 2.0).abs() < 1e-9);
    assert!(lambda[(0, 1)] <= 1e-8, "wrong-signed multiplier survived");
}

#[test]
fn test_residuals_at_bounds_after_solve() {
    // active rows sit at their (shifted) bound, inactive rows inside
    let mut solver = LexLsi::new(
        2,
        &[2, 2],
        &[ObjectiveType::General, ObjectiveType::General],
    )
    .unwrap();
    // priority 0: x0 <= 1 and x1 >= -1 (one-sided rows, reference = bound)
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(
                2,
                4,
                &[
                    1.0,
                    0.0,
                    f64::NEG_INFINITY,
                    1.0,
                    0.0,
                    1.0,
                    -1.0,
                    f64::INFINITY,
                ],
            ),
        )
        .unwrap();
    // priority 1: x0 = 4, x1 = 0
    solver
        .set_data_general(
            1,
            &DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 4.0, 4.0, 0.0, 1.0, 0.0, 0.0]),
        )
        .unwrap();

    assert_eq!(solver.solve(), SolveStatus::Solved);
    let x = solver.get_x();
    assert!((x[0] - 1.0).abs() < TOL);
    assert!(x[1].abs() < TOL);

    let types = solver.get_active_ctr(0);
    assert_eq!(types[0], ConstraintType::ActiveUpper);
    assert_eq!(types[1], ConstraintType::Inactive);
    // row 0 active at its upper bound: v = x0 - 1 = 0 (reference is the
    // bound itself); row 1 inactive and strictly inside: v = x1 + 1 = 1
    // relative to its lower-bound reference, i.e. feasible
    assert!(solver.get_v(0)[0].abs() < TOL);
    assert!(solver.get_v(0)[1] >= -TOL);
}

#[test]
fn test_activate_deactivate_restores_state() {
    let mut solver = LexLsi::new(
        1,
        &[2],
        &[ObjectiveType::General],
    )
    .unwrap();
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 1.0, -1.0, 2.0]),
        )
        .unwrap();

    let before = solver.get_active_ctr(0);
    solver
        .api_activate(0, 1, ConstraintType::ActiveLower)
        .unwrap();
    assert_eq!(solver.active_ctr_count(), 1);
    solver.deactivate(0, 0).unwrap();
    assert_eq!(solver.get_active_ctr(0), before);
    assert_eq!(solver.active_ctr_count(), 0);
    // counters may advance even though the state is restored
    assert_eq!(solver.deactivations_count(), 1);
}

#[test]
fn test_set_v0_is_kept_through_phase1() {
    let mut solver = LexLsi::new(1, &[1], &[ObjectiveType::General]).unwrap();
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(1, 3, &[1.0, f64::NEG_INFINITY, 10.0]),
        )
        .unwrap();
    solver.set_x0(&DVector::from_vec(vec![0.0])).unwrap();
    solver
        .set_v0(0, &DVector::from_vec(vec![-3.5]))
        .unwrap();

    assert_eq!(solver.solve(), SolveStatus::Solved);
    // nothing activates, so the seeded residual survives untouched
    assert!((solver.get_v(0)[0] + 3.5).abs() < TOL);
}

#[test]
fn test_two_sided_row_activates_lower_bound() {
    // priority 0: -1 <= x <= 1; priority 1: x = -4
    let mut solver = LexLsi::new(
        1,
        &[1, 1],
        &[ObjectiveType::General, ObjectiveType::General],
    )
    .unwrap();
    solver
        .set_data_general(0, &DMatrix::from_row_slice(1, 3, &[1.0, -1.0, 1.0]))
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 3, &[1.0, -4.0, -4.0]))
        .unwrap();

    assert_eq!(solver.solve(), SolveStatus::Solved);
    assert!((solver.get_x()[0] + 1.0).abs() < TOL);
    assert_eq!(solver.get_active_ctr(0), vec![ConstraintType::ActiveLower]);
    assert!((solver.get_v(1)[0].abs() - 3.0).abs() < TOL);
}

#[test]
fn test_lexicographic_residuals_are_not_traded() {
    // two conflicting equalities at priority 0 fix the level-0 residual;
    // priority 1 must be solved without touching it.
    // level 0: x0 = 0 and x0 = 2 (least squares: x0 = 1, |v| = 1 each)
    // level 1: x1 = 5
    let mut solver = LexLsi::new(
        2,
        &[2, 1],
        &[ObjectiveType::General, ObjectiveType::General],
    )
    .unwrap();
    solver
        .set_data_general(
            0,
            &DMatrix::from_row_slice(2, 4, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 2.0]),
        )
        .unwrap();
    solver
        .set_data_general(1, &DMatrix::from_row_slice(1, 4, &[0.0, 1.0, 5.0, 5.0]))
        .unwrap();

    assert_eq!(solver.solve(), SolveStatus::Solved);
    let x = solver.get_x();
    assert!((x[0] - 1.0).abs() < TOL, "x = {x}");
    assert!((x[1] - 5.0).abs() < TOL, "x = {x}");
    // level-0 norm is the unavoidable sqrt(2) * 1, level 1 is exact
    let v0 = solver.get_v(0);
    assert!((v0.norm() - std::f64::consts::SQRT_2).abs() < 1e-9);
    assert!(solver.get_v(1)[0].abs() < TOL);
}
