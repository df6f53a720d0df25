// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

mod common;

use approx::assert_abs_diff_eq;
use nlbridge::{Context, Error, HandleKind, ObjectiveGoal, TermOwner, VariableType};
use nlbridge_reference::Reference;

type Ctx<'cb> = Context<'cb, Reference>;

#[test]
fn test_ids_are_unique_and_strictly_increasing() {
    common::init_logging();
    let mut ctx = Ctx::new().unwrap();
    let mut vars = Vec::new();
    let mut cons = Vec::new();
    for round in 0..20 {
        vars.push(ctx.add_var().unwrap());
        if round % 3 == 0 {
            cons.push(ctx.add_con().unwrap());
        }
        if round % 5 == 0 {
            vars.extend(ctx.add_vars(2).unwrap());
        }
    }
    assert!(vars.windows(2).all(|w| w[0] < w[1]));
    assert!(cons.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(vars[0].get(), 0);
    assert_eq!(cons[0].get(), 0);
    assert!(vars.iter().all(|v| v.context() == ctx.id()));
    assert_eq!(ctx.num_vars(), vars.len());
    assert_eq!(ctx.get_number_vars().unwrap(), vars.len());
    assert_eq!(ctx.get_number_cons().unwrap(), cons.len());
}

#[test]
fn test_ids_of_separate_contexts_are_independent() {
    let mut a = Ctx::new().unwrap();
    let mut b = Ctx::new().unwrap();
    let from_a = a.add_vars(4).unwrap();
    let y = b.add_var().unwrap();
    assert_eq!(y.get(), 0);
    assert_ne!(a.id(), b.id());
    // A handle issued by `a` only is not valid for `b`.
    assert_eq!(
        b.get_var_upbnd(from_a[3]),
        Err(Error::InvalidHandle {
            kind: HandleKind::Variable,
            index: 3
        })
    );
}

#[test]
fn test_foreign_handles_are_rejected_even_when_in_range() {
    let mut a = Ctx::new().unwrap();
    let mut b = Ctx::new().unwrap();
    let xa = a.add_var().unwrap();
    let ca = a.add_con().unwrap();
    let xb = b.add_var().unwrap();
    b.add_con().unwrap();
    b.set_var_upbnd(xb, 2.0).unwrap();
    assert_eq!(xa.get(), xb.get());
    assert_ne!(xa, xb);

    assert_eq!(
        b.set_var_upbnd(xa, 5.0),
        Err(Error::InvalidHandle {
            kind: HandleKind::Variable,
            index: 0
        })
    );
    assert_eq!(
        b.add_con_linear_term(ca, xb, 1.0),
        Err(Error::InvalidHandle {
            kind: HandleKind::Constraint,
            index: 0
        })
    );
    assert!(b.terms().is_empty());
    assert_eq!(b.get_var_upbnd(xb).unwrap(), 2.0);
}

#[test]
fn test_upper_bound_round_trips_exactly() {
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    let c = ctx.add_con().unwrap();
    for b in [
        0.0,
        -1.5,
        0.1 + 0.2,
        1e-300,
        -1e300,
        123_456.789,
        f64::MIN_POSITIVE,
        f64::EPSILON,
    ] {
        ctx.set_var_upbnd(x, b).unwrap();
        assert_eq!(ctx.get_var_upbnd(x).unwrap().to_bits(), b.to_bits());
        ctx.set_con_upbnd(c, b).unwrap();
        assert_eq!(ctx.get_con_upbnd(c).unwrap().to_bits(), b.to_bits());
    }
}

#[test]
fn test_bounds_default_to_unbounded() {
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    let c = ctx.add_con().unwrap();
    assert_eq!(ctx.get_var_lobnd(x).unwrap(), f64::NEG_INFINITY);
    assert_eq!(ctx.get_var_upbnd(x).unwrap(), f64::INFINITY);
    assert_eq!(ctx.get_con_lobnd(c).unwrap(), f64::NEG_INFINITY);
    assert_eq!(ctx.get_con_upbnd(c).unwrap(), f64::INFINITY);
    assert_eq!(ctx.get_var_type(x).unwrap(), VariableType::Continuous);
}

/// Solves `min x^2 + a x` with the linear coefficient split into `parts`.
fn solve_split_linear(parts: &[f64]) -> (f64, f64, f64) {
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    ctx.add_obj_quadratic_term(x, x, 1.0).unwrap();
    for &a in parts {
        ctx.add_obj_linear_term(x, a).unwrap();
    }
    let coefficient = ctx.terms().linear_coefficient(TermOwner::Objective, x);
    assert!(ctx.solve().unwrap().is_optimal());
    (
        coefficient,
        ctx.get_var_primal_value(x).unwrap(),
        ctx.get_obj_value().unwrap(),
    )
}

#[test]
fn test_repeated_linear_terms_accumulate() {
    let (once_coef, once_x, once_obj) = solve_split_linear(&[-6.0]);
    let (twice_coef, twice_x, twice_obj) = solve_split_linear(&[-3.0, -3.0]);
    assert_eq!(once_coef, twice_coef);
    assert_abs_diff_eq!(once_x, 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(twice_x, once_x, epsilon = 1e-9);
    assert_abs_diff_eq!(twice_obj, once_obj, epsilon = 1e-9);
    assert_abs_diff_eq!(once_obj, -9.0, epsilon = 1e-6);
}

#[test]
fn test_cross_terms_are_passed_unscaled() {
    // min x^2 + y^2 + x*y - 3x, stationary at x = 2, y = -1.
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    let y = ctx.add_var().unwrap();
    ctx.add_obj_quadratic_term(x, x, 1.0).unwrap();
    ctx.add_obj_quadratic_term(y, y, 1.0).unwrap();
    ctx.add_obj_quadratic_term(x, y, 1.0).unwrap();
    ctx.add_obj_linear_term(x, -3.0).unwrap();
    assert!(ctx.solve().unwrap().is_optimal());
    assert_abs_diff_eq!(ctx.get_var_primal_value(x).unwrap(), 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(ctx.get_var_primal_value(y).unwrap(), -1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(ctx.get_obj_value().unwrap(), -3.0, epsilon = 1e-6);
    assert_eq!(
        ctx.terms()
            .quadratic_coefficient(TermOwner::Objective, y, x),
        0.0
    );
}

#[test]
fn test_linear_program_with_equality_and_maximize() {
    // max x + 2y s.t. x + y == 4, 0 <= x, 0 <= y <= 3  ->  (1, 3), 7
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    let y = ctx.add_var().unwrap();
    ctx.set_var_lobnd(x, 0.0).unwrap();
    ctx.set_var_bnds(y, 0.0, 3.0).unwrap();
    let c = ctx.add_con().unwrap();
    ctx.add_con_linear_term(c, x, 1.0).unwrap();
    ctx.add_con_linear_term(c, y, 1.0).unwrap();
    ctx.set_con_eqbnd(c, 4.0).unwrap();
    ctx.add_obj_linear_term(x, 1.0).unwrap();
    ctx.add_obj_linear_term(y, 2.0).unwrap();
    ctx.set_obj_goal(ObjectiveGoal::Maximize).unwrap();

    let status = ctx.solve().unwrap();
    assert!(status.is_feasible(), "unexpected status {}", status);
    assert_abs_diff_eq!(ctx.get_var_primal_value(x).unwrap(), 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(ctx.get_var_primal_value(y).unwrap(), 3.0, epsilon = 1e-5);
    assert_abs_diff_eq!(ctx.get_obj_value().unwrap(), 7.0, epsilon = 1e-5);
    assert_abs_diff_eq!(ctx.get_con_value(c).unwrap(), 4.0, epsilon = 1e-6);
}

#[test]
fn test_invalid_handles_leave_the_term_store_untouched() {
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    let mut other = Ctx::new().unwrap();
    let ghost = other.add_vars(10).unwrap()[9];
    let stray = other.add_con().unwrap();
    assert!(matches!(
        ctx.add_obj_quadratic_term(x, ghost, 1.0),
        Err(Error::InvalidHandle { index: 9, .. })
    ));
    assert!(matches!(
        ctx.set_con_dual_init_value(stray, 1.0),
        Err(Error::InvalidHandle {
            kind: HandleKind::Constraint,
            ..
        })
    ));
    assert_eq!(ctx.terms().num_quadratic(), 0);
}

#[test]
fn test_initial_values_are_accepted_for_issued_handles() {
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    let c = ctx.add_con().unwrap();
    ctx.add_con_linear_term(c, x, 1.0).unwrap();
    ctx.set_con_lobnd(c, 2.0).unwrap();
    ctx.add_obj_quadratic_term(x, x, 1.0).unwrap();

    ctx.set_var_primal_init_value(x, 5.0).unwrap();
    ctx.set_var_dual_init_value(x, 0.0).unwrap();
    ctx.set_con_dual_init_value(c, -4.0).unwrap();

    assert!(ctx.solve().unwrap().is_feasible());
    assert_abs_diff_eq!(ctx.get_var_primal_value(x).unwrap(), 2.0, epsilon = 1e-5);
    // d/dx x^2 = 4 at the active bound x >= 2.
    assert_abs_diff_eq!(ctx.get_con_dual_value(c).unwrap().abs(), 4.0, epsilon = 1e-3);
}
