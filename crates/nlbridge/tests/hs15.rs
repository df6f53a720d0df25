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

//! Hock-Schittkowski problem 15 solved end to end through the callback
//! protocol.
//!
//! ```text
//! min   100 (x1 - x0^2)^2 + (1 - x0)^2
//! s.t.  x0 * x1 >= 1
//!       x0 + x1^2 >= 0
//!       x0 <= 0.5
//! ```

mod common;

use approx::assert_abs_diff_eq;
use nlbridge::{Context, EvalRequest, EvalResult, GradientSparsity, Sparsity, VariableId};
use nlbridge_reference::Reference;
use std::cell::Cell;

fn objective(x: &[f64]) -> f64 {
    let a = x[1] - x[0] * x[0];
    let b = 1.0 - x[0];
    100.0 * a * a + b * b
}

fn build<'cb>(
    ctx: &mut Context<'cb, Reference>,
    evaluations: &'cb Cell<usize>,
) -> nlbridge::Result<[VariableId; 2]> {
    let vars = ctx.add_vars(2)?;
    let (x0, x1) = (vars[0], vars[1]);
    ctx.set_var_upbnd(x0, 0.5)?;
    ctx.set_var_primal_init_value(x0, -2.0)?;
    ctx.set_var_primal_init_value(x1, 1.0)?;

    let cons = ctx.add_cons(2)?;
    ctx.set_con_lobnd(cons[0], 1.0)?;
    ctx.set_con_lobnd(cons[1], 0.0)?;
    ctx.add_con_quadratic_term(cons[0], x0, x1, 1.0)?;
    ctx.add_con_linear_term(cons[1], x0, 1.0)?;
    ctx.add_con_quadratic_term(cons[1], x1, x1, 1.0)?;

    let token = ctx.register_value_callback(
        true,
        &[],
        move |_, request: &EvalRequest<'_>, result: &mut EvalResult<'_>| {
            evaluations.set(evaluations.get() + 1);
            result.set_objective(objective(request.x()));
            0
        },
    )?;
    ctx.attach_gradient(token, GradientSparsity::dense(), |_, request, result| {
        let x = request.x();
        let g = result.objective_gradient_mut();
        g[0] = -400.0 * x[0] * (x[1] - x[0] * x[0]) - 2.0 * (1.0 - x[0]);
        g[1] = 200.0 * (x[1] - x[0] * x[0]);
        0
    })?;
    ctx.attach_hessian(
        token,
        Sparsity::Sparse(vec![(x0, x0), (x0, x1), (x1, x1)]),
        |_, request, result| {
            let x = request.x();
            let sigma = request.sigma();
            let h = result.hessian_mut();
            h[0] = sigma * (1200.0 * x[0] * x[0] - 400.0 * x[1] + 2.0);
            h[1] = sigma * (-400.0 * x[0]);
            h[2] = sigma * 200.0;
            0
        },
    )?;
    Ok([x0, x1])
}

#[test]
fn test_hs15_reaches_a_kkt_point() {
    common::init_logging();
    let evaluations = Cell::new(0);
    let mut ctx = Context::<Reference>::new().unwrap();
    let [x0, x1] = build(&mut ctx, &evaluations).unwrap();

    let status = ctx.solve().unwrap();
    assert!(status.is_feasible(), "unexpected status {}", status);
    assert!(evaluations.get() > 0);

    let x = [
        ctx.get_var_primal_value(x0).unwrap(),
        ctx.get_var_primal_value(x1).unwrap(),
    ];
    let obj = ctx.get_obj_value().unwrap();
    if (x[0] - 0.5).abs() < 1e-2 {
        assert_abs_diff_eq!(x[0], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(obj, 306.5, epsilon = 1e-2);
    } else {
        assert_abs_diff_eq!(x[0], -0.79212, epsilon = 1e-3);
        assert_abs_diff_eq!(x[1], -1.26243, epsilon = 1e-3);
        assert_abs_diff_eq!(obj, 360.38, epsilon = 1e-1);
    }
    assert!(ctx.get_abs_feas_error().unwrap() < 1e-6);
    assert!(ctx.get_rel_opt_error().unwrap() < 1e-3);
}

#[test]
fn test_hs15_closures_outlive_the_registering_scope() {
    let evaluations = Cell::new(0);
    let mut ctx = Context::<Reference>::new().unwrap();
    // Every closure was created inside `build`, which has returned.
    build(&mut ctx, &evaluations).unwrap();
    assert_eq!(ctx.num_callbacks(), 1);

    ctx.solve().unwrap();
    let after_first = evaluations.get();
    assert!(after_first > 0);
    // A second solve dispatches into the same closures again.
    ctx.solve().unwrap();
    assert!(evaluations.get() > after_first);
}

#[test]
fn test_hs15_constraint_values_and_multipliers() {
    let evaluations = Cell::new(0);
    let mut ctx = Context::<Reference>::new().unwrap();
    let [x0, x1] = build(&mut ctx, &evaluations).unwrap();
    ctx.solve().unwrap();

    let x = ctx.get_var_primal_values().unwrap();
    let cons: Vec<_> = ctx.constraints().collect();
    assert_abs_diff_eq!(
        ctx.get_con_value(cons[0]).unwrap(),
        x[x0.get()] * x[x1.get()],
        epsilon = 1e-9
    );
    assert_abs_diff_eq!(
        ctx.get_con_value(cons[1]).unwrap(),
        x[x0.get()] + x[x1.get()] * x[x1.get()],
        epsilon = 1e-9
    );
    // x0 * x1 >= 1 is active at both local solutions.
    assert!(ctx.get_con_dual_value(cons[0]).unwrap().abs() > 1e-3);
}
