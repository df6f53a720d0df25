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
use nlbridge::callback::packed_upper_index;
use nlbridge::constants::{KN_RC_CALLBACK_ERR, KN_RC_USER_TERMINATION};
use nlbridge::{Context, Error, GradientSparsity, RequestKind, SolveClass, Sparsity};
use nlbridge_reference::Reference;
use std::cell::{Cell, RefCell};

type Ctx<'cb> = Context<'cb, Reference>;

#[test]
fn test_token_of_another_context_is_rejected() {
    common::init_logging();
    let mut a = Ctx::new().unwrap();
    let mut b = Ctx::new().unwrap();
    a.add_var().unwrap();
    b.add_var().unwrap();

    let token = a
        .register_value_callback(true, &[], |_, request, result| {
            result.set_objective(request.x()[0] * request.x()[0]);
            0
        })
        .unwrap();

    assert_eq!(
        b.attach_gradient(token, GradientSparsity::dense(), |_, _, _| 0),
        Err(Error::UnknownCallbackContext)
    );
    assert_eq!(
        b.attach_hessian(token, Sparsity::Dense, |_, _, _| 0),
        Err(Error::UnknownCallbackContext)
    );
    assert_eq!(b.num_callbacks(), 0);
    // The owner still accepts it.
    a.attach_gradient(token, GradientSparsity::dense(), |_, request, result| {
        result.objective_gradient_mut()[0] = 2.0 * request.x()[0];
        0
    })
    .unwrap();
}

#[test]
fn test_panicking_closure_fails_the_solve() {
    common::init_logging();
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    ctx.set_var_bnds(x, -1.0, 1.0).unwrap();
    ctx.register_value_callback(true, &[], |_, _, _| panic!("objective exploded"))
        .unwrap();

    assert_eq!(
        ctx.solve(),
        Err(Error::CallbackFailed {
            status: KN_RC_CALLBACK_ERR
        })
    );
    // No solution was stored.
    assert!(matches!(
        ctx.get_obj_value(),
        Err(Error::EngineRejected { .. })
    ));
}

#[test]
fn test_failing_status_is_reported() {
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    ctx.set_var_bnds(x, -1.0, 1.0).unwrap();
    ctx.register_value_callback(true, &[], |_, _, _| -7).unwrap();

    assert_eq!(ctx.solve(), Err(Error::CallbackFailed { status: -7 }));
}

#[test]
fn test_user_termination_is_a_status_not_an_error() {
    let calls = Cell::new(0_u32);
    let mut ctx = Ctx::new().unwrap();
    ctx.add_var().unwrap();
    ctx.register_value_callback(true, &[], |_, request, result| {
        calls.set(calls.get() + 1);
        if calls.get() > 3 {
            return KN_RC_USER_TERMINATION;
        }
        let v = request.x()[0] - 2.0;
        result.set_objective(v * v);
        0
    })
    .unwrap();

    let status = ctx.solve().unwrap();
    assert_eq!(status.code(), KN_RC_USER_TERMINATION);
    assert_eq!(status.class(), SolveClass::UserTermination);
    assert!(!status.is_feasible());
    assert_eq!(calls.get(), 4);
}

#[test]
fn test_sparse_constraint_callback_with_derivatives() {
    common::init_logging();
    let values = Cell::new(0_u32);
    let gradients = Cell::new(0_u32);
    let hessians = Cell::new(0_u32);
    let kinds = RefCell::new(Vec::new());

    let mut ctx = Ctx::new().unwrap();
    let vars = ctx.add_vars(2).unwrap();
    let (x0, x1) = (vars[0], vars[1]);
    let c = ctx.add_con().unwrap();
    ctx.set_con_upbnd(c, 1.0).unwrap();
    ctx.add_obj_linear_term(x0, -1.0).unwrap();
    ctx.add_obj_linear_term(x1, -1.0).unwrap();
    ctx.set_var_primal_init_value(x0, 0.2).unwrap();
    ctx.set_var_primal_init_value(x1, 0.1).unwrap();

    // x0^2 + x1^2 <= 1, evaluated by a constraint-only callback.
    let token = ctx
        .register_value_callback(false, &[c], |_, request, result| {
            values.set(values.get() + 1);
            kinds.borrow_mut().push(request.kind());
            assert_eq!(result.objective(), None);
            let x = request.x();
            result.constraints_mut()[0] = x[0] * x[0] + x[1] * x[1];
            0
        })
        .unwrap();
    ctx.attach_gradient(
        token,
        GradientSparsity {
            objective: Sparsity::Dense,
            jacobian: Sparsity::Sparse(vec![(c, x0), (c, x1)]),
        },
        |_, request, result| {
            gradients.set(gradients.get() + 1);
            assert!(result.objective_gradient_mut().is_empty());
            let x = request.x();
            let jac = result.jacobian_mut();
            assert_eq!(jac.len(), 2);
            jac[0] = 2.0 * x[0];
            jac[1] = 2.0 * x[1];
            0
        },
    )
    .unwrap();
    ctx.attach_hessian(
        token,
        Sparsity::Sparse(vec![(x0, x0), (x1, x1)]),
        |_, request, result| {
            hessians.set(hessians.get() + 1);
            assert_eq!(request.lambda().len(), 3);
            // Constraints come first in `lambda`; `c` is constraint 0.
            let multiplier = request.lambda()[0];
            let h = result.hessian_mut();
            assert_eq!(h.len(), 2);
            h[0] = 2.0 * multiplier;
            h[1] = 2.0 * multiplier;
            0
        },
    )
    .unwrap();

    let status = ctx.solve().unwrap();
    assert!(status.is_feasible(), "unexpected status {}", status);
    let half = 0.5_f64.sqrt();
    assert_abs_diff_eq!(ctx.get_var_primal_value(x0).unwrap(), half, epsilon = 1e-5);
    assert_abs_diff_eq!(ctx.get_var_primal_value(x1).unwrap(), half, epsilon = 1e-5);
    assert_abs_diff_eq!(ctx.get_obj_value().unwrap(), -2.0 * half, epsilon = 1e-6);
    assert_abs_diff_eq!(ctx.get_con_value(c).unwrap(), 1.0, epsilon = 1e-6);

    assert!(values.get() > 0);
    assert!(gradients.get() > 0);
    assert!(hessians.get() > 0);
    assert!(kinds
        .borrow()
        .iter()
        .all(|&kind| kind == RequestKind::Values));
}

#[test]
fn test_dense_jacobian_and_packed_hessian() {
    let values = Cell::new(0_u32);
    let gradients = Cell::new(0_u32);
    let hessians = Cell::new(0_u32);

    let mut ctx = Ctx::new().unwrap();
    let vars = ctx.add_vars(2).unwrap();
    let c = ctx.add_con().unwrap();
    ctx.set_con_upbnd(c, 1.0).unwrap();
    for &v in &vars {
        ctx.add_obj_linear_term(v, -1.0).unwrap();
        ctx.set_var_primal_init_value(v, 0.1).unwrap();
    }

    // x0^2 + x0*x1 + x1^2 <= 1
    let token = ctx
        .register_value_callback(false, &[c], |_, request, result| {
            values.set(values.get() + 1);
            let x = request.x();
            result.constraints_mut()[0] = x[0] * x[0] + x[0] * x[1] + x[1] * x[1];
            0
        })
        .unwrap();
    ctx.attach_gradient(token, GradientSparsity::dense(), |_, request, result| {
        gradients.set(gradients.get() + 1);
        assert!(result.objective_gradient_mut().is_empty());
        let x = request.x();
        let jac = result.jacobian_mut();
        // One row of n entries.
        assert_eq!(jac.len(), 2);
        jac[0] = 2.0 * x[0] + x[1];
        jac[1] = x[0] + 2.0 * x[1];
        0
    })
    .unwrap();
    ctx.attach_hessian(token, Sparsity::Dense, |_, request, result| {
        hessians.set(hessians.get() + 1);
        let multiplier = request.lambda()[0];
        let h = result.hessian_mut();
        assert_eq!(h.len(), 3);
        h[packed_upper_index(0, 0, 2)] = 2.0 * multiplier;
        h[packed_upper_index(0, 1, 2)] = multiplier;
        h[packed_upper_index(1, 1, 2)] = 2.0 * multiplier;
        0
    })
    .unwrap();

    let status = ctx.solve().unwrap();
    assert!(status.is_feasible(), "unexpected status {}", status);
    let corner = 1.0 / 3.0_f64.sqrt();
    for &v in &vars {
        assert_abs_diff_eq!(ctx.get_var_primal_value(v).unwrap(), corner, epsilon = 1e-5);
    }
    assert_abs_diff_eq!(ctx.get_con_value(c).unwrap(), 1.0, epsilon = 1e-6);
    assert!(values.get() > 0);
    assert!(gradients.get() > 0);
    assert!(hessians.get() > 0);
}

#[test]
fn test_many_value_callbacks_are_summed() {
    const COUNT: usize = 50;
    let mut ctx = Ctx::new().unwrap();
    let x = ctx.add_var().unwrap();
    ctx.set_var_primal_init_value(x, 0.0).unwrap();

    for i in 0..COUNT {
        let target = i as f64;
        ctx.register_value_callback(true, &[], move |_, request, result| {
            let v = request.x()[0] - target;
            result.set_objective(v * v);
            0
        })
        .unwrap();
    }
    assert_eq!(ctx.num_callbacks(), COUNT);

    let status = ctx.solve().unwrap();
    assert!(status.is_feasible(), "unexpected status {}", status);
    assert_abs_diff_eq!(ctx.get_var_primal_value(x).unwrap(), 24.5, epsilon = 1e-4);
    let expected: f64 = (0..COUNT).map(|i| (24.5 - i as f64).powi(2)).sum();
    assert_abs_diff_eq!(ctx.get_obj_value().unwrap(), expected, epsilon = 1e-3);
}

#[test]
fn test_closure_reads_model_through_the_view() {
    let seen = RefCell::new(None);
    let mut ctx = Ctx::new().unwrap();
    let vars = ctx.add_vars(3).unwrap();
    for (i, &v) in vars.iter().enumerate() {
        ctx.set_var_bnds(v, 0.0, 1.0 + i as f64).unwrap();
    }
    ctx.register_value_callback(true, &[], |view, request, result| {
        if seen.borrow().is_none() {
            let uppers: Vec<f64> = view
                .variables()
                .map(|v| view.get_var_upbnd(v).unwrap_or(f64::NAN))
                .collect();
            *seen.borrow_mut() = Some((view.is_owner(), view.num_vars(), uppers));
        }
        let x = request.x();
        result.set_objective(x.iter().map(|v| (v - 0.5) * (v - 0.5)).sum());
        0
    })
    .unwrap();

    ctx.solve().unwrap();
    let (is_owner, num_vars, uppers) = seen.borrow_mut().take().unwrap();
    assert!(!is_owner);
    assert_eq!(num_vars, 3);
    assert_eq!(uppers, vec![1.0, 2.0, 3.0]);
    for v in vars {
        assert_abs_diff_eq!(ctx.get_var_primal_value(v).unwrap(), 0.5, epsilon = 1e-5);
    }
    assert_eq!(ctx.variables().last().map(|v| v.get()), Some(2));
}
