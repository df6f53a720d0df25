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

//! Solves Hock-Schittkowski problem 15 with the in-process reference engine
//! and prints the result.
//!
//! Run with `RUST_LOG=nlbridge=debug` to see every registration and solve.

use nlbridge::{Context, GradientSparsity, Sparsity};
use nlbridge_reference::{Reference, ReferenceOptions};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> nlbridge::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    Reference::set_default_options(
        ReferenceOptions::builder()
            .optimality_tolerance(1e-8)
            .build(),
    );

    let mut ctx = Context::<Reference>::new()?;
    let x = ctx.add_vars(2)?;
    ctx.set_var_upbnd(x[0], 0.5)?;
    ctx.set_var_primal_init_value(x[0], -2.0)?;
    ctx.set_var_primal_init_value(x[1], 1.0)?;

    let c = ctx.add_cons(2)?;
    ctx.set_con_lobnd(c[0], 1.0)?;
    ctx.set_con_lobnd(c[1], 0.0)?;
    ctx.add_con_quadratic_term(c[0], x[0], x[1], 1.0)?;
    ctx.add_con_linear_term(c[1], x[0], 1.0)?;
    ctx.add_con_quadratic_term(c[1], x[1], x[1], 1.0)?;

    let token = ctx.register_value_callback(true, &[], |_, request, result| {
        let x = request.x();
        let a = x[1] - x[0] * x[0];
        let b = 1.0 - x[0];
        result.set_objective(100.0 * a * a + b * b);
        0
    })?;
    ctx.attach_gradient(token, GradientSparsity::dense(), |_, request, result| {
        let x = request.x();
        let g = result.objective_gradient_mut();
        g[0] = -400.0 * x[0] * (x[1] - x[0] * x[0]) - 2.0 * (1.0 - x[0]);
        g[1] = 200.0 * (x[1] - x[0] * x[0]);
        0
    })?;
    ctx.attach_hessian(
        token,
        Sparsity::Sparse(vec![(x[0], x[0]), (x[0], x[1]), (x[1], x[1])]),
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

    let status = ctx.solve()?;
    println!("status:    {}", status);
    println!("objective: {:.6}", ctx.get_obj_value()?);
    for v in ctx.variables() {
        println!("{}: {:.6}", v, ctx.get_var_primal_value(v)?);
    }
    for c in ctx.constraints() {
        println!(
            "{}: value {:.6}, dual {:.6}",
            c,
            ctx.get_con_value(c)?,
            ctx.get_con_dual_value(c)?
        );
    }
    println!("feasibility error: {:.3e}", ctx.get_abs_feas_error()?);
    Ok(())
}
