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

//! # Continuous Solver
//!
//! Augmented-Lagrangian method over one-sided rows. Every finite side of a
//! variable or constraint bound becomes a row `g_k(x) <= 0` with multiplier
//! `mu_k >= 0`. For a penalty `rho`, the inner loop minimizes
//!
//! ```text
//! Phi(x) = s f(x) + sum_k ((max(0, mu_k + rho g_k(x)))^2 - mu_k^2) / (2 rho)
//! ```
//!
//! by damped Newton steps with Armijo backtracking, where `s` is `1` when
//! minimizing and `-1` when maximizing. The outer loop then updates
//! `mu_k <- max(0, mu_k + rho g_k)` and grows `rho` whenever the violation
//! did not drop to a quarter of its previous value.

use crate::eval::{CallbackStatus, Derivatives, EvalOutcome, Evaluator, Values};
use crate::linalg::{add_outer, dot, inf_norm, regularized_newton_direction};
use crate::session::Solution;
use libc::c_int;
use nlbridge_core::math::bound::Bound;
use nlbridge_sys::constants::{
    KN_RC_INFEASIBLE, KN_RC_ITER_LIMIT_FEAS, KN_RC_ITER_LIMIT_INFEAS, KN_RC_OPTIMAL,
    KN_RC_UNBOUNDED,
};
use tracing::{debug, trace};

const UNBOUNDED_OBJECTIVE: f64 = -1e20;
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Constraint(usize),
    Variable(usize),
}

/// One side of one bound, read as `g(x) <= 0`.
#[derive(Debug, Clone, Copy)]
struct Row {
    body: Body,
    side: Side,
    bound: f64,
}

impl Row {
    #[inline]
    fn body_value(&self, x: &[f64], c: &[f64]) -> f64 {
        match self.body {
            Body::Constraint(i) => c[i],
            Body::Variable(j) => x[j],
        }
    }

    #[inline]
    fn value(&self, x: &[f64], c: &[f64]) -> f64 {
        let v = self.body_value(x, c);
        match self.side {
            Side::Lower => self.bound - v,
            Side::Upper => v - self.bound,
        }
    }

    #[inline]
    fn direction(&self) -> f64 {
        match self.side {
            Side::Lower => -1.0,
            Side::Upper => 1.0,
        }
    }

    /// Writes `grad g(x)` into `out`.
    fn gradient(&self, jacobian: &[f64], n: usize, out: &mut [f64]) {
        out.iter_mut().for_each(|v| *v = 0.0);
        let d = self.direction();
        match self.body {
            Body::Constraint(i) => {
                for j in 0..n {
                    out[j] = d * jacobian[i * n + j];
                }
            }
            Body::Variable(j) => out[j] = d,
        }
    }

    #[inline]
    fn scale(&self) -> f64 {
        self.bound.abs().max(1.0)
    }
}

fn push_rows(rows: &mut Vec<Row>, body: Body, bound: &Bound<f64>) {
    if bound.has_lower() {
        rows.push(Row {
            body,
            side: Side::Lower,
            bound: bound.lower(),
        });
    }
    if bound.has_upper() {
        rows.push(Row {
            body,
            side: Side::Upper,
            bound: bound.upper(),
        });
    }
}

/// Merit function of one outer iteration.
struct Merit<'a, 'm> {
    eval: &'a Evaluator<'m>,
    rows: &'a [Row],
    mu: &'a [f64],
    rho: f64,
    sign: f64,
}

/// Merit value, gradient and the function data they were computed from.
struct MeritPoint {
    phi: f64,
    gradient: Vec<f64>,
    values: Values,
    derivatives: Derivatives,
}

impl Merit<'_, '_> {
    #[inline]
    fn shifted(&self, k: usize, g: f64) -> f64 {
        (self.mu[k] + self.rho * g).max(0.0)
    }

    fn phi(&self, x: &[f64], values: &Values) -> f64 {
        let mut phi = self.sign * values.objective;
        for (k, row) in self.rows.iter().enumerate() {
            let t = self.shifted(k, row.value(x, &values.constraints));
            phi += (t * t - self.mu[k] * self.mu[k]) / (2.0 * self.rho);
        }
        phi
    }

    /// Merit value at a trial point. `None` if a callback could not evaluate it.
    fn value(&self, x: &[f64]) -> EvalOutcome<Option<f64>> {
        match self.eval.values(x) {
            Ok(values) => Ok(Some(self.phi(x, &values))),
            Err(status) if status.is_eval_error() => Ok(None),
            Err(status) => Err(status),
        }
    }

    fn point(&self, x: &[f64]) -> EvalOutcome<MeritPoint> {
        let n = x.len();
        let values = self.eval.values(x)?;
        let derivatives = self.eval.derivatives(x)?;
        let mut gradient: Vec<f64> = derivatives.objective.iter().map(|g| self.sign * g).collect();
        let mut row_grad = vec![0.0; n];
        for (k, row) in self.rows.iter().enumerate() {
            let t = self.shifted(k, row.value(x, &values.constraints));
            if t > 0.0 {
                row.gradient(&derivatives.jacobian, n, &mut row_grad);
                for j in 0..n {
                    gradient[j] += t * row_grad[j];
                }
            }
        }
        Ok(MeritPoint {
            phi: self.phi(x, &values),
            gradient,
            values,
            derivatives,
        })
    }

    fn hessian(&self, x: &[f64], point: &MeritPoint) -> EvalOutcome<Vec<f64>> {
        let n = x.len();
        let m = point.values.constraints.len();
        let mut weights = vec![0.0; m];
        let mut active = Vec::new();
        for (k, row) in self.rows.iter().enumerate() {
            let t = self.shifted(k, row.value(x, &point.values.constraints));
            if t > 0.0 {
                if let Body::Constraint(i) = row.body {
                    weights[i] += row.direction() * t;
                }
                active.push(k);
            }
        }
        let mut h = self.eval.lagrangian_hessian(x, self.sign, &weights)?;
        let mut row_grad = vec![0.0; n];
        for k in active {
            self.rows[k].gradient(&point.derivatives.jacobian, n, &mut row_grad);
            add_outer(&mut h, n, &row_grad, self.rho);
        }
        Ok(h)
    }
}

/// Returns `p^T H p`.
fn curvature(h: &[f64], n: usize, p: &[f64]) -> f64 {
    let mut acc = 0.0;
    for i in 0..n {
        acc += p[i] * dot(&h[i * n..(i + 1) * n], p);
    }
    acc
}

struct InnerOutcome {
    gradient_norm: f64,
    objective_scale: f64,
    unbounded: bool,
}

fn minimize_merit(
    merit: &Merit<'_, '_>,
    x: &mut [f64],
    max_iterations: usize,
    tolerance: f64,
) -> EvalOutcome<InnerOutcome> {
    let n = x.len();
    let mut point = merit.point(x)?;
    for iteration in 0..max_iterations {
        let gradient_norm = inf_norm(&point.gradient);
        let objective_scale = inf_norm(&point.derivatives.objective).max(1.0);
        let done = |unbounded| InnerOutcome {
            gradient_norm,
            objective_scale,
            unbounded,
        };
        if merit.sign * point.values.objective < UNBOUNDED_OBJECTIVE {
            return Ok(done(true));
        }
        if gradient_norm <= tolerance * objective_scale {
            return Ok(done(false));
        }

        let h = merit.hessian(x, &point)?;
        let (direction, slope) = match regularized_newton_direction(&h, n, &point.gradient) {
            Some(p) if dot(&p, &point.gradient) < 0.0 => {
                let slope = dot(&p, &point.gradient);
                (p, slope)
            }
            _ => {
                let p: Vec<f64> = point.gradient.iter().map(|g| -g).collect();
                let slope = -dot(&point.gradient, &point.gradient);
                (p, slope)
            }
        };

        let mut alpha = 1.0;
        let mut trial = vec![0.0; n];
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACKS {
            for j in 0..n {
                trial[j] = x[j] + alpha * direction[j];
            }
            if let Some(phi) = merit.value(&trial)? {
                if phi <= point.phi + ARMIJO * alpha * slope {
                    accepted = true;
                    break;
                }
            }
            alpha *= 0.5;
        }

        // Without positive curvature along the direction the full step says
        // nothing about the step length, so keep doubling while Armijo holds.
        if accepted
            && alpha == 1.0
            && curvature(&h, n, &direction) <= 1e-12 * dot(&direction, &direction)
        {
            let mut candidate = vec![0.0; n];
            for _ in 0..MAX_BACKTRACKS {
                let longer = 2.0 * alpha;
                for j in 0..n {
                    candidate[j] = x[j] + longer * direction[j];
                }
                match merit.value(&candidate)? {
                    Some(phi) if phi <= point.phi + ARMIJO * longer * slope => {
                        alpha = longer;
                        std::mem::swap(&mut trial, &mut candidate);
                    }
                    _ => break,
                }
            }
        }
        trace!(
            iteration,
            phi = point.phi,
            gradient_norm,
            alpha,
            accepted,
            "newton step"
        );
        if !accepted {
            return Ok(done(false));
        }

        let step = alpha * inf_norm(&direction);
        x.copy_from_slice(&trial);
        point = merit.point(x)?;
        if step <= 1e-15 * inf_norm(x).max(1.0) {
            break;
        }
    }
    Ok(InnerOutcome {
        gradient_norm: inf_norm(&point.gradient),
        objective_scale: inf_norm(&point.derivatives.objective).max(1.0),
        unbounded: merit.sign * point.values.objective < UNBOUNDED_OBJECTIVE,
    })
}

/// Result of one continuous solve.
#[derive(Debug, Clone)]
pub(crate) struct Relaxation {
    pub(crate) status: c_int,
    pub(crate) solution: Solution,
}

impl Relaxation {
    /// Returns `true` if the point satisfies all bounds within tolerance.
    #[inline]
    pub(crate) fn is_feasible(&self, tolerance: f64) -> bool {
        self.solution.rel_feas_error <= tolerance
    }
}

/// Solves the continuous problem with the given variable bounds, starting at `x0`.
///
/// Returns the callback status if a callback aborted the solve.
pub(crate) fn solve_relaxation(
    eval: &Evaluator<'_>,
    var_bounds: &[Bound<f64>],
    x0: &[f64],
) -> Result<Relaxation, CallbackStatus> {
    let model = eval.model();
    let options = &model.options;
    let n = model.num_vars();
    let m = model.num_cons();

    let mut rows = Vec::new();
    for (i, b) in model.con_bounds.iter().enumerate() {
        push_rows(&mut rows, Body::Constraint(i), b);
    }
    for (j, b) in var_bounds.iter().enumerate() {
        push_rows(&mut rows, Body::Variable(j), b);
    }

    let mut x = x0.to_vec();
    let mut mu = vec![0.0; rows.len()];
    let mut rho = options.initial_penalty;
    let mut previous_violation = f64::INFINITY;
    let mut status = None;
    let mut inner = InnerOutcome {
        gradient_norm: f64::INFINITY,
        objective_scale: 1.0,
        unbounded: false,
    };

    for outer in 0..options.max_outer_iterations {
        let merit = Merit {
            eval,
            rows: &rows,
            mu: &mu,
            rho,
            sign: model.sign,
        };
        inner = minimize_merit(
            &merit,
            &mut x,
            options.max_inner_iterations,
            options.optimality_tolerance,
        )?;
        if inner.unbounded {
            status = Some(KN_RC_UNBOUNDED);
            break;
        }

        let values = eval.values(&x)?;
        let mut violation: f64 = 0.0;
        for (k, row) in rows.iter().enumerate() {
            let g = row.value(&x, &values.constraints);
            violation = violation.max(g.max(0.0) / row.scale());
            mu[k] = (mu[k] + rho * g).max(0.0);
        }

        debug!(
            outer,
            objective = values.objective,
            violation,
            stationarity = inner.gradient_norm,
            penalty = rho,
            "augmented lagrangian iteration"
        );

        if violation <= options.feasibility_tolerance
            && inner.gradient_norm <= options.optimality_tolerance * inner.objective_scale
        {
            status = Some(KN_RC_OPTIMAL);
            break;
        }
        if violation > 0.25 * previous_violation {
            if rho >= options.max_penalty {
                status = Some(KN_RC_INFEASIBLE);
                break;
            }
            rho = (rho * options.penalty_growth).min(options.max_penalty);
        }
        previous_violation = violation;
    }

    let values = eval.values(&x)?;
    let mut lambda = vec![0.0; m + n];
    let mut abs_feas: f64 = 0.0;
    let mut rel_feas: f64 = 0.0;
    for (k, row) in rows.iter().enumerate() {
        let g = row.value(&x, &values.constraints).max(0.0);
        abs_feas = abs_feas.max(g);
        rel_feas = rel_feas.max(g / row.scale());
        let slot = match row.body {
            Body::Constraint(i) => i,
            Body::Variable(j) => m + j,
        };
        lambda[slot] += row.direction() * mu[k];
    }

    let status = status.unwrap_or(if rel_feas <= options.feasibility_tolerance {
        KN_RC_ITER_LIMIT_FEAS
    } else {
        KN_RC_ITER_LIMIT_INFEAS
    });

    Ok(Relaxation {
        status,
        solution: Solution {
            x,
            lambda,
            objective: values.objective,
            constraint_values: values.constraints,
            abs_feas_error: abs_feas,
            rel_feas_error: rel_feas,
            abs_opt_error: inner.gradient_norm,
            rel_opt_error: inner.gradient_norm / inner.objective_scale,
        },
    })
}
