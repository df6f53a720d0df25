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

//! Evaluation of the problem functions at a point.
//!
//! Structural terms are evaluated directly. Callback terms are evaluated by
//! calling the registered foreign function pointers with the registered user
//! parameters, exactly as a native engine would. Callbacks without a gradient
//! or Hessian callback are differentiated by forward differences.

use crate::linalg::{packed_upper_index, packed_upper_len};
use crate::model::{CallbackBinding, Model};
use libc::{c_double, c_int};
use nlbridge_sys::constants::{
    KN_RC_CALLBACK_ERR, KN_RC_EVALFC, KN_RC_EVALGA, KN_RC_EVALH, KN_RC_EVALH_NO_F,
    KN_RC_EVAL_ERR, KN_RC_USER_TERMINATION,
};
use nlbridge_sys::{EvalCallbackFn, EvalRequest, EvalResult, KnContext};

/// Non-zero status returned by a user callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallbackStatus(pub(crate) c_int);

impl CallbackStatus {
    /// Returns `true` if the callback reported that the point cannot be evaluated.
    #[inline]
    pub(crate) fn is_eval_error(self) -> bool {
        self.0 == KN_RC_EVAL_ERR
    }

    /// Terminal solve status an abort caused by this callback status maps to.
    #[inline]
    pub(crate) fn solve_status(self) -> c_int {
        match self.0 {
            KN_RC_USER_TERMINATION => KN_RC_USER_TERMINATION,
            KN_RC_EVAL_ERR => KN_RC_EVAL_ERR,
            _ => KN_RC_CALLBACK_ERR,
        }
    }
}

pub(crate) type EvalOutcome<T> = Result<T, CallbackStatus>;

/// Objective and constraint body values at a point.
#[derive(Debug, Clone)]
pub(crate) struct Values {
    pub(crate) objective: f64,
    pub(crate) constraints: Vec<f64>,
}

/// Objective gradient and dense row-major `m x n` Jacobian at a point.
#[derive(Debug, Clone)]
pub(crate) struct Derivatives {
    pub(crate) objective: Vec<f64>,
    pub(crate) jacobian: Vec<f64>,
}

pub(crate) struct Evaluator<'m> {
    model: &'m Model,
    kc: *mut KnContext,
}

impl<'m> Evaluator<'m> {
    pub(crate) fn new(model: &'m Model, kc: *mut KnContext) -> Self {
        Self { model, kc }
    }

    #[inline]
    pub(crate) fn model(&self) -> &'m Model {
        self.model
    }

    #[inline]
    pub(crate) fn session_ptr(&self) -> *mut KnContext {
        self.kc
    }

    fn invoke(
        &self,
        callback: EvalCallbackFn,
        binding: &CallbackBinding,
        request: &EvalRequest,
        result: &mut EvalResult,
    ) -> EvalOutcome<()> {
        // SAFETY: the callback was registered for this session together with
        // `user_params`; request and result point to live buffers sized for
        // the callback's layout.
        let status = unsafe {
            callback(
                self.kc,
                binding.token,
                request,
                result,
                binding.record.user_params,
            )
        };
        if status == 0 {
            Ok(())
        } else {
            Err(CallbackStatus(status))
        }
    }

    /// Evaluates one callback's objective and constraint contributions.
    fn callback_values(&self, binding: &CallbackBinding, x: &[f64]) -> EvalOutcome<(f64, Vec<f64>)> {
        let mut obj = 0.0;
        let mut c = vec![0.0; binding.record.constraints.len()];
        let request = EvalRequest {
            type_: KN_RC_EVALFC,
            thread_id: 0,
            x: x.as_ptr(),
            lambda: std::ptr::null(),
            sigma: std::ptr::null(),
            vec: std::ptr::null(),
        };
        let mut result = EvalResult::null();
        if binding.record.evaluates_objective {
            result.obj = &mut obj;
        }
        if !c.is_empty() {
            result.c = c.as_mut_ptr();
        }
        self.invoke(binding.record.value, binding, &request, &mut result)?;
        Ok((obj, c))
    }

    /// Evaluates one callback's first derivatives into a dense gradient and
    /// a dense `k x n` Jacobian over the callback's own constraints.
    fn callback_gradient(&self, binding: &CallbackBinding, x: &[f64]) -> EvalOutcome<(Vec<f64>, Vec<f64>)> {
        let n = x.len();
        let k = binding.record.constraints.len();
        let mut grad = vec![0.0; n];
        let mut jac = vec![0.0; k * n];

        let Some((layout, callback)) = &binding.record.gradient else {
            let h = self.model.options.finite_difference_step;
            let (f0, c0) = self.callback_values(binding, x)?;
            let mut xp = x.to_vec();
            for j in 0..n {
                let step = h * x[j].abs().max(1.0);
                xp[j] = x[j] + step;
                let (f1, c1) = self.callback_values(binding, &xp)?;
                xp[j] = x[j];
                grad[j] = (f1 - f0) / step;
                for r in 0..k {
                    jac[r * n + j] = (c1[r] - c0[r]) / step;
                }
            }
            return Ok((grad, jac));
        };

        let obj_len = match &layout.objective {
            Some(vars) => vars.len(),
            None if binding.record.evaluates_objective => n,
            None => 0,
        };
        let jac_len = layout.jacobian.as_ref().map_or(k * n, Vec::len);
        let mut obj_buf = vec![0.0; obj_len];
        let mut jac_buf = vec![0.0; jac_len];

        let request = EvalRequest {
            type_: KN_RC_EVALGA,
            thread_id: 0,
            x: x.as_ptr(),
            lambda: std::ptr::null(),
            sigma: std::ptr::null(),
            vec: std::ptr::null(),
        };
        let mut result = EvalResult::null();
        if !obj_buf.is_empty() {
            result.obj_grad = obj_buf.as_mut_ptr();
        }
        if !jac_buf.is_empty() {
            result.jac = jac_buf.as_mut_ptr();
        }
        self.invoke(*callback, binding, &request, &mut result)?;

        match &layout.objective {
            Some(vars) => {
                for (&j, &v) in vars.iter().zip(&obj_buf) {
                    grad[j] += v;
                }
            }
            None => grad[..obj_len].copy_from_slice(&obj_buf),
        }
        match &layout.jacobian {
            Some(pattern) => {
                for (&(con, var), &v) in pattern.iter().zip(&jac_buf) {
                    if let Some(r) = binding.record.constraints.iter().position(|&c| c == con) {
                        jac[r * n + var] += v;
                    }
                }
            }
            None => jac.copy_from_slice(&jac_buf),
        }
        Ok((grad, jac))
    }

    /// Adds one callback's weighted second derivatives into the full `n x n` matrix `h`.
    fn callback_hessian(
        &self,
        binding: &CallbackBinding,
        x: &[f64],
        sigma: f64,
        lambda: &[f64],
        h: &mut [f64],
    ) -> EvalOutcome<()> {
        let n = x.len();
        let Some((pattern, callback)) = &binding.record.hessian else {
            // Forward differences of the weighted callback gradient.
            let weighted = |point: &[f64]| -> EvalOutcome<Vec<f64>> {
                let (grad, jac) = self.callback_gradient(binding, point)?;
                let mut g: Vec<f64> = grad.iter().map(|v| sigma * v).collect();
                for (r, &con) in binding.record.constraints.iter().enumerate() {
                    let w = lambda[con];
                    if w != 0.0 {
                        for j in 0..n {
                            g[j] += w * jac[r * n + j];
                        }
                    }
                }
                Ok(g)
            };
            let step_scale = self.model.options.finite_difference_step.sqrt();
            let g0 = weighted(x)?;
            let mut xp = x.to_vec();
            let mut fd = vec![0.0; n * n];
            for j in 0..n {
                let step = step_scale * x[j].abs().max(1.0);
                xp[j] = x[j] + step;
                let g1 = weighted(&xp)?;
                xp[j] = x[j];
                for i in 0..n {
                    fd[i * n + j] = (g1[i] - g0[i]) / step;
                }
            }
            for i in 0..n {
                for j in 0..n {
                    h[i * n + j] += 0.5 * (fd[i * n + j] + fd[j * n + i]);
                }
            }
            return Ok(());
        };

        let len = pattern.as_ref().map_or(packed_upper_len(n), Vec::len);
        let mut buf = vec![0.0; len];
        let sigma_value: c_double = sigma;
        let request = EvalRequest {
            type_: if sigma == 0.0 {
                KN_RC_EVALH_NO_F
            } else {
                KN_RC_EVALH
            },
            thread_id: 0,
            x: x.as_ptr(),
            lambda: lambda.as_ptr(),
            sigma: &sigma_value,
            vec: std::ptr::null(),
        };
        let mut result = EvalResult::null();
        if !buf.is_empty() {
            result.hess = buf.as_mut_ptr();
        }
        self.invoke(*callback, binding, &request, &mut result)?;

        let mut add = |i: usize, j: usize, v: f64| {
            h[i * n + j] += v;
            if i != j {
                h[j * n + i] += v;
            }
        };
        match pattern {
            Some(pairs) => {
                for (&(i, j), &v) in pairs.iter().zip(&buf) {
                    add(i, j, v);
                }
            }
            None => {
                for i in 0..n {
                    for j in i..n {
                        add(i, j, buf[packed_upper_index(i, j, n)]);
                    }
                }
            }
        }
        Ok(())
    }

    /// Objective and constraint values at `x`.
    pub(crate) fn values(&self, x: &[f64]) -> EvalOutcome<Values> {
        let m = self.model;
        let mut objective = 0.0;
        let mut constraints = vec![0.0; m.num_cons()];

        for &(j, a) in &m.objective_linear {
            objective += a * x[j];
        }
        for &(i, j, q) in &m.objective_quadratic {
            objective += q * x[i] * x[j];
        }
        for &(c, j, a) in &m.constraint_linear {
            constraints[c] += a * x[j];
        }
        for &(c, i, j, q) in &m.constraint_quadratic {
            constraints[c] += q * x[i] * x[j];
        }
        for binding in &m.callbacks {
            let (f, c) = self.callback_values(binding, x)?;
            if binding.record.evaluates_objective {
                objective += f;
            }
            for (&con, v) in binding.record.constraints.iter().zip(c) {
                constraints[con] += v;
            }
        }
        Ok(Values {
            objective,
            constraints,
        })
    }

    /// Objective gradient and constraint Jacobian at `x`.
    pub(crate) fn derivatives(&self, x: &[f64]) -> EvalOutcome<Derivatives> {
        let m = self.model;
        let n = m.num_vars();
        let mut objective = vec![0.0; n];
        let mut jacobian = vec![0.0; m.num_cons() * n];

        for &(j, a) in &m.objective_linear {
            objective[j] += a;
        }
        for &(i, j, q) in &m.objective_quadratic {
            objective[i] += q * x[j];
            objective[j] += q * x[i];
        }
        for &(c, j, a) in &m.constraint_linear {
            jacobian[c * n + j] += a;
        }
        for &(c, i, j, q) in &m.constraint_quadratic {
            jacobian[c * n + i] += q * x[j];
            jacobian[c * n + j] += q * x[i];
        }
        for binding in &m.callbacks {
            let (grad, jac) = self.callback_gradient(binding, x)?;
            if binding.record.evaluates_objective {
                for j in 0..n {
                    objective[j] += grad[j];
                }
            }
            for (r, &con) in binding.record.constraints.iter().enumerate() {
                for j in 0..n {
                    jacobian[con * n + j] += jac[r * n + j];
                }
            }
        }
        Ok(Derivatives {
            objective,
            jacobian,
        })
    }

    /// Full `n x n` Hessian of `sigma * f + sum_i weights[i] * c_i` at `x`.
    pub(crate) fn lagrangian_hessian(
        &self,
        x: &[f64],
        sigma: f64,
        weights: &[f64],
    ) -> EvalOutcome<Vec<f64>> {
        let m = self.model;
        let n = m.num_vars();
        let mut h = vec![0.0; n * n];

        for &(i, j, q) in &m.objective_quadratic {
            h[i * n + j] += sigma * q;
            h[j * n + i] += sigma * q;
        }
        for &(c, i, j, q) in &m.constraint_quadratic {
            let w = weights[c];
            h[i * n + j] += w * q;
            h[j * n + i] += w * q;
        }

        let mut lambda = vec![0.0; m.num_cons() + n];
        lambda[..m.num_cons()].copy_from_slice(weights);
        for binding in &m.callbacks {
            self.callback_hessian(binding, x, sigma, &lambda, &mut h)?;
        }
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReferenceOptions;
    use crate::session::{CallbackRecord, GradientLayout, Session, VariableRecord};
    use approx::assert_relative_eq;
    use libc::c_void;
    use nlbridge_sys::CbContext;

    // f(x) = x0^2 * x1, c0(x) = x0 + x1^3
    unsafe extern "C" fn value(
        _kc: *mut KnContext,
        _cb: *mut CbContext,
        request: *const EvalRequest,
        result: *mut EvalResult,
        _user: *mut c_void,
    ) -> c_int {
        let x = std::slice::from_raw_parts((*request).x, 2);
        *(*result).obj = x[0] * x[0] * x[1];
        *(*result).c = x[0] + x[1] * x[1] * x[1];
        0
    }

    unsafe extern "C" fn gradient(
        _kc: *mut KnContext,
        _cb: *mut CbContext,
        request: *const EvalRequest,
        result: *mut EvalResult,
        _user: *mut c_void,
    ) -> c_int {
        let x = std::slice::from_raw_parts((*request).x, 2);
        let g = std::slice::from_raw_parts_mut((*result).obj_grad, 2);
        g[0] = 2.0 * x[0] * x[1];
        g[1] = x[0] * x[0];
        // Sparse Jacobian pattern [(0, 1)] only.
        *(*result).jac = 3.0 * x[1] * x[1];
        0
    }

    unsafe extern "C" fn failing(
        _kc: *mut KnContext,
        _cb: *mut CbContext,
        _request: *const EvalRequest,
        _result: *mut EvalResult,
        _user: *mut c_void,
    ) -> c_int {
        KN_RC_EVAL_ERR
    }

    fn model(gradient_cb: bool) -> Model {
        let mut session = Session::new(ReferenceOptions::default());
        session.variables.push(VariableRecord::default());
        session.variables.push(VariableRecord::default());
        session.constraints.push(Default::default());
        session.objective_linear.push((0, 1.0));
        session.objective_quadratic.push((0, 1, 2.0));
        session.push_callback(CallbackRecord {
            evaluates_objective: true,
            constraints: vec![0],
            value,
            user_params: std::ptr::null_mut(),
            gradient: gradient_cb.then(|| {
                (
                    GradientLayout {
                        objective: None,
                        jacobian: Some(vec![(0, 1)]),
                    },
                    gradient as EvalCallbackFn,
                )
            }),
            hessian: None,
        });
        Model::capture(&session)
    }

    #[test]
    fn test_values_sum_structure_and_callbacks() {
        let m = model(true);
        let eval = Evaluator::new(&m, std::ptr::null_mut());
        let v = eval.values(&[2.0, 3.0]).unwrap();
        // x0 + 2 x0 x1 + x0^2 x1 = 2 + 12 + 12
        assert_relative_eq!(v.objective, 26.0);
        assert_relative_eq!(v.constraints[0], 29.0);
    }

    #[test]
    fn test_sparse_jacobian_is_scattered() {
        let m = model(true);
        let eval = Evaluator::new(&m, std::ptr::null_mut());
        let d = eval.derivatives(&[2.0, 3.0]).unwrap();
        assert_relative_eq!(d.objective[0], 1.0 + 6.0 + 12.0);
        assert_relative_eq!(d.objective[1], 4.0 + 4.0);
        // Only the declared nonzero is filled, x0's slot stays structural (zero).
        assert_relative_eq!(d.jacobian[0], 0.0);
        assert_relative_eq!(d.jacobian[1], 27.0);
    }

    #[test]
    fn test_finite_difference_fallback_matches_analytic() {
        let m = model(false);
        let eval = Evaluator::new(&m, std::ptr::null_mut());
        let d = eval.derivatives(&[2.0, 3.0]).unwrap();
        assert_relative_eq!(d.objective[0], 19.0, epsilon = 1e-4);
        assert_relative_eq!(d.objective[1], 8.0, epsilon = 1e-4);
        assert_relative_eq!(d.jacobian[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(d.jacobian[1], 27.0, epsilon = 1e-4);
    }

    #[test]
    fn test_hessian_fallback_and_structure() {
        let m = model(true);
        let eval = Evaluator::new(&m, std::ptr::null_mut());
        let h = eval.lagrangian_hessian(&[2.0, 3.0], 1.0, &[0.5]).unwrap();
        // d2/dx2 [2 x0 x1 + x0^2 x1 + 0.5 (x0 + x1^3)]
        assert_relative_eq!(h[0], 6.0, epsilon = 1e-2);
        assert_relative_eq!(h[1], 2.0 + 4.0, epsilon = 1e-2);
        assert_relative_eq!(h[2], h[1], epsilon = 1e-9);
        assert_relative_eq!(h[3], 9.0, epsilon = 1e-2);
    }

    #[test]
    fn test_callback_status_is_propagated() {
        let mut m = model(true);
        m.callbacks[0].record.value = failing;
        let eval = Evaluator::new(&m, std::ptr::null_mut());
        let err = eval.values(&[0.0, 0.0]).unwrap_err();
        assert!(err.is_eval_error());
        assert_eq!(err.solve_status(), KN_RC_EVAL_ERR);
        assert_eq!(CallbackStatus(-1).solve_status(), KN_RC_CALLBACK_ERR);
    }
}
