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

//! Safe views over the evaluation request and result records the engine
//! passes into a callback.
//!
//! The engine hands out raw pointers whose lengths are implied by the
//! callback's registration (number of variables, the callback's constraint
//! list, and the declared sparsity patterns). `BufferLayout` captures those
//! lengths so a thunk can turn the pointers into slices once, before the
//! closure runs.

use libc::{c_double, c_int};
use nlbridge_sys::constants::{
    KN_RC_EVALFC, KN_RC_EVALFCGA, KN_RC_EVALGA, KN_RC_EVALH, KN_RC_EVALHV, KN_RC_EVALHV_NO_F,
    KN_RC_EVALH_NO_F, KN_RC_EVALR, KN_RC_EVALRJ,
};
use nlbridge_sys::types;

/// What the engine asks a callback to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Objective and constraint values.
    Values,
    /// Objective gradient and constraint Jacobian.
    Gradient,
    /// Values and first derivatives in one call.
    ValuesAndGradient,
    /// Hessian of the Lagrangian, `sigma * objective + lambda * constraints`.
    Hessian,
    /// Hessian of the Lagrangian without the objective part.
    HessianNoObjective,
    /// Hessian-vector product.
    HessianVector,
    /// Hessian-vector product without the objective part.
    HessianVectorNoObjective,
    /// Least-squares residuals.
    Residuals,
    /// Least-squares residual Jacobian.
    ResidualJacobian,
    /// A request code this layer does not know about.
    Other(c_int),
}

impl RequestKind {
    pub fn from_raw(code: c_int) -> Self {
        match code {
            KN_RC_EVALFC => RequestKind::Values,
            KN_RC_EVALGA => RequestKind::Gradient,
            KN_RC_EVALFCGA => RequestKind::ValuesAndGradient,
            KN_RC_EVALH => RequestKind::Hessian,
            KN_RC_EVALH_NO_F => RequestKind::HessianNoObjective,
            KN_RC_EVALHV => RequestKind::HessianVector,
            KN_RC_EVALHV_NO_F => RequestKind::HessianVectorNoObjective,
            KN_RC_EVALR => RequestKind::Residuals,
            KN_RC_EVALRJ => RequestKind::ResidualJacobian,
            other => RequestKind::Other(other),
        }
    }

    pub fn raw(self) -> c_int {
        match self {
            RequestKind::Values => KN_RC_EVALFC,
            RequestKind::Gradient => KN_RC_EVALGA,
            RequestKind::ValuesAndGradient => KN_RC_EVALFCGA,
            RequestKind::Hessian => KN_RC_EVALH,
            RequestKind::HessianNoObjective => KN_RC_EVALH_NO_F,
            RequestKind::HessianVector => KN_RC_EVALHV,
            RequestKind::HessianVectorNoObjective => KN_RC_EVALHV_NO_F,
            RequestKind::Residuals => KN_RC_EVALR,
            RequestKind::ResidualJacobian => KN_RC_EVALRJ,
            RequestKind::Other(code) => code,
        }
    }

    /// Returns `true` for the Hessian kinds that exclude the objective.
    #[inline]
    pub fn excludes_objective(self) -> bool {
        matches!(
            self,
            RequestKind::HessianNoObjective | RequestKind::HessianVectorNoObjective
        )
    }
}

/// Lengths of the buffers that belong to one callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferLayout {
    /// Number of variables of the session.
    pub num_vars: usize,
    /// Number of constraints of the session.
    pub num_cons: usize,
    /// Number of constraints evaluated by this callback.
    pub callback_cons: usize,
    /// Whether this callback evaluates the objective.
    pub evaluates_objective: bool,
    /// Entries of the objective gradient buffer.
    pub objective_gradient: usize,
    /// Entries of the Jacobian buffer.
    pub jacobian: usize,
    /// Entries of the Hessian buffer.
    pub hessian: usize,
}

/// Read-only view of an evaluation request.
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest<'a> {
    kind: RequestKind,
    x: &'a [f64],
    lambda: &'a [f64],
    sigma: f64,
    vector: &'a [f64],
}

impl<'a> EvalRequest<'a> {
    /// Builds a request view from plain slices.
    pub fn new(kind: RequestKind, x: &'a [f64], lambda: &'a [f64], sigma: f64) -> Self {
        Self {
            kind,
            x,
            lambda,
            sigma,
            vector: &[],
        }
    }

    /// Builds a view over a raw request record.
    ///
    /// # Safety
    ///
    /// Every non-null pointer of `raw` must be valid for reads of the length
    /// implied by `layout` for the duration of `'a`.
    pub unsafe fn from_raw(raw: &'a types::EvalRequest, layout: &BufferLayout) -> Self {
        let kind = RequestKind::from_raw(raw.type_);
        let n = layout.num_vars;
        let sigma = if raw.sigma.is_null() {
            if kind.excludes_objective() {
                0.0
            } else {
                1.0
            }
        } else {
            *raw.sigma
        };
        Self {
            kind,
            x: read_slice(raw.x, n),
            lambda: read_slice(raw.lambda, layout.num_cons + n),
            sigma,
            vector: read_slice(raw.vec, n),
        }
    }

    #[inline]
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The current primal point, indexed by variable handle.
    #[inline]
    pub fn x(&self) -> &'a [f64] {
        self.x
    }

    /// Multipliers of all constraints followed by those of all variable
    /// bounds. Empty unless the request is a Hessian request.
    #[inline]
    pub fn lambda(&self) -> &'a [f64] {
        self.lambda
    }

    /// Weight of the objective in the Hessian of the Lagrangian.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// The vector of a Hessian-vector product request.
    #[inline]
    pub fn vector(&self) -> &'a [f64] {
        self.vector
    }
}

/// Output buffers of an evaluation request.
///
/// Buffers the engine did not supply for this request are empty.
#[derive(Debug)]
pub struct EvalResult<'a> {
    objective: Option<&'a mut f64>,
    constraints: &'a mut [f64],
    objective_gradient: &'a mut [f64],
    jacobian: &'a mut [f64],
    hessian: &'a mut [f64],
    hessian_vector: &'a mut [f64],
}

impl<'a> EvalResult<'a> {
    /// Builds a result view from plain buffers.
    pub fn new(
        objective: Option<&'a mut f64>,
        constraints: &'a mut [f64],
        objective_gradient: &'a mut [f64],
        jacobian: &'a mut [f64],
        hessian: &'a mut [f64],
    ) -> Self {
        Self {
            objective,
            constraints,
            objective_gradient,
            jacobian,
            hessian,
            hessian_vector: &mut [],
        }
    }

    /// Builds a view over a raw result record.
    ///
    /// # Safety
    ///
    /// Every non-null pointer of `raw` must be valid for writes of the length
    /// implied by `layout` for the duration of `'a`, and the buffers must not
    /// overlap.
    pub unsafe fn from_raw(raw: &'a mut types::EvalResult, layout: &BufferLayout) -> Self {
        let objective = if layout.evaluates_objective && !raw.obj.is_null() {
            Some(&mut *raw.obj)
        } else {
            None
        };
        Self {
            objective,
            constraints: write_slice(raw.c, layout.callback_cons),
            objective_gradient: write_slice(raw.obj_grad, layout.objective_gradient),
            jacobian: write_slice(raw.jac, layout.jacobian),
            hessian: write_slice(raw.hess, layout.hessian),
            hessian_vector: write_slice(raw.hess_vec, layout.num_vars),
        }
    }

    /// Stores the objective value. Ignored when the engine did not ask for it.
    #[inline]
    pub fn set_objective(&mut self, value: f64) {
        if let Some(obj) = self.objective.as_deref_mut() {
            *obj = value;
        }
    }

    /// Returns the stored objective value, if the engine asked for one.
    #[inline]
    pub fn objective(&self) -> Option<f64> {
        self.objective.as_deref().copied()
    }

    /// Constraint values, in the order the callback's constraints were
    /// registered.
    #[inline]
    pub fn constraints_mut(&mut self) -> &mut [f64] {
        &mut *self.constraints
    }

    /// Objective gradient, dense by variable or ordered as the declared
    /// sparsity pattern.
    #[inline]
    pub fn objective_gradient_mut(&mut self) -> &mut [f64] {
        &mut *self.objective_gradient
    }

    /// Jacobian, dense row-major over the callback's constraints or ordered
    /// as the declared sparsity pattern.
    #[inline]
    pub fn jacobian_mut(&mut self) -> &mut [f64] {
        &mut *self.jacobian
    }

    /// Hessian, the packed row-major upper triangle when dense or ordered as
    /// the declared sparsity pattern.
    #[inline]
    pub fn hessian_mut(&mut self) -> &mut [f64] {
        &mut *self.hessian
    }

    #[inline]
    pub fn hessian_vector_mut(&mut self) -> &mut [f64] {
        &mut *self.hessian_vector
    }
}

/// Position of `(i, j)`, `i <= j`, in a packed row-major upper triangle of
/// an `n x n` matrix.
#[inline]
pub fn packed_upper_index(i: usize, j: usize, n: usize) -> usize {
    debug_assert!(i <= j && j < n);
    i * n - i * (i + 1) / 2 + j
}

#[inline]
pub(crate) unsafe fn read_slice<'a>(ptr: *const c_double, len: usize) -> &'a [f64] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

#[inline]
unsafe fn write_slice<'a>(ptr: *mut c_double, len: usize) -> &'a mut [f64] {
    if ptr.is_null() || len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(ptr, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kind_round_trips_known_codes() {
        for code in [1, 2, 3, 7, 8, 9, 10, 11, 12] {
            assert_eq!(RequestKind::from_raw(code).raw(), code);
        }
        assert_eq!(RequestKind::from_raw(42), RequestKind::Other(42));
    }

    #[test]
    fn test_raw_views_follow_layout() {
        let x = [1.0, 2.0];
        let lambda = [0.5, 0.0, 0.0];
        let sigma = 2.0;
        let raw = types::EvalRequest {
            type_: KN_RC_EVALH,
            thread_id: 0,
            x: x.as_ptr(),
            lambda: lambda.as_ptr(),
            sigma: &sigma,
            vec: std::ptr::null(),
        };
        let layout = BufferLayout {
            num_vars: 2,
            num_cons: 1,
            callback_cons: 1,
            evaluates_objective: true,
            objective_gradient: 2,
            jacobian: 2,
            hessian: 3,
        };
        let request = unsafe { EvalRequest::from_raw(&raw, &layout) };
        assert_eq!(request.kind(), RequestKind::Hessian);
        assert_eq!(request.x(), &[1.0, 2.0]);
        assert_eq!(request.lambda().len(), 3);
        assert_eq!(request.sigma(), 2.0);
        assert!(request.vector().is_empty());

        let mut hess = [0.0; 3];
        let mut raw_result = types::EvalResult::null();
        raw_result.hess = hess.as_mut_ptr();
        {
            let mut result = unsafe { EvalResult::from_raw(&mut raw_result, &layout) };
            assert_eq!(result.objective(), None);
            assert!(result.constraints_mut().is_empty());
            result.hessian_mut()[packed_upper_index(1, 1, 2)] = 4.0;
            result.set_objective(1.0);
        }
        assert_eq!(hess, [0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_missing_sigma_defaults_by_kind() {
        let x = [0.0];
        let mut raw = types::EvalRequest {
            type_: KN_RC_EVALH_NO_F,
            thread_id: 0,
            x: x.as_ptr(),
            lambda: std::ptr::null(),
            sigma: std::ptr::null(),
            vec: std::ptr::null(),
        };
        let layout = BufferLayout {
            num_vars: 1,
            ..BufferLayout::default()
        };
        assert_eq!(unsafe { EvalRequest::from_raw(&raw, &layout) }.sigma(), 0.0);
        raw.type_ = KN_RC_EVALH;
        assert_eq!(unsafe { EvalRequest::from_raw(&raw, &layout) }.sigma(), 1.0);
    }

    #[test]
    fn test_packed_upper_index() {
        let n = 3;
        let order: Vec<_> = (0..n)
            .flat_map(|i| (i..n).map(move |j| packed_upper_index(i, j, n)))
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }
}
