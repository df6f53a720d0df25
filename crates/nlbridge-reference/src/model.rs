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

//! Read-only snapshot of a session taken when `KN_solve` starts.
//!
//! Callbacks may read the session through the engine API while the solver
//! runs, so the solver works on this copy and only borrows the session
//! mutably again once it is done.

use crate::options::ReferenceOptions;
use crate::session::{token_of, CallbackRecord, Session};
use fixedbitset::FixedBitSet;
use libc::c_void;
use nlbridge_core::math::bound::Bound;
use nlbridge_sys::constants::{KN_OBJGOAL_MAXIMIZE, KN_VARTYPE_BINARY, KN_VARTYPE_CONTINUOUS};
use nlbridge_sys::{CbContext, UserCallbackFn};

/// A registered evaluation callback together with its token.
#[derive(Debug, Clone)]
pub(crate) struct CallbackBinding {
    pub(crate) token: *mut CbContext,
    pub(crate) record: CallbackRecord,
}

#[derive(Debug, Clone)]
pub(crate) struct Model {
    pub(crate) options: ReferenceOptions,
    /// `1.0` when minimizing, `-1.0` when maximizing.
    pub(crate) sign: f64,
    pub(crate) var_bounds: Vec<Bound<f64>>,
    pub(crate) con_bounds: Vec<Bound<f64>>,
    pub(crate) integers: FixedBitSet,
    pub(crate) x0: Vec<f64>,
    pub(crate) objective_linear: Vec<(usize, f64)>,
    pub(crate) objective_quadratic: Vec<(usize, usize, f64)>,
    pub(crate) constraint_linear: Vec<(usize, usize, f64)>,
    pub(crate) constraint_quadratic: Vec<(usize, usize, usize, f64)>,
    pub(crate) callbacks: Vec<CallbackBinding>,
    pub(crate) node_callback: Option<(UserCallbackFn, *mut c_void)>,
}

impl Model {
    pub(crate) fn capture(session: &Session) -> Self {
        let n = session.num_vars();
        let mut integers = FixedBitSet::with_capacity(n);
        let mut var_bounds = Vec::with_capacity(n);
        let mut x0 = Vec::with_capacity(n);

        for (j, v) in session.variables.iter().enumerate() {
            let mut bound = v.bound;
            if v.kind == KN_VARTYPE_BINARY {
                bound = Bound::from_parts(bound.lower().max(0.0), bound.upper().min(1.0));
            }
            if v.kind != KN_VARTYPE_CONTINUOUS {
                integers.insert(j);
            }
            let start = v
                .mip_primal_init
                .filter(|_| v.kind != KN_VARTYPE_CONTINUOUS)
                .or(v.primal_init)
                .unwrap_or_else(|| bound.clamp(0.0));
            var_bounds.push(bound);
            x0.push(start);
        }

        Self {
            options: session.options.clone(),
            sign: if session.goal == KN_OBJGOAL_MAXIMIZE {
                -1.0
            } else {
                1.0
            },
            var_bounds,
            con_bounds: session.constraints.iter().map(|c| c.bound).collect(),
            integers,
            x0,
            objective_linear: session.objective_linear.clone(),
            objective_quadratic: session.objective_quadratic.clone(),
            constraint_linear: session.constraint_linear.clone(),
            constraint_quadratic: session.constraint_quadratic.clone(),
            callbacks: session
                .callbacks
                .iter()
                .map(|r| CallbackBinding {
                    token: token_of(r),
                    record: (**r).clone(),
                })
                .collect(),
            node_callback: session.node_callback,
        }
    }

    #[inline]
    pub(crate) fn num_vars(&self) -> usize {
        self.var_bounds.len()
    }

    #[inline]
    pub(crate) fn num_cons(&self) -> usize {
        self.con_bounds.len()
    }

    #[inline]
    pub(crate) fn is_mixed_integer(&self) -> bool {
        !self.integers.is_clear()
    }

    /// Index of the first inconsistent variable or constraint bound, if any.
    pub(crate) fn first_inconsistent_bound(&self) -> Option<usize> {
        self.var_bounds
            .iter()
            .chain(self.con_bounds.iter())
            .position(|b| !b.is_consistent())
    }
}
