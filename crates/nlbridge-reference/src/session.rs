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

//! In-memory state of one reference engine session.
//!
//! A `Session` lives in a `Box` whose address doubles as the opaque
//! `KnContext` pointer handed to callers. Evaluation callbacks are stored as
//! individually boxed `CallbackRecord`s; the address of a record is the
//! `CbContext` token returned at registration.

use crate::options::ReferenceOptions;
use libc::{c_int, c_void};
use nlbridge_core::math::bound::Bound;
use nlbridge_sys::constants::KN_OBJGOAL_MINIMIZE;
use nlbridge_sys::constants::KN_VARTYPE_CONTINUOUS;
use nlbridge_sys::{CbContext, EvalCallbackFn, KnContext, UserCallbackFn};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub(crate) struct VariableRecord {
    pub(crate) bound: Bound<f64>,
    pub(crate) kind: c_int,
    pub(crate) primal_init: Option<f64>,
    pub(crate) dual_init: Option<f64>,
    pub(crate) mip_primal_init: Option<f64>,
}

impl Default for VariableRecord {
    fn default() -> Self {
        Self {
            bound: Bound::unbounded(),
            kind: KN_VARTYPE_CONTINUOUS,
            primal_init: None,
            dual_init: None,
            mip_primal_init: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ConstraintRecord {
    pub(crate) bound: Bound<f64>,
    pub(crate) dual_init: Option<f64>,
}

/// Nonzero layout of a first-derivative callback. `None` means dense.
#[derive(Debug, Clone, Default)]
pub(crate) struct GradientLayout {
    pub(crate) objective: Option<Vec<usize>>,
    pub(crate) jacobian: Option<Vec<(usize, usize)>>,
}

#[derive(Debug, Clone)]
pub(crate) struct CallbackRecord {
    pub(crate) evaluates_objective: bool,
    pub(crate) constraints: Vec<usize>,
    pub(crate) value: EvalCallbackFn,
    pub(crate) user_params: *mut c_void,
    pub(crate) gradient: Option<(GradientLayout, EvalCallbackFn)>,
    /// Upper-triangle `(var1, var2)` pattern, `None` for the dense packed triangle.
    pub(crate) hessian: Option<(Option<Vec<(usize, usize)>>, EvalCallbackFn)>,
}

/// Primal/dual point and quality measures of the last solve.
#[derive(Debug, Clone, Default)]
pub(crate) struct Solution {
    pub(crate) x: Vec<f64>,
    /// One multiplier per constraint followed by one per variable.
    pub(crate) lambda: Vec<f64>,
    pub(crate) objective: f64,
    pub(crate) constraint_values: Vec<f64>,
    pub(crate) abs_feas_error: f64,
    pub(crate) rel_feas_error: f64,
    pub(crate) abs_opt_error: f64,
    pub(crate) rel_opt_error: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct MipSummary {
    pub(crate) incumbent: Option<(f64, Vec<f64>)>,
    pub(crate) relaxation_bound: f64,
}

pub(crate) struct Session {
    pub(crate) options: ReferenceOptions,
    pub(crate) variables: Vec<VariableRecord>,
    pub(crate) constraints: Vec<ConstraintRecord>,
    pub(crate) goal: c_int,
    pub(crate) objective_linear: Vec<(usize, f64)>,
    pub(crate) objective_quadratic: Vec<(usize, usize, f64)>,
    pub(crate) constraint_linear: Vec<(usize, usize, f64)>,
    pub(crate) constraint_quadratic: Vec<(usize, usize, usize, f64)>,
    pub(crate) callbacks: Vec<Box<CallbackRecord>>,
    tokens: FxHashMap<usize, usize>,
    pub(crate) node_callback: Option<(UserCallbackFn, *mut c_void)>,
    pub(crate) solution: Option<Solution>,
    pub(crate) mip: Option<MipSummary>,
}

impl Session {
    pub(crate) fn new(options: ReferenceOptions) -> Self {
        Self {
            options,
            variables: Vec::new(),
            constraints: Vec::new(),
            goal: KN_OBJGOAL_MINIMIZE,
            objective_linear: Vec::new(),
            objective_quadratic: Vec::new(),
            constraint_linear: Vec::new(),
            constraint_quadratic: Vec::new(),
            callbacks: Vec::new(),
            tokens: FxHashMap::default(),
            node_callback: None,
            solution: None,
            mip: None,
        }
    }

    /// Moves the session to the heap and returns it as an opaque session pointer.
    pub(crate) fn into_raw(self) -> *mut KnContext {
        Box::into_raw(Box::new(self)).cast::<KnContext>()
    }

    /// Reclaims a session created by `into_raw`.
    ///
    /// # Safety
    ///
    /// `kc` must come from `into_raw` and must not be used afterwards.
    pub(crate) unsafe fn from_raw(kc: *mut KnContext) -> Box<Session> {
        Box::from_raw(kc.cast::<Session>())
    }

    #[inline]
    pub(crate) fn num_vars(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub(crate) fn num_cons(&self) -> usize {
        self.constraints.len()
    }

    #[inline]
    pub(crate) fn variable(&self, index: c_int) -> Option<&VariableRecord> {
        usize::try_from(index).ok().and_then(|i| self.variables.get(i))
    }

    #[inline]
    pub(crate) fn variable_mut(&mut self, index: c_int) -> Option<&mut VariableRecord> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.variables.get_mut(i))
    }

    #[inline]
    pub(crate) fn constraint(&self, index: c_int) -> Option<&ConstraintRecord> {
        usize::try_from(index).ok().and_then(|i| self.constraints.get(i))
    }

    #[inline]
    pub(crate) fn constraint_mut(&mut self, index: c_int) -> Option<&mut ConstraintRecord> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.constraints.get_mut(i))
    }

    /// Converts a raw variable index to a position, if issued.
    #[inline]
    pub(crate) fn var_position(&self, index: c_int) -> Option<usize> {
        usize::try_from(index).ok().filter(|&i| i < self.variables.len())
    }

    /// Converts a raw constraint index to a position, if issued.
    #[inline]
    pub(crate) fn con_position(&self, index: c_int) -> Option<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.constraints.len())
    }

    /// Stores a callback record and returns its token.
    pub(crate) fn push_callback(&mut self, record: CallbackRecord) -> *mut CbContext {
        let boxed = Box::new(record);
        let token = token_of(&boxed);
        self.tokens.insert(token as usize, self.callbacks.len());
        self.callbacks.push(boxed);
        token
    }

    pub(crate) fn callback_mut(&mut self, cb: *mut CbContext) -> Option<&mut CallbackRecord> {
        let index = *self.tokens.get(&(cb as usize))?;
        self.callbacks.get_mut(index).map(|b| &mut **b)
    }

    /// Returns `true` if any variable is integer or binary.
    pub(crate) fn has_integer_variables(&self) -> bool {
        self.variables
            .iter()
            .any(|v| v.kind != KN_VARTYPE_CONTINUOUS)
    }
}

/// The token of a boxed callback record is the address of the record.
#[inline]
pub(crate) fn token_of(record: &CallbackRecord) -> *mut CbContext {
    (record as *const CallbackRecord).cast_mut().cast::<CbContext>()
}

/// Borrows the session behind an opaque session pointer.
///
/// # Safety
///
/// `kc` must come from `Session::into_raw` and no mutable borrow of the
/// session may be live.
///
/// # Panics
///
/// Panics if `kc` is null.
#[inline]
pub(crate) unsafe fn session<'a>(kc: *mut KnContext, operation: &str) -> &'a Session {
    assert!(
        !kc.is_null(),
        "called `{}` with null context pointer",
        operation
    );
    &*kc.cast::<Session>()
}

/// Mutably borrows the session behind an opaque session pointer.
///
/// # Safety
///
/// `kc` must come from `Session::into_raw` and no other borrow of the
/// session may be live.
///
/// # Panics
///
/// Panics if `kc` is null.
#[inline]
pub(crate) unsafe fn session_mut<'a>(kc: *mut KnContext, operation: &str) -> &'a mut Session {
    assert!(
        !kc.is_null(),
        "called `{}` with null context pointer",
        operation
    );
    &mut *kc.cast::<Session>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlbridge_sys::{EvalRequest, EvalResult};

    unsafe extern "C" fn noop(
        _kc: *mut KnContext,
        _cb: *mut CbContext,
        _request: *const EvalRequest,
        _result: *mut EvalResult,
        _user: *mut c_void,
    ) -> c_int {
        0
    }

    fn record() -> CallbackRecord {
        CallbackRecord {
            evaluates_objective: true,
            constraints: Vec::new(),
            value: noop,
            user_params: std::ptr::null_mut(),
            gradient: None,
            hessian: None,
        }
    }

    #[test]
    fn test_callback_tokens_are_stable_addresses() {
        let mut session = Session::new(ReferenceOptions::default());
        let first = session.push_callback(record());
        for _ in 0..64 {
            session.push_callback(record());
        }
        assert_eq!(token_of(&session.callbacks[0]), first);
        assert!(session.callback_mut(first).is_some());
        assert!(session.callback_mut(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_position_lookup_rejects_unissued_indices() {
        let mut session = Session::new(ReferenceOptions::default());
        session.variables.push(VariableRecord::default());
        assert_eq!(session.var_position(0), Some(0));
        assert_eq!(session.var_position(1), None);
        assert_eq!(session.var_position(-1), None);
        assert_eq!(session.con_position(0), None);
    }

    #[test]
    fn test_raw_round_trip() {
        let kc = Session::new(ReferenceOptions::default()).into_raw();
        // SAFETY: `kc` was just created by `into_raw`.
        let session = unsafe { Session::from_raw(kc) };
        assert_eq!(session.num_vars(), 0);
        assert_eq!(session.goal, KN_OBJGOAL_MINIMIZE);
    }
}
