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

//! # Engine Abstraction
//!
//! One associated function per engine entry point the wrapper uses. Every
//! function returns the engine's integer status, `0` on success, and writes
//! outputs through `&mut` parameters, mirroring the C calling convention.
//!
//! ## Sparsity arguments
//!
//! Where the C API takes a nonzero count plus index arrays, the trait takes
//! `Option` slices: `None` selects the dense layout (the `KN_DENSE` family of
//! sentinels), `Some` passes an explicit pattern whose length is the count.
//!
//! ## Safety
//!
//! Implementors promise that:
//!
//! * `new` either fails with a non-zero status or stores a session pointer
//!   that stays valid until `free` is called on it.
//! * Callback function pointers are invoked only from within `solve` of the
//!   same session, on the calling thread, with the `user_params` registered
//!   for that callback.
//! * Out-of-range indices are reported through a non-zero status, never
//!   through memory unsafety.

use crate::types::{CbContext, EvalCallbackFn, KnContext, KnInt, UserCallbackFn};
use libc::{c_double, c_int, c_void};

/// An engine implementing the Knitro-style session API.
///
/// # Safety
///
/// See the module documentation for the contract implementors must uphold.
pub unsafe trait Engine: 'static {
    /// Human readable engine name, used in log records.
    const NAME: &'static str;

    /// Creates a new session (`KN_new`).
    ///
    /// On success `kc` receives the session pointer. A zero status with a
    /// null pointer means the engine refused to start (e.g. no license).
    fn new(kc: &mut *mut KnContext) -> c_int;

    /// Frees a session (`KN_free`) and nulls the pointer.
    ///
    /// # Safety
    ///
    /// `kc` must come from `new` of the same engine and not be freed yet.
    unsafe fn free(kc: &mut *mut KnContext) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_var(kc: *mut KnContext, index: &mut KnInt) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_con(kc: *mut KnContext, index: &mut KnInt) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_var_lobnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_var_upbnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_var_lobnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_var_upbnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_var_type(kc: *mut KnContext, index: KnInt, kind: c_int) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_var_type(kc: *mut KnContext, index: KnInt, kind: &mut c_int) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_con_lobnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_con_upbnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_con_lobnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_con_upbnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_obj_goal(kc: *mut KnContext, goal: c_int) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_var_primal_init_value(kc: *mut KnContext, index: KnInt, value: c_double)
        -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_var_dual_init_value(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_con_dual_init_value(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn set_mip_var_primal_init_value(
        kc: *mut KnContext,
        index: KnInt,
        value: c_double,
    ) -> c_int;

    /// Adds `coef * x[var]` to the objective.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_obj_linear_term(kc: *mut KnContext, var: KnInt, coef: c_double) -> c_int;
    /// Adds `coef * x[var]` to the body of constraint `con`.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_con_linear_term(
        kc: *mut KnContext,
        con: KnInt,
        var: KnInt,
        coef: c_double,
    ) -> c_int;
    /// Adds `coef * x[var1] * x[var2]` to the objective.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_obj_quadratic_term(
        kc: *mut KnContext,
        var1: KnInt,
        var2: KnInt,
        coef: c_double,
    ) -> c_int;
    /// Adds `coef * x[var1] * x[var2]` to the body of constraint `con`.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_con_quadratic_term(
        kc: *mut KnContext,
        con: KnInt,
        var1: KnInt,
        var2: KnInt,
        coef: c_double,
    ) -> c_int;

    /// Registers an evaluation callback (`KN_add_eval_callback`) covering the
    /// objective (if `eval_obj`) and the listed constraints.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn add_eval_callback(
        kc: *mut KnContext,
        eval_obj: bool,
        index_cons: &[KnInt],
        callback: EvalCallbackFn,
        cb: &mut *mut CbContext,
    ) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine and `cb` one of its
    /// callback records. `user_params` must outlive the session's use of it.
    unsafe fn set_cb_user_params(
        kc: *mut KnContext,
        cb: *mut CbContext,
        user_params: *mut c_void,
    ) -> c_int;

    /// Attaches a first-derivative callback (`KN_set_cb_grad`).
    ///
    /// `obj_grad_vars` lists the objective gradient nonzeros, `jacobian` the
    /// `(constraint, variable)` Jacobian nonzeros. `None` selects dense.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine and `cb` one of its
    /// callback records.
    unsafe fn set_cb_grad(
        kc: *mut KnContext,
        cb: *mut CbContext,
        obj_grad_vars: Option<&[KnInt]>,
        jacobian: Option<(&[KnInt], &[KnInt])>,
        callback: EvalCallbackFn,
    ) -> c_int;

    /// Attaches a second-derivative callback (`KN_set_cb_hess`).
    ///
    /// `hessian` lists the `(var1, var2)` nonzeros of the upper triangle.
    /// `None` selects the dense row-major upper triangle.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine and `cb` one of its
    /// callback records.
    unsafe fn set_cb_hess(
        kc: *mut KnContext,
        cb: *mut CbContext,
        hessian: Option<(&[KnInt], &[KnInt])>,
        callback: EvalCallbackFn,
    ) -> c_int;

    /// Installs the callback invoked after each branch-and-bound node.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine. `user_params` must
    /// outlive the session's use of it.
    unsafe fn set_mip_node_callback(
        kc: *mut KnContext,
        callback: UserCallbackFn,
        user_params: *mut c_void,
    ) -> c_int;

    /// Runs the solver. Returns the terminal status.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn solve(kc: *mut KnContext) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_number_vars(kc: *mut KnContext, count: &mut KnInt) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_number_cons(kc: *mut KnContext, count: &mut KnInt) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_obj_value(kc: *mut KnContext, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_var_primal_value(kc: *mut KnContext, index: KnInt, value: &mut c_double)
        -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_var_dual_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_con_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_con_dual_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int;

    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_abs_feas_error(kc: *mut KnContext, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_rel_feas_error(kc: *mut KnContext, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_abs_opt_error(kc: *mut KnContext, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_rel_opt_error(kc: *mut KnContext, value: &mut c_double) -> c_int;

    /// Objective of the best integer-feasible point. Returns
    /// `KN_RC_NO_INCUMBENT` while there is none.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_mip_incumbent_obj(kc: *mut KnContext, value: &mut c_double) -> c_int;
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_mip_relaxation_bnd(kc: *mut KnContext, value: &mut c_double) -> c_int;
    /// Copies the incumbent point into `x`, which must hold one entry per variable.
    ///
    /// # Safety
    ///
    /// `kc` must be a live session of this engine.
    unsafe fn get_mip_incumbent_x(kc: *mut KnContext, x: &mut [c_double]) -> c_int;
}
