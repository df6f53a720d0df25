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

//! # Knitro Engine
//!
//! `extern "C"` declarations of the Knitro shared library and the [`Knitro`]
//! engine that forwards every [`Engine`] call to them. Only compiled with the
//! `knitro` feature. Linking needs `libknitro` on the library search path,
//! `build.rs` adds `$KNITRODIR/lib` when that variable is set.

use crate::constants::{KN_DENSE, KN_DENSE_ROWMAJOR, KN_RC_BAD_N_OR_F};
use crate::engine::Engine;
use crate::layout::{count, pair_pattern, pattern};
use crate::types::{CbContext, EvalCallbackFn, KnBool, KnContext, KnInt, KnLong, UserCallbackFn};
use libc::{c_double, c_int, c_void};

#[link(name = "knitro")]
extern "C" {
    fn KN_new(kc: *mut *mut KnContext) -> c_int;
    fn KN_free(kc: *mut *mut KnContext) -> c_int;

    fn KN_add_var(kc: *mut KnContext, index_var: *mut KnInt) -> c_int;
    fn KN_add_con(kc: *mut KnContext, index_con: *mut KnInt) -> c_int;

    fn KN_set_var_lobnd(kc: *mut KnContext, index_var: KnInt, x_lo_bnd: c_double) -> c_int;
    fn KN_set_var_upbnd(kc: *mut KnContext, index_var: KnInt, x_up_bnd: c_double) -> c_int;
    fn KN_get_var_lobnd(kc: *mut KnContext, index_var: KnInt, x_lo_bnd: *mut c_double) -> c_int;
    fn KN_get_var_upbnd(kc: *mut KnContext, index_var: KnInt, x_up_bnd: *mut c_double) -> c_int;
    fn KN_set_var_type(kc: *mut KnContext, index_var: KnInt, x_type: c_int) -> c_int;
    fn KN_get_var_type(kc: *mut KnContext, index_var: KnInt, x_type: *mut c_int) -> c_int;

    fn KN_set_con_lobnd(kc: *mut KnContext, index_con: KnInt, c_lo_bnd: c_double) -> c_int;
    fn KN_set_con_upbnd(kc: *mut KnContext, index_con: KnInt, c_up_bnd: c_double) -> c_int;
    fn KN_get_con_lobnd(kc: *mut KnContext, index_con: KnInt, c_lo_bnd: *mut c_double) -> c_int;
    fn KN_get_con_upbnd(kc: *mut KnContext, index_con: KnInt, c_up_bnd: *mut c_double) -> c_int;

    fn KN_set_obj_goal(kc: *mut KnContext, obj_goal: c_int) -> c_int;

    fn KN_set_var_primal_init_value(kc: *mut KnContext, index_var: KnInt, x_init: c_double)
        -> c_int;
    fn KN_set_var_dual_init_value(kc: *mut KnContext, index_var: KnInt, lambda_init: c_double)
        -> c_int;
    fn KN_set_con_dual_init_value(kc: *mut KnContext, index_con: KnInt, lambda_init: c_double)
        -> c_int;
    fn KN_set_mip_var_primal_init_value(
        kc: *mut KnContext,
        index_var: KnInt,
        x_init: c_double,
    ) -> c_int;

    fn KN_add_obj_linear_term(kc: *mut KnContext, index_var: KnInt, coef: c_double) -> c_int;
    fn KN_add_con_linear_term(
        kc: *mut KnContext,
        index_con: KnInt,
        index_var: KnInt,
        coef: c_double,
    ) -> c_int;
    fn KN_add_obj_quadratic_term(
        kc: *mut KnContext,
        index_var1: KnInt,
        index_var2: KnInt,
        coef: c_double,
    ) -> c_int;
    fn KN_add_con_quadratic_term(
        kc: *mut KnContext,
        index_con: KnInt,
        index_var1: KnInt,
        index_var2: KnInt,
        coef: c_double,
    ) -> c_int;

    fn KN_add_eval_callback(
        kc: *mut KnContext,
        eval_obj: KnBool,
        n_c: KnInt,
        index_cons: *const KnInt,
        func_callback: EvalCallbackFn,
        cb: *mut *mut CbContext,
    ) -> c_int;
    fn KN_set_cb_user_params(
        kc: *mut KnContext,
        cb: *mut CbContext,
        user_params: *mut c_void,
    ) -> c_int;
    fn KN_set_cb_grad(
        kc: *mut KnContext,
        cb: *mut CbContext,
        n_v: KnInt,
        obj_grad_index_vars: *const KnInt,
        nnz_j: KnLong,
        jac_index_cons: *const KnInt,
        jac_index_vars: *const KnInt,
        grad_callback: EvalCallbackFn,
    ) -> c_int;
    fn KN_set_cb_hess(
        kc: *mut KnContext,
        cb: *mut CbContext,
        nnz_h: KnLong,
        hess_index_vars1: *const KnInt,
        hess_index_vars2: *const KnInt,
        hess_callback: EvalCallbackFn,
    ) -> c_int;
    fn KN_set_mip_node_callback(
        kc: *mut KnContext,
        fn_ptr: UserCallbackFn,
        user_params: *mut c_void,
    ) -> c_int;

    fn KN_solve(kc: *mut KnContext) -> c_int;

    fn KN_get_number_vars(kc: *mut KnContext, n_v: *mut KnInt) -> c_int;
    fn KN_get_number_cons(kc: *mut KnContext, n_c: *mut KnInt) -> c_int;
    fn KN_get_obj_value(kc: *mut KnContext, obj: *mut c_double) -> c_int;
    fn KN_get_var_primal_value(kc: *mut KnContext, index_var: KnInt, x: *mut c_double) -> c_int;
    fn KN_get_var_dual_value(kc: *mut KnContext, index_var: KnInt, lambda: *mut c_double)
        -> c_int;
    fn KN_get_con_value(kc: *mut KnContext, index_con: KnInt, c: *mut c_double) -> c_int;
    fn KN_get_con_dual_value(kc: *mut KnContext, index_con: KnInt, lambda: *mut c_double)
        -> c_int;
    fn KN_get_abs_feas_error(kc: *mut KnContext, abs_feas_error: *mut c_double) -> c_int;
    fn KN_get_rel_feas_error(kc: *mut KnContext, rel_feas_error: *mut c_double) -> c_int;
    fn KN_get_abs_opt_error(kc: *mut KnContext, abs_opt_error: *mut c_double) -> c_int;
    fn KN_get_rel_opt_error(kc: *mut KnContext, rel_opt_error: *mut c_double) -> c_int;
    fn KN_get_mip_incumbent_obj(kc: *mut KnContext, obj: *mut c_double) -> c_int;
    fn KN_get_mip_relaxation_bnd(kc: *mut KnContext, obj_bound: *mut c_double) -> c_int;
    fn KN_get_mip_incumbent_x(kc: *mut KnContext, x: *mut c_double) -> c_int;
}

/// The Knitro shared library.
#[derive(Debug, Clone, Copy, Default)]
pub struct Knitro;

unsafe impl Engine for Knitro {
    const NAME: &'static str = "knitro";

    fn new(kc: &mut *mut KnContext) -> c_int {
        // SAFETY: `kc` is a valid out-pointer for the duration of the call.
        unsafe { KN_new(kc) }
    }

    unsafe fn free(kc: &mut *mut KnContext) -> c_int {
        KN_free(kc)
    }

    unsafe fn add_var(kc: *mut KnContext, index: &mut KnInt) -> c_int {
        KN_add_var(kc, index)
    }

    unsafe fn add_con(kc: *mut KnContext, index: &mut KnInt) -> c_int {
        KN_add_con(kc, index)
    }

    unsafe fn set_var_lobnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        KN_set_var_lobnd(kc, index, value)
    }

    unsafe fn set_var_upbnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        KN_set_var_upbnd(kc, index, value)
    }

    unsafe fn get_var_lobnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_var_lobnd(kc, index, value)
    }

    unsafe fn get_var_upbnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_var_upbnd(kc, index, value)
    }

    unsafe fn set_var_type(kc: *mut KnContext, index: KnInt, kind: c_int) -> c_int {
        KN_set_var_type(kc, index, kind)
    }

    unsafe fn get_var_type(kc: *mut KnContext, index: KnInt, kind: &mut c_int) -> c_int {
        KN_get_var_type(kc, index, kind)
    }

    unsafe fn set_con_lobnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        KN_set_con_lobnd(kc, index, value)
    }

    unsafe fn set_con_upbnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        KN_set_con_upbnd(kc, index, value)
    }

    unsafe fn get_con_lobnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_con_lobnd(kc, index, value)
    }

    unsafe fn get_con_upbnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_con_upbnd(kc, index, value)
    }

    unsafe fn set_obj_goal(kc: *mut KnContext, goal: c_int) -> c_int {
        KN_set_obj_goal(kc, goal)
    }

    unsafe fn set_var_primal_init_value(
        kc: *mut KnContext,
        index: KnInt,
        value: c_double,
    ) -> c_int {
        KN_set_var_primal_init_value(kc, index, value)
    }

    unsafe fn set_var_dual_init_value(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        KN_set_var_dual_init_value(kc, index, value)
    }

    unsafe fn set_con_dual_init_value(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        KN_set_con_dual_init_value(kc, index, value)
    }

    unsafe fn set_mip_var_primal_init_value(
        kc: *mut KnContext,
        index: KnInt,
        value: c_double,
    ) -> c_int {
        KN_set_mip_var_primal_init_value(kc, index, value)
    }

    unsafe fn add_obj_linear_term(kc: *mut KnContext, var: KnInt, coef: c_double) -> c_int {
        KN_add_obj_linear_term(kc, var, coef)
    }

    unsafe fn add_con_linear_term(
        kc: *mut KnContext,
        con: KnInt,
        var: KnInt,
        coef: c_double,
    ) -> c_int {
        KN_add_con_linear_term(kc, con, var, coef)
    }

    unsafe fn add_obj_quadratic_term(
        kc: *mut KnContext,
        var1: KnInt,
        var2: KnInt,
        coef: c_double,
    ) -> c_int {
        KN_add_obj_quadratic_term(kc, var1, var2, coef)
    }

    unsafe fn add_con_quadratic_term(
        kc: *mut KnContext,
        con: KnInt,
        var1: KnInt,
        var2: KnInt,
        coef: c_double,
    ) -> c_int {
        KN_add_con_quadratic_term(kc, con, var1, var2, coef)
    }

    unsafe fn add_eval_callback(
        kc: *mut KnContext,
        eval_obj: bool,
        index_cons: &[KnInt],
        callback: EvalCallbackFn,
        cb: &mut *mut CbContext,
    ) -> c_int {
        let Some(num_cons) = count(index_cons) else {
            return KN_RC_BAD_N_OR_F;
        };
        let cons = if index_cons.is_empty() {
            std::ptr::null()
        } else {
            index_cons.as_ptr()
        };
        KN_add_eval_callback(
            kc,
            KnBool::from(eval_obj),
            num_cons,
            cons,
            callback,
            cb,
        )
    }

    unsafe fn set_cb_user_params(
        kc: *mut KnContext,
        cb: *mut CbContext,
        user_params: *mut c_void,
    ) -> c_int {
        KN_set_cb_user_params(kc, cb, user_params)
    }

    unsafe fn set_cb_grad(
        kc: *mut KnContext,
        cb: *mut CbContext,
        obj_grad_vars: Option<&[KnInt]>,
        jacobian: Option<(&[KnInt], &[KnInt])>,
        callback: EvalCallbackFn,
    ) -> c_int {
        let Some((n_v, obj_vars)) = pattern(obj_grad_vars, KN_DENSE) else {
            return KN_RC_BAD_N_OR_F;
        };
        let Some((nnz_j, jac_cons, jac_vars)) = pair_pattern(jacobian, KN_DENSE) else {
            return KN_RC_BAD_N_OR_F;
        };
        KN_set_cb_grad(kc, cb, n_v, obj_vars, nnz_j, jac_cons, jac_vars, callback)
    }

    unsafe fn set_cb_hess(
        kc: *mut KnContext,
        cb: *mut CbContext,
        hessian: Option<(&[KnInt], &[KnInt])>,
        callback: EvalCallbackFn,
    ) -> c_int {
        let Some((nnz_h, vars1, vars2)) = pair_pattern(hessian, KN_DENSE_ROWMAJOR) else {
            return KN_RC_BAD_N_OR_F;
        };
        KN_set_cb_hess(kc, cb, nnz_h, vars1, vars2, callback)
    }

    unsafe fn set_mip_node_callback(
        kc: *mut KnContext,
        callback: UserCallbackFn,
        user_params: *mut c_void,
    ) -> c_int {
        KN_set_mip_node_callback(kc, callback, user_params)
    }

    unsafe fn solve(kc: *mut KnContext) -> c_int {
        KN_solve(kc)
    }

    unsafe fn get_number_vars(kc: *mut KnContext, count: &mut KnInt) -> c_int {
        KN_get_number_vars(kc, count)
    }

    unsafe fn get_number_cons(kc: *mut KnContext, count: &mut KnInt) -> c_int {
        KN_get_number_cons(kc, count)
    }

    unsafe fn get_obj_value(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_obj_value(kc, value)
    }

    unsafe fn get_var_primal_value(
        kc: *mut KnContext,
        index: KnInt,
        value: &mut c_double,
    ) -> c_int {
        KN_get_var_primal_value(kc, index, value)
    }

    unsafe fn get_var_dual_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_var_dual_value(kc, index, value)
    }

    unsafe fn get_con_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_con_value(kc, index, value)
    }

    unsafe fn get_con_dual_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        KN_get_con_dual_value(kc, index, value)
    }

    unsafe fn get_abs_feas_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_abs_feas_error(kc, value)
    }

    unsafe fn get_rel_feas_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_rel_feas_error(kc, value)
    }

    unsafe fn get_abs_opt_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_abs_opt_error(kc, value)
    }

    unsafe fn get_rel_opt_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_rel_opt_error(kc, value)
    }

    unsafe fn get_mip_incumbent_obj(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_mip_incumbent_obj(kc, value)
    }

    unsafe fn get_mip_relaxation_bnd(kc: *mut KnContext, value: &mut c_double) -> c_int {
        KN_get_mip_relaxation_bnd(kc, value)
    }

    unsafe fn get_mip_incumbent_x(kc: *mut KnContext, x: &mut [c_double]) -> c_int {
        KN_get_mip_incumbent_x(kc, x.as_mut_ptr())
    }
}
