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

//! `Engine` implementation of the reference engine.
//!
//! Every entry point resolves the opaque session pointer, validates indices
//! against what the session issued, and reports problems through the
//! engine's status codes. Null session pointers panic.

use crate::bnb::branch_and_bound;
use crate::eval::Evaluator;
use crate::model::Model;
use crate::nlp::solve_relaxation;
use crate::options::{default_options, set_default_options, ReferenceOptions};
use crate::session::{
    session, session_mut, CallbackRecord, ConstraintRecord, GradientLayout, MipSummary, Session,
    Solution, VariableRecord,
};
use libc::{c_double, c_int, c_void};
use nlbridge_sys::constants::{
    KN_OBJGOAL_MAXIMIZE, KN_OBJGOAL_MINIMIZE, KN_RC_BAD_CON_INDEX, KN_RC_BAD_KCPTR,
    KN_RC_ILLEGAL_CALL, KN_RC_INFEASIBLE, KN_RC_NO_INCUMBENT, KN_VARTYPE_BINARY,
    KN_VARTYPE_CONTINUOUS, KN_VARTYPE_INTEGER,
};
use nlbridge_sys::{CbContext, Engine, EvalCallbackFn, KnContext, KnInt, UserCallbackFn};
use tracing::{debug, info, warn};

/// The in-process reference engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reference;

impl Reference {
    /// Sets the options captured by sessions created afterwards on this thread.
    pub fn set_default_options(options: ReferenceOptions) {
        set_default_options(options);
    }

    /// Returns the options new sessions on this thread start with.
    pub fn default_options() -> ReferenceOptions {
        default_options()
    }
}

const BAD_VAR_INDEX: c_int = KN_RC_ILLEGAL_CALL;

#[inline]
fn to_kn_int(value: usize) -> Option<KnInt> {
    KnInt::try_from(value).ok()
}

unsafe fn update_var(
    kc: *mut KnContext,
    operation: &str,
    index: KnInt,
    update: impl FnOnce(&mut VariableRecord),
) -> c_int {
    match session_mut(kc, operation).variable_mut(index) {
        Some(v) => {
            update(v);
            0
        }
        None => BAD_VAR_INDEX,
    }
}

unsafe fn read_var<T>(
    kc: *mut KnContext,
    operation: &str,
    index: KnInt,
    out: &mut T,
    read: impl FnOnce(&VariableRecord) -> T,
) -> c_int {
    match session(kc, operation).variable(index) {
        Some(v) => {
            *out = read(v);
            0
        }
        None => BAD_VAR_INDEX,
    }
}

unsafe fn update_con(
    kc: *mut KnContext,
    operation: &str,
    index: KnInt,
    update: impl FnOnce(&mut ConstraintRecord),
) -> c_int {
    match session_mut(kc, operation).constraint_mut(index) {
        Some(c) => {
            update(c);
            0
        }
        None => KN_RC_BAD_CON_INDEX,
    }
}

unsafe fn read_con(
    kc: *mut KnContext,
    operation: &str,
    index: KnInt,
    out: &mut c_double,
    read: impl FnOnce(&ConstraintRecord) -> c_double,
) -> c_int {
    match session(kc, operation).constraint(index) {
        Some(c) => {
            *out = read(c);
            0
        }
        None => KN_RC_BAD_CON_INDEX,
    }
}

/// Reads a value of the last solution. Fails before the first solve.
unsafe fn read_solution(
    kc: *mut KnContext,
    operation: &str,
    out: &mut c_double,
    read: impl FnOnce(&Session, &Solution) -> Option<c_double>,
) -> c_int {
    let s = session(kc, operation);
    let Some(solution) = s.solution.as_ref() else {
        return KN_RC_ILLEGAL_CALL;
    };
    match read(s, solution) {
        Some(v) => {
            *out = v;
            0
        }
        None => KN_RC_ILLEGAL_CALL,
    }
}

unsafe impl Engine for Reference {
    const NAME: &'static str = "reference";

    fn new(kc: &mut *mut KnContext) -> c_int {
        *kc = Session::new(default_options()).into_raw();
        debug!(engine = Self::NAME, "session created");
        0
    }

    unsafe fn free(kc: &mut *mut KnContext) -> c_int {
        if !kc.is_null() {
            drop(Session::from_raw(*kc));
            *kc = std::ptr::null_mut();
            debug!(engine = Self::NAME, "session freed");
        }
        0
    }

    unsafe fn add_var(kc: *mut KnContext, index: &mut KnInt) -> c_int {
        let s = session_mut(kc, "KN_add_var");
        let Some(next) = to_kn_int(s.num_vars()) else {
            return KN_RC_ILLEGAL_CALL;
        };
        s.variables.push(VariableRecord::default());
        *index = next;
        0
    }

    unsafe fn add_con(kc: *mut KnContext, index: &mut KnInt) -> c_int {
        let s = session_mut(kc, "KN_add_con");
        let Some(next) = to_kn_int(s.num_cons()) else {
            return KN_RC_ILLEGAL_CALL;
        };
        s.constraints.push(ConstraintRecord::default());
        *index = next;
        0
    }

    unsafe fn set_var_lobnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        update_var(kc, "KN_set_var_lobnd", index, |v| {
            v.bound = v.bound.with_lower(value)
        })
    }

    unsafe fn set_var_upbnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        update_var(kc, "KN_set_var_upbnd", index, |v| {
            v.bound = v.bound.with_upper(value)
        })
    }

    unsafe fn get_var_lobnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_var(kc, "KN_get_var_lobnd", index, value, |v| v.bound.lower())
    }

    unsafe fn get_var_upbnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_var(kc, "KN_get_var_upbnd", index, value, |v| v.bound.upper())
    }

    unsafe fn set_var_type(kc: *mut KnContext, index: KnInt, kind: c_int) -> c_int {
        if !matches!(
            kind,
            KN_VARTYPE_CONTINUOUS | KN_VARTYPE_INTEGER | KN_VARTYPE_BINARY
        ) {
            return KN_RC_ILLEGAL_CALL;
        }
        update_var(kc, "KN_set_var_type", index, |v| v.kind = kind)
    }

    unsafe fn get_var_type(kc: *mut KnContext, index: KnInt, kind: &mut c_int) -> c_int {
        read_var(kc, "KN_get_var_type", index, kind, |v| v.kind)
    }

    unsafe fn set_con_lobnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        update_con(kc, "KN_set_con_lobnd", index, |c| {
            c.bound = c.bound.with_lower(value)
        })
    }

    unsafe fn set_con_upbnd(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        update_con(kc, "KN_set_con_upbnd", index, |c| {
            c.bound = c.bound.with_upper(value)
        })
    }

    unsafe fn get_con_lobnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_con(kc, "KN_get_con_lobnd", index, value, |c| c.bound.lower())
    }

    unsafe fn get_con_upbnd(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_con(kc, "KN_get_con_upbnd", index, value, |c| c.bound.upper())
    }

    unsafe fn set_obj_goal(kc: *mut KnContext, goal: c_int) -> c_int {
        if goal != KN_OBJGOAL_MINIMIZE && goal != KN_OBJGOAL_MAXIMIZE {
            return KN_RC_ILLEGAL_CALL;
        }
        session_mut(kc, "KN_set_obj_goal").goal = goal;
        0
    }

    unsafe fn set_var_primal_init_value(
        kc: *mut KnContext,
        index: KnInt,
        value: c_double,
    ) -> c_int {
        update_var(kc, "KN_set_var_primal_init_value", index, |v| {
            v.primal_init = Some(value)
        })
    }

    unsafe fn set_var_dual_init_value(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        update_var(kc, "KN_set_var_dual_init_value", index, |v| {
            v.dual_init = Some(value)
        })
    }

    unsafe fn set_con_dual_init_value(kc: *mut KnContext, index: KnInt, value: c_double) -> c_int {
        update_con(kc, "KN_set_con_dual_init_value", index, |c| {
            c.dual_init = Some(value)
        })
    }

    unsafe fn set_mip_var_primal_init_value(
        kc: *mut KnContext,
        index: KnInt,
        value: c_double,
    ) -> c_int {
        update_var(kc, "KN_set_mip_var_primal_init_value", index, |v| {
            v.mip_primal_init = Some(value)
        })
    }

    unsafe fn add_obj_linear_term(kc: *mut KnContext, var: KnInt, coef: c_double) -> c_int {
        let s = session_mut(kc, "KN_add_obj_linear_term");
        let Some(j) = s.var_position(var) else {
            return BAD_VAR_INDEX;
        };
        s.objective_linear.push((j, coef));
        0
    }

    unsafe fn add_con_linear_term(
        kc: *mut KnContext,
        con: KnInt,
        var: KnInt,
        coef: c_double,
    ) -> c_int {
        let s = session_mut(kc, "KN_add_con_linear_term");
        let Some(i) = s.con_position(con) else {
            return KN_RC_BAD_CON_INDEX;
        };
        let Some(j) = s.var_position(var) else {
            return BAD_VAR_INDEX;
        };
        s.constraint_linear.push((i, j, coef));
        0
    }

    unsafe fn add_obj_quadratic_term(
        kc: *mut KnContext,
        var1: KnInt,
        var2: KnInt,
        coef: c_double,
    ) -> c_int {
        let s = session_mut(kc, "KN_add_obj_quadratic_term");
        let (Some(a), Some(b)) = (s.var_position(var1), s.var_position(var2)) else {
            return BAD_VAR_INDEX;
        };
        s.objective_quadratic.push((a, b, coef));
        0
    }

    unsafe fn add_con_quadratic_term(
        kc: *mut KnContext,
        con: KnInt,
        var1: KnInt,
        var2: KnInt,
        coef: c_double,
    ) -> c_int {
        let s = session_mut(kc, "KN_add_con_quadratic_term");
        let Some(i) = s.con_position(con) else {
            return KN_RC_BAD_CON_INDEX;
        };
        let (Some(a), Some(b)) = (s.var_position(var1), s.var_position(var2)) else {
            return BAD_VAR_INDEX;
        };
        s.constraint_quadratic.push((i, a, b, coef));
        0
    }

    unsafe fn add_eval_callback(
        kc: *mut KnContext,
        eval_obj: bool,
        index_cons: &[KnInt],
        callback: EvalCallbackFn,
        cb: &mut *mut CbContext,
    ) -> c_int {
        let s = session_mut(kc, "KN_add_eval_callback");
        let Some(constraints) = index_cons
            .iter()
            .map(|&c| s.con_position(c))
            .collect::<Option<Vec<_>>>()
        else {
            return KN_RC_BAD_CON_INDEX;
        };
        *cb = s.push_callback(CallbackRecord {
            evaluates_objective: eval_obj,
            constraints,
            value: callback,
            user_params: std::ptr::null_mut(),
            gradient: None,
            hessian: None,
        });
        0
    }

    unsafe fn set_cb_user_params(
        kc: *mut KnContext,
        cb: *mut CbContext,
        user_params: *mut c_void,
    ) -> c_int {
        match session_mut(kc, "KN_set_cb_user_params").callback_mut(cb) {
            Some(record) => {
                record.user_params = user_params;
                0
            }
            None => KN_RC_BAD_KCPTR,
        }
    }

    unsafe fn set_cb_grad(
        kc: *mut KnContext,
        cb: *mut CbContext,
        obj_grad_vars: Option<&[KnInt]>,
        jacobian: Option<(&[KnInt], &[KnInt])>,
        callback: EvalCallbackFn,
    ) -> c_int {
        let s = session_mut(kc, "KN_set_cb_grad");
        let objective = match obj_grad_vars {
            Some(vars) => match vars
                .iter()
                .map(|&v| s.var_position(v))
                .collect::<Option<Vec<_>>>()
            {
                Some(v) => Some(v),
                None => return BAD_VAR_INDEX,
            },
            None => None,
        };
        let jacobian = match jacobian {
            Some((cons, vars)) if cons.len() == vars.len() => {
                let pattern = cons
                    .iter()
                    .zip(vars)
                    .map(|(&c, &v)| Some((s.con_position(c)?, s.var_position(v)?)))
                    .collect::<Option<Vec<_>>>();
                match pattern {
                    Some(p) => Some(p),
                    None => return KN_RC_BAD_CON_INDEX,
                }
            }
            Some(_) => return KN_RC_ILLEGAL_CALL,
            None => None,
        };
        match s.callback_mut(cb) {
            Some(record) => {
                record.gradient = Some((
                    GradientLayout {
                        objective,
                        jacobian,
                    },
                    callback,
                ));
                0
            }
            None => KN_RC_BAD_KCPTR,
        }
    }

    unsafe fn set_cb_hess(
        kc: *mut KnContext,
        cb: *mut CbContext,
        hessian: Option<(&[KnInt], &[KnInt])>,
        callback: EvalCallbackFn,
    ) -> c_int {
        let s = session_mut(kc, "KN_set_cb_hess");
        let pattern = match hessian {
            Some((vars1, vars2)) if vars1.len() == vars2.len() => {
                match vars1
                    .iter()
                    .zip(vars2)
                    .map(|(&a, &b)| Some((s.var_position(a)?, s.var_position(b)?)))
                    .collect::<Option<Vec<_>>>()
                {
                    Some(p) => Some(p),
                    None => return BAD_VAR_INDEX,
                }
            }
            Some(_) => return KN_RC_ILLEGAL_CALL,
            None => None,
        };
        match s.callback_mut(cb) {
            Some(record) => {
                record.hessian = Some((pattern, callback));
                0
            }
            None => KN_RC_BAD_KCPTR,
        }
    }

    unsafe fn set_mip_node_callback(
        kc: *mut KnContext,
        callback: UserCallbackFn,
        user_params: *mut c_void,
    ) -> c_int {
        session_mut(kc, "KN_set_mip_node_callback").node_callback = Some((callback, user_params));
        0
    }

    unsafe fn solve(kc: *mut KnContext) -> c_int {
        // The model is a snapshot, callbacks may read the session while it runs.
        let model = Model::capture(session(kc, "KN_solve"));
        if let Some(position) = model.first_inconsistent_bound() {
            warn!(position, "inconsistent bounds, nothing to solve");
            return KN_RC_INFEASIBLE;
        }
        info!(
            engine = Self::NAME,
            variables = model.num_vars(),
            constraints = model.num_cons(),
            callbacks = model.callbacks.len(),
            mixed_integer = model.is_mixed_integer(),
            "solve started"
        );

        let eval = Evaluator::new(&model, kc);
        let (status, solution, mip) = if model.is_mixed_integer() {
            match branch_and_bound(&eval) {
                Ok(outcome) => (outcome.status, outcome.solution, Some(outcome.summary)),
                Err(callback) => (
                    callback.solve_status(),
                    None,
                    Some(MipSummary {
                        incumbent: None,
                        relaxation_bound: -model.sign * f64::INFINITY,
                    }),
                ),
            }
        } else {
            match solve_relaxation(&eval, &model.var_bounds, &model.x0) {
                Ok(relaxation) => (relaxation.status, Some(relaxation.solution), None),
                Err(callback) => (callback.solve_status(), None, None),
            }
        };

        info!(engine = Self::NAME, status, "solve finished");
        let s = session_mut(kc, "KN_solve");
        s.solution = solution;
        s.mip = mip;
        status
    }

    unsafe fn get_number_vars(kc: *mut KnContext, count: &mut KnInt) -> c_int {
        match to_kn_int(session(kc, "KN_get_number_vars").num_vars()) {
            Some(n) => {
                *count = n;
                0
            }
            None => KN_RC_ILLEGAL_CALL,
        }
    }

    unsafe fn get_number_cons(kc: *mut KnContext, count: &mut KnInt) -> c_int {
        match to_kn_int(session(kc, "KN_get_number_cons").num_cons()) {
            Some(n) => {
                *count = n;
                0
            }
            None => KN_RC_ILLEGAL_CALL,
        }
    }

    unsafe fn get_obj_value(kc: *mut KnContext, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_obj_value", value, |_, sol| Some(sol.objective))
    }

    unsafe fn get_var_primal_value(
        kc: *mut KnContext,
        index: KnInt,
        value: &mut c_double,
    ) -> c_int {
        read_solution(kc, "KN_get_var_primal_value", value, |s, sol| {
            s.var_position(index).map(|j| sol.x[j])
        })
    }

    unsafe fn get_var_dual_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_var_dual_value", value, |s, sol| {
            s.var_position(index).map(|j| sol.lambda[s.num_cons() + j])
        })
    }

    unsafe fn get_con_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_con_value", value, |s, sol| {
            s.con_position(index).map(|i| sol.constraint_values[i])
        })
    }

    unsafe fn get_con_dual_value(kc: *mut KnContext, index: KnInt, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_con_dual_value", value, |s, sol| {
            s.con_position(index).map(|i| sol.lambda[i])
        })
    }

    unsafe fn get_abs_feas_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_abs_feas_error", value, |_, sol| {
            Some(sol.abs_feas_error)
        })
    }

    unsafe fn get_rel_feas_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_rel_feas_error", value, |_, sol| {
            Some(sol.rel_feas_error)
        })
    }

    unsafe fn get_abs_opt_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_abs_opt_error", value, |_, sol| {
            Some(sol.abs_opt_error)
        })
    }

    unsafe fn get_rel_opt_error(kc: *mut KnContext, value: &mut c_double) -> c_int {
        read_solution(kc, "KN_get_rel_opt_error", value, |_, sol| {
            Some(sol.rel_opt_error)
        })
    }

    unsafe fn get_mip_incumbent_obj(kc: *mut KnContext, value: &mut c_double) -> c_int {
        match session(kc, "KN_get_mip_incumbent_obj")
            .mip
            .as_ref()
            .and_then(|mip| mip.incumbent.as_ref())
        {
            Some((objective, _)) => {
                *value = *objective;
                0
            }
            None => KN_RC_NO_INCUMBENT,
        }
    }

    unsafe fn get_mip_relaxation_bnd(kc: *mut KnContext, value: &mut c_double) -> c_int {
        match session(kc, "KN_get_mip_relaxation_bnd").mip.as_ref() {
            Some(mip) => {
                *value = mip.relaxation_bound;
                0
            }
            None => KN_RC_ILLEGAL_CALL,
        }
    }

    unsafe fn get_mip_incumbent_x(kc: *mut KnContext, x: &mut [c_double]) -> c_int {
        let s = session(kc, "KN_get_mip_incumbent_x");
        match s.mip.as_ref().and_then(|mip| mip.incumbent.as_ref()) {
            Some((_, point)) if x.len() == point.len() => {
                x.copy_from_slice(point);
                0
            }
            Some(_) => KN_RC_ILLEGAL_CALL,
            None => KN_RC_NO_INCUMBENT,
        }
    }
}
