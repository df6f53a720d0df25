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

//! Integer and floating point constants shared with the engine.
//!
//! Status codes follow the engine's banded convention: `0` is optimal, the
//! `-1xx` band is "feasible but tolerances not fully met", `-2xx` is
//! infeasible, `-3xx` unbounded, `-40x` a limit reached at a feasible point,
//! `-41x` a limit reached at an infeasible point, and `-5xx` covers input,
//! callback and internal errors.

use crate::types::KnInt;
use libc::{c_double, c_int};

/// Value used by the engine to encode an absent bound.
pub const KN_INFINITY: c_double = f64::MAX;

// Sparsity sentinels passed in place of an explicit nonzero count.
pub const KN_DENSE: KnInt = -1;
pub const KN_DENSE_ROWMAJOR: KnInt = -2;
pub const KN_DENSE_COLMAJOR: KnInt = -3;

// Objective goal.
pub const KN_OBJGOAL_MINIMIZE: c_int = 0;
pub const KN_OBJGOAL_MAXIMIZE: c_int = 1;

// Variable kinds.
pub const KN_VARTYPE_CONTINUOUS: c_int = 0;
pub const KN_VARTYPE_INTEGER: c_int = 1;
pub const KN_VARTYPE_BINARY: c_int = 2;

// Evaluation request kinds carried in `EvalRequest::type_`.
pub const KN_RC_EVALFC: c_int = 1;
pub const KN_RC_EVALGA: c_int = 2;
pub const KN_RC_EVALH: c_int = 3;
pub const KN_RC_EVALHV: c_int = 7;
pub const KN_RC_EVALH_NO_F: c_int = 8;
pub const KN_RC_EVALHV_NO_F: c_int = 9;
pub const KN_RC_EVALR: c_int = 10;
pub const KN_RC_EVALRJ: c_int = 11;
pub const KN_RC_EVALFCGA: c_int = 12;

// Terminal solve statuses.
pub const KN_RC_OPTIMAL_OR_SATISFACTORY: c_int = 0;
pub const KN_RC_OPTIMAL: c_int = 0;
pub const KN_RC_NEAR_OPT: c_int = -100;
pub const KN_RC_FEAS_XTOL: c_int = -101;
pub const KN_RC_FEAS_NO_IMPROVE: c_int = -102;
pub const KN_RC_FEAS_FTOL: c_int = -103;
pub const KN_RC_INFEASIBLE: c_int = -200;
pub const KN_RC_INFEAS_XTOL: c_int = -201;
pub const KN_RC_INFEAS_NO_IMPROVE: c_int = -202;
pub const KN_RC_UNBOUNDED: c_int = -300;
pub const KN_RC_UNBOUNDED_OR_INFEAS: c_int = -301;
pub const KN_RC_ITER_LIMIT_FEAS: c_int = -400;
pub const KN_RC_TIME_LIMIT_FEAS: c_int = -401;
pub const KN_RC_FEVAL_LIMIT_FEAS: c_int = -402;
pub const KN_RC_MIP_EXH_FEAS: c_int = -403;
pub const KN_RC_MIP_TERM_FEAS: c_int = -404;
pub const KN_RC_MIP_SOLVE_LIMIT_FEAS: c_int = -405;
pub const KN_RC_MIP_NODE_LIMIT_FEAS: c_int = -406;
pub const KN_RC_ITER_LIMIT_INFEAS: c_int = -410;
pub const KN_RC_TIME_LIMIT_INFEAS: c_int = -411;
pub const KN_RC_FEVAL_LIMIT_INFEAS: c_int = -412;
pub const KN_RC_MIP_EXH_INFEAS: c_int = -413;
pub const KN_RC_MIP_SOLVE_LIMIT_INFEAS: c_int = -415;
pub const KN_RC_MIP_NODE_LIMIT_INFEAS: c_int = -416;

// Errors. Evaluation callbacks also return these to the engine.
pub const KN_RC_CALLBACK_ERR: c_int = -500;
pub const KN_RC_EVAL_ERR: c_int = -502;
pub const KN_RC_USER_TERMINATION: c_int = -504;
pub const KN_RC_BAD_CON_INDEX: c_int = -510;
pub const KN_RC_ILLEGAL_CALL: c_int = -515;
pub const KN_RC_BAD_KCPTR: c_int = -516;
pub const KN_RC_NULL_POINTER: c_int = -517;
pub const KN_RC_BAD_N_OR_F: c_int = -526;

/// Positive code returned by `KN_get_mip_incumbent_obj` while no
/// integer-feasible point has been found.
pub const KN_RC_NO_INCUMBENT: c_int = 1;
