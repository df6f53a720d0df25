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

//! # Dispatch Thunks
//!
//! `extern "C"` trampolines handed to the engine in place of the user's
//! closures. The engine calls them with its own session pointer and the
//! `user_params` registered for the callback, which is the address of the
//! callback's registry entry.
//!
//! Every thunk:
//!
//! 1. recovers the entry from `user_params`,
//! 2. wraps the engine session in a non-owning `Context` view,
//! 3. turns the raw request and result records into safe views,
//! 4. runs the closure, converting a panic into `KN_RC_CALLBACK_ERR`,
//! 5. returns the closure's status to the engine unchanged.
//!
//! Panics never unwind into the engine.

use crate::callback::registry::{NodeEntry, ValueEntry};
use crate::callback::request::{read_slice, EvalRequest, EvalResult};
use crate::context::Context;
use libc::{c_double, c_int, c_void};
use nlbridge_sys::constants::KN_RC_CALLBACK_ERR;
use nlbridge_sys::{types, CbContext, Engine, KnContext};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};

/// Which closure of a value entry a thunk serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Value,
    Gradient,
    Hessian,
}

impl Stage {
    #[inline]
    pub(crate) fn name(self) -> &'static str {
        match self {
            Stage::Value => "value",
            Stage::Gradient => "gradient",
            Stage::Hessian => "hessian",
        }
    }
}

pub(crate) unsafe extern "C" fn value_thunk<'cb, E: Engine>(
    kc: *mut KnContext,
    _cb: *mut CbContext,
    request: *const types::EvalRequest,
    result: *mut types::EvalResult,
    user_params: *mut c_void,
) -> c_int {
    dispatch_eval::<E>(Stage::Value, kc, request, result, user_params)
}

pub(crate) unsafe extern "C" fn gradient_thunk<'cb, E: Engine>(
    kc: *mut KnContext,
    _cb: *mut CbContext,
    request: *const types::EvalRequest,
    result: *mut types::EvalResult,
    user_params: *mut c_void,
) -> c_int {
    dispatch_eval::<E>(Stage::Gradient, kc, request, result, user_params)
}

pub(crate) unsafe extern "C" fn hessian_thunk<'cb, E: Engine>(
    kc: *mut KnContext,
    _cb: *mut CbContext,
    request: *const types::EvalRequest,
    result: *mut types::EvalResult,
    user_params: *mut c_void,
) -> c_int {
    dispatch_eval::<E>(Stage::Hessian, kc, request, result, user_params)
}

pub(crate) unsafe extern "C" fn node_thunk<'cb, E: Engine>(
    kc: *mut KnContext,
    x: *const c_double,
    lambda: *const c_double,
    user_params: *mut c_void,
) -> c_int {
    if user_params.is_null() {
        error!(callback = "node", "callback dispatched without user parameters");
        return KN_RC_CALLBACK_ERR;
    }
    // SAFETY: `user_params` is the address of a live `NodeEntry` registered
    // by the context owning this session.
    let entry = &mut *user_params.cast::<NodeEntry<'cb, E>>();
    let view = match Context::<'cb, E>::borrowed(kc, entry.owner) {
        Ok(view) => view,
        Err(err) => {
            error!(callback = "node", %err, "cannot wrap engine session");
            return KN_RC_CALLBACK_ERR;
        }
    };
    let n = view.num_vars();
    let x = read_slice(x, n);
    let lambda = read_slice(lambda, view.num_cons() + n);

    let closure = &mut entry.closure;
    let status = guard("node", || closure(&view, x, lambda));
    if status != 0 {
        warn!(callback = "node", status, "callback returned non-zero status");
        entry.failure.record(status);
    }
    status
}

unsafe fn dispatch_eval<'cb, E: Engine>(
    stage: Stage,
    kc: *mut KnContext,
    request: *const types::EvalRequest,
    result: *mut types::EvalResult,
    user_params: *mut c_void,
) -> c_int {
    if user_params.is_null() || request.is_null() || result.is_null() {
        error!(
            callback = stage.name(),
            "callback dispatched with a null pointer"
        );
        return KN_RC_CALLBACK_ERR;
    }
    // SAFETY: `user_params` is the address of a live `ValueEntry` registered
    // by the context owning this session. The engine calls back on the
    // solving thread only, so no other reference to the entry is active.
    let entry = &mut *user_params.cast::<ValueEntry<'cb, E>>();
    let view = match Context::<'cb, E>::borrowed(kc, entry.owner) {
        Ok(view) => view,
        Err(err) => {
            error!(callback = stage.name(), %err, "cannot wrap engine session");
            return KN_RC_CALLBACK_ERR;
        }
    };
    let layout = entry.layout(stage, view.num_vars(), view.num_cons());
    let request = EvalRequest::from_raw(&*request, &layout);
    let mut result = EvalResult::from_raw(&mut *result, &layout);

    let Some(closure) = entry.closure_mut(stage) else {
        error!(callback = stage.name(), "no closure attached for this stage");
        return KN_RC_CALLBACK_ERR;
    };
    let status = guard(stage.name(), || closure(&view, &request, &mut result));
    if status != 0 {
        warn!(
            callback = stage.name(),
            status, "callback returned non-zero status"
        );
        entry.failure.record(status);
    }
    status
}

/// Runs `f`, turning a panic into `KN_RC_CALLBACK_ERR`.
pub(crate) fn guard(callback: &'static str, f: impl FnOnce() -> c_int) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(payload) => {
            error!(
                callback,
                panic = panic_message(payload.as_ref()),
                "callback panicked"
            );
            KN_RC_CALLBACK_ERR
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_passes_status_through() {
        assert_eq!(guard("value", || 0), 0);
        assert_eq!(guard("value", || -502), -502);
    }

    #[test]
    fn test_guard_catches_panics() {
        assert_eq!(guard("value", || panic!("boom")), KN_RC_CALLBACK_ERR);
        let owned = String::from("owned");
        assert_eq!(
            guard("hessian", move || panic!("{}", owned)),
            KN_RC_CALLBACK_ERR
        );
    }

    #[test]
    fn test_panic_message_reads_common_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(3_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
