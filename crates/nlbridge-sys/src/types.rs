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

//! `#[repr(C)]` mirrors of the engine's boundary types.

use libc::{c_double, c_int, c_longlong, c_void};
use std::marker::{PhantomData, PhantomPinned};

/// Engine integer used for indices and counts (`KNINT`).
pub type KnInt = c_int;
/// Engine wide integer (`KNLONG`).
pub type KnLong = c_longlong;
/// Engine boolean (`KNBOOL`), zero is false.
pub type KnBool = c_int;

/// Opaque engine session (`KN_context`).
///
/// Only ever handled through raw pointers.
#[repr(C)]
pub struct KnContext {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// Opaque per-callback record (`CB_context`) created by the engine when an
/// evaluation callback is registered. Its address identifies the
/// registration in every later call.
#[repr(C)]
pub struct CbContext {
    _data: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// What the engine asks an evaluation callback to compute.
///
/// `lambda` holds one multiplier per constraint followed by one per
/// variable. `sigma` scales the objective part of a Hessian request.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EvalRequest {
    pub type_: c_int,
    pub thread_id: c_int,
    pub x: *const c_double,
    pub lambda: *const c_double,
    pub sigma: *const c_double,
    pub vec: *const c_double,
}

/// Output buffers an evaluation callback writes into.
///
/// Pointers the current request does not use may be null.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct EvalResult {
    pub obj: *mut c_double,
    pub c: *mut c_double,
    pub obj_grad: *mut c_double,
    pub jac: *mut c_double,
    pub hess: *mut c_double,
    pub hess_vec: *mut c_double,
    pub rsd: *mut c_double,
    pub rsd_jac: *mut c_double,
}

impl EvalResult {
    /// A result record with every buffer unset.
    pub const fn null() -> Self {
        Self {
            obj: std::ptr::null_mut(),
            c: std::ptr::null_mut(),
            obj_grad: std::ptr::null_mut(),
            jac: std::ptr::null_mut(),
            hess: std::ptr::null_mut(),
            hess_vec: std::ptr::null_mut(),
            rsd: std::ptr::null_mut(),
            rsd_jac: std::ptr::null_mut(),
        }
    }
}

/// Evaluation callback (`KN_eval_callback`).
pub type EvalCallbackFn = unsafe extern "C" fn(
    kc: *mut KnContext,
    cb: *mut CbContext,
    request: *const EvalRequest,
    result: *mut EvalResult,
    user_params: *mut c_void,
) -> c_int;

/// Plain user callback (`KN_user_callback`), used for MIP node notifications.
pub type UserCallbackFn = unsafe extern "C" fn(
    kc: *mut KnContext,
    x: *const c_double,
    lambda: *const c_double,
    user_params: *mut c_void,
) -> c_int;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_match_c() {
        let ptr = std::mem::size_of::<*const c_double>();
        assert_eq!(std::mem::size_of::<EvalResult>(), 8 * ptr);
        assert_eq!(std::mem::size_of::<EvalRequest>(), 8 + 4 * ptr);
        assert_eq!(std::mem::size_of::<KnContext>(), 0);
    }

    #[test]
    fn test_null_result_has_no_buffers() {
        let r = EvalResult::null();
        assert!(r.obj.is_null());
        assert!(r.hess_vec.is_null());
        assert!(r.rsd_jac.is_null());
    }
}
