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

//! # nlbridge sys
//!
//! **Raw C ABI surface of a Knitro-style nonlinear optimization engine.**
//!
//! The crate has three layers:
//!
//! 1.  `types` and `constants`: `#[repr(C)]` mirrors of the engine's opaque
//!     session handles, evaluation request/result records, callback function
//!     pointer types, and the integer constants that travel across the
//!     boundary (status codes, sparsity sentinels, goals, variable kinds).
//! 2.  `engine`: the [`Engine`] trait, one associated function per engine
//!     entry point. The safe wrapper crate is generic over it, so the same
//!     wrapper drives the native library or an in-process implementation.
//! 3.  `knitro` (feature `knitro`): the `extern "C"` declarations of the real
//!     shared library and the `Knitro` engine built on them.
//!
//! Nothing in this crate allocates or validates, apart from refusing slice
//! lengths that do not fit the engine's integer types. All functions taking
//! a session pointer are `unsafe` and expect a pointer obtained from the
//! same engine's `new`.

pub mod constants;
pub mod engine;
#[cfg(feature = "knitro")]
pub mod knitro;
mod layout;
pub mod types;

pub use engine::Engine;
#[cfg(feature = "knitro")]
pub use knitro::Knitro;
pub use types::{
    CbContext, EvalCallbackFn, EvalRequest, EvalResult, KnBool, KnContext, KnInt, KnLong,
    UserCallbackFn,
};
