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

//! # nlbridge
//!
//! **Handle-based problem builder and callback dispatch for Knitro-style
//! nonlinear optimization engines.**
//!
//! The crate lets application code build a nonlinear (optionally
//! mixed-integer) problem incrementally, hand it to an engine, and read the
//! results back. The engine itself is a black box reached through the
//! [`Engine`] trait of `nlbridge-sys`.
//!
//! ## Building blocks
//!
//! - `handle`: `VariableId`/`ConstraintId` and the allocator issuing them
//!   in creation order.
//! - `terms`: the Structural Term Store mirroring every linear and quadratic
//!   coefficient handed to the engine, with accumulation.
//! - `callback`: registration types, the registry owning the closures at
//!   stable addresses, safe request/result views, and the `extern "C"`
//!   thunks the engine calls.
//! - `context`: the `Context` façade tying it together.
//! - `status`: classification of terminal engine codes.
//!
//! ## Callback protocol
//!
//! Closures are registered with a `Context` and owned by it until it is
//! dropped. The engine calls a thunk with the address of the closure's
//! registry entry. The thunk wraps the engine session in a non-owning
//! `Context` view, runs the closure, and returns its status to the engine
//! unchanged. A panicking closure is reported as `KN_RC_CALLBACK_ERR`.
//!
//! ## Example
//!
//! ```rust
//! use nlbridge::{Context, ObjectiveGoal};
//! use nlbridge_reference::Reference;
//!
//! # fn main() -> nlbridge::Result<()> {
//! // maximize -(x - 1)^2 + 3 over 0 <= x <= 4
//! let mut ctx = Context::<Reference>::new()?;
//! let x = ctx.add_var()?;
//! ctx.set_var_bnds(x, 0.0, 4.0)?;
//! ctx.set_obj_goal(ObjectiveGoal::Maximize)?;
//! ctx.register_value_callback(true, &[], |_, request, result| {
//!     let v = request.x()[0];
//!     result.set_objective(-(v - 1.0) * (v - 1.0) + 3.0);
//!     0
//! })?;
//!
//! let status = ctx.solve()?;
//! assert!(status.is_optimal());
//! assert!((ctx.get_obj_value()? - 3.0).abs() < 1e-6);
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod context;
pub mod error;
pub mod handle;
pub mod status;
pub mod terms;
pub mod types;

pub use callback::{
    CallbackToken, EvalRequest, EvalResult, GradientSparsity, HessianSparsity, RequestKind,
    Sparsity,
};
pub use context::Context;
pub use error::{Error, HandleKind, Result};
pub use handle::{ConstraintId, ContextId, Handle, VariableId};
pub use nlbridge_sys::constants;
pub use nlbridge_sys::Engine;
pub use status::{SolveClass, SolveStatus};
pub use terms::{LinearTerm, QuadraticTerm, StructuralTermStore, TermOwner};
pub use types::{ObjectiveGoal, VariableType};
