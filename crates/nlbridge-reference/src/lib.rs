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

//! # nlbridge Reference Engine
//!
//! A small in-process engine implementing the `nlbridge_sys::Engine`
//! contract. It exists so that the modeling layer, the callback dispatch
//! protocol and complete solves can be exercised without a proprietary
//! solver library.
//!
//! It is a test double. It is not published and is not part of the modeling
//! layer: `nlbridge` uses it only as a dev-dependency, and nothing in
//! `nlbridge` depends on its numerics. Its solver is simple and
//! makes no claim to robustness or speed on real models.
//!
//! ## Algorithm
//!
//! - Continuous problems are solved by an augmented-Lagrangian method whose
//!   subproblems are minimized with regularized Newton steps and an Armijo
//!   line search (`nlp`).
//! - Problems with integer or binary variables run a depth-first
//!   branch-and-bound over the continuous relaxation (`bnb`), calling the
//!   node callback after every relaxation.
//! - Missing gradient or Hessian callbacks are replaced by forward
//!   differences of the value (resp. gradient) callback.
//!
//! ## Highlights
//!
//! - Evaluation callbacks are invoked through the registered foreign
//!   function pointers and user parameters, honouring dense and sparse
//!   derivative layouts exactly as declared.
//! - Callback context tokens are the addresses of individually boxed
//!   callback records.
//! - Out-of-range indices and calls that need a prior solve return non-zero
//!   statuses. Null session pointers panic.
//!
//! ## Configuration
//!
//! ```rust
//! use nlbridge_reference::{Reference, ReferenceOptions};
//!
//! Reference::set_default_options(
//!     ReferenceOptions::builder()
//!         .optimality_tolerance(1e-8)
//!         .max_nodes(500)
//!         .build(),
//! );
//! assert_eq!(Reference::default_options().max_nodes, 500);
//! # Reference::set_default_options(ReferenceOptions::default());
//! ```

mod bnb;
mod engine;
mod eval;
mod linalg;
mod model;
mod nlp;
mod options;
mod session;

pub use engine::Reference;
pub use options::{ReferenceOptions, ReferenceOptionsBuilder};
