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

//! Callback registration types, the registry owning the closures, and the
//! thunks the engine calls.

pub(crate) mod registry;
pub mod request;
pub(crate) mod thunk;

use crate::handle::{ConstraintId, VariableId};
use nlbridge_sys::CbContext;
use std::ptr::NonNull;

pub use registry::{EvalClosure, NodeClosure};
pub use request::{packed_upper_index, BufferLayout, EvalRequest, EvalResult, RequestKind};

/// Opaque correlation key the engine returns for a value callback.
///
/// The only use of a token is to attach gradient and Hessian callbacks to
/// the value callback it was returned for.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackToken(NonNull<CbContext>);

impl CallbackToken {
    #[inline]
    pub(crate) fn from_raw(ptr: *mut CbContext) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// The raw engine callback context.
    #[inline]
    pub fn as_ptr(&self) -> *mut CbContext {
        self.0.as_ptr()
    }
}

impl std::fmt::Debug for CallbackToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallbackToken({:p})", self.0)
    }
}

/// Which entries of a derivative a callback fills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sparsity<T> {
    /// Every entry, in the dense order of the buffer.
    Dense,
    /// Exactly the listed entries, in this order.
    Sparse(Vec<T>),
}

impl<T> Default for Sparsity<T> {
    fn default() -> Self {
        Sparsity::Dense
    }
}

impl<T> Sparsity<T> {
    /// Number of buffer entries, `dense_len` for the dense layout.
    #[inline]
    pub fn len_or(&self, dense_len: usize) -> usize {
        match self {
            Sparsity::Dense => dense_len,
            Sparsity::Sparse(entries) => entries.len(),
        }
    }

    #[inline]
    pub fn is_dense(&self) -> bool {
        matches!(self, Sparsity::Dense)
    }
}

/// Layout of the objective gradient and the Jacobian filled by a gradient
/// callback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GradientSparsity {
    pub objective: Sparsity<VariableId>,
    /// `(constraint, variable)` entries over the callback's constraints.
    pub jacobian: Sparsity<(ConstraintId, VariableId)>,
}

impl GradientSparsity {
    /// Dense objective gradient and dense Jacobian.
    #[inline]
    pub fn dense() -> Self {
        Self::default()
    }

    #[inline]
    pub fn sparse(
        objective: Vec<VariableId>,
        jacobian: Vec<(ConstraintId, VariableId)>,
    ) -> Self {
        Self {
            objective: Sparsity::Sparse(objective),
            jacobian: Sparsity::Sparse(jacobian),
        }
    }
}

/// Layout of a Hessian buffer: packed upper triangle when dense, otherwise
/// the listed `(row, column)` pairs with `row <= column`.
pub type HessianSparsity = Sparsity<(VariableId, VariableId)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_token_is_rejected() {
        assert!(CallbackToken::from_raw(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn test_sparsity_lengths() {
        let dense: Sparsity<VariableId> = Sparsity::Dense;
        assert_eq!(dense.len_or(6), 6);
        assert!(dense.is_dense());
        let sparse = Sparsity::Sparse(vec![VariableId::unowned(0), VariableId::unowned(2)]);
        assert_eq!(sparse.len_or(6), 2);
        assert!(GradientSparsity::dense().jacobian.is_dense());
    }
}
