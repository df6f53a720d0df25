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

//! # Callback Registry
//!
//! Owns every closure registered with a `Context`.
//!
//! The engine only ever sees a thin pointer to a registry entry (its
//! `user_params`), so entries must never move once registered. Each entry is
//! boxed on its own and the arena only keeps the raw pointers, which keeps
//! addresses stable no matter how many callbacks are registered afterwards.
//! Entries are released together with the registry, which lives exactly as
//! long as the owning context.

use crate::callback::request::{BufferLayout, EvalRequest, EvalResult};
use crate::callback::thunk::Stage;
use crate::callback::{CallbackToken, GradientSparsity, HessianSparsity, Sparsity};
use crate::context::Context;
use crate::handle::{ConstraintId, ContextId};
use libc::c_int;
use nlbridge_sys::Engine;
use rustc_hash::FxHashMap;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

/// An evaluation closure: value, gradient or Hessian.
pub type EvalClosure<'cb, E> =
    dyn FnMut(&Context<'cb, E>, &EvalRequest<'_>, &mut EvalResult<'_>) -> c_int + 'cb;

/// A branch-and-bound node closure receiving the node's primal point and
/// multipliers.
pub type NodeClosure<'cb, E> = dyn FnMut(&Context<'cb, E>, &[f64], &[f64]) -> c_int + 'cb;

/// First non-zero status a closure reported since the last reset.
#[derive(Debug, Clone, Default)]
pub(crate) struct FailureSlot(Rc<Cell<Option<c_int>>>);

impl FailureSlot {
    #[inline]
    pub(crate) fn record(&self, status: c_int) {
        if self.0.get().is_none() {
            self.0.set(Some(status));
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> Option<c_int> {
        self.0.get()
    }

    #[inline]
    pub(crate) fn reset(&self) {
        self.0.set(None);
    }
}

/// A value callback with its optional derivative callbacks.
pub(crate) struct ValueEntry<'cb, E: Engine> {
    pub(crate) evaluates_objective: bool,
    pub(crate) constraints: Vec<ConstraintId>,
    pub(crate) value: Box<EvalClosure<'cb, E>>,
    pub(crate) gradient: Option<(GradientSparsity, Box<EvalClosure<'cb, E>>)>,
    pub(crate) hessian: Option<(HessianSparsity, Box<EvalClosure<'cb, E>>)>,
    pub(crate) owner: ContextId,
    pub(crate) failure: FailureSlot,
}

impl<'cb, E: Engine> ValueEntry<'cb, E> {
    /// Buffer lengths the engine uses for this entry at the given stage.
    pub(crate) fn layout(&self, stage: Stage, num_vars: usize, num_cons: usize) -> BufferLayout {
        let k = self.constraints.len();
        let mut layout = BufferLayout {
            num_vars,
            num_cons,
            callback_cons: k,
            evaluates_objective: self.evaluates_objective,
            ..BufferLayout::default()
        };
        match stage {
            Stage::Value => {}
            Stage::Gradient => {
                if let Some((sparsity, _)) = &self.gradient {
                    layout.objective_gradient = match &sparsity.objective {
                        Sparsity::Sparse(vars) => vars.len(),
                        Sparsity::Dense if self.evaluates_objective => num_vars,
                        Sparsity::Dense => 0,
                    };
                    layout.jacobian = sparsity.jacobian.len_or(k * num_vars);
                }
            }
            Stage::Hessian => {
                if let Some((sparsity, _)) = &self.hessian {
                    layout.hessian = sparsity.len_or(num_vars * (num_vars + 1) / 2);
                }
            }
        }
        layout
    }

    /// The closure serving `stage`, if one is attached.
    pub(crate) fn closure_mut(&mut self, stage: Stage) -> Option<&mut Box<EvalClosure<'cb, E>>> {
        match stage {
            Stage::Value => Some(&mut self.value),
            Stage::Gradient => self.gradient.as_mut().map(|(_, c)| c),
            Stage::Hessian => self.hessian.as_mut().map(|(_, c)| c),
        }
    }
}

pub(crate) struct NodeEntry<'cb, E: Engine> {
    pub(crate) closure: Box<NodeClosure<'cb, E>>,
    pub(crate) owner: ContextId,
    pub(crate) failure: FailureSlot,
}

/// Individually boxed values whose addresses never change.
pub(crate) struct StableArena<T> {
    entries: Vec<NonNull<T>>,
}

impl<T> StableArena<T> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Moves `value` to its own allocation and returns its address.
    pub(crate) fn push(&mut self, value: T) -> NonNull<T> {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        self.entries.push(ptr);
        ptr
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<T> Drop for StableArena<T> {
    fn drop(&mut self) {
        for ptr in self.entries.drain(..) {
            // SAFETY: every pointer came from `Box::leak` in `push` and is
            // released exactly once, here.
            unsafe { drop(Box::from_raw(ptr.as_ptr())) };
        }
    }
}

pub(crate) struct Registry<'cb, E: Engine> {
    owner: ContextId,
    values: StableArena<ValueEntry<'cb, E>>,
    nodes: StableArena<NodeEntry<'cb, E>>,
    by_token: FxHashMap<CallbackToken, NonNull<ValueEntry<'cb, E>>>,
    failure: FailureSlot,
}

impl<'cb, E: Engine> Registry<'cb, E> {
    pub(crate) fn new(owner: ContextId) -> Self {
        Self {
            owner,
            values: StableArena::new(),
            nodes: StableArena::new(),
            by_token: FxHashMap::default(),
            failure: FailureSlot::default(),
        }
    }

    /// Stores a value entry. It is not reachable by token until `bind`.
    #[inline]
    pub(crate) fn insert_value(
        &mut self,
        evaluates_objective: bool,
        constraints: Vec<ConstraintId>,
        value: Box<EvalClosure<'cb, E>>,
    ) -> NonNull<ValueEntry<'cb, E>> {
        let failure = self.failure.clone();
        self.values.push(ValueEntry {
            evaluates_objective,
            constraints,
            value,
            gradient: None,
            hessian: None,
            owner: self.owner,
            failure,
        })
    }

    #[inline]
    pub(crate) fn bind(&mut self, token: CallbackToken, entry: NonNull<ValueEntry<'cb, E>>) {
        self.by_token.insert(token, entry);
    }

    #[inline]
    pub(crate) fn insert_node(
        &mut self,
        closure: Box<NodeClosure<'cb, E>>,
    ) -> NonNull<NodeEntry<'cb, E>> {
        let failure = self.failure.clone();
        self.nodes.push(NodeEntry {
            closure,
            owner: self.owner,
            failure,
        })
    }

    #[inline]
    pub(crate) fn contains(&self, token: CallbackToken) -> bool {
        self.by_token.contains_key(&token)
    }

    pub(crate) fn entry(&self, token: CallbackToken) -> Option<&ValueEntry<'cb, E>> {
        // SAFETY: bound pointers point into `self.values`, which outlives the
        // returned borrow. No closure runs while the registry is borrowed.
        self.by_token.get(&token).map(|ptr| unsafe { ptr.as_ref() })
    }

    pub(crate) fn entry_mut(&mut self, token: CallbackToken) -> Option<&mut ValueEntry<'cb, E>> {
        // SAFETY: as in `entry`, and `&mut self` rules out other borrows.
        self.by_token
            .get(&token)
            .map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    #[inline]
    pub(crate) fn failure(&self) -> &FailureSlot {
        &self.failure
    }

    /// Number of value callbacks reachable by token.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.by_token.len()
    }

    #[inline]
    pub(crate) fn num_node_callbacks(&self) -> usize {
        self.nodes.len()
    }
}
