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

//! Handles for variables and constraints, and the allocator issuing them.
//!
//! Handles are issued in creation order starting at zero and are never
//! reused. Every `Context` is stamped with a process-unique `ContextId`
//! that its handles carry, so a handle issued by one context is rejected by
//! every other context even when its index is in range.

use nlbridge_core::utils::index::{TypedIndex, TypedIndexTag};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VariableTag;

impl TypedIndexTag for VariableTag {
    const NAME: &'static str = "VariableId";
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ConstraintTag;

impl TypedIndexTag for ConstraintTag {
    const NAME: &'static str = "ConstraintId";
}

/// Identity of the `Context` that issued a handle.
///
/// A borrowed view passed into a callback carries the identity of the
/// context owning the session, so handles captured by closures stay valid
/// inside them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ContextId(pub(crate) u64);

// Zero is never issued.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ContextId {
    /// Returns an identity no other context of this process has.
    #[inline]
    pub(crate) fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// An index of kind `T` stamped with the context that issued it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle<T> {
    context: ContextId,
    index: TypedIndex<T>,
}

impl<T> Handle<T> {
    #[inline]
    pub(crate) const fn new(context: ContextId, index: usize) -> Self {
        Self {
            context,
            index: TypedIndex::new(index),
        }
    }

    /// Position of the handle in creation order.
    #[inline]
    pub fn get(&self) -> usize {
        self.index.get()
    }

    /// The context that issued this handle.
    #[inline]
    pub fn context(&self) -> ContextId {
        self.context
    }

    #[inline]
    pub fn index(&self) -> TypedIndex<T> {
        TypedIndex::new(self.index.get())
    }

    /// The signed 32-bit index the engine uses, if it fits.
    #[inline]
    pub fn to_raw(&self) -> Option<i32> {
        self.index.to_raw()
    }
}

impl<T: TypedIndexTag> std::fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index)
    }
}

impl<T: TypedIndexTag> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.index, self.context)
    }
}

/// Handle of a decision variable.
pub type VariableId = Handle<VariableTag>;

/// Handle of a constraint.
pub type ConstraintId = Handle<ConstraintTag>;

/// Issues strictly increasing handles of one kind for one context.
#[derive(Debug, Clone)]
pub struct HandleAllocator<T> {
    owner: ContextId,
    issued: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> HandleAllocator<T> {
    /// Creates an allocator for `owner` that already issued `0..issued`.
    #[inline]
    pub(crate) const fn with_issued(owner: ContextId, issued: usize) -> Self {
        Self {
            owner,
            issued,
            _marker: std::marker::PhantomData,
        }
    }

    /// Issues the next handle.
    #[inline]
    pub fn allocate(&mut self) -> Handle<T> {
        let id = Handle::new(self.owner, self.issued);
        self.issued += 1;
        id
    }

    /// Returns the number of handles issued so far.
    #[inline]
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Returns `true` if `id` was issued by this allocator.
    #[inline]
    pub fn contains(&self, id: Handle<T>) -> bool {
        id.context == self.owner && id.get() < self.issued
    }

    /// Iterates over all handles issued so far, in creation order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Handle<T>> {
        let owner = self.owner;
        (0..self.issued).map(move |i| Handle::new(owner, i))
    }
}

#[cfg(test)]
impl<T> Handle<T> {
    /// A handle no context issued, for tests of context-free structures.
    pub(crate) const fn unowned(index: usize) -> Self {
        Self::new(ContextId(0), index)
    }
}
