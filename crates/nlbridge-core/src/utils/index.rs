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

//! # Strongly Typed Handles
//!
//! Phantom-typed wrappers around `usize` that keep indices from different
//! handle spaces apart (variables vs. constraints). A `TypedIndex<T>` carries
//! a tag type `T: TypedIndexTag` naming its space, and compiles down to a
//! transparent `usize`.
//!
//! ## Motivation
//!
//! A nonlinear problem session hands out two independent counters, one for
//! variables and one for constraints, both starting at zero. Passing a raw
//! integer to an operation that expects the other kind compiles fine and
//! silently addresses the wrong entity. Tagged handles turn that mistake into
//! a type error.
//!
//! ## Highlights
//!
//! - `TypedIndexTag` defines a human-readable `NAME` used for `Display`/`Debug`.
//! - `TypedIndex<T>` offers `new`, `get`, and `next` for monotonic issuance.
//! - `to_raw`/`try_from_raw` convert from and to the signed 32-bit indices
//!   native engines expect, rejecting values that do not fit.
//! - Zero-cost: `#[repr(transparent)]` over `usize`.
//!
//! ## Usage
//!
//! ```rust
//! use nlbridge_core::utils::index::{TypedIndex, TypedIndexTag};
//!
//! #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
//! struct VariableTag;
//! impl TypedIndexTag for VariableTag { const NAME: &'static str = "VariableId"; }
//!
//! type VariableId = TypedIndex<VariableTag>;
//! let v = VariableId::new(3);
//! assert_eq!(v.get(), 3);
//! assert_eq!(v.to_raw(), Some(3));
//! assert_eq!(format!("{}", v), "VariableId(3)");
//! ```

/// A trait to tag typed indices with a name for debugging and display purposes.
pub trait TypedIndexTag: Clone {
    const NAME: &'static str;
}

/// A strongly typed index that is associated with a specific tag type `T`.
///
/// # Examples
///
/// ```rust
/// # use nlbridge_core::utils::index::{TypedIndex, TypedIndexTag};
///
/// #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
/// struct RowTag;
///
/// impl TypedIndexTag for RowTag {
///    const NAME: &'static str = "Row";
/// }
///
/// type Row = TypedIndex<RowTag>;
///
/// let row = Row::new(5);
/// assert_eq!(row.next().get(), 6);
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedIndex<T> {
    index: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T> TypedIndex<T> {
    /// Creates a new `TypedIndex` with the given `usize` index.
    #[inline(always)]
    pub const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: std::marker::PhantomData,
        }
    }

    /// Returns the underlying `usize` index.
    #[inline(always)]
    pub const fn get(&self) -> usize {
        self.index
    }

    /// Returns the index that is issued right after this one.
    #[inline(always)]
    pub const fn next(&self) -> Self {
        Self::new(self.index + 1)
    }

    /// Converts the index into the signed 32-bit form used by native engines.
    ///
    /// Returns `None` if the index does not fit into an `i32`.
    #[inline]
    pub fn to_raw(&self) -> Option<i32> {
        i32::try_from(self.index).ok()
    }

    /// Builds an index from the signed 32-bit form used by native engines.
    ///
    /// Returns `None` for negative values.
    ///
    /// ```rust
    /// # use nlbridge_core::utils::index::{TypedIndex, TypedIndexTag};
    /// # #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    /// # struct RowTag;
    /// # impl TypedIndexTag for RowTag { const NAME: &'static str = "Row"; }
    /// assert!(TypedIndex::<RowTag>::try_from_raw(-1).is_none());
    /// assert_eq!(TypedIndex::<RowTag>::try_from_raw(4).map(|r| r.get()), Some(4));
    /// ```
    #[inline]
    pub fn try_from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().map(Self::new)
    }
}

impl<T> std::fmt::Debug for TypedIndex<T>
where
    T: TypedIndexTag,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", T::NAME, self.index)
    }
}

impl<T> std::fmt::Display for TypedIndex<T>
where
    T: TypedIndexTag,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", T::NAME, self.index)
    }
}

impl<T> From<usize> for TypedIndex<T> {
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

impl<T> From<TypedIndex<T>> for usize {
    fn from(typed_index: TypedIndex<T>) -> Self {
        typed_index.index
    }
}
