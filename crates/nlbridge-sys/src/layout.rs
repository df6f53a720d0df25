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

//! Conversion of Rust slices into the `(count, pointer)` arguments of the
//! engine's C API.

#![cfg_attr(not(feature = "knitro"), allow(dead_code))]

use crate::types::{KnInt, KnLong};

/// Length of `slice` as an engine count, `None` if it does not fit.
#[inline]
pub(crate) fn count<T>(slice: &[T]) -> Option<KnInt> {
    KnInt::try_from(slice.len()).ok()
}

/// Splits an optional slice into the `(count, pointer)` pair the C API
/// expects, using `dense` as the count when no pattern is given.
#[inline]
pub(crate) fn pattern<T>(slice: Option<&[T]>, dense: KnInt) -> Option<(KnInt, *const T)> {
    match slice {
        Some(s) => Some((count(s)?, s.as_ptr())),
        None => Some((dense, std::ptr::null())),
    }
}

/// Like [`pattern`] for coordinate lists given as two parallel slices.
/// Slices of different length are rejected.
#[inline]
pub(crate) fn pair_pattern<T>(
    pairs: Option<(&[T], &[T])>,
    dense: KnInt,
) -> Option<(KnLong, *const T, *const T)> {
    match pairs {
        Some((first, second)) if first.len() == second.len() => {
            let nnz = KnLong::try_from(first.len()).ok()?;
            Some((nnz, first.as_ptr(), second.as_ptr()))
        }
        Some(_) => None,
        None => Some((KnLong::from(dense), std::ptr::null(), std::ptr::null())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{KN_DENSE, KN_DENSE_ROWMAJOR};
    use std::ptr::NonNull;

    /// A slice of `len` zero-sized elements, which occupies no memory.
    fn units(len: usize) -> &'static [()] {
        // SAFETY: zero-sized elements need no backing storage and any
        // length spans zero bytes.
        unsafe { std::slice::from_raw_parts(NonNull::<()>::dangling().as_ptr(), len) }
    }

    #[test]
    fn test_pattern_passes_counts_through() {
        let indices: [KnInt; 3] = [4, 0, 2];
        let (n, ptr) = pattern(Some(&indices[..]), KN_DENSE).unwrap();
        assert_eq!(n, 3);
        assert_eq!(ptr, indices.as_ptr());

        let (n, ptr) = pattern::<KnInt>(None, KN_DENSE).unwrap();
        assert_eq!(n, KN_DENSE);
        assert!(ptr.is_null());
    }

    #[test]
    fn test_oversized_slices_do_not_truncate() {
        let largest = KnInt::MAX as usize;
        assert_eq!(count(units(largest)), Some(KnInt::MAX));
        assert_eq!(count(units(largest + 1)), None);
        assert!(pattern(Some(units(largest + 1)), KN_DENSE).is_none());
        assert!(pattern(Some(units(usize::MAX)), KN_DENSE).is_none());
    }

    #[test]
    fn test_pair_pattern_widens_and_checks_lengths() {
        let rows: [KnInt; 2] = [0, 1];
        let cols: [KnInt; 2] = [1, 1];
        let (nnz, r, c) = pair_pattern(Some((&rows[..], &cols[..])), KN_DENSE).unwrap();
        assert_eq!(nnz, 2);
        assert_eq!((r, c), (rows.as_ptr(), cols.as_ptr()));

        // Wider than the engine's 32-bit counts, still a valid nonzero count.
        let wide = units(KnInt::MAX as usize + 1);
        let (nnz, _, _) = pair_pattern(Some((wide, wide)), KN_DENSE).unwrap();
        assert_eq!(nnz, KnLong::from(KnInt::MAX) + 1);

        assert!(pair_pattern(Some((&rows[..], &cols[..1])), KN_DENSE).is_none());

        let (nnz, r, _) = pair_pattern::<KnInt>(None, KN_DENSE_ROWMAJOR).unwrap();
        assert_eq!(nnz, KnLong::from(KN_DENSE_ROWMAJOR));
        assert!(r.is_null());
    }
}
