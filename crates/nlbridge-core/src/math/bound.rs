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

use num_traits::Float;

/// Returns `true` if `value` stands for an absent bound.
///
/// Both IEEE infinities and the largest finite value count as unbounded,
/// since native engines commonly encode infinity as `DBL_MAX`.
#[inline]
pub fn is_unbounded_value<T>(value: T) -> bool
where
    T: Float,
{
    value.is_infinite() || value.abs() >= T::max_value()
}

/// A closed interval `[lower, upper]` describing the admissible range of a
/// variable or constraint body.
///
/// Either side may be unbounded. A default `Bound` is `(-inf, +inf)`.
/// Unlike a mathematical interval, a `Bound` may be constructed in an
/// inconsistent state (`lower > upper`) through `from_parts`, because
/// problem builders set the two sides independently. `is_consistent`
/// reports whether the pair is usable.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct Bound<T>
where
    T: Float,
{
    lower: T,
    upper: T,
}

impl<T> Default for Bound<T>
where
    T: Float,
{
    #[inline]
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> Bound<T>
where
    T: Float,
{
    /// Creates the unbounded interval `(-inf, +inf)`.
    #[inline]
    pub fn unbounded() -> Self {
        Self {
            lower: T::neg_infinity(),
            upper: T::infinity(),
        }
    }

    /// Creates a new `Bound`.
    ///
    /// # Panics
    ///
    /// Panics if `lower > upper` or either side is NaN.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use nlbridge_core::math::bound::Bound;
    /// let b = Bound::new(0.0, 1.0);
    /// assert!(b.contains(0.5));
    /// ```
    #[inline]
    pub fn new(lower: T, upper: T) -> Self {
        assert!(
            lower <= upper,
            "Invalid bound: lower must be less than or equal to upper"
        );
        Self { lower, upper }
    }

    /// Creates a new `Bound` if `lower <= upper`.
    ///
    /// ```rust
    /// # use nlbridge_core::math::bound::Bound;
    /// assert!(Bound::try_new(0.0, 1.0).is_some());
    /// assert!(Bound::try_new(2.0, 1.0).is_none());
    /// assert!(Bound::try_new(f64::NAN, 1.0).is_none());
    /// ```
    #[inline]
    pub fn try_new(lower: T, upper: T) -> Option<Self> {
        if lower <= upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// Creates a `Bound` from two independently set sides without checking them.
    #[inline]
    pub fn from_parts(lower: T, upper: T) -> Self {
        Self { lower, upper }
    }

    /// Creates the degenerate interval `[value, value]`.
    #[inline]
    pub fn fixed(value: T) -> Self {
        Self {
            lower: value,
            upper: value,
        }
    }

    #[inline]
    pub fn lower(&self) -> T {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> T {
        self.upper
    }

    /// Returns a copy with the lower side replaced.
    #[inline]
    pub fn with_lower(self, lower: T) -> Self {
        Self { lower, ..self }
    }

    /// Returns a copy with the upper side replaced.
    #[inline]
    pub fn with_upper(self, upper: T) -> Self {
        Self { upper, ..self }
    }

    #[inline]
    pub fn has_lower(&self) -> bool {
        !is_unbounded_value(self.lower)
    }

    #[inline]
    pub fn has_upper(&self) -> bool {
        !is_unbounded_value(self.upper)
    }

    /// Returns `true` if both sides coincide.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    /// Returns `true` if `lower <= upper`. NaN on either side is inconsistent.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.lower <= self.upper
    }

    /// Returns `true` if `value` lies inside the interval.
    #[inline]
    pub fn contains(&self, value: T) -> bool {
        (!self.has_lower() || value >= self.lower) && (!self.has_upper() || value <= self.upper)
    }

    /// Returns by how much `value` violates the interval, or zero if it lies inside.
    ///
    /// ```rust
    /// # use nlbridge_core::math::bound::Bound;
    /// let b = Bound::new(1.0, 2.0);
    /// assert_eq!(b.violation(0.25), 0.75);
    /// assert_eq!(b.violation(1.5), 0.0);
    /// assert_eq!(b.violation(3.0), 1.0);
    /// ```
    #[inline]
    pub fn violation(&self, value: T) -> T {
        let below = if self.has_lower() {
            self.lower - value
        } else {
            T::zero()
        };
        let above = if self.has_upper() {
            value - self.upper
        } else {
            T::zero()
        };
        below.max(above).max(T::zero())
    }

    /// Clamps `value` into the interval, ignoring unbounded sides.
    #[inline]
    pub fn clamp(&self, value: T) -> T {
        let mut v = value;
        if self.has_lower() && v < self.lower {
            v = self.lower;
        }
        if self.has_upper() && v > self.upper {
            v = self.upper;
        }
        v
    }

    /// Returns the intersection of two bounds, or `None` if it is empty.
    #[inline]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        Self::try_new(self.lower.max(other.lower), self.upper.min(other.upper))
    }
}

impl<T> std::fmt::Debug for Bound<T>
where
    T: Float + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bound[{:?}, {:?}]", self.lower, self.upper)
    }
}

impl<T> std::fmt::Display for Bound<T>
where
    T: Float + std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
