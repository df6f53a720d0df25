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

//! Tuning knobs of the reference engine.
//!
//! Options are captured by a session when it is created. The defaults for
//! new sessions live in a thread-local slot that `Reference::set_default_options`
//! overwrites, so tests running on different threads do not interfere.

use std::cell::RefCell;

/// Numerical settings of the reference engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOptions {
    /// Largest acceptable bound violation, scaled by `max(1, |bound|)`.
    pub feasibility_tolerance: f64,
    /// Largest acceptable Lagrangian gradient, scaled by `max(1, |grad f|)`.
    pub optimality_tolerance: f64,
    /// Multiplier updates before giving up.
    pub max_outer_iterations: usize,
    /// Newton steps per multiplier update.
    pub max_inner_iterations: usize,
    pub initial_penalty: f64,
    /// Factor applied to the penalty when the violation did not shrink enough.
    pub penalty_growth: f64,
    pub max_penalty: f64,
    /// Relative step of forward differences used when no derivative callback is attached.
    pub finite_difference_step: f64,
    /// Branch-and-bound nodes before the search stops with a node-limit status.
    pub max_nodes: u64,
    /// Distance to the nearest integer below which a value counts as integral.
    pub integrality_tolerance: f64,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        ReferenceOptionsBuilder::new().build()
    }
}

impl ReferenceOptions {
    /// Creates a new `ReferenceOptionsBuilder` with default values.
    #[inline]
    pub fn builder() -> ReferenceOptionsBuilder {
        ReferenceOptionsBuilder::new()
    }
}

impl std::fmt::Display for ReferenceOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reference Engine Options:")?;
        writeln!(f, "  Feasibility Tolerance: {:e}", self.feasibility_tolerance)?;
        writeln!(f, "  Optimality Tolerance: {:e}", self.optimality_tolerance)?;
        writeln!(f, "  Outer Iterations: {}", self.max_outer_iterations)?;
        writeln!(f, "  Inner Iterations: {}", self.max_inner_iterations)?;
        writeln!(
            f,
            "  Penalty: {} (x{} up to {:e})",
            self.initial_penalty, self.penalty_growth, self.max_penalty
        )?;
        writeln!(f, "  Finite Difference Step: {:e}", self.finite_difference_step)?;
        writeln!(f, "  Node Limit: {}", self.max_nodes)?;
        writeln!(f, "  Integrality Tolerance: {:e}", self.integrality_tolerance)
    }
}

/// Builder for `ReferenceOptions`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceOptionsBuilder {
    options: ReferenceOptions,
}

impl Default for ReferenceOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceOptionsBuilder {
    /// Creates a new `ReferenceOptionsBuilder` with default values.
    #[inline]
    pub fn new() -> Self {
        Self {
            options: ReferenceOptions {
                feasibility_tolerance: 1e-8,
                optimality_tolerance: 1e-6,
                max_outer_iterations: 100,
                max_inner_iterations: 200,
                initial_penalty: 10.0,
                penalty_growth: 10.0,
                max_penalty: 1e12,
                finite_difference_step: 1e-7,
                max_nodes: 10_000,
                integrality_tolerance: 1e-6,
            },
        }
    }

    #[inline]
    pub fn feasibility_tolerance(mut self, value: f64) -> Self {
        self.options.feasibility_tolerance = value;
        self
    }

    #[inline]
    pub fn optimality_tolerance(mut self, value: f64) -> Self {
        self.options.optimality_tolerance = value;
        self
    }

    #[inline]
    pub fn max_outer_iterations(mut self, value: usize) -> Self {
        self.options.max_outer_iterations = value;
        self
    }

    #[inline]
    pub fn max_inner_iterations(mut self, value: usize) -> Self {
        self.options.max_inner_iterations = value;
        self
    }

    #[inline]
    pub fn initial_penalty(mut self, value: f64) -> Self {
        self.options.initial_penalty = value;
        self
    }

    #[inline]
    pub fn penalty_growth(mut self, value: f64) -> Self {
        self.options.penalty_growth = value;
        self
    }

    #[inline]
    pub fn max_penalty(mut self, value: f64) -> Self {
        self.options.max_penalty = value;
        self
    }

    #[inline]
    pub fn finite_difference_step(mut self, value: f64) -> Self {
        self.options.finite_difference_step = value;
        self
    }

    #[inline]
    pub fn max_nodes(mut self, value: u64) -> Self {
        self.options.max_nodes = value;
        self
    }

    #[inline]
    pub fn integrality_tolerance(mut self, value: f64) -> Self {
        self.options.integrality_tolerance = value;
        self
    }

    /// Builds the `ReferenceOptions` instance.
    #[inline]
    pub fn build(self) -> ReferenceOptions {
        self.options
    }
}

thread_local! {
    static DEFAULT_OPTIONS: RefCell<ReferenceOptions> = RefCell::new(ReferenceOptions::default());
}

pub(crate) fn default_options() -> ReferenceOptions {
    DEFAULT_OPTIONS.with(|slot| slot.borrow().clone())
}

pub(crate) fn set_default_options(options: ReferenceOptions) {
    DEFAULT_OPTIONS.with(|slot| *slot.borrow_mut() = options);
}
