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

//! # Structural Term Store
//!
//! Records the linear and quadratic coefficients a `Context` handed to the
//! engine, so the assembled polynomial structure can be inspected without a
//! round trip through the engine.
//!
//! Terms accumulate: adding a term whose owner and operands match an earlier
//! one adds to its coefficient instead of creating a second entry. Entries
//! keep the order in which their operands were first seen.
//!
//! Quadratic terms are stored exactly as given. The pair `(a, b)` with
//! `a != b` denotes the single cross term `coef * x_a * x_b`, and it is a
//! different entry than `(b, a)`. No symmetrization or halving happens here.

use crate::handle::{ConstraintId, VariableId};
use rustc_hash::FxHashMap;

/// The function a structural term contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermOwner {
    Objective,
    Constraint(ConstraintId),
}

impl std::fmt::Display for TermOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TermOwner::Objective => write!(f, "objective"),
            TermOwner::Constraint(c) => write!(f, "{}", c),
        }
    }
}

/// `coefficient * x[variable]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTerm {
    pub owner: TermOwner,
    pub variable: VariableId,
    pub coefficient: f64,
}

/// `coefficient * x[first] * x[second]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraticTerm {
    pub owner: TermOwner,
    pub first: VariableId,
    pub second: VariableId,
    pub coefficient: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StructuralTermStore {
    linear: Vec<LinearTerm>,
    linear_slots: FxHashMap<(TermOwner, VariableId), usize>,
    quadratic: Vec<QuadraticTerm>,
    quadratic_slots: FxHashMap<(TermOwner, VariableId, VariableId), usize>,
}

impl StructuralTermStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coefficient * x[variable]` to `owner`.
    pub fn add_linear(&mut self, owner: TermOwner, variable: VariableId, coefficient: f64) {
        match self.linear_slots.get(&(owner, variable)) {
            Some(&slot) => self.linear[slot].coefficient += coefficient,
            None => {
                self.linear_slots.insert((owner, variable), self.linear.len());
                self.linear.push(LinearTerm {
                    owner,
                    variable,
                    coefficient,
                });
            }
        }
    }

    /// Adds `coefficient * x[first] * x[second]` to `owner`.
    pub fn add_quadratic(
        &mut self,
        owner: TermOwner,
        first: VariableId,
        second: VariableId,
        coefficient: f64,
    ) {
        match self.quadratic_slots.get(&(owner, first, second)) {
            Some(&slot) => self.quadratic[slot].coefficient += coefficient,
            None => {
                self.quadratic_slots
                    .insert((owner, first, second), self.quadratic.len());
                self.quadratic.push(QuadraticTerm {
                    owner,
                    first,
                    second,
                    coefficient,
                });
            }
        }
    }

    /// Accumulated linear coefficient, zero if no such term was added.
    pub fn linear_coefficient(&self, owner: TermOwner, variable: VariableId) -> f64 {
        self.linear_slots
            .get(&(owner, variable))
            .map_or(0.0, |&slot| self.linear[slot].coefficient)
    }

    /// Accumulated quadratic coefficient of the ordered pair, zero if no
    /// such term was added.
    pub fn quadratic_coefficient(
        &self,
        owner: TermOwner,
        first: VariableId,
        second: VariableId,
    ) -> f64 {
        self.quadratic_slots
            .get(&(owner, first, second))
            .map_or(0.0, |&slot| self.quadratic[slot].coefficient)
    }

    #[inline]
    pub fn linear_terms(&self) -> impl Iterator<Item = &LinearTerm> {
        self.linear.iter()
    }

    #[inline]
    pub fn quadratic_terms(&self) -> impl Iterator<Item = &QuadraticTerm> {
        self.quadratic.iter()
    }

    /// Linear terms of one owner.
    pub fn linear_terms_of(&self, owner: TermOwner) -> impl Iterator<Item = &LinearTerm> {
        self.linear.iter().filter(move |t| t.owner == owner)
    }

    /// Quadratic terms of one owner.
    pub fn quadratic_terms_of(&self, owner: TermOwner) -> impl Iterator<Item = &QuadraticTerm> {
        self.quadratic.iter().filter(move |t| t.owner == owner)
    }

    #[inline]
    pub fn num_linear(&self) -> usize {
        self.linear.len()
    }

    #[inline]
    pub fn num_quadratic(&self) -> usize {
        self.quadratic.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.linear.is_empty() && self.quadratic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: usize) -> VariableId {
        VariableId::unowned(i)
    }

    #[test]
    fn test_linear_terms_accumulate() {
        let mut store = StructuralTermStore::new();
        store.add_linear(TermOwner::Objective, x(0), 1.5);
        store.add_linear(TermOwner::Objective, x(0), 2.5);
        assert_eq!(store.num_linear(), 1);
        assert_eq!(store.linear_coefficient(TermOwner::Objective, x(0)), 4.0);
    }

    #[test]
    fn test_owners_are_kept_apart() {
        let mut store = StructuralTermStore::new();
        let c = TermOwner::Constraint(ConstraintId::unowned(0));
        store.add_linear(TermOwner::Objective, x(1), 1.0);
        store.add_linear(c, x(1), -3.0);
        assert_eq!(store.linear_coefficient(c, x(1)), -3.0);
        assert_eq!(store.linear_terms_of(c).count(), 1);
        assert_eq!(store.linear_coefficient(c, x(0)), 0.0);
    }

    #[test]
    fn test_quadratic_pairs_are_not_symmetrized() {
        let mut store = StructuralTermStore::new();
        store.add_quadratic(TermOwner::Objective, x(0), x(1), 2.0);
        store.add_quadratic(TermOwner::Objective, x(1), x(0), 1.0);
        store.add_quadratic(TermOwner::Objective, x(0), x(1), 0.5);
        assert_eq!(store.num_quadratic(), 2);
        assert_eq!(
            store.quadratic_coefficient(TermOwner::Objective, x(0), x(1)),
            2.5
        );
        assert_eq!(
            store.quadratic_coefficient(TermOwner::Objective, x(1), x(0)),
            1.0
        );
    }

    #[test]
    fn test_terms_keep_first_seen_order() {
        let mut store = StructuralTermStore::new();
        store.add_linear(TermOwner::Objective, x(2), 1.0);
        store.add_linear(TermOwner::Objective, x(0), 1.0);
        store.add_linear(TermOwner::Objective, x(2), 1.0);
        let order: Vec<_> = store.linear_terms().map(|t| t.variable.get()).collect();
        assert_eq!(order, vec![2, 0]);
        assert!(!store.is_empty());
    }
}
