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

//! # Branch-and-Bound
//!
//! Depth-first search over the continuous relaxation. Each node tightens the
//! bounds of one integer variable; the relaxation of every node is solved by
//! the continuous solver and reported to the node callback, whose status can
//! stop the search. Nodes whose parent relaxation is no better than the
//! incumbent are pruned without being solved.
//!
//! All objective comparisons are done in the minimization sense, i.e. on
//! `sign * f`.

use crate::eval::{CallbackStatus, Evaluator};
use crate::nlp::solve_relaxation;
use crate::session::{MipSummary, Solution};
use fixedbitset::FixedBitSet;
use libc::c_int;
use nlbridge_core::math::bound::Bound;
use nlbridge_sys::constants::{
    KN_RC_CALLBACK_ERR, KN_RC_INFEASIBLE, KN_RC_MIP_NODE_LIMIT_FEAS, KN_RC_MIP_NODE_LIMIT_INFEAS,
    KN_RC_OPTIMAL, KN_RC_UNBOUNDED, KN_RC_USER_TERMINATION,
};
use tracing::{debug, info};

/// Statistics collected during one branch-and-bound run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NodeStatistics {
    pub(crate) nodes_explored: u64,
    pub(crate) prunings_infeasible: u64,
    pub(crate) prunings_bound: u64,
    pub(crate) solutions_found: u64,
    pub(crate) max_depth: u64,
}

impl NodeStatistics {
    #[inline]
    fn on_node_explored(&mut self, depth: u64) {
        self.nodes_explored = self.nodes_explored.saturating_add(1);
        self.max_depth = self.max_depth.max(depth);
    }

    #[inline]
    fn on_pruning_infeasible(&mut self) {
        self.prunings_infeasible = self.prunings_infeasible.saturating_add(1);
    }

    #[inline]
    fn on_pruning_bound(&mut self) {
        self.prunings_bound = self.prunings_bound.saturating_add(1);
    }

    #[inline]
    fn on_solution_found(&mut self) {
        self.solutions_found = self.solutions_found.saturating_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Exhausted,
    NodeLimit,
    Unbounded,
    /// The node callback returned this non-zero status.
    Aborted(c_int),
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Vec<Bound<f64>>,
    start: Vec<f64>,
    depth: u64,
    /// Relaxation value of the parent, a lower bound for this subtree.
    parent_bound: f64,
}

/// Result of a branch-and-bound run.
#[derive(Debug, Clone)]
pub(crate) struct MipOutcome {
    pub(crate) status: c_int,
    pub(crate) solution: Option<Solution>,
    pub(crate) summary: MipSummary,
    pub(crate) statistics: NodeStatistics,
}

/// Returns the integer variable farthest from integrality, if any is fractional.
fn most_fractional(x: &[f64], integers: &FixedBitSet, tolerance: f64) -> Option<usize> {
    integers
        .ones()
        .map(|j| (j, (x[j] - x[j].round()).abs()))
        .filter(|&(_, distance)| distance > tolerance)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(j, _)| j)
}

struct Search<'a, 'm> {
    eval: &'a Evaluator<'m>,
    stack: Vec<Node>,
    incumbent: Option<(f64, Solution)>,
    last_relaxation: Option<Solution>,
    stats: NodeStatistics,
}

impl<'a, 'm> Search<'a, 'm> {
    fn new(eval: &'a Evaluator<'m>) -> Self {
        let model = eval.model();
        Self {
            eval,
            stack: vec![Node {
                bounds: model.var_bounds.clone(),
                start: model.x0.clone(),
                depth: 0,
                parent_bound: f64::NEG_INFINITY,
            }],
            incumbent: None,
            last_relaxation: None,
            stats: NodeStatistics::default(),
        }
    }

    #[inline]
    fn best(&self) -> f64 {
        self.incumbent
            .as_ref()
            .map_or(f64::INFINITY, |(value, _)| *value)
    }

    #[inline]
    fn is_dominated(&self, value: f64) -> bool {
        value >= self.best() - 1e-9 * self.best().abs().max(1.0)
    }

    /// Reports a solved node to the node callback. Returns its status.
    fn notify(&self, solution: &Solution) -> c_int {
        match self.eval.model().node_callback {
            // SAFETY: the callback and its user parameters were registered
            // for this session; `x` and `lambda` hold n and m + n entries.
            Some((callback, user_params)) => unsafe {
                callback(
                    self.eval.session_ptr(),
                    solution.x.as_ptr(),
                    solution.lambda.as_ptr(),
                    user_params,
                )
            },
            None => 0,
        }
    }

    fn run(mut self) -> Result<MipOutcome, CallbackStatus> {
        let model = self.eval.model();
        let options = &model.options;

        let termination = loop {
            let Some(node) = self.stack.pop() else {
                break Termination::Exhausted;
            };
            if self.stats.nodes_explored >= options.max_nodes {
                self.stack.push(node);
                break Termination::NodeLimit;
            }
            if self.is_dominated(node.parent_bound) {
                self.stats.on_pruning_bound();
                continue;
            }
            self.stats.on_node_explored(node.depth);

            let relaxation = solve_relaxation(self.eval, &node.bounds, &node.start)?;
            let status = self.notify(&relaxation.solution);
            self.last_relaxation = Some(relaxation.solution.clone());
            if status != 0 {
                self.stack.push(node);
                break Termination::Aborted(status);
            }
            if relaxation.status == KN_RC_UNBOUNDED {
                break Termination::Unbounded;
            }
            if !relaxation.is_feasible(options.feasibility_tolerance) {
                self.stats.on_pruning_infeasible();
                continue;
            }

            let value = model.sign * relaxation.solution.objective;
            if self.is_dominated(value) {
                self.stats.on_pruning_bound();
                continue;
            }

            let x = &relaxation.solution.x;
            match most_fractional(x, &model.integers, options.integrality_tolerance) {
                None => {
                    let mut solution = relaxation.solution;
                    for j in model.integers.ones() {
                        solution.x[j] = solution.x[j].round();
                    }
                    debug!(
                        node = self.stats.nodes_explored,
                        objective = solution.objective,
                        "new incumbent"
                    );
                    self.stats.on_solution_found();
                    self.incumbent = Some((value, solution));
                }
                Some(j) => {
                    let split = x[j];
                    let bound = node.bounds[j];
                    // Pushed up-branch first so the down-branch is explored first.
                    for child in [
                        Bound::try_new(split.ceil(), bound.upper()),
                        Bound::try_new(bound.lower(), split.floor()),
                    ]
                    .into_iter()
                    .flatten()
                    {
                        let mut bounds = node.bounds.clone();
                        bounds[j] = child;
                        let start = x
                            .iter()
                            .zip(&bounds)
                            .map(|(&v, b)| b.clamp(v))
                            .collect();
                        self.stack.push(Node {
                            bounds,
                            start,
                            depth: node.depth + 1,
                            parent_bound: value,
                        });
                    }
                }
            }
        };

        Ok(self.finish(termination))
    }

    fn finish(self, termination: Termination) -> MipOutcome {
        let sign = self.eval.model().sign;
        let has_incumbent = self.incumbent.is_some();
        let status = match termination {
            Termination::Exhausted if has_incumbent => KN_RC_OPTIMAL,
            Termination::Exhausted => KN_RC_INFEASIBLE,
            Termination::NodeLimit if has_incumbent => KN_RC_MIP_NODE_LIMIT_FEAS,
            Termination::NodeLimit => KN_RC_MIP_NODE_LIMIT_INFEAS,
            Termination::Unbounded => KN_RC_UNBOUNDED,
            Termination::Aborted(KN_RC_USER_TERMINATION) => KN_RC_USER_TERMINATION,
            Termination::Aborted(_) => KN_RC_CALLBACK_ERR,
        };

        let open = self
            .stack
            .iter()
            .map(|n| n.parent_bound)
            .fold(f64::INFINITY, f64::min);
        let relaxation_bound = sign * open.min(self.best());

        info!(
            status,
            nodes = self.stats.nodes_explored,
            solutions = self.stats.solutions_found,
            pruned_bound = self.stats.prunings_bound,
            pruned_infeasible = self.stats.prunings_infeasible,
            max_depth = self.stats.max_depth,
            "branch-and-bound finished"
        );

        let incumbent = self
            .incumbent
            .map(|(_, solution)| (solution.objective, solution));
        let solution = incumbent
            .as_ref()
            .map(|(_, s)| s.clone())
            .or(self.last_relaxation);

        MipOutcome {
            status,
            solution,
            summary: MipSummary {
                incumbent: incumbent.map(|(objective, s)| (objective, s.x)),
                relaxation_bound,
            },
            statistics: self.stats,
        }
    }
}

/// Runs branch-and-bound over the integer variables of the evaluator's model.
pub(crate) fn branch_and_bound(eval: &Evaluator<'_>) -> Result<MipOutcome, CallbackStatus> {
    Search::new(eval).run()
}
