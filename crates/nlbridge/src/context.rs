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

//! # Problem Context
//!
//! `Context` is the façade of the crate. It owns one engine session, issues
//! variable and constraint handles, mirrors structural terms, owns every
//! registered closure, and exposes the solve and the post-solve accessors.
//!
//! ## Ownership
//!
//! A context created through `Context::new` owns its session and frees it
//! when dropped. While the engine is solving, every closure receives a
//! second, borrowed `Context` wrapping the same session. The borrowed view
//! never frees the session and has no closures of its own. Builder
//! operations need `&mut self`, so a closure can read from the view but not
//! modify the problem.
//!
//! ## Errors
//!
//! Handles are validated before anything reaches the engine
//! (`Error::InvalidHandle`). Non-zero engine statuses of pass-through calls
//! become `Error::EngineRejected` carrying the engine function name.

use crate::callback::registry::Registry;
use crate::callback::thunk::{gradient_thunk, hessian_thunk, node_thunk, value_thunk};
use crate::callback::{
    CallbackToken, EvalRequest, EvalResult, GradientSparsity, HessianSparsity, Sparsity,
};
use crate::error::{check, Error, HandleKind, Result};
use crate::handle::{
    ConstraintId, ConstraintTag, ContextId, HandleAllocator, VariableId, VariableTag,
};
use crate::status::SolveStatus;
use crate::terms::{StructuralTermStore, TermOwner};
use crate::types::{ObjectiveGoal, VariableType};
use libc::{c_double, c_int};
use nlbridge_sys::constants::{
    KN_RC_CALLBACK_ERR, KN_RC_EVAL_ERR, KN_RC_ILLEGAL_CALL, KN_RC_NULL_POINTER,
};
use nlbridge_sys::{Engine, KnContext, KnInt};
use std::ptr::NonNull;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    /// Created by `Context::new`, released on drop.
    Owned,
    /// Wraps a session owned elsewhere.
    Borrowed,
}

/// A nonlinear optimization problem bound to one engine session.
///
/// `'cb` is the lifetime of everything the registered closures borrow.
pub struct Context<'cb, E: Engine> {
    id: ContextId,
    session: NonNull<KnContext>,
    ownership: Ownership,
    variables: HandleAllocator<VariableTag>,
    constraints: HandleAllocator<ConstraintTag>,
    terms: StructuralTermStore,
    registry: Registry<'cb, E>,
}

impl<'cb, E: Engine> std::fmt::Debug for Context<'cb, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("engine", &E::NAME)
            .field("id", &self.id)
            .field("session", &self.session)
            .field("ownership", &self.ownership)
            .field("num_vars", &self.num_vars())
            .field("num_cons", &self.num_cons())
            .field("num_callbacks", &self.registry.len())
            .finish()
    }
}

fn count(operation: &'static str, value: KnInt) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::EngineRejected {
        operation,
        code: value,
    })
}

/// Fails if the engine numbered a new entity differently than the allocator
/// is about to.
fn expect_index(operation: &'static str, expected: usize, index: KnInt) -> Result<()> {
    if usize::try_from(index).ok() == Some(expected) {
        return Ok(());
    }
    warn!(operation, expected, index, "engine numbering diverged from issued handles");
    Err(Error::EngineRejected {
        operation,
        code: KN_RC_ILLEGAL_CALL,
    })
}

impl<'cb, E: Engine> Context<'cb, E> {
    /// Creates a new engine session.
    ///
    /// # Errors
    ///
    /// `SessionCreationFailed` if the engine returns a non-zero status and
    /// `NoValidLicense` if it returns no session.
    pub fn new() -> Result<Self> {
        let mut raw = std::ptr::null_mut();
        let code = E::new(&mut raw);
        if code != 0 {
            return Err(Error::SessionCreationFailed { code });
        }
        let session = NonNull::new(raw).ok_or(Error::NoValidLicense)?;
        let id = ContextId::next();
        debug!(engine = E::NAME, context = %id, "session created");
        Ok(Self::from_parts(id, session, Ownership::Owned, 0, 0))
    }

    /// Wraps a session owned by the context `owner`, as passed into a
    /// callback. Handles issued by `owner` are valid for the view.
    pub(crate) fn borrowed(kc: *mut KnContext, owner: ContextId) -> Result<Self> {
        let session = NonNull::new(kc).ok_or(Error::EngineRejected {
            operation: "KN_get_number_vars",
            code: KN_RC_NULL_POINTER,
        })?;
        let mut n: KnInt = 0;
        let mut m: KnInt = 0;
        // SAFETY: the engine passes its own live session into callbacks.
        unsafe {
            check("KN_get_number_vars", E::get_number_vars(kc, &mut n))?;
            check("KN_get_number_cons", E::get_number_cons(kc, &mut m))?;
        }
        Ok(Self::from_parts(
            owner,
            session,
            Ownership::Borrowed,
            count("KN_get_number_vars", n)?,
            count("KN_get_number_cons", m)?,
        ))
    }

    fn from_parts(
        id: ContextId,
        session: NonNull<KnContext>,
        ownership: Ownership,
        num_vars: usize,
        num_cons: usize,
    ) -> Self {
        Self {
            id,
            session,
            ownership,
            variables: HandleAllocator::with_issued(id, num_vars),
            constraints: HandleAllocator::with_issued(id, num_cons),
            terms: StructuralTermStore::new(),
            registry: Registry::new(id),
        }
    }

    /// Identity stamped into every handle this context issues.
    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Returns `true` if dropping this context frees the engine session.
    #[inline]
    pub fn is_owner(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    /// The raw engine session.
    #[inline]
    pub fn as_ptr(&self) -> *mut KnContext {
        self.session.as_ptr()
    }

    #[inline]
    pub fn num_vars(&self) -> usize {
        self.variables.issued()
    }

    #[inline]
    pub fn num_cons(&self) -> usize {
        self.constraints.issued()
    }

    /// All variable handles, in creation order.
    #[inline]
    pub fn variables(&self) -> impl Iterator<Item = VariableId> {
        self.variables.iter()
    }

    /// All constraint handles, in creation order.
    #[inline]
    pub fn constraints(&self) -> impl Iterator<Item = ConstraintId> {
        self.constraints.iter()
    }

    /// Structural terms added through this context.
    #[inline]
    pub fn terms(&self) -> &StructuralTermStore {
        &self.terms
    }

    /// Number of registered value callbacks.
    #[inline]
    pub fn num_callbacks(&self) -> usize {
        self.registry.len()
    }

    fn var_index(&self, v: VariableId) -> Result<KnInt> {
        match v.to_raw() {
            Some(raw) if self.variables.contains(v) => Ok(raw),
            _ => Err(Error::InvalidHandle {
                kind: HandleKind::Variable,
                index: v.get(),
            }),
        }
    }

    fn con_index(&self, c: ConstraintId) -> Result<KnInt> {
        match c.to_raw() {
            Some(raw) if self.constraints.contains(c) => Ok(raw),
            _ => Err(Error::InvalidHandle {
                kind: HandleKind::Constraint,
                index: c.get(),
            }),
        }
    }

    /// Runs an engine getter writing into an out-parameter.
    #[inline]
    fn read<T: Default>(
        &self,
        operation: &'static str,
        get: impl FnOnce(*mut KnContext, &mut T) -> c_int,
    ) -> Result<T> {
        let mut value = T::default();
        check(operation, get(self.as_ptr(), &mut value))?;
        Ok(value)
    }

    // Variables and constraints

    /// Adds a variable. It starts unbounded and continuous.
    pub fn add_var(&mut self) -> Result<VariableId> {
        let mut index: KnInt = -1;
        // SAFETY: `self.session` is a live session of `E`.
        check("KN_add_var", unsafe { E::add_var(self.as_ptr(), &mut index) })?;
        expect_index("KN_add_var", self.variables.issued(), index)?;
        let id = self.variables.allocate();
        debug!(variable = %id, "variable added");
        Ok(id)
    }

    pub fn add_vars(&mut self, count: usize) -> Result<Vec<VariableId>> {
        (0..count).map(|_| self.add_var()).collect()
    }

    /// Adds a constraint. It starts unbounded on both sides.
    pub fn add_con(&mut self) -> Result<ConstraintId> {
        let mut index: KnInt = -1;
        // SAFETY: `self.session` is a live session of `E`.
        check("KN_add_con", unsafe { E::add_con(self.as_ptr(), &mut index) })?;
        expect_index("KN_add_con", self.constraints.issued(), index)?;
        let id = self.constraints.allocate();
        debug!(constraint = %id, "constraint added");
        Ok(id)
    }

    pub fn add_cons(&mut self, count: usize) -> Result<Vec<ConstraintId>> {
        (0..count).map(|_| self.add_con()).collect()
    }

    // Bounds

    pub fn set_var_lobnd(&mut self, v: VariableId, value: f64) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_set_var_lobnd", unsafe {
            E::set_var_lobnd(self.as_ptr(), j, value)
        })
    }

    pub fn set_var_upbnd(&mut self, v: VariableId, value: f64) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_set_var_upbnd", unsafe {
            E::set_var_upbnd(self.as_ptr(), j, value)
        })
    }

    /// Sets both bounds of a variable.
    pub fn set_var_bnds(&mut self, v: VariableId, lower: f64, upper: f64) -> Result<()> {
        self.set_var_lobnd(v, lower)?;
        self.set_var_upbnd(v, upper)
    }

    /// Fixes a variable to `value`.
    pub fn set_var_fxbnd(&mut self, v: VariableId, value: f64) -> Result<()> {
        self.set_var_bnds(v, value, value)
    }

    pub fn get_var_lobnd(&self, v: VariableId) -> Result<f64> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_var_lobnd", |kc, out| unsafe {
            E::get_var_lobnd(kc, j, out)
        })
    }

    pub fn get_var_upbnd(&self, v: VariableId) -> Result<f64> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_var_upbnd", |kc, out| unsafe {
            E::get_var_upbnd(kc, j, out)
        })
    }

    pub fn set_con_lobnd(&mut self, c: ConstraintId, value: f64) -> Result<()> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        check("KN_set_con_lobnd", unsafe {
            E::set_con_lobnd(self.as_ptr(), i, value)
        })
    }

    pub fn set_con_upbnd(&mut self, c: ConstraintId, value: f64) -> Result<()> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        check("KN_set_con_upbnd", unsafe {
            E::set_con_upbnd(self.as_ptr(), i, value)
        })
    }

    /// Sets both bounds of a constraint.
    pub fn set_con_bnds(&mut self, c: ConstraintId, lower: f64, upper: f64) -> Result<()> {
        self.set_con_lobnd(c, lower)?;
        self.set_con_upbnd(c, upper)
    }

    /// Turns a constraint into the equality `body == value`.
    pub fn set_con_eqbnd(&mut self, c: ConstraintId, value: f64) -> Result<()> {
        self.set_con_bnds(c, value, value)
    }

    pub fn get_con_lobnd(&self, c: ConstraintId) -> Result<f64> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_con_lobnd", |kc, out| unsafe {
            E::get_con_lobnd(kc, i, out)
        })
    }

    pub fn get_con_upbnd(&self, c: ConstraintId) -> Result<f64> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_con_upbnd", |kc, out| unsafe {
            E::get_con_upbnd(kc, i, out)
        })
    }

    // Types, goal, initial values

    pub fn set_var_type(&mut self, v: VariableId, kind: VariableType) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_set_var_type", unsafe {
            E::set_var_type(self.as_ptr(), j, kind.to_raw())
        })?;
        debug!(variable = %v, %kind, "variable type set");
        Ok(())
    }

    pub fn get_var_type(&self, v: VariableId) -> Result<VariableType> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        let raw: c_int = self.read("KN_get_var_type", |kc, out| unsafe {
            E::get_var_type(kc, j, out)
        })?;
        VariableType::from_raw(raw).ok_or(Error::EngineRejected {
            operation: "KN_get_var_type",
            code: raw,
        })
    }

    pub fn set_obj_goal(&mut self, goal: ObjectiveGoal) -> Result<()> {
        // SAFETY: live session.
        check("KN_set_obj_goal", unsafe {
            E::set_obj_goal(self.as_ptr(), goal.to_raw())
        })
    }

    pub fn set_var_primal_init_value(&mut self, v: VariableId, value: f64) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_set_var_primal_init_value", unsafe {
            E::set_var_primal_init_value(self.as_ptr(), j, value)
        })
    }

    pub fn set_var_dual_init_value(&mut self, v: VariableId, value: f64) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_set_var_dual_init_value", unsafe {
            E::set_var_dual_init_value(self.as_ptr(), j, value)
        })
    }

    pub fn set_con_dual_init_value(&mut self, c: ConstraintId, value: f64) -> Result<()> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        check("KN_set_con_dual_init_value", unsafe {
            E::set_con_dual_init_value(self.as_ptr(), i, value)
        })
    }

    /// Sets the value of a variable in a known MIP solution.
    pub fn set_mip_var_primal_init_value(&mut self, v: VariableId, value: f64) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_set_mip_var_primal_init_value", unsafe {
            E::set_mip_var_primal_init_value(self.as_ptr(), j, value)
        })
    }

    // Structural terms

    /// Adds `coef * x[v]` to the objective.
    pub fn add_obj_linear_term(&mut self, v: VariableId, coef: f64) -> Result<()> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        check("KN_add_obj_linear_term", unsafe {
            E::add_obj_linear_term(self.as_ptr(), j, coef)
        })?;
        self.terms.add_linear(TermOwner::Objective, v, coef);
        debug!(owner = "objective", variable = %v, coef, "linear term added");
        Ok(())
    }

    /// Adds `coef * x[v]` to the body of constraint `c`.
    pub fn add_con_linear_term(&mut self, c: ConstraintId, v: VariableId, coef: f64) -> Result<()> {
        let i = self.con_index(c)?;
        let j = self.var_index(v)?;
        // SAFETY: live session, validated indices.
        check("KN_add_con_linear_term", unsafe {
            E::add_con_linear_term(self.as_ptr(), i, j, coef)
        })?;
        self.terms.add_linear(TermOwner::Constraint(c), v, coef);
        debug!(owner = %c, variable = %v, coef, "linear term added");
        Ok(())
    }

    /// Adds `coef * x[v1] * x[v2]` to the objective.
    ///
    /// For `v1 != v2` the coefficient belongs to the single cross term, it
    /// is neither halved nor doubled.
    pub fn add_obj_quadratic_term(
        &mut self,
        v1: VariableId,
        v2: VariableId,
        coef: f64,
    ) -> Result<()> {
        let a = self.var_index(v1)?;
        let b = self.var_index(v2)?;
        // SAFETY: live session, validated indices.
        check("KN_add_obj_quadratic_term", unsafe {
            E::add_obj_quadratic_term(self.as_ptr(), a, b, coef)
        })?;
        self.terms.add_quadratic(TermOwner::Objective, v1, v2, coef);
        debug!(owner = "objective", first = %v1, second = %v2, coef, "quadratic term added");
        Ok(())
    }

    /// Adds `coef * x[v1] * x[v2]` to the body of constraint `c`.
    pub fn add_con_quadratic_term(
        &mut self,
        c: ConstraintId,
        v1: VariableId,
        v2: VariableId,
        coef: f64,
    ) -> Result<()> {
        let i = self.con_index(c)?;
        let a = self.var_index(v1)?;
        let b = self.var_index(v2)?;
        // SAFETY: live session, validated indices.
        check("KN_add_con_quadratic_term", unsafe {
            E::add_con_quadratic_term(self.as_ptr(), i, a, b, coef)
        })?;
        self.terms
            .add_quadratic(TermOwner::Constraint(c), v1, v2, coef);
        debug!(owner = %c, first = %v1, second = %v2, coef, "quadratic term added");
        Ok(())
    }

    // Callbacks

    /// Registers a closure evaluating the objective (if `evaluates_objective`)
    /// and the bodies of `constraints`.
    ///
    /// The closure writes the objective through `EvalResult::set_objective`
    /// and the constraint values in the order of `constraints`. The returned
    /// token is the only way to attach derivative callbacks to it.
    pub fn register_value_callback<F>(
        &mut self,
        evaluates_objective: bool,
        constraints: &[ConstraintId],
        closure: F,
    ) -> Result<CallbackToken>
    where
        F: FnMut(&Context<'cb, E>, &EvalRequest<'_>, &mut EvalResult<'_>) -> c_int + 'cb,
    {
        let raw_cons = constraints
            .iter()
            .map(|&c| self.con_index(c))
            .collect::<Result<Vec<_>>>()?;

        let mut cb = std::ptr::null_mut();
        // SAFETY: live session, validated indices. The thunk matches the
        // engine's evaluation callback signature.
        check("KN_add_eval_callback", unsafe {
            E::add_eval_callback(
                self.as_ptr(),
                evaluates_objective,
                &raw_cons,
                value_thunk::<E>,
                &mut cb,
            )
        })?;
        let token = CallbackToken::from_raw(cb).ok_or(Error::EngineRejected {
            operation: "KN_add_eval_callback",
            code: KN_RC_NULL_POINTER,
        })?;

        let entry =
            self.registry
                .insert_value(evaluates_objective, constraints.to_vec(), Box::new(closure));
        // SAFETY: live session and a token it just issued. The entry stays
        // at this address until the context is dropped.
        check("KN_set_cb_user_params", unsafe {
            E::set_cb_user_params(self.as_ptr(), cb, entry.as_ptr().cast())
        })?;
        self.registry.bind(token, entry);

        debug!(
            ?token,
            evaluates_objective,
            constraints = constraints.len(),
            "value callback registered"
        );
        Ok(token)
    }

    /// Attaches a gradient closure to the value callback of `token`.
    ///
    /// # Errors
    ///
    /// `UnknownCallbackContext` if `token` was not returned by
    /// `register_value_callback` of this context.
    pub fn attach_gradient<F>(
        &mut self,
        token: CallbackToken,
        sparsity: GradientSparsity,
        closure: F,
    ) -> Result<()>
    where
        F: FnMut(&Context<'cb, E>, &EvalRequest<'_>, &mut EvalResult<'_>) -> c_int + 'cb,
    {
        let evaluates_objective = self
            .registry
            .entry(token)
            .map(|entry| entry.evaluates_objective)
            .ok_or(Error::UnknownCallbackContext)?;

        let objective = match &sparsity.objective {
            Sparsity::Dense if evaluates_objective => None,
            Sparsity::Dense => Some(Vec::new()),
            Sparsity::Sparse(vars) => Some(
                vars.iter()
                    .map(|&v| self.var_index(v))
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        let jacobian = match &sparsity.jacobian {
            Sparsity::Dense => None,
            Sparsity::Sparse(entries) => {
                let mut cons = Vec::with_capacity(entries.len());
                let mut vars = Vec::with_capacity(entries.len());
                for &(c, v) in entries {
                    cons.push(self.con_index(c)?);
                    vars.push(self.var_index(v)?);
                }
                Some((cons, vars))
            }
        };

        // SAFETY: live session, a token of this session, validated indices.
        check("KN_set_cb_grad", unsafe {
            E::set_cb_grad(
                self.as_ptr(),
                token.as_ptr(),
                objective.as_deref(),
                jacobian
                    .as_ref()
                    .map(|(cons, vars)| (cons.as_slice(), vars.as_slice())),
                gradient_thunk::<E>,
            )
        })?;

        debug!(
            ?token,
            objective_nnz = objective.as_ref().map(Vec::len),
            jacobian_nnz = jacobian.as_ref().map(|(cons, _)| cons.len()),
            "gradient callback attached"
        );
        if let Some(entry) = self.registry.entry_mut(token) {
            entry.gradient = Some((sparsity, Box::new(closure)));
        }
        Ok(())
    }

    /// Attaches a Hessian closure to the value callback of `token`.
    ///
    /// # Errors
    ///
    /// `UnknownCallbackContext` if `token` was not returned by
    /// `register_value_callback` of this context.
    pub fn attach_hessian<F>(
        &mut self,
        token: CallbackToken,
        sparsity: HessianSparsity,
        closure: F,
    ) -> Result<()>
    where
        F: FnMut(&Context<'cb, E>, &EvalRequest<'_>, &mut EvalResult<'_>) -> c_int + 'cb,
    {
        if !self.registry.contains(token) {
            return Err(Error::UnknownCallbackContext);
        }

        let pattern = match &sparsity {
            Sparsity::Dense => None,
            Sparsity::Sparse(pairs) => {
                let mut rows = Vec::with_capacity(pairs.len());
                let mut cols = Vec::with_capacity(pairs.len());
                for &(a, b) in pairs {
                    rows.push(self.var_index(a)?);
                    cols.push(self.var_index(b)?);
                }
                Some((rows, cols))
            }
        };

        // SAFETY: live session, a token of this session, validated indices.
        check("KN_set_cb_hess", unsafe {
            E::set_cb_hess(
                self.as_ptr(),
                token.as_ptr(),
                pattern
                    .as_ref()
                    .map(|(rows, cols)| (rows.as_slice(), cols.as_slice())),
                hessian_thunk::<E>,
            )
        })?;

        debug!(
            ?token,
            hessian_nnz = pattern.as_ref().map(|(rows, _)| rows.len()),
            "hessian callback attached"
        );
        if let Some(entry) = self.registry.entry_mut(token) {
            entry.hessian = Some((sparsity, Box::new(closure)));
        }
        Ok(())
    }

    /// Registers the closure the engine calls at every branch-and-bound
    /// node with the node's primal point and multipliers.
    ///
    /// A non-zero return value is passed to the engine unchanged;
    /// `KN_RC_USER_TERMINATION` stops the search. Registering again replaces
    /// the closure the engine calls.
    pub fn register_node_callback<F>(&mut self, closure: F) -> Result<()>
    where
        F: FnMut(&Context<'cb, E>, &[f64], &[f64]) -> c_int + 'cb,
    {
        let entry = self.registry.insert_node(Box::new(closure));
        // SAFETY: live session. The entry stays at this address until the
        // context is dropped.
        check("KN_set_mip_node_callback", unsafe {
            E::set_mip_node_callback(self.as_ptr(), node_thunk::<E>, entry.as_ptr().cast())
        })?;
        debug!(
            replaced = self.registry.num_node_callbacks() > 1,
            "node callback registered"
        );
        Ok(())
    }

    // Solving

    /// Solves the problem and returns the engine's terminal status.
    ///
    /// A status that is not optimal is not an error.
    ///
    /// # Errors
    ///
    /// - `InconsistentBounds` if a variable or constraint has `lower > upper`.
    /// - `CallbackFailed` if a closure reported a failure and the engine
    ///   aborted the solve with a callback error.
    pub fn solve(&mut self) -> Result<SolveStatus> {
        self.validate_bounds()?;
        self.registry.failure().reset();

        info!(
            engine = E::NAME,
            variables = self.num_vars(),
            constraints = self.num_cons(),
            callbacks = self.registry.len(),
            "solve started"
        );
        // SAFETY: live session. Every registered entry outlives the call.
        let code = unsafe { E::solve(self.as_ptr()) };
        let status = SolveStatus::new(code);

        if matches!(code, KN_RC_CALLBACK_ERR | KN_RC_EVAL_ERR) {
            if let Some(failed) = self.registry.failure().get() {
                warn!(
                    engine = E::NAME,
                    status = code,
                    callback_status = failed,
                    "solve aborted by a failing callback"
                );
                return Err(Error::CallbackFailed { status: failed });
            }
        }
        info!(
            engine = E::NAME,
            status = code,
            class = %status.class(),
            "solve finished"
        );
        Ok(status)
    }

    fn validate_bounds(&self) -> Result<()> {
        for v in self.variables() {
            let lower = self.get_var_lobnd(v)?;
            let upper = self.get_var_upbnd(v)?;
            if lower > upper {
                return Err(Error::InconsistentBounds {
                    kind: HandleKind::Variable,
                    index: v.get(),
                    lower,
                    upper,
                });
            }
        }
        for c in self.constraints() {
            let lower = self.get_con_lobnd(c)?;
            let upper = self.get_con_upbnd(c)?;
            if lower > upper {
                return Err(Error::InconsistentBounds {
                    kind: HandleKind::Constraint,
                    index: c.get(),
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }

    // Results

    /// Number of variables as reported by the engine.
    pub fn get_number_vars(&self) -> Result<usize> {
        // SAFETY: live session.
        let n = self.read("KN_get_number_vars", |kc, out| unsafe {
            E::get_number_vars(kc, out)
        })?;
        count("KN_get_number_vars", n)
    }

    /// Number of constraints as reported by the engine.
    pub fn get_number_cons(&self) -> Result<usize> {
        // SAFETY: live session.
        let m = self.read("KN_get_number_cons", |kc, out| unsafe {
            E::get_number_cons(kc, out)
        })?;
        count("KN_get_number_cons", m)
    }

    pub fn get_obj_value(&self) -> Result<f64> {
        // SAFETY: live session.
        self.read("KN_get_obj_value", |kc, out| unsafe {
            E::get_obj_value(kc, out)
        })
    }

    pub fn get_var_primal_value(&self, v: VariableId) -> Result<f64> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_var_primal_value", |kc, out| unsafe {
            E::get_var_primal_value(kc, j, out)
        })
    }

    /// Primal values of all variables, in creation order.
    pub fn get_var_primal_values(&self) -> Result<Vec<f64>> {
        self.variables()
            .map(|v| self.get_var_primal_value(v))
            .collect()
    }

    pub fn get_var_dual_value(&self, v: VariableId) -> Result<f64> {
        let j = self.var_index(v)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_var_dual_value", |kc, out| unsafe {
            E::get_var_dual_value(kc, j, out)
        })
    }

    pub fn get_con_value(&self, c: ConstraintId) -> Result<f64> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_con_value", |kc, out| unsafe {
            E::get_con_value(kc, i, out)
        })
    }

    pub fn get_con_dual_value(&self, c: ConstraintId) -> Result<f64> {
        let i = self.con_index(c)?;
        // SAFETY: live session, validated index.
        self.read("KN_get_con_dual_value", |kc, out| unsafe {
            E::get_con_dual_value(kc, i, out)
        })
    }

    pub fn get_abs_feas_error(&self) -> Result<f64> {
        // SAFETY: live session.
        self.read("KN_get_abs_feas_error", |kc, out| unsafe {
            E::get_abs_feas_error(kc, out)
        })
    }

    pub fn get_rel_feas_error(&self) -> Result<f64> {
        // SAFETY: live session.
        self.read("KN_get_rel_feas_error", |kc, out| unsafe {
            E::get_rel_feas_error(kc, out)
        })
    }

    pub fn get_abs_opt_error(&self) -> Result<f64> {
        // SAFETY: live session.
        self.read("KN_get_abs_opt_error", |kc, out| unsafe {
            E::get_abs_opt_error(kc, out)
        })
    }

    pub fn get_rel_opt_error(&self) -> Result<f64> {
        // SAFETY: live session.
        self.read("KN_get_rel_opt_error", |kc, out| unsafe {
            E::get_rel_opt_error(kc, out)
        })
    }

    /// Returns `true` if the engine holds a MIP incumbent.
    ///
    /// "No incumbent" is reported by the engine through a positive status,
    /// which yields `Ok(false)`. Negative statuses are errors.
    pub fn has_mip_incumbent(&self) -> Result<bool> {
        Ok(self.get_mip_incumbent_obj()?.is_some())
    }

    /// Objective of the MIP incumbent, `None` if there is none.
    pub fn get_mip_incumbent_obj(&self) -> Result<Option<f64>> {
        let mut value: c_double = 0.0;
        // SAFETY: live session.
        let code = unsafe { E::get_mip_incumbent_obj(self.as_ptr(), &mut value) };
        match code {
            0 => Ok(Some(value)),
            c if c > 0 => Ok(None),
            code => Err(Error::EngineRejected {
                operation: "KN_get_mip_incumbent_obj",
                code,
            }),
        }
    }

    /// The MIP incumbent point in variable creation order, `None` if there
    /// is none.
    pub fn get_mip_incumbent_x(&self) -> Result<Option<Vec<f64>>> {
        let mut x = vec![0.0; self.num_vars()];
        // SAFETY: live session, `x` holds one entry per variable.
        let code = unsafe { E::get_mip_incumbent_x(self.as_ptr(), &mut x) };
        match code {
            0 => Ok(Some(x)),
            c if c > 0 => Ok(None),
            code => Err(Error::EngineRejected {
                operation: "KN_get_mip_incumbent_x",
                code,
            }),
        }
    }

    /// Best known bound on the optimal MIP objective.
    pub fn get_mip_relaxation_bnd(&self) -> Result<f64> {
        // SAFETY: live session.
        self.read("KN_get_mip_relaxation_bnd", |kc, out| unsafe {
            E::get_mip_relaxation_bnd(kc, out)
        })
    }
}

impl<'cb, E: Engine> Drop for Context<'cb, E> {
    fn drop(&mut self) {
        if self.ownership == Ownership::Borrowed {
            return;
        }
        let mut raw = self.session.as_ptr();
        // SAFETY: owned sessions come from `E::new` and are freed only here.
        let code = unsafe { E::free(&mut raw) };
        if code != 0 {
            warn!(engine = E::NAME, code, "engine failed to release session");
        } else {
            debug!(engine = E::NAME, "session released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::registry::ValueEntry;
    use crate::callback::thunk::value_thunk;
    use libc::c_void;
    use nlbridge_reference::Reference;
    use nlbridge_sys::constants::KN_RC_EVALFC;
    use nlbridge_sys::types;

    type Ctx<'cb> = Context<'cb, Reference>;

    #[test]
    fn test_new_context_owns_its_session() {
        let ctx = Ctx::new().unwrap();
        assert!(ctx.is_owner());
        assert!(!ctx.as_ptr().is_null());
        assert_eq!(ctx.num_vars(), 0);
    }

    #[test]
    fn test_borrowed_view_reads_counts_and_does_not_free() {
        let mut ctx = Ctx::new().unwrap();
        ctx.add_vars(3).unwrap();
        ctx.add_con().unwrap();
        {
            let view = Ctx::borrowed(ctx.as_ptr(), ctx.id()).unwrap();
            assert!(!view.is_owner());
            assert_eq!(view.id(), ctx.id());
            assert_eq!(view.num_vars(), 3);
            assert_eq!(view.num_cons(), 1);
        }
        // Still usable after the view is gone.
        assert_eq!(ctx.get_number_vars().unwrap(), 3);
    }

    #[test]
    fn test_unissued_handles_are_rejected_before_the_engine() {
        let mut ctx = Ctx::new().unwrap();
        let x = ctx.add_var().unwrap();
        let stranger = VariableId::new(ctx.id(), 5);
        assert_eq!(
            ctx.set_var_lobnd(stranger, 0.0),
            Err(Error::InvalidHandle {
                kind: HandleKind::Variable,
                index: 5
            })
        );
        assert!(matches!(
            ctx.add_con_linear_term(ConstraintId::new(ctx.id(), 0), x, 1.0),
            Err(Error::InvalidHandle {
                kind: HandleKind::Constraint,
                ..
            })
        ));
        assert!(ctx.terms().is_empty());
    }

    #[test]
    fn test_handles_of_another_context_are_rejected_in_range() {
        let mut ctx = Ctx::new().unwrap();
        ctx.add_vars(2).unwrap();
        let mut other = Ctx::new().unwrap();
        let foreign = other.add_var().unwrap();
        assert_eq!(foreign.get(), 0);
        assert_eq!(
            ctx.set_var_upbnd(foreign, 1.0),
            Err(Error::InvalidHandle {
                kind: HandleKind::Variable,
                index: 0
            })
        );
    }

    #[test]
    fn test_diverged_engine_numbering_is_an_error() {
        let mut ctx = Ctx::new().unwrap();
        ctx.add_var().unwrap();
        ctx.add_con().unwrap();
        {
            // A second wrapper on the same session adds behind the owner's back.
            let mut view = Ctx::borrowed(ctx.as_ptr(), ctx.id()).unwrap();
            view.add_var().unwrap();
            view.add_con().unwrap();
        }
        assert_eq!(
            ctx.add_var(),
            Err(Error::EngineRejected {
                operation: "KN_add_var",
                code: KN_RC_ILLEGAL_CALL
            })
        );
        assert_eq!(
            ctx.add_con(),
            Err(Error::EngineRejected {
                operation: "KN_add_con",
                code: KN_RC_ILLEGAL_CALL
            })
        );
        assert_eq!(ctx.num_vars(), 1);
        assert_eq!(ctx.num_cons(), 1);
    }

    #[test]
    fn test_engine_rejections_carry_the_operation() {
        let ctx = Ctx::new().unwrap();
        assert_eq!(
            ctx.get_obj_value(),
            Err(Error::EngineRejected {
                operation: "KN_get_obj_value",
                code: nlbridge_sys::constants::KN_RC_ILLEGAL_CALL
            })
        );
    }

    #[test]
    fn test_bounds_and_types_round_trip() {
        let mut ctx = Ctx::new().unwrap();
        let x = ctx.add_var().unwrap();
        let c = ctx.add_con().unwrap();
        ctx.set_var_bnds(x, -1.5, 2.25).unwrap();
        ctx.set_con_eqbnd(c, 4.0).unwrap();
        ctx.set_var_type(x, VariableType::Integer).unwrap();
        assert_eq!(ctx.get_var_lobnd(x).unwrap(), -1.5);
        assert_eq!(ctx.get_var_upbnd(x).unwrap(), 2.25);
        assert_eq!(ctx.get_con_lobnd(c).unwrap(), 4.0);
        assert_eq!(ctx.get_con_upbnd(c).unwrap(), 4.0);
        assert_eq!(ctx.get_var_type(x).unwrap(), VariableType::Integer);
    }

    #[test]
    fn test_inconsistent_bounds_fail_the_solve() {
        let mut ctx = Ctx::new().unwrap();
        let x = ctx.add_var().unwrap();
        ctx.set_var_bnds(x, 1.0, 0.0).unwrap();
        assert_eq!(
            ctx.solve(),
            Err(Error::InconsistentBounds {
                kind: HandleKind::Variable,
                index: 0,
                lower: 1.0,
                upper: 0.0
            })
        );
    }

    #[test]
    fn test_structural_terms_are_mirrored() {
        let mut ctx = Ctx::new().unwrap();
        let x = ctx.add_var().unwrap();
        let y = ctx.add_var().unwrap();
        let c = ctx.add_con().unwrap();
        ctx.add_obj_quadratic_term(x, y, 2.0).unwrap();
        ctx.add_con_linear_term(c, y, 1.0).unwrap();
        ctx.add_con_linear_term(c, y, 0.5).unwrap();
        assert_eq!(
            ctx.terms().quadratic_coefficient(TermOwner::Objective, x, y),
            2.0
        );
        assert_eq!(
            ctx.terms()
                .linear_coefficient(TermOwner::Constraint(c), y),
            1.5
        );
    }

    #[test]
    fn test_callbacks_can_read_through_the_view() {
        let seen_upper = std::cell::Cell::new(0.0);
        let mut ctx = Ctx::new().unwrap();
        let x = ctx.add_var().unwrap();
        ctx.set_var_bnds(x, 1.0, 3.0).unwrap();
        let seen = &seen_upper;
        ctx.register_value_callback(true, &[], move |view, request, result| {
            seen.set(view.get_var_upbnd(x).unwrap_or(f64::NAN));
            let v = request.x()[0];
            result.set_objective(v * v);
            0
        })
        .unwrap();
        let status = ctx.solve().unwrap();
        assert!(status.is_optimal());
        assert_eq!(seen_upper.get(), 3.0);
        assert!((ctx.get_var_primal_value(x).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_value_thunk_is_deterministic_and_contains_panics() {
        let mut ctx = Ctx::new().unwrap();
        ctx.add_vars(2).unwrap();
        let c = ctx.add_con().unwrap();
        let pure = ctx
            .register_value_callback(true, &[c], |_, request, result| {
                let x = request.x();
                result.set_objective(x[0] * x[1]);
                result.constraints_mut()[0] = x[0] + x[1];
                0
            })
            .unwrap();
        let broken = ctx
            .register_value_callback(true, &[], |_, _, _| panic!("broken model"))
            .unwrap();

        let mut user_params = |token| -> *mut c_void {
            let entry: *mut ValueEntry<'_, Reference> = ctx.registry.entry_mut(token).unwrap();
            entry.cast()
        };
        let pure_params = user_params(pure);
        let broken_params = user_params(broken);

        let point = [2.0, 3.0];
        let request = types::EvalRequest {
            type_: KN_RC_EVALFC,
            thread_id: 0,
            x: point.as_ptr(),
            lambda: std::ptr::null(),
            sigma: std::ptr::null(),
            vec: std::ptr::null(),
        };
        let run = |token: CallbackToken, params: *mut c_void| {
            let mut obj = f64::NAN;
            let mut con = [f64::NAN];
            let mut result = types::EvalResult::null();
            result.obj = &mut obj;
            result.c = con.as_mut_ptr();
            let status = unsafe {
                value_thunk::<Reference>(ctx.as_ptr(), token.as_ptr(), &request, &mut result, params)
            };
            (status, obj, con[0])
        };

        let first = run(pure, pure_params);
        let second = run(pure, pure_params);
        assert_eq!(first, (0, 6.0, 5.0));
        assert_eq!(first, second);

        let (status, _, _) = run(broken, broken_params);
        assert_eq!(status, KN_RC_CALLBACK_ERR);
        assert_eq!(ctx.registry.failure().get(), Some(KN_RC_CALLBACK_ERR));
    }

    #[test]
    fn test_null_user_params_are_reported_not_dereferenced() {
        let mut ctx = Ctx::new().unwrap();
        ctx.add_var().unwrap();
        let token = ctx
            .register_value_callback(true, &[], |_, _, _| 0)
            .unwrap();
        let point = [0.0];
        let request = types::EvalRequest {
            type_: KN_RC_EVALFC,
            thread_id: 0,
            x: point.as_ptr(),
            lambda: std::ptr::null(),
            sigma: std::ptr::null(),
            vec: std::ptr::null(),
        };
        let mut result = types::EvalResult::null();
        let status = unsafe {
            value_thunk::<Reference>(
                ctx.as_ptr(),
                token.as_ptr(),
                &request,
                &mut result,
                std::ptr::null_mut(),
            )
        };
        assert_eq!(status, KN_RC_CALLBACK_ERR);
    }
}
