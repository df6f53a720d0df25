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

use libc::c_int;
use thiserror::Error;

/// Which kind of handle an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Variable,
    Constraint,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleKind::Variable => write!(f, "variable"),
            HandleKind::Constraint => write!(f, "constraint"),
        }
    }
}

/// Errors raised by the modeling layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The engine could not create a session.
    #[error("engine session creation failed with status {code}")]
    SessionCreationFailed { code: c_int },

    /// The engine started but reported that no valid license is available.
    #[error("engine has no valid license")]
    NoValidLicense,

    /// A handle was not issued by this context.
    #[error("{kind} handle {index} was not issued by this context")]
    InvalidHandle { kind: HandleKind, index: usize },

    /// A gradient or Hessian callback was attached to a token with no
    /// registered value callback.
    #[error("callback context token has no registered value callback")]
    UnknownCallbackContext,

    /// A pass-through engine call returned a non-zero status.
    #[error("engine rejected `{operation}` with status {code}")]
    EngineRejected {
        operation: &'static str,
        code: c_int,
    },

    /// A registered closure failed and the engine gave up on the solve.
    #[error("registered callback failed with status {status}")]
    CallbackFailed { status: c_int },

    /// A bound with `lower > upper` was found when the solve started.
    #[error("{kind} {index} has inconsistent bounds [{lower}, {upper}]")]
    InconsistentBounds {
        kind: HandleKind,
        index: usize,
        lower: f64,
        upper: f64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps an engine status to `Ok(())` or `EngineRejected`.
#[inline]
pub(crate) fn check(operation: &'static str, code: c_int) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::EngineRejected { operation, code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_maps_non_zero_codes() {
        assert_eq!(check("KN_solve", 0), Ok(()));
        assert_eq!(
            check("KN_set_var_upbnd", -515),
            Err(Error::EngineRejected {
                operation: "KN_set_var_upbnd",
                code: -515
            })
        );
    }

    #[test]
    fn test_messages_name_the_operation() {
        let err = Error::EngineRejected {
            operation: "KN_add_var",
            code: -3,
        };
        assert_eq!(err.to_string(), "engine rejected `KN_add_var` with status -3");

        let err = Error::InvalidHandle {
            kind: HandleKind::Constraint,
            index: 7,
        };
        assert_eq!(
            err.to_string(),
            "constraint handle 7 was not issued by this context"
        );
    }
}
