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

//! Terminal solve status and its classification.
//!
//! The engine reports how a solve ended through an integer code. Codes are
//! grouped in ranges: `0` is optimal, `-1xx` a feasible point that could not
//! be proven optimal, `-2xx` infeasible, `-3xx` unbounded, `-40x` a limit
//! reached at a feasible point, `-41x` a limit reached at an infeasible
//! point, and `-5xx` failures, of which `-504` is a termination requested by
//! a callback. Not converging is a status, never an error.

use libc::c_int;
use nlbridge_sys::constants::KN_RC_USER_TERMINATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveClass {
    /// A locally optimal (or, for MIPs, optimal) solution was found.
    Optimal,
    /// A feasible point was found, optimality could not be established.
    FeasibleApproximate,
    /// The problem appears to be infeasible.
    Infeasible,
    /// The objective appears to be unbounded.
    Unbounded,
    /// A limit stopped the solve at a feasible point.
    LimitReachedFeasible,
    /// A limit stopped the solve before a feasible point was found.
    LimitReachedInfeasible,
    /// A callback asked the engine to stop.
    UserTermination,
    /// Any other engine failure.
    Failure,
}

impl std::fmt::Display for SolveClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveClass::Optimal => write!(f, "Optimal"),
            SolveClass::FeasibleApproximate => write!(f, "Feasible Approximate"),
            SolveClass::Infeasible => write!(f, "Infeasible"),
            SolveClass::Unbounded => write!(f, "Unbounded"),
            SolveClass::LimitReachedFeasible => write!(f, "Limit Reached (Feasible)"),
            SolveClass::LimitReachedInfeasible => write!(f, "Limit Reached (Infeasible)"),
            SolveClass::UserTermination => write!(f, "User Termination"),
            SolveClass::Failure => write!(f, "Failure"),
        }
    }
}

/// The terminal code returned by the engine's solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolveStatus(c_int);

impl SolveStatus {
    #[inline]
    pub const fn new(code: c_int) -> Self {
        Self(code)
    }

    /// The raw engine code.
    #[inline]
    pub const fn code(&self) -> c_int {
        self.0
    }

    pub fn class(&self) -> SolveClass {
        match self.0 {
            0 => SolveClass::Optimal,
            -199..=-100 => SolveClass::FeasibleApproximate,
            -299..=-200 => SolveClass::Infeasible,
            -399..=-300 => SolveClass::Unbounded,
            -409..=-400 => SolveClass::LimitReachedFeasible,
            -499..=-410 => SolveClass::LimitReachedInfeasible,
            KN_RC_USER_TERMINATION => SolveClass::UserTermination,
            _ => SolveClass::Failure,
        }
    }

    #[inline]
    pub fn is_optimal(&self) -> bool {
        self.class() == SolveClass::Optimal
    }

    /// Returns `true` if the engine stopped at a feasible point.
    #[inline]
    pub fn is_feasible(&self) -> bool {
        matches!(
            self.class(),
            SolveClass::Optimal
                | SolveClass::FeasibleApproximate
                | SolveClass::LimitReachedFeasible
        )
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.class(), self.0)
    }
}

impl From<SolveStatus> for c_int {
    fn from(status: SolveStatus) -> Self {
        status.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_follows_code_ranges() {
        let cases = [
            (0, SolveClass::Optimal),
            (-100, SolveClass::FeasibleApproximate),
            (-103, SolveClass::FeasibleApproximate),
            (-200, SolveClass::Infeasible),
            (-300, SolveClass::Unbounded),
            (-301, SolveClass::Unbounded),
            (-400, SolveClass::LimitReachedFeasible),
            (-406, SolveClass::LimitReachedFeasible),
            (-410, SolveClass::LimitReachedInfeasible),
            (-416, SolveClass::LimitReachedInfeasible),
            (-504, SolveClass::UserTermination),
            (-500, SolveClass::Failure),
            (-502, SolveClass::Failure),
            (1, SolveClass::Failure),
        ];
        for (code, class) in cases {
            assert_eq!(SolveStatus::new(code).class(), class, "code {}", code);
        }
    }

    #[test]
    fn test_feasibility() {
        assert!(SolveStatus::new(0).is_optimal());
        assert!(SolveStatus::new(-402).is_feasible());
        assert!(!SolveStatus::new(-410).is_feasible());
        assert!(!SolveStatus::new(-504).is_feasible());
    }

    #[test]
    fn test_display() {
        assert_eq!(SolveStatus::new(-202).to_string(), "Infeasible (-202)");
    }
}
