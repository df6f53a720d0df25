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
use nlbridge_sys::constants::{
    KN_OBJGOAL_MAXIMIZE, KN_OBJGOAL_MINIMIZE, KN_VARTYPE_BINARY, KN_VARTYPE_CONTINUOUS,
    KN_VARTYPE_INTEGER,
};

/// Domain of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableType {
    #[default]
    Continuous,
    Integer,
    Binary,
}

impl VariableType {
    #[inline]
    pub fn to_raw(self) -> c_int {
        match self {
            VariableType::Continuous => KN_VARTYPE_CONTINUOUS,
            VariableType::Integer => KN_VARTYPE_INTEGER,
            VariableType::Binary => KN_VARTYPE_BINARY,
        }
    }

    #[inline]
    pub fn from_raw(code: c_int) -> Option<Self> {
        match code {
            KN_VARTYPE_CONTINUOUS => Some(VariableType::Continuous),
            KN_VARTYPE_INTEGER => Some(VariableType::Integer),
            KN_VARTYPE_BINARY => Some(VariableType::Binary),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "continuous"),
            VariableType::Integer => write!(f, "integer"),
            VariableType::Binary => write!(f, "binary"),
        }
    }
}

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectiveGoal {
    #[default]
    Minimize,
    Maximize,
}

impl ObjectiveGoal {
    #[inline]
    pub fn to_raw(self) -> c_int {
        match self {
            ObjectiveGoal::Minimize => KN_OBJGOAL_MINIMIZE,
            ObjectiveGoal::Maximize => KN_OBJGOAL_MAXIMIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_type_codes() {
        for kind in [
            VariableType::Continuous,
            VariableType::Integer,
            VariableType::Binary,
        ] {
            assert_eq!(VariableType::from_raw(kind.to_raw()), Some(kind));
        }
        assert_eq!(VariableType::from_raw(9), None);
    }

    #[test]
    fn test_goal_codes_differ() {
        assert_ne!(
            ObjectiveGoal::Minimize.to_raw(),
            ObjectiveGoal::Maximize.to_raw()
        );
    }
}
