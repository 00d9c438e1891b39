use crate::basic_types::{InfRational, Literal, Variable};

/// Which side of `x op v` a posted assertion constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssertionOp {
    Leq,
    Geq,
}

impl std::fmt::Display for AssertionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssertionOp::Leq => write!(f, "<="),
            AssertionOp::Geq => write!(f, ">="),
        }
    }
}

/// A posted `x <= v` / `x >= v` constraint, control literal `b`, watching
/// variable `x`'s bounds so it can unit-propagate or conflict as they move.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Assertion {
    pub(crate) b: Literal,
    pub(crate) x: Variable,
    pub(crate) op: AssertionOp,
    pub(crate) v: InfRational,
}
