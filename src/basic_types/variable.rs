use serde::Serialize;

/// A propositional variable identity.
///
/// Variable `0` is reserved: in the SAT core it denotes the constant
/// `false`; in each difference-logic theory it additionally denotes the
/// graph origin, which always sits at distance `0` from itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Variable(u32);

impl Variable {
    /// The reserved `false`/origin variable.
    pub const ZERO: Variable = Variable(0);

    pub(crate) fn new(index: u32) -> Self {
        Variable(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}
