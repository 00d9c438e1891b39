use crate::basic_types::{InfRational, Literal};

/// One side of a variable's current `[lb, ub]` interval, together with the
/// literal whose assertion justifies it — `true_literal()` for the two
/// unbounded defaults every fresh variable starts with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bound {
    pub(crate) value: InfRational,
    pub(crate) reason: Literal,
}
