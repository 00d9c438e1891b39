use thiserror::Error;

/// Errors that are reachable from ordinary (if misguided) caller input,
/// rather than internal programming bugs. Precondition
/// violations are asserted, not returned, via [`crate::munchkin_assert_simple`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmtError {
    /// An IDL/RDL query (`bounds`, `distance`) was given a linear
    /// expression whose shape is not a difference of at most two variables.
    #[error("linear expression `{detail}` cannot be expressed as a difference-logic term")]
    OutOfRangeExpression { detail: String },

    /// The IDL/RDL theory does not implement general-linear-expression
    /// comparators; callers needing them should use LRA instead.
    #[error("comparator `{0}` is not implemented for general linear expressions in difference logic; use LRA instead")]
    Unimplemented(&'static str),
}
