use serde::Serialize;

use crate::basic_types::{Lbool, Literal};
use crate::sat::clause::Clause;
use crate::sat::exact_one::ExactOne;

/// The closed set of built-in constraint kinds. `Conj`/`Disj`/`Eq`/`AtMostOne`
/// are *not* separate variants: their factories expand directly into
/// `Clause`s (see [`crate::sat::core::SatCore::new_eq`] and friends) — only
/// `Clause` and `ExactOne` need dedicated watched machinery.
///
/// Tagged-variant dispatch rather than a trait object: the set of built-in
/// constraints is closed at compile time.
#[derive(Debug, Clone, Serialize)]
pub(crate) enum ConstraintKind {
    Clause(Clause),
    ExactOne(ExactOne),
}

/// Index into [`SatCore`][crate::sat::core::SatCore]'s constraint arena.
/// Reasons and watch lists hold this rather than a reference, so the
/// reason graph can be cyclic without reference counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub(crate) struct ConstraintId(pub(crate) u32);

impl ConstraintId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a constraint's `propagate` wants the core to do with its watch
/// list entry, plus any literals it now forces`).
pub(crate) struct PropagateResult {
    /// `None` to keep watching the same literal index; `Some(idx)` to move
    /// the watch to a different literal's index (only `Clause` ever does
    /// this — `ExactOne` watches every literal permanently).
    pub(crate) watch_move: Option<usize>,
    /// Literals this constraint now forces to `True`, with itself as the
    /// reason. Usually zero or one; `ExactOne`'s control-variable branch can
    /// force several at once.
    pub(crate) to_enqueue: Vec<Literal>,
}

impl ConstraintKind {
    /// `Ok` on success (with zero or more literals to enqueue), `Err(())`
    /// on conflict — in which case the caller reads the conflict back out
    /// via `get_reason(None, ..)`.
    pub(crate) fn propagate(
        &mut self,
        p: Literal,
        value: impl Fn(Literal) -> Lbool,
    ) -> Result<PropagateResult, ()> {
        match self {
            ConstraintKind::Clause(clause) => clause.propagate(p, value),
            ConstraintKind::ExactOne(eo) => eo.propagate(p, value),
        }
    }

    pub(crate) fn get_reason(&self, p: Option<Literal>, value: impl Fn(Literal) -> Lbool) -> Vec<Literal> {
        match self {
            ConstraintKind::Clause(clause) => clause.get_reason(p, value),
            ConstraintKind::ExactOne(eo) => eo.get_reason(p, value),
        }
    }

    pub(crate) fn simplify(&mut self, value: impl Fn(Literal) -> Lbool) -> bool {
        match self {
            ConstraintKind::Clause(clause) => clause.simplify_permanently_satisfied(value),
            ConstraintKind::ExactOne(eo) => eo.simplify(value),
        }
    }
}
