//! The plug-in protocol a decision procedure implements to participate in
//! the CDCL search loop.
//!
//! A theory receives control only through [`Solver::propagate`][crate::solver::Solver::propagate]'s
//! main loop: it is handed a `&mut SatCore` so it can read literal values
//! and [`SatCore::record`] derived unit clauses, but it never stores that
//! reference permanently. Keeping the reference call-scoped rather than
//! stashed on the struct avoids an ownership cycle between the theory and
//! the core it propagates into.
//!
//! Factory methods specific to a theory (`new_var`, `new_leq`, ...) are
//! *not* part of this trait: they live on the concrete theory type and are
//! called directly by the owner of both the theory and the [`SatCore`]
//! (see [`crate::solver::Solver`]), which can freely split-borrow its own
//! fields to hand out `&mut SatCore` alongside `&mut dyn Theory`.

use std::any::Any;

use crate::basic_types::Literal;
use crate::sat::SatCore;

/// Stable identity of a theory registered with a [`Solver`][crate::solver::Solver],
/// used by the theory itself to `bind` the propositional variables it
/// wants to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TheoryId(pub(crate) usize);

/// The four operations every theory plugin must provide.
pub trait Theory: Any {
    fn name(&self) -> &'static str;

    /// Told its own id right after registration, so it can `bind` the
    /// propositional variables its factory methods mint.
    fn set_theory_id(&mut self, id: TheoryId);

    /// Called once for every newly assigned literal `p` this theory is
    /// bound to. Returns `true` if propagation succeeded (possibly after
    /// calling [`SatCore::record`] zero or more times), `false` if a
    /// conflict was detected — in which case [`Theory::take_conflict`]
    /// must return the conflicting (currently-true) literal set.
    fn propagate(&mut self, sat: &mut SatCore, p: Literal) -> bool;

    /// Called once per `propagate()` drain, after the propagation queue is
    /// empty, to let the theory perform a global consistency check (e.g.
    /// the simplex `check()` or the distance-graph negative-cycle scan).
    fn check(&mut self, sat: &mut SatCore) -> bool;

    /// Push a new layer: the theory must remember enough to undo every
    /// mutation made until the matching `pop()`.
    fn push(&mut self);

    /// Undo back to the state before the most recent unmatched `push()`.
    fn pop(&mut self);

    /// Drains and returns the conflicting literal set published by the
    /// most recent failing `propagate`/`check` call.
    fn take_conflict(&mut self) -> Vec<Literal>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
