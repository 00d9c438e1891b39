//! Orchestrates the propositional core and every registered theory: the
//! interleaved `propagate()` main loop, `assume`/`pop`, and theory
//! registration. This is the component `SatCore` and `Theory` were
//! deliberately designed not to need a reference to each other for —
//! `Solver` owns both and freely split-borrows its own fields.

use std::any::Any;

use log::debug;
use serde_json::json;

use crate::basic_types::Literal;
use crate::sat::core::ClauseStep;
use crate::sat::SatCore;
use crate::theory::{Theory, TheoryId};

pub struct Solver {
    sat: SatCore,
    theories: Vec<Box<dyn Theory>>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            sat: SatCore::new(),
            theories: Vec::new(),
        }
    }

    /// Wraps an existing core (e.g. a [`SatCore::copy`] snapshot) in a fresh
    /// solver with no registered theories.
    pub fn from_sat(sat: SatCore) -> Self {
        Solver {
            sat,
            theories: Vec::new(),
        }
    }

    pub fn sat(&self) -> &SatCore {
        &self.sat
    }

    pub fn sat_mut(&mut self) -> &mut SatCore {
        &mut self.sat
    }

    /// Registers a theory and returns its stable [`TheoryId`], which the
    /// theory itself uses when calling [`SatCore::bind`] to subscribe to
    /// propositional variables.
    pub fn register_theory(&mut self, mut theory: Box<dyn Theory>) -> TheoryId {
        let id = TheoryId(self.theories.len());
        theory.set_theory_id(id);
        self.theories.push(theory);
        id
    }

    pub fn theory(&self, id: TheoryId) -> &dyn Theory {
        self.theories[id.0].as_ref()
    }

    pub fn theory_mut(&mut self, id: TheoryId) -> &mut dyn Theory {
        self.theories[id.0].as_mut()
    }

    pub fn theory_as<T: Any>(&mut self, id: TheoryId) -> Option<&mut T> {
        self.theories[id.0].as_any_mut().downcast_mut::<T>()
    }

    /// Split-borrows the core and a concrete theory simultaneously, for
    /// callers that need to invoke a theory's own factory methods (which
    /// take `&mut SatCore` explicitly rather than holding one).
    pub fn sat_and_theory<T: Any>(&mut self, id: TheoryId) -> (&mut SatCore, &mut T) {
        let theory = self.theories[id.0]
            .as_any_mut()
            .downcast_mut::<T>()
            .expect("theory type mismatch");
        (&mut self.sat, theory)
    }

    /// Decide `p` and propagate to a fixpoint. Returns `false` if the
    /// decision conflicts (and, when at the root level, the problem is
    /// unsatisfiable).
    pub fn assume(&mut self, p: Literal) -> bool {
        for theory in &mut self.theories {
            theory.push();
        }
        if !self.sat.begin_assume(p) {
            return false;
        }
        self.propagate()
    }

    /// Undo the most recent unmatched `assume`. Pops every theory's layer
    /// after unwinding the core's trail.
    pub fn pop(&mut self) {
        self.sat.pop_level();
        for theory in &mut self.theories {
            theory.pop();
        }
    }

    /// Drains the propagation queue, interleaving clause propagation and
    /// theory propagation for every dispatched literal, then lets each
    /// theory run its global `check()`. A conflict at any stage triggers
    /// analysis and backjumping; the whole loop restarts after a backjump,
    /// since popped decisions may free up further propagation.
    pub fn propagate(&mut self) -> bool {
        'restart: loop {
            loop {
                match self.sat.step_clause_propagation() {
                    ClauseStep::Empty => break,
                    ClauseStep::Conflict(reason) => {
                        if !self.resolve_conflict(reason) {
                            return false;
                        }
                        continue 'restart;
                    }
                    ClauseStep::Dispatched(p) => {
                        let bound = self.sat.bound_theories(p.variable()).to_vec();
                        let mut conflicted = None;
                        for tid in bound {
                            if !self.theories[tid.0].propagate(&mut self.sat, p) {
                                conflicted = Some(tid);
                                break;
                            }
                        }
                        if let Some(tid) = conflicted {
                            let reason = self.theories[tid.0].take_conflict();
                            if !self.resolve_conflict(reason) {
                                return false;
                            }
                            continue 'restart;
                        }
                    }
                }
            }

            let mut conflicted = None;
            for (idx, theory) in self.theories.iter_mut().enumerate() {
                if !theory.check(&mut self.sat) {
                    conflicted = Some(TheoryId(idx));
                    break;
                }
            }
            if let Some(tid) = conflicted {
                let reason = self.theories[tid.0].take_conflict();
                if !self.resolve_conflict(reason) {
                    return false;
                }
                continue 'restart;
            }

            return true;
        }
    }

    /// Shared tail of both the clause- and theory-conflict paths: analyze,
    /// backjump, record, unless we are already at the root (in which case
    /// the problem is unsatisfiable and there is nothing left to undo).
    fn resolve_conflict(&mut self, reason: Vec<Literal>) -> bool {
        if self.sat.root_level() {
            return false;
        }
        let (learnt, backtrack_level) = self.sat.analyze(reason);
        debug!("conflict, backjumping to level {backtrack_level}");
        while self.sat.decision_level() > backtrack_level {
            self.pop();
        }
        self.sat.record(learnt);
        true
    }

    /// Root-level-only constraint-database cleanup, passed through to the
    /// core.
    pub fn simplify_db(&mut self) -> bool {
        self.sat.simplify_db()
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "sat": self.sat.to_json(),
            "theories": self.theories.iter().map(|t| t.name()).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::Lbool;

    #[test]
    fn assume_and_propagate_drives_unit_clauses() {
        let mut solver = Solver::new();
        let a = Literal::new(solver.sat_mut().new_var(), true);
        let b = Literal::new(solver.sat_mut().new_var(), true);
        assert!(solver.sat_mut().new_clause(vec![!a, b]));
        assert!(solver.assume(a));
        assert_eq!(solver.sat().value_lit(b), Lbool::True);
        solver.pop();
        assert_eq!(solver.sat().value_lit(b), Lbool::Unassigned);
    }

    #[test]
    fn root_level_conflict_is_detected_as_unsat() {
        let mut solver = Solver::new();
        let a = Literal::new(solver.sat_mut().new_var(), true);
        let b = Literal::new(solver.sat_mut().new_var(), true);
        assert!(solver.sat_mut().new_clause(vec![a, b]));
        assert!(solver.sat_mut().new_clause(vec![a, !b]));
        assert!(solver.sat_mut().new_clause(vec![!a]));
        assert!(!solver.propagate());
    }
}
