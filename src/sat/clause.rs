use serde::Serialize;

use crate::basic_types::{Lbool, Literal};
use crate::sat::constraint::PropagateResult;

/// A problem or learned clause over `n >= 2` literals, watched on its
/// first two literals per the two-watched-literal scheme.
/// Ported from `include/clause.hpp` / `src/clause.cpp`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Clause {
    literals: Vec<Literal>,
    is_learned: bool,
}

impl Clause {
    pub(crate) fn new(literals: Vec<Literal>, is_learned: bool) -> Self {
        debug_assert!(literals.len() >= 2, "a clause needs at least two literals");
        Clause {
            literals,
            is_learned,
        }
    }

    pub(crate) fn is_learned(&self) -> bool {
        self.is_learned
    }

    pub(crate) fn literals(&self) -> &[Literal] {
        &self.literals
    }

    /// The two literals this clause is initially watched on: `!literals[0]`
    /// and `!literals[1]`.
    pub(crate) fn initial_watches(&self) -> (Literal, Literal) {
        (!self.literals[0], !self.literals[1])
    }

    /// `p` just became `True`, and this clause was watching `p` (i.e. one
    /// of `!literals[0]`/`!literals[1]` equals `p`). Canonicalizes so
    /// `literals[1] = !p`, then either finds a fresh literal to watch or
    /// reports the clause as unit/conflicting under `literals[0]`.
    pub(crate) fn propagate(
        &mut self,
        p: Literal,
        value: impl Fn(Literal) -> Lbool,
    ) -> Result<PropagateResult, ()> {
        if self.literals[0].variable() == p.variable() {
            self.literals.swap(0, 1);
        }
        debug_assert_eq!(self.literals[1].variable(), p.variable());

        if value(self.literals[0]) == Lbool::True {
            // already satisfied: keep watching the same literal.
            return Ok(PropagateResult {
                watch_move: None,
                to_enqueue: vec![],
            });
        }

        for i in 2..self.literals.len() {
            if value(self.literals[i]) != Lbool::False {
                self.literals.swap(1, i);
                return Ok(PropagateResult {
                    watch_move: Some((!self.literals[1]).index()),
                    to_enqueue: vec![],
                });
            }
        }

        // the clause is unit under the current assignment (or conflicting).
        if value(self.literals[0]) == Lbool::False {
            return Err(());
        }
        Ok(PropagateResult {
            watch_move: None,
            to_enqueue: vec![self.literals[0]],
        })
    }

    /// Reason for literal `p` (one of this clause's literals, now True):
    /// the negations of every other literal. For an undefined `p` (the
    /// conflict-analysis entry point), returns the negation of every
    /// literal — valid because a clause conflicts only when all of its
    /// literals are currently False.
    pub(crate) fn get_reason(&self, p: Option<Literal>, _value: impl Fn(Literal) -> Lbool) -> Vec<Literal> {
        self.literals
            .iter()
            .filter(|&&l| Some(l) != p)
            .map(|&l| !l)
            .collect()
    }

    /// Root-level-only: drop satisfied/falsified literals in place, and
    /// report whether the whole clause is now permanently satisfied (in
    /// which case the caller should drop the constraint entirely).
    pub(crate) fn simplify_permanently_satisfied(&mut self, value: impl Fn(Literal) -> Lbool) -> bool {
        let mut kept = Vec::with_capacity(self.literals.len());
        for &lit in &self.literals {
            match value(lit) {
                Lbool::True => return true,
                Lbool::Unassigned => kept.push(lit),
                Lbool::False => {}
            }
        }
        self.literals = kept;
        false
    }
}

impl std::fmt::Display for Clause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self
            .literals
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(" \u{2228} ");
        write!(f, "({body})[learned:{}]", self.is_learned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic_types::Variable;

    fn lit(idx: u32, sign: bool) -> Literal {
        Literal::new(Variable::new(idx), sign)
    }

    #[test]
    fn propagate_moves_watch_to_fresh_nonfalse_literal() {
        let mut c = Clause::new(vec![lit(1, true), lit(2, true), lit(3, true)], false);
        let values = |l: Literal| if l == lit(3, true) { Lbool::Unassigned } else { Lbool::Unassigned };
        let result = c.propagate(lit(2, false), values).unwrap();
        assert!(result.watch_move.is_some());
        assert!(result.to_enqueue.is_empty());
    }

    #[test]
    fn propagate_reports_unit_when_no_fresh_literal_found() {
        let mut c = Clause::new(vec![lit(1, true), lit(2, true)], false);
        let values = |l: Literal| if l == lit(1, true) { Lbool::Unassigned } else { Lbool::True };
        let result = c.propagate(lit(2, false), values).unwrap();
        assert_eq!(result.to_enqueue, vec![lit(1, true)]);
    }

    #[test]
    fn propagate_conflicts_when_both_watched_literals_false() {
        let mut c = Clause::new(vec![lit(1, true), lit(2, true)], false);
        let values = |_: Literal| Lbool::False;
        assert!(c.propagate(lit(2, false), values).is_err());
    }
}
