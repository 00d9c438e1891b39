use serde::Serialize;

use crate::basic_types::{Lbool, Literal};
use crate::sat::constraint::PropagateResult;

/// `ctr <-> exactly-one(lits)`, watched directly rather than expanded into
/// clauses.
///
/// All literals of `lits`, plus `ctr` and `!ctr`, sit on every watch list
/// this constraint cares about: any of them becoming `True` can trigger a
/// propagation, so the constraint watches all of them rather than just two.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExactOne {
    lits: Vec<Literal>,
    ctr: Literal,
}

impl ExactOne {
    pub(crate) fn new(lits: Vec<Literal>, ctr: Literal) -> Self {
        debug_assert!(lits.len() >= 2, "exact-one needs at least two literals");
        ExactOne { lits, ctr }
    }

    pub(crate) fn watched_literals(&self) -> impl Iterator<Item = Literal> + '_ {
        self.lits
            .iter()
            .copied()
            .chain(self.lits.iter().map(|&l| !l))
            .chain([self.ctr, !self.ctr])
    }

    /// `p` just became `True`. `value` reads the *current* lbool of any
    /// literal. `true_count` is the number of `lits` currently `True`.
    ///
    /// Returns `Ok(unit_literals)` with zero or more literals to enqueue
    /// (with this constraint as their reason), or `Err(())` on conflict (the
    /// caller reads the conflict back out via [`Self::get_reason`] with
    /// `p = None`).
    pub(crate) fn propagate(
        &self,
        p: Literal,
        value: impl Fn(Literal) -> Lbool,
    ) -> Result<PropagateResult, ()> {
        let to_enqueue = self.propagate_inner(p, value)?;
        Ok(PropagateResult {
            watch_move: None,
            to_enqueue,
        })
    }

    fn propagate_inner(
        &self,
        p: Literal,
        value: impl Fn(Literal) -> Lbool,
    ) -> Result<Vec<Literal>, ()> {
        let true_count = self.lits.iter().filter(|&&l| value(l) == Lbool::True).count();
        if p.variable() == self.ctr.variable() {
            // the control variable was assigned.
            if value(self.ctr) == Lbool::True {
                if true_count > 1 {
                    return Err(());
                }
                if true_count == 1 {
                    return Ok(vec![]);
                }
                // ctr is true, none of the literals are yet: nothing forced
                // unless exactly one remains undecided, handled below by the
                // per-literal branch; here we can at least propagate when
                // all-but-one are already false.
                let undecided: Vec<Literal> = self
                    .lits
                    .iter()
                    .copied()
                    .filter(|&l| value(l) != Lbool::False)
                    .collect();
                if undecided.len() == 1 {
                    return Ok(vec![undecided[0]]);
                }
            } else {
                // ctr is false: no constraint is implied on the literals.
            }
        } else {
            // one of `lits` (or its negation) was assigned.
            if true_count > 1 {
                return Err(());
            }
            if true_count == 1 {
                if value(self.ctr) == Lbool::False {
                    return Err(());
                }
                let mut forced: Vec<Literal> = self
                    .lits
                    .iter()
                    .copied()
                    .filter(|&l| value(l) == Lbool::Unassigned)
                    .map(|l| !l)
                    .collect();
                if value(self.ctr) == Lbool::Unassigned {
                    forced.push(self.ctr);
                }
                return Ok(forced);
            }
            let undecided_count = self.lits.iter().filter(|&&l| value(l) == Lbool::Unassigned).count();
            if undecided_count == 0 {
                // every literal is false: the exact-one cannot hold.
                if value(self.ctr) == Lbool::True {
                    return Err(());
                }
                if value(self.ctr) == Lbool::Unassigned {
                    return Ok(vec![!self.ctr]);
                }
            } else if undecided_count == 1 && value(self.ctr) == Lbool::True {
                let last = self.lits.iter().copied().find(|&l| value(l) == Lbool::Unassigned).unwrap();
                return Ok(vec![last]);
            }
        }
        Ok(vec![])
    }

    /// Reason for `p`: the negation of every other literal currently
    /// forcing the constraint. For an undefined `p` (conflict entry point)
    /// this returns the full falsifying set.
    pub(crate) fn get_reason(&self, p: Option<Literal>, value: impl Fn(Literal) -> Lbool) -> Vec<Literal> {
        let mut reason = Vec::new();
        for &l in &self.lits {
            if Some(l) == p {
                continue;
            }
            match value(l) {
                Lbool::True => reason.push(!l),
                Lbool::False => reason.push(l),
                Lbool::Unassigned => {}
            }
        }
        if Some(self.ctr) != p && Some(!self.ctr) != p {
            match value(self.ctr) {
                Lbool::True => reason.push(!self.ctr),
                Lbool::False => reason.push(self.ctr),
                Lbool::Unassigned => {}
            }
        }
        reason
    }

    pub(crate) fn simplify(&self, value: impl Fn(Literal) -> Lbool) -> bool {
        value(self.ctr) != Lbool::Unassigned
            && self.lits.iter().all(|&l| value(l) != Lbool::Unassigned)
    }
}
