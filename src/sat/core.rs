use std::collections::VecDeque;

use fnv::FnvHashMap;
use log::{debug, trace};
use serde_json::json;

use crate::basic_types::{Lbool, Literal, Variable};
use crate::sat::clause::Clause;
use crate::sat::constraint::{ConstraintId, ConstraintKind};
use crate::sat::exact_one::ExactOne;
use crate::sat::listener::{ListenerRegistry, ValueListener};
use crate::theory::TheoryId;
use crate::{munchkin_assert_extreme, munchkin_assert_simple};

/// Outcome of dequeuing and clause-propagating a single literal. The caller
/// (the [`Solver`][crate::solver::Solver]) is responsible for the theory
/// propagation that must follow for the dispatched literal — the clause
/// layer of the core knows nothing about theories.
pub(crate) enum ClauseStep {
    /// The queue was empty; nothing was dispatched.
    Empty,
    /// Literal `p` was dequeued and every clause watcher handled it without
    /// conflict. The caller must still run theory propagation for `p`.
    Dispatched(Literal),
    /// A clause conflicted. The queue has been cleared; `reason` is the
    /// fully-falsified literal set to feed into [`SatCore::analyze`].
    Conflict(Vec<Literal>),
}

/// The propositional core: variable store, trail, two-watched-literal
/// clause propagation, first-UIP conflict analysis, and backjumping.
///
/// Theory orchestration is deliberately *not* here — see
/// [`crate::theory::Theory`]'s module doc and [`crate::solver::Solver`],
/// which owns both this core and the registered theories and drives the
/// interleaving between them.
#[derive(Debug, Clone)]
pub struct SatCore {
    constrs: Vec<ConstraintKind>,
    watches: Vec<Vec<ConstraintId>>,
    assigns: Vec<Lbool>,
    reason: Vec<Option<ConstraintId>>,
    level: Vec<usize>,

    prop_queue: VecDeque<Literal>,
    trail: Vec<Literal>,
    trail_lim: Vec<usize>,
    decisions: Vec<Literal>,

    binds: FnvHashMap<Variable, Vec<TheoryId>>,
    listeners: ListenerRegistry,
}

impl Default for SatCore {
    fn default() -> Self {
        Self::new()
    }
}

impl SatCore {
    pub fn new() -> Self {
        let mut core = SatCore {
            constrs: Vec::new(),
            watches: Vec::new(),
            assigns: Vec::new(),
            reason: Vec::new(),
            level: Vec::new(),
            prop_queue: VecDeque::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            decisions: Vec::new(),
            binds: FnvHashMap::default(),
            listeners: ListenerRegistry::default(),
        };
        let false_var = core.new_var();
        debug_assert_eq!(false_var, Variable::ZERO);
        core.assigns[Variable::ZERO.index()] = Lbool::False;
        core.level[Variable::ZERO.index()] = 0;
        core
    }

    pub fn new_var(&mut self) -> Variable {
        let index = self.assigns.len() as u32;
        self.assigns.push(Lbool::Unassigned);
        self.watches.push(Vec::new()); // positive literal's watch list
        self.watches.push(Vec::new()); // negative literal's watch list
        self.level.push(0);
        self.reason.push(None);
        Variable::new(index)
    }

    pub fn value(&self, x: Variable) -> Lbool {
        self.assigns[x.index()]
    }

    pub fn value_lit(&self, p: Literal) -> Lbool {
        Self::lit_value(&self.assigns, p)
    }

    fn lit_value(assigns: &[Lbool], p: Literal) -> Lbool {
        let v = assigns[p.variable().index()];
        if p.sign() {
            v
        } else {
            !v
        }
    }

    pub fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    pub fn root_level(&self) -> bool {
        self.trail_lim.is_empty()
    }

    pub(crate) fn bind(&mut self, v: Variable, th: TheoryId) {
        self.binds.entry(v).or_default().push(th);
    }

    pub(crate) fn bound_theories(&self, v: Variable) -> &[TheoryId] {
        self.binds.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn listen(&mut self, var: Variable, listener: std::rc::Rc<std::cell::RefCell<dyn ValueListener>>) {
        self.listeners.listen(var, listener);
    }

    // --- Clause construction -------------------------------------------------

    /// Only valid at root level. Sorts, drops duplicates/already-false
    /// literals, detects `{p, !p}` tautologies, and dispatches on the
    /// resulting size.
    pub fn new_clause(&mut self, mut lits: Vec<Literal>) -> bool {
        munchkin_assert_simple!(self.root_level());
        lits.sort();
        let mut kept: Vec<Literal> = Vec::with_capacity(lits.len());
        let mut prev: Option<Literal> = None;
        for &l in &lits {
            if self.value_lit(l) == Lbool::True || Some(!l) == prev {
                return true; // satisfied or a tautology
            }
            if self.value_lit(l) != Lbool::False && Some(l) != prev {
                kept.push(l);
                prev = Some(l);
            }
        }

        match kept.len() {
            0 => false,
            1 => self.enqueue(kept[0], None),
            _ => {
                self.add_clause(kept, false);
                true
            }
        }
    }

    fn add_clause(&mut self, lits: Vec<Literal>, is_learned: bool) -> ConstraintId {
        let clause = Clause::new(lits, is_learned);
        let (w0, w1) = clause.initial_watches();
        let id = ConstraintId(self.constrs.len() as u32);
        self.constrs.push(ConstraintKind::Clause(clause));
        self.watches[w0.index()].push(id);
        self.watches[w1.index()].push(id);
        trace!("+{}", id.index());
        id
    }

    /// `l <-> (a = b)`, emitted as the four equivalence clauses, with the
    /// usual trivial-case short circuits.
    pub fn new_eq(&mut self, left: Literal, right: Literal) -> Literal {
        munchkin_assert_simple!(self.root_level());
        if left == right {
            return crate::basic_types::true_literal();
        }
        match self.value_lit(left) {
            Lbool::True => return right,
            Lbool::False => return !right,
            Lbool::Unassigned => {}
        }
        match self.value_lit(right) {
            Lbool::True => return left,
            Lbool::False => return !left,
            Lbool::Unassigned => {}
        }
        let ctr = Literal::new(self.new_var(), true);
        let ok = self.new_clause(vec![ctr, left, right])
            && self.new_clause(vec![ctr, !left, !right])
            && self.new_clause(vec![!ctr, !left, right])
            && self.new_clause(vec![!ctr, left, !right]);
        if !ok {
            return crate::basic_types::FALSE_LITERAL;
        }
        ctr
    }

    /// Reified conjunction: dedups/sorts by variable, short-
    /// circuits on an already-resolved value, and only mints a fresh
    /// control literal when more than one undetermined literal remains.
    pub fn new_conj(&mut self, ls: Vec<Literal>) -> Literal {
        munchkin_assert_simple!(self.root_level());
        let kept = match self.filter_sorted(ls, Lbool::False, Lbool::True) {
            FilterOutcome::ShortCircuit(l) => return l,
            FilterOutcome::Kept(kept) => kept,
        };
        if kept.is_empty() {
            return crate::basic_types::true_literal();
        }
        if kept.len() == 1 {
            return kept[0];
        }
        let ctr = Literal::new(self.new_var(), true);
        let mut lits = Vec::with_capacity(kept.len() + 1);
        lits.push(ctr);
        for &l in &kept {
            if !self.new_clause(vec![!ctr, l]) {
                return crate::basic_types::FALSE_LITERAL;
            }
            lits.push(!l);
        }
        if !self.new_clause(lits) {
            return crate::basic_types::FALSE_LITERAL;
        }
        ctr
    }

    /// Reified disjunction: the dual of `new_conj`.
    pub fn new_disj(&mut self, ls: Vec<Literal>) -> Literal {
        munchkin_assert_simple!(self.root_level());
        let kept = match self.filter_sorted(ls, Lbool::True, Lbool::False) {
            FilterOutcome::ShortCircuit(l) => return l,
            FilterOutcome::Kept(kept) => kept,
        };
        if kept.is_empty() {
            return crate::basic_types::FALSE_LITERAL;
        }
        if kept.len() == 1 {
            return kept[0];
        }
        let ctr = Literal::new(self.new_var(), true);
        let mut lits = Vec::with_capacity(kept.len() + 1);
        lits.push(!ctr);
        for &l in &kept {
            if !self.new_clause(vec![ctr, !l]) {
                return crate::basic_types::FALSE_LITERAL;
            }
            lits.push(l);
        }
        if !self.new_clause(lits) {
            return crate::basic_types::FALSE_LITERAL;
        }
        ctr
    }

    /// At most one of `ls` is `True`: pairwise exclusion
    /// clauses plus a covering clause, reified under a fresh control
    /// literal when more than one undetermined literal remains.
    pub fn new_at_most_one(&mut self, ls: Vec<Literal>) -> Literal {
        munchkin_assert_simple!(self.root_level());
        let kept = match self.filter_at_most_one(ls) {
            FilterOutcome::ShortCircuit(l) => return l,
            FilterOutcome::Kept(kept) => kept,
        };
        if kept.is_empty() {
            return crate::basic_types::true_literal();
        }
        if kept.len() == 1 {
            return kept[0];
        }
        let ctr = Literal::new(self.new_var(), true);
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                if !self.new_clause(vec![!ctr, !kept[i], !kept[j]]) {
                    return crate::basic_types::FALSE_LITERAL;
                }
            }
        }
        let mut lits = kept.clone();
        lits.push(ctr);
        if !self.new_clause(lits) {
            return crate::basic_types::FALSE_LITERAL;
        }
        for i in 0..kept.len() {
            let mut c_lits = kept.clone();
            c_lits[i] = !c_lits[i];
            c_lits.push(ctr);
            if !self.new_clause(c_lits) {
                return crate::basic_types::FALSE_LITERAL;
            }
        }
        ctr
    }

    /// Exactly one of `ls` is `True`. Implemented as a dedicated watched
    /// [`ExactOne`] constraint rather than a clause expansion.
    pub fn new_exact_one(&mut self, ls: Vec<Literal>) -> Literal {
        munchkin_assert_simple!(self.root_level());
        let kept = match self.filter_at_most_one(ls) {
            FilterOutcome::ShortCircuit(l) => return l,
            FilterOutcome::Kept(kept) => kept,
        };
        if kept.is_empty() {
            return crate::basic_types::FALSE_LITERAL;
        }
        if kept.len() == 1 {
            return kept[0];
        }
        let ctr = Literal::new(self.new_var(), true);
        let constraint = ExactOne::new(kept, ctr);
        let id = ConstraintId(self.constrs.len() as u32);
        for l in constraint.watched_literals() {
            self.watches[l.index()].push(id);
        }
        self.constrs.push(ConstraintKind::ExactOne(constraint));
        ctr
    }

    fn filter_sorted(&self, mut ls: Vec<Literal>, short_circuit_on: Lbool, drop_on: Lbool) -> FilterOutcome {
        ls.sort_by_key(|l| l.variable());
        let mut kept = Vec::with_capacity(ls.len());
        let mut prev: Option<Literal> = None;
        for &l in &ls {
            let v = self.value_lit(l);
            if v == short_circuit_on || Some(!l) == prev {
                return FilterOutcome::ShortCircuit(if short_circuit_on == Lbool::True {
                    crate::basic_types::true_literal()
                } else {
                    crate::basic_types::FALSE_LITERAL
                });
            }
            if v != drop_on && Some(l) != prev {
                kept.push(l);
                prev = Some(l);
            }
        }
        FilterOutcome::Kept(kept)
    }

    fn filter_at_most_one(&self, mut ls: Vec<Literal>) -> FilterOutcome {
        ls.sort_by_key(|l| l.variable());
        let mut true_found = false;
        let mut kept = Vec::with_capacity(ls.len());
        for &l in &ls {
            match self.value_lit(l) {
                Lbool::True => {
                    if true_found {
                        return FilterOutcome::ShortCircuit(crate::basic_types::FALSE_LITERAL);
                    }
                    true_found = true;
                    kept.push(l);
                }
                Lbool::Unassigned => kept.push(l),
                Lbool::False => {}
            }
        }
        FilterOutcome::Kept(kept)
    }

    // --- Assignment / propagation --------------------------------------------

    /// Precondition: `value(p) == Unassigned` and the propagation queue is
    /// empty. Only pushes the decision and enqueues
    /// `p`; the caller ([`Solver::assume`][crate::solver::Solver::assume])
    /// pushes every theory's layer and drives `propagate()`.
    pub(crate) fn begin_assume(&mut self, p: Literal) -> bool {
        munchkin_assert_simple!(self.value_lit(p) == Lbool::Unassigned);
        munchkin_assert_simple!(self.prop_queue.is_empty());
        debug!("+[{p}]");
        self.trail_lim.push(self.trail.len());
        self.decisions.push(p);
        self.enqueue(p, None)
    }

    pub(crate) fn enqueue(&mut self, p: Literal, reason: Option<ConstraintId>) -> bool {
        match self.value_lit(p) {
            Lbool::True => true,
            Lbool::False => false,
            Lbool::Unassigned => {
                let var = p.variable();
                self.assigns[var.index()] = if p.sign() { Lbool::True } else { Lbool::False };
                self.level[var.index()] = self.decision_level();
                self.reason[var.index()] = reason;
                self.trail.push(p);
                self.prop_queue.push_back(p);
                self.listeners.fire_changed(var);
                true
            }
        }
    }

    /// Dequeues (at most) one literal and runs clause propagation for it
    ///. Returns [`ClauseStep::Empty`] without touching
    /// anything if the queue is already drained.
    pub(crate) fn step_clause_propagation(&mut self) -> ClauseStep {
        let Some(p) = self.prop_queue.pop_front() else {
            return ClauseStep::Empty;
        };

        let mut watchers = std::mem::take(&mut self.watches[p.index()]);
        let mut conflict_at = None;
        for i in 0..watchers.len() {
            let id = watchers[i];
            let constrs = &mut self.constrs;
            let assigns = &self.assigns;
            let result = constrs[id.index()].propagate(p, |l| Self::lit_value(assigns, l));
            match result {
                Ok(outcome) => {
                    let target = outcome.watch_move.unwrap_or(p.index());
                    self.watches[target].push(id);
                    for lit in outcome.to_enqueue {
                        if !self.enqueue(lit, Some(id)) {
                            conflict_at = Some(id);
                            break;
                        }
                    }
                    if conflict_at.is_some() {
                        break;
                    }
                }
                Err(()) => {
                    // this constraint keeps watching `p`; the rest of the
                    // not-yet-processed watchers are re-added verbatim.
                    self.watches[p.index()].push(id);
                    conflict_at = Some(id);
                    break;
                }
            }
        }

        if let Some(conflict_id) = conflict_at {
            // re-add every watcher we had not yet reached this pass.
            for id in watchers.drain(..).skip_while(|&w| w != conflict_id).skip(1) {
                self.watches[p.index()].push(id);
            }
            self.prop_queue.clear();
            let assigns = &self.assigns;
            let reason = self.constrs[conflict_id.index()].get_reason(None, |l| Self::lit_value(assigns, l));
            return ClauseStep::Conflict(reason);
        }

        ClauseStep::Dispatched(p)
    }

    // --- Conflict analysis and backjumping -----------------------------------

    /// First-UIP analysis. `p_reason` is
    /// the already-negated falsifying literal set of the conflicting
    /// constraint (i.e. `constraint.get_reason(None, ..)`, or the
    /// equivalent built from a theory's `cnfl` buffer). Pops the trail as
    /// it walks backward; returns the learned clause (asserting literal
    /// first) and the backjump level.
    pub(crate) fn analyze(&mut self, mut p_reason: Vec<Literal>) -> (Vec<Literal>, usize) {
        let mut seen: fnv::FnvHashSet<Variable> = fnv::FnvHashSet::default();
        let mut counter = 0usize;
        let mut p: Option<Literal> = None;
        let mut out_learnt = vec![crate::basic_types::FALSE_LITERAL]; // placeholder for slot 0
        let mut backtrack_level = 0usize;

        loop {
            for &q in &p_reason {
                let qv = q.variable();
                if seen.insert(qv) {
                    munchkin_assert_extreme!(self.value_lit(q) == Lbool::True);
                    if self.level[qv.index()] == self.decision_level() {
                        counter += 1;
                    } else if self.level[qv.index()] > 0 {
                        out_learnt.push(!q);
                        backtrack_level = backtrack_level.max(self.level[qv.index()]);
                    }
                }
            }

            loop {
                let last = *self.trail.last().expect("trail must be nonempty during analysis");
                munchkin_assert_extreme!(self.level[last.variable().index()] == self.decision_level());
                if let Some(reason_id) = self.reason[last.variable().index()] {
                    let assigns = &self.assigns;
                    p_reason = self.constrs[reason_id.index()].get_reason(Some(last), |l| Self::lit_value(assigns, l));
                }
                self.pop_trail_literal();
                p = Some(last);
                if seen.contains(&last.variable()) {
                    break;
                }
            }
            counter -= 1;
            if counter == 0 {
                break;
            }
        }

        let p = p.expect("first-UIP analysis must determine an asserting literal");
        munchkin_assert_extreme!(self.value_lit(p) == Lbool::Unassigned);
        out_learnt[0] = !p;
        (out_learnt, backtrack_level)
    }

    fn pop_trail_literal(&mut self) {
        let p = self.trail.pop().expect("pop_trail_literal called on empty trail");
        let v = p.variable();
        self.assigns[v.index()] = Lbool::Unassigned;
        self.level[v.index()] = 0;
        self.reason[v.index()] = None;
        self.listeners.fire_reset(v);
    }

    /// Records the learned clause. Caller must already have backjumped to
    /// the returned backtrack level before calling this.
    pub(crate) fn record(&mut self, mut lits: Vec<Literal>) {
        munchkin_assert_extreme!(self.value_lit(lits[0]) == Lbool::Unassigned);
        if lits.len() == 1 {
            munchkin_assert_simple!(self.root_level());
            let ok = self.enqueue(lits[0], None);
            munchkin_assert_simple!(ok);
            return;
        }
        let level = &self.level;
        lits[1..].sort_by_key(|l| std::cmp::Reverse(level[l.variable().index()]));
        let l0 = lits[0];
        let id = self.add_clause(lits, true);
        let ok = self.enqueue(l0, Some(id));
        munchkin_assert_simple!(ok);
    }

    /// Unwinds the trail to the start of the current decision level
    ///`). Does *not* call any theory's `pop()` — that
    /// is the [`Solver`][crate::solver::Solver]'s job, since theories live
    /// outside this core.
    pub(crate) fn pop_level(&mut self) {
        munchkin_assert_simple!(!self.trail_lim.is_empty());
        debug!("-[{}]", self.decisions.last().expect("decisions nonempty"));
        let floor = self.trail_lim[self.trail_lim.len() - 1];
        while self.trail.len() > floor {
            self.pop_trail_literal();
        }
        self.trail_lim.pop();
        self.decisions.pop();
    }

    /// Root-level-only constraint-database cleanup: drops every constraint
    /// whose `simplify()` reports permanent satisfaction. Watch lists are
    /// rebuilt from scratch since constraint identities shift.
    pub fn simplify_db(&mut self) -> bool {
        munchkin_assert_simple!(self.root_level());
        let assigns = self.assigns.clone();
        let mut kept = Vec::with_capacity(self.constrs.len());
        for mut c in std::mem::take(&mut self.constrs) {
            if !c.simplify(|l| Self::lit_value(&assigns, l)) {
                kept.push(c);
            }
        }
        self.constrs = kept;
        self.rebuild_watches();
        true
    }

    fn rebuild_watches(&mut self) {
        for w in &mut self.watches {
            w.clear();
        }
        for (idx, c) in self.constrs.iter().enumerate() {
            let id = ConstraintId(idx as u32);
            match c {
                ConstraintKind::Clause(clause) => {
                    let (w0, w1) = clause.initial_watches();
                    self.watches[w0.index()].push(id);
                    self.watches[w1.index()].push(id);
                }
                ConstraintKind::ExactOne(eo) => {
                    for l in eo.watched_literals() {
                        self.watches[l.index()].push(id);
                    }
                }
            }
        }
    }

    /// Duplicates this core into an independent snapshot: every constraint,
    /// the full trail and assignment state, and the listener registry (the
    /// listener objects themselves are shared, not copied) are carried over.
    /// Watches are rebuilt rather than cloned verbatim so the new core's
    /// watch lists don't alias the original's `Vec` allocations.
    pub fn copy(&self) -> SatCore {
        let mut snapshot = self.clone();
        snapshot.rebuild_watches();
        snapshot
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "num_vars": self.assigns.len(),
            "decision_level": self.decision_level(),
            "trail": self.trail.iter().map(|l| l.to_string()).collect::<Vec<_>>(),
            "num_constraints": self.constrs.len(),
        })
    }
}

enum FilterOutcome {
    ShortCircuit(Literal),
    Kept(Vec<Literal>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_clause_propagates_root_fact() {
        let mut sat = SatCore::new();
        let a = Literal::new(sat.new_var(), true);
        assert!(sat.new_clause(vec![a]));
        assert_eq!(sat.value_lit(a), Lbool::True);
    }

    #[test]
    fn clause_with_two_unassigned_literals_stays_undecided() {
        let mut sat = SatCore::new();
        let a = Literal::new(sat.new_var(), true);
        let b = Literal::new(sat.new_var(), true);
        assert!(sat.new_clause(vec![a, b]));
        assert_eq!(sat.value_lit(a), Lbool::Unassigned);
        assert_eq!(sat.value_lit(b), Lbool::Unassigned);
    }

    #[test]
    fn empty_clause_is_unsat_at_root() {
        let mut sat = SatCore::new();
        let a = Literal::new(sat.new_var(), true);
        assert!(sat.new_clause(vec![a]));
        assert!(!sat.new_clause(vec![!a]));
    }

    #[test]
    fn new_eq_short_circuits_on_identical_literal() {
        let mut sat = SatCore::new();
        let a = Literal::new(sat.new_var(), true);
        assert_eq!(sat.new_eq(a, a), crate::basic_types::true_literal());
    }

    #[test]
    fn copy_is_independent_of_the_original() {
        let mut sat = SatCore::new();
        let b1 = Literal::new(sat.new_var(), true);
        let snapshot = sat.copy();
        assert!(sat.begin_assume(b1));
        assert_eq!(sat.value_lit(b1), Lbool::True);
        assert_eq!(snapshot.value_lit(b1), Lbool::Unassigned);
    }
}
