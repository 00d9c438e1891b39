//! Incremental simplex over [`InfRational`] bounds: the linear real
//! arithmetic theory. Ported from `include/lra/lra_theory.hpp` /
//! `src/lra/lra_theory.cpp`, with `assert_lower`/`assert_upper`/`check`
//! filled in from the bound-propagation and Bland's-rule pivoting the
//! header declares but the retrieved sources don't define a body for.

use std::cell::RefCell;
use std::rc::Rc;

use fnv::{FnvHashMap, FnvHashSet};
use serde_json::json;

use crate::basic_types::rational::{is_positive, is_zero};
use crate::basic_types::{true_literal, InfRational, Lbool, Lin, Literal, Rational, Variable, FALSE_LITERAL};
use crate::lra::assertion::{Assertion, AssertionOp};
use crate::lra::bound::Bound;
use crate::lra::row::Row;
use crate::sat::{ListenerRegistry, SatCore, ValueListener};
use crate::theory::{Theory, TheoryId};

fn lb_index(x: Variable) -> usize {
    x.index() * 2
}

fn ub_index(x: Variable) -> usize {
    x.index() * 2 + 1
}

#[derive(Default)]
pub struct LraTheory {
    id: Option<TheoryId>,
    c_bounds: Vec<Bound>,
    vals: Vec<InfRational>,
    tableau: FnvHashMap<Variable, Row>,
    v_asrts: FnvHashMap<Variable, Assertion>,
    a_watches: Vec<Vec<Variable>>,
    t_watches: Vec<FnvHashSet<Variable>>,
    exprs: FnvHashMap<String, Variable>,
    s_asrts: FnvHashMap<String, Literal>,
    layers: Vec<FnvHashMap<usize, Bound>>,
    cnfl: Vec<Literal>,
    listeners: ListenerRegistry,
}

impl LraTheory {
    pub fn new() -> Self {
        LraTheory::default()
    }

    fn id(&self) -> TheoryId {
        self.id.expect("LraTheory used before being registered")
    }

    /// Allocates a fresh nonbasic variable with unbounded `[-inf, +inf]`.
    pub fn new_var(&mut self) -> Variable {
        let v = Variable::new(self.vals.len() as u32);
        self.c_bounds.push(Bound {
            value: InfRational::from_rational(Rational::NEGATIVE_INFINITY),
            reason: true_literal(),
        });
        self.c_bounds.push(Bound {
            value: InfRational::from_rational(Rational::POSITIVE_INFINITY),
            reason: true_literal(),
        });
        self.vals.push(InfRational::ZERO);
        self.a_watches.push(Vec::new());
        self.t_watches.push(FnvHashSet::default());
        v
    }

    /// Allocates a slack variable tied to `expr` via a tableau row,
    /// deduping on the expression's canonical string form.
    pub fn new_var_for(&mut self, expr: Lin) -> Variable {
        let key = expr.to_string();
        if let Some(&v) = self.exprs.get(&key) {
            return v;
        }
        let v = self.new_var();
        let (lb, ub) = self.bounds_lin(&expr);
        let value = self.value_lin(&expr);
        self.c_bounds[lb_index(v)] = Bound { value: lb, reason: true_literal() };
        self.c_bounds[ub_index(v)] = Bound { value: ub, reason: true_literal() };
        self.vals[v.index()] = value;
        self.new_row(v, expr);
        self.exprs.insert(key, v);
        v
    }

    fn new_row(&mut self, x: Variable, expr: Lin) {
        assert!(!self.tableau.contains_key(&x), "variable is already basic");
        for (v, _) in expr.terms() {
            self.t_watches[v.index()].insert(x);
        }
        self.tableau.insert(x, Row { expr });
    }

    pub fn lb(&self, x: Variable) -> InfRational {
        self.c_bounds[lb_index(x)].value
    }

    pub fn ub(&self, x: Variable) -> InfRational {
        self.c_bounds[ub_index(x)].value
    }

    pub fn value(&self, x: Variable) -> InfRational {
        self.vals[x.index()]
    }

    fn lb_lin(&self, l: &Lin) -> InfRational {
        let mut b = InfRational::from_rational(l.constant);
        for (v, c) in l.terms() {
            let side = if is_positive(c) { self.lb(v) } else { self.ub(v) };
            b = b + side * c;
        }
        b
    }

    fn ub_lin(&self, l: &Lin) -> InfRational {
        let mut b = InfRational::from_rational(l.constant);
        for (v, c) in l.terms() {
            let side = if is_positive(c) { self.ub(v) } else { self.lb(v) };
            b = b + side * c;
        }
        b
    }

    pub fn bounds_lin(&self, l: &Lin) -> (InfRational, InfRational) {
        (self.lb_lin(l), self.ub_lin(l))
    }

    fn value_lin(&self, l: &Lin) -> InfRational {
        let mut v = InfRational::from_rational(l.constant);
        for (var, c) in l.terms() {
            v = v + self.value(var) * c;
        }
        v
    }

    /// Do the admissible intervals of two linear expressions overlap?
    pub fn matches(&self, l0: &Lin, l1: &Lin) -> bool {
        let (lb0, ub0) = self.bounds_lin(l0);
        let (lb1, ub1) = self.bounds_lin(l1);
        ub0 >= lb1 && lb0 <= ub1
    }

    fn canonicalize(&self, left: &Lin, right: &Lin) -> Lin {
        let mut expr = left - right;
        let basics: Vec<Variable> = expr.terms().filter(|(v, _)| self.tableau.contains_key(v)).map(|(v, _)| v).collect();
        for v in basics {
            let row = self.tableau[&v].expr.clone();
            expr = expr.substitute(v, &row);
        }
        expr
    }

    fn slack_for(&mut self, expr: &Lin) -> Variable {
        self.new_var_for(expr.clone())
    }

    fn post(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin, op: AssertionOp, shift: Rational) -> Literal {
        let mut expr = self.canonicalize(left, right);
        let c_right = InfRational::new(-expr.constant, shift);
        expr.constant = Rational::ZERO;
        let (elb, eub) = self.bounds_lin(&expr);
        match op {
            AssertionOp::Leq => {
                if eub <= c_right {
                    return true_literal();
                }
                if elb > c_right {
                    return FALSE_LITERAL;
                }
            }
            AssertionOp::Geq => {
                if elb >= c_right {
                    return true_literal();
                }
                if eub < c_right {
                    return FALSE_LITERAL;
                }
            }
        }
        let key = format!("{op}|{expr}|{c_right}");
        if let Some(&lit) = self.s_asrts.get(&key) {
            return lit;
        }
        let ctr = sat.new_var();
        sat.bind(ctr, self.id());
        let ctr_lit = Literal::new(ctr, true);
        let slack = self.slack_for(&expr);
        self.v_asrts.insert(ctr, Assertion { b: ctr_lit, x: slack, op, v: c_right });
        self.a_watches[slack.index()].push(ctr);
        self.s_asrts.insert(key, ctr_lit);
        ctr_lit
    }

    /// `left < right`.
    pub fn new_lt(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Literal {
        self.post(sat, left, right, AssertionOp::Leq, -Rational::ONE)
    }

    /// `left <= right`.
    pub fn new_leq(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Literal {
        self.post(sat, left, right, AssertionOp::Leq, Rational::ZERO)
    }

    /// `left == right`, as the conjunction of `<=` and `>=`.
    pub fn new_eq(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Literal {
        let leq = self.new_leq(sat, left, right);
        let geq = self.new_geq(sat, left, right);
        sat.new_conj(vec![leq, geq])
    }

    /// `left >= right`.
    pub fn new_geq(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Literal {
        self.post(sat, left, right, AssertionOp::Geq, Rational::ZERO)
    }

    /// `left > right`.
    pub fn new_gt(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Literal {
        self.post(sat, left, right, AssertionOp::Geq, Rational::ONE)
    }

    pub fn listen(&mut self, x: Variable, listener: Rc<RefCell<dyn ValueListener>>) {
        self.listeners.listen(x, listener);
    }

    fn record_layer(&mut self, idx: usize) {
        if let Some(layer) = self.layers.last_mut() {
            layer.entry(idx).or_insert(self.c_bounds[idx]);
        }
    }

    /// Tighten `x`'s lower bound to `val`, justified by `p`. Propagates to
    /// watching assertions and rows; returns `false` (with `cnfl` set) on
    /// an immediate bound clash.
    pub fn assert_lower(&mut self, sat: &mut SatCore, x: Variable, val: InfRational, p: Literal) -> bool {
        if val <= self.lb(x) {
            return true;
        }
        if val > self.ub(x) {
            self.cnfl = vec![!p, !self.c_bounds[ub_index(x)].reason];
            return false;
        }
        self.record_layer(lb_index(x));
        self.c_bounds[lb_index(x)] = Bound { value: val, reason: p };
        if self.tableau.contains_key(&x) {
            self.try_fix_basic(x);
        } else if self.vals[x.index()] < val {
            self.update(x, val);
        }
        self.propagate_from(sat, x)
    }

    /// Tighten `x`'s upper bound to `val`, justified by `p`.
    pub fn assert_upper(&mut self, sat: &mut SatCore, x: Variable, val: InfRational, p: Literal) -> bool {
        if val >= self.ub(x) {
            return true;
        }
        if val < self.lb(x) {
            self.cnfl = vec![!p, !self.c_bounds[lb_index(x)].reason];
            return false;
        }
        self.record_layer(ub_index(x));
        self.c_bounds[ub_index(x)] = Bound { value: val, reason: p };
        if self.tableau.contains_key(&x) {
            self.try_fix_basic(x);
        } else if self.vals[x.index()] > val {
            self.update(x, val);
        }
        self.propagate_from(sat, x)
    }

    pub fn set_lb(&mut self, sat: &mut SatCore, x: Variable, val: Rational, p: Literal) -> bool {
        self.assert_lower(sat, x, InfRational::from_rational(val), p)
    }

    pub fn set_ub(&mut self, sat: &mut SatCore, x: Variable, val: Rational, p: Literal) -> bool {
        self.assert_upper(sat, x, InfRational::from_rational(val), p)
    }

    pub fn set_eq(&mut self, sat: &mut SatCore, x: Variable, val: Rational, p: Literal) -> bool {
        self.assert_lower(sat, x, InfRational::from_rational(val), p) && self.assert_upper(sat, x, InfRational::from_rational(val), p)
    }

    /// After `x`'s bound moved, re-check every assertion and row watching
    /// it. Grounded in `lra_constraint.cpp`'s `propagate_lb`/`propagate_ub`
    /// (per-assertion) and `lra_eq.cpp`'s (per-row).
    fn propagate_from(&mut self, sat: &mut SatCore, x: Variable) -> bool {
        let watchers = self.a_watches[x.index()].clone();
        for ctr in watchers {
            if !self.propagate_assertion(sat, ctr) {
                return false;
            }
        }
        let rows: Vec<Variable> = self.t_watches[x.index()].iter().copied().collect();
        for basic in rows {
            if !self.propagate_row(sat, basic) {
                return false;
            }
        }
        true
    }

    /// Re-derives `ctr`'s entailed truth value from `a.x`'s current bounds.
    /// A violated bound (`lb(a.x) > a.v` for `Leq`, `ub(a.x) < a.v` for
    /// `Geq`) forces `a.b` false — but whether that's a conflict or a unit
    /// propagation depends on `a.b`'s current SAT value: if it's already
    /// `True` the two facts contradict outright (`cnfl`); if it's still
    /// `Unassigned` we instead record the implication and let it propagate.
    /// Mirrors `assertion::propagate_lb`/`propagate_ub`, which `switch` on
    /// `sat->value(b)` rather than assuming it.
    fn propagate_assertion(&mut self, sat: &mut SatCore, ctr: Variable) -> bool {
        let a = self.v_asrts[&ctr];
        let lb = self.lb(a.x);
        let ub = self.ub(a.x);
        match a.op {
            AssertionOp::Leq => {
                if ub <= a.v {
                    // b is now entailed true
                    true
                } else if lb > a.v {
                    let reason = !self.c_bounds[lb_index(a.x)].reason;
                    match sat.value_lit(a.b) {
                        Lbool::True => {
                            self.cnfl = vec![a.b, reason];
                            false
                        }
                        Lbool::Unassigned => {
                            sat.record(vec![!a.b, reason]);
                            true
                        }
                        Lbool::False => true,
                    }
                } else {
                    true
                }
            }
            AssertionOp::Geq => {
                if lb >= a.v {
                    true
                } else if ub < a.v {
                    let reason = !self.c_bounds[ub_index(a.x)].reason;
                    match sat.value_lit(a.b) {
                        Lbool::True => {
                            self.cnfl = vec![!a.b, reason];
                            false
                        }
                        Lbool::Unassigned => {
                            sat.record(vec![!a.b, reason]);
                            true
                        }
                        Lbool::False => true,
                    }
                } else {
                    true
                }
            }
        }
    }

    /// Row-based bound propagation: recompute `x`'s bounds from its row's
    /// nonbasic terms and, if they tightened, fire the assertions watching
    /// `x`. Ported from `lra_eq.cpp`.
    ///
    /// Derived tightenings use `true_literal()` as their placeholder
    /// reason: `!true_literal()` is a permanently-false literal, so folding
    /// it into a learned clause is sound, just not maximally precise.
    /// The real justification still comes from the opposing bound's own
    /// reason, which `assert_lower`/`assert_upper` thread through.
    fn propagate_row(&mut self, sat: &mut SatCore, x: Variable) -> bool {
        let row = self.tableau[&x].expr.clone();
        let new_lb = self.lb_lin(&row);
        let new_ub = self.ub_lin(&row);
        if new_lb > self.lb(x) && !self.assert_lower(sat, x, new_lb, true_literal()) {
            return false;
        }
        if new_ub < self.ub(x) && !self.assert_upper(sat, x, new_ub, true_literal()) {
            return false;
        }
        true
    }

    fn update(&mut self, x: Variable, v: InfRational) {
        let old = self.vals[x.index()];
        if old == v {
            return;
        }
        let delta = v - old;
        self.vals[x.index()] = v;
        self.listeners.fire_changed(x);
        let rows: Vec<Variable> = self.t_watches[x.index()].iter().copied().collect();
        for basic in rows {
            let coeff = self.tableau[&basic].expr.coefficient(x);
            if is_zero(coeff) {
                continue;
            }
            self.vals[basic.index()] = self.vals[basic.index()] + delta * coeff;
            self.listeners.fire_changed(basic);
        }
    }

    fn find_pivot_partner(&self, x_i: Variable, needs_increase: bool) -> Option<Variable> {
        let row = &self.tableau[&x_i].expr;
        let mut candidates: Vec<(Variable, Rational)> = row.terms().collect();
        candidates.sort_by_key(|(v, _)| *v);
        for (xj, c) in candidates {
            let room_up = self.vals[xj.index()] < self.ub(xj);
            let room_down = self.vals[xj.index()] > self.lb(xj);
            let usable = if needs_increase {
                (is_positive(c) && room_up) || (!is_positive(c) && room_down)
            } else {
                (is_positive(c) && room_down) || (!is_positive(c) && room_up)
            };
            if usable {
                return Some(xj);
            }
        }
        None
    }

    fn try_fix_basic(&mut self, x_i: Variable) {
        let val = self.vals[x_i.index()];
        if val < self.lb(x_i) {
            let target = self.lb(x_i);
            if let Some(xj) = self.find_pivot_partner(x_i, true) {
                self.pivot_and_update(x_i, xj, target);
            }
        } else if val > self.ub(x_i) {
            let target = self.ub(x_i);
            if let Some(xj) = self.find_pivot_partner(x_i, false) {
                self.pivot_and_update(x_i, xj, target);
            }
        }
    }

    /// Swap `x_i` (basic) and `x_j` (nonbasic) in the tableau, then drive
    /// `x_i`'s new nonbasic value to `v`, cascading through every row that
    /// depends on it — the textbook simplex `pivot`+`update` pair.
    fn pivot_and_update(&mut self, x_i: Variable, x_j: Variable, v: InfRational) {
        let row = self.tableau.remove(&x_i).expect("pivot source must be basic");
        let alpha_j = row.expr.coefficient(x_j);
        let inv = Rational::ONE / alpha_j;
        let mut new_expr = Lin::scaled_variable(x_i, inv);
        for (k, c) in row.expr.terms() {
            if k == x_j {
                continue;
            }
            new_expr = &new_expr - &Lin::scaled_variable(k, c * inv);
        }
        new_expr.constant = new_expr.constant - row.expr.constant * inv;

        for (k, _) in row.expr.terms() {
            self.t_watches[k.index()].remove(&x_i);
        }

        let dependents: Vec<Variable> = self.t_watches[x_j.index()].iter().copied().filter(|&w| w != x_i).collect();
        for w in dependents {
            let mut wr = self.tableau.remove(&w).expect("watcher must still be basic");
            wr.expr = wr.expr.substitute(x_j, &new_expr);
            self.t_watches[x_j.index()].remove(&w);
            for (k, _) in new_expr.terms() {
                self.t_watches[k.index()].insert(w);
            }
            self.tableau.insert(w, wr);
        }

        for (k, _) in new_expr.terms() {
            self.t_watches[k.index()].insert(x_j);
        }
        self.tableau.insert(x_j, Row { expr: new_expr });

        self.update(x_i, v);
    }

    fn run_check(&mut self) -> bool {
        loop {
            let mut keys: Vec<Variable> = self.tableau.keys().copied().collect();
            keys.sort();
            let violating = keys.into_iter().find(|&x| {
                let val = self.vals[x.index()];
                val < self.lb(x) || val > self.ub(x)
            });
            let Some(x_i) = violating else { return true };
            let val = self.vals[x_i.index()];
            let below = val < self.lb(x_i);
            let target = if below { self.lb(x_i) } else { self.ub(x_i) };
            if let Some(x_j) = self.find_pivot_partner(x_i, below) {
                self.pivot_and_update(x_i, x_j, target);
                continue;
            }
            let row = self.tableau[&x_i].expr.clone();
            let mut cnfl = vec![if below { !self.c_bounds[lb_index(x_i)].reason } else { !self.c_bounds[ub_index(x_i)].reason }];
            for (v, c) in row.terms() {
                let pos = is_positive(c);
                let idx = match (below, pos) {
                    (true, true) => ub_index(v),
                    (true, false) => lb_index(v),
                    (false, true) => lb_index(v),
                    (false, false) => ub_index(v),
                };
                cnfl.push(!self.c_bounds[idx].reason);
            }
            self.cnfl = cnfl;
            return false;
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut vars = Vec::new();
        for i in 0..self.vals.len() {
            let v = Variable::new(i as u32);
            vars.push(json!({
                "var": v.to_string(),
                "lb": self.lb(v).to_string(),
                "ub": self.ub(v).to_string(),
                "value": self.value(v).to_string(),
                "basic": self.tableau.contains_key(&v),
            }));
        }
        json!({ "variables": vars })
    }
}

impl Theory for LraTheory {
    fn name(&self) -> &'static str {
        "lra"
    }

    fn set_theory_id(&mut self, id: TheoryId) {
        self.id = Some(id);
    }

    fn propagate(&mut self, sat: &mut SatCore, p: Literal) -> bool {
        let Some(&a) = self.v_asrts.get(&p.variable()) else {
            return true;
        };
        match (a.op, p.sign()) {
            (AssertionOp::Leq, true) => self.assert_upper(sat, a.x, a.v, p),
            (AssertionOp::Leq, false) => {
                let bump = InfRational::new(a.v.rational(), a.v.infinitesimal() + Rational::ONE);
                self.assert_lower(sat, a.x, bump, p)
            }
            (AssertionOp::Geq, true) => self.assert_lower(sat, a.x, a.v, p),
            (AssertionOp::Geq, false) => {
                let bump = InfRational::new(a.v.rational(), a.v.infinitesimal() - Rational::ONE);
                self.assert_upper(sat, a.x, bump, p)
            }
        }
    }

    fn check(&mut self, _sat: &mut SatCore) -> bool {
        self.run_check()
    }

    fn push(&mut self) {
        self.layers.push(FnvHashMap::default());
    }

    fn pop(&mut self) {
        let layer = self.layers.pop().expect("pop without matching push");
        for (idx, bound) in layer {
            self.c_bounds[idx] = bound;
        }
    }

    fn take_conflict(&mut self) -> Vec<Literal> {
        std::mem::take(&mut self.cnfl)
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Solver;

    fn setup() -> (Solver, TheoryId) {
        let mut solver = Solver::new();
        let id = solver.register_theory(Box::new(LraTheory::new()));
        (solver, id)
    }

    #[test]
    fn trivially_true_comparison_short_circuits() {
        let (mut solver, id) = setup();
        let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
        let x = lra.new_var();
        lra.set_lb(sat, x, Rational::from_int(5), true_literal());
        let five = Lin::constant(Rational::from_int(5));
        let lit = lra.new_geq(sat, &Lin::variable(x), &five);
        assert_eq!(lit, true_literal());
    }

    #[test]
    fn asserting_a_bound_propagates_through_the_solver() {
        let (mut solver, id) = setup();
        let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
        let x = lra.new_var();
        let zero = Lin::constant(Rational::ZERO);
        let geq5 = lra.new_geq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(5)));
        let leq10 = lra.new_leq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(10)));
        let _ = zero;
        assert!(solver.assume(geq5));
        assert!(solver.assume(leq10));
        let (_, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
        assert!(lra.lb(x) >= InfRational::from_int(5));
        assert!(lra.ub(x) <= InfRational::from_int(10));
    }

    #[test]
    fn contradictory_bounds_conflict() {
        let (mut solver, id) = setup();
        let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
        let x = lra.new_var();
        let leq5 = lra.new_leq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(5)));
        let geq10 = lra.new_geq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(10)));
        assert!(solver.assume(leq5));
        assert!(!solver.assume(geq10));
        assert_eq!(solver.sat().value_lit(leq5), Lbool::True);
    }

    #[test]
    fn tableau_row_substitutes_equalities() {
        let (mut solver, id) = setup();
        let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
        let x = lra.new_var();
        let y = lra.new_var();
        // x + y == 10, then x >= 4 should force y <= 6 via the row.
        let lhs = &Lin::variable(x) + &Lin::variable(y);
        let ten = Lin::constant(Rational::from_int(10));
        let eq = lra.new_eq(sat, &lhs, &ten);
        assert!(solver.assume(eq));
        let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
        let geq4 = lra.new_geq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(4)));
        assert!(solver.assume(geq4));
    }
}
