use std::cell::RefCell;
use std::rc::Rc;

use fnv::{FnvHashMap, FnvHashSet};
use serde_json::json;

use crate::basic_types::{true_literal, Lin, Literal, Rational, SmtError, Variable, FALSE_LITERAL};
use crate::dl::value::DistanceValue;
use crate::sat::{ListenerRegistry, SatCore, ValueListener};
use crate::theory::{Theory, TheoryId};

/// A posted `to - from <= dist` edge, control literal `b`. Registered under
/// `var_dists[var(b)]` for propagation and under `dist_constrs[(from,to)]`
/// so a caller can enumerate the constraints it has posted between a pair.
#[derive(Debug, Clone, Copy)]
struct DistanceConstraint<D> {
    from: Variable,
    to: Variable,
    dist: D,
}

#[derive(Default)]
struct Layer<D> {
    old_dists: FnvHashMap<(Variable, Variable), D>,
    old_preds: FnvHashMap<(Variable, Variable), Variable>,
    old_cause: FnvHashMap<(Variable, Variable), Option<Literal>>,
}

/// Incremental all-pairs shortest-path difference logic, generic over the
/// edge-weight type `D` (see [`DistanceValue`]). Variable `0` is the graph
/// origin, per the data model: `lb(v) = -dists[v][0]`, `ub(v) = dists[0][v]`.
pub struct DistanceLogicTheory<D: DistanceValue> {
    id: Option<TheoryId>,
    n_vars: usize,
    dists: Vec<Vec<D>>,
    preds: Vec<Vec<Variable>>,
    /// For each pair whose current `dists` entry was tightened by a
    /// specific asserted edge, the control literal of that edge. Used to
    /// reconstruct the literal set of a negative cycle without re-deriving
    /// it from the vertex-only `preds` matrix, which (per spec) records
    /// only the midpoint vertex of the relaxing edge, not the literal.
    cause: FnvHashMap<(Variable, Variable), Literal>,
    var_dists: FnvHashMap<Variable, DistanceConstraint<D>>,
    /// Every control literal posted for the ordered pair `(from, to)`, in
    /// posting order. Read back via [`Self::constraints_between`].
    dist_constrs: FnvHashMap<(Variable, Variable), Vec<Literal>>,
    layers: Vec<Layer<D>>,
    cnfl: Vec<Literal>,
    listeners: ListenerRegistry,
}

impl<D: DistanceValue> Default for DistanceLogicTheory<D> {
    fn default() -> Self {
        Self::with_capacity(16)
    }
}

impl<D: DistanceValue> DistanceLogicTheory<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sizes the distance/predecessor matrices to `size x size`,
    /// matching `idl_theory`'s constructor default of 16.
    pub fn with_capacity(size: usize) -> Self {
        let size = size.max(1);
        let mut dists = vec![vec![D::infinity(); size]; size];
        let mut preds: Vec<Vec<Variable>> = vec![vec![Variable::ZERO; size]; size];
        for i in 0..size {
            dists[i][i] = D::zero();
            preds[i][i] = Variable::new(i as u32);
        }
        DistanceLogicTheory {
            id: None,
            n_vars: 1,
            dists,
            preds,
            cause: FnvHashMap::default(),
            var_dists: FnvHashMap::default(),
            dist_constrs: FnvHashMap::default(),
            layers: Vec::new(),
            cnfl: Vec::new(),
            listeners: ListenerRegistry::default(),
        }
    }

    fn id(&self) -> TheoryId {
        self.id.expect("DistanceLogicTheory used before being registered")
    }

    /// Allocates a fresh graph node, growing the distance/predecessor
    /// matrices `(old_len * 3) / 2 + 1` at a time when they run out of
    /// room, matching `idl_theory::resize`.
    pub fn new_var(&mut self) -> Variable {
        let v = Variable::new(self.n_vars as u32);
        self.n_vars += 1;
        if self.n_vars > self.dists.len() {
            self.resize((self.dists.len() * 3) / 2 + 1);
        }
        v
    }

    fn resize(&mut self, size: usize) {
        let old_size = self.dists.len();
        if size <= old_size {
            return;
        }
        for row in &mut self.dists {
            row.resize(size, D::infinity());
        }
        for row in &mut self.preds {
            row.resize(size, Variable::ZERO);
        }
        self.dists.resize(size, vec![D::infinity(); size]);
        self.preds.resize(size, vec![Variable::ZERO; size]);
        for i in old_size..size {
            self.dists[i][i] = D::zero();
            self.preds[i][i] = Variable::new(i as u32);
        }
    }

    pub fn lb(&self, v: Variable) -> D {
        self.dists[v.index()][0].negate()
    }

    pub fn ub(&self, v: Variable) -> D {
        self.dists[0][v.index()]
    }

    pub fn bounds(&self, v: Variable) -> (D, D) {
        (self.lb(v), self.ub(v))
    }

    /// `(-dists[to][from], dists[from][to])`: the tightest known lower and
    /// upper bound on `to - from`.
    pub fn distance(&self, from: Variable, to: Variable) -> (D, D) {
        (self.dists[to.index()][from.index()].negate(), self.dists[from.index()][to.index()])
    }

    /// Every control literal posted so far for `to - from <= d` edges
    /// between this exact ordered pair, in posting order. Lets a caller
    /// enumerate the constraints it has stacked on a pair without having to
    /// keep its own side-table of the literals `new_distance` returned.
    pub fn constraints_between(&self, from: Variable, to: Variable) -> &[Literal] {
        self.dist_constrs.get(&(from, to)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Creates (or finds already-entailed/refuted) the literal controlling
    /// `to - from <= dist`.
    pub fn new_distance(&mut self, sat: &mut SatCore, from: Variable, to: Variable, dist: D) -> Literal {
        if self.dists[to.index()][from.index()] < dist.negate() {
            return FALSE_LITERAL; // the constraint is inconsistent
        }
        if self.dists[from.index()][to.index()] <= dist {
            return true_literal(); // trivially satisfied already
        }
        let ctr = sat.new_var();
        sat.bind(ctr, self.id());
        let ctr_lit = Literal::new(ctr, true);
        self.var_dists.insert(ctr, DistanceConstraint { from, to, dist });
        self.dist_constrs.entry((from, to)).or_default().push(ctr_lit);
        ctr_lit
    }

    /// `to - from in [min, max]`, as the conjunction of the two one-sided
    /// constraints.
    pub fn new_distance_range(&mut self, sat: &mut SatCore, from: Variable, to: Variable, min: D, max: D) -> Literal {
        let lo = self.new_distance(sat, to, from, min.negate());
        let hi = self.new_distance(sat, from, to, max);
        sat.new_conj(vec![lo, hi])
    }

    /// Reduces `left <= right` (or, with `strict`, `left < right`) to a
    /// single edge when `left - right` is a difference of at most two
    /// variables with unit coefficients; otherwise it is out of this
    /// theory's reach. Mirrors `idl_theory::new_leq` et al., which the
    /// retrieved source throws `std::runtime_error("Not implemented yet")`
    /// for in the general case (spec open question: decline general linear
    /// expressions rather than invent a reduction the source doesn't have).
    fn post(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin, strict: bool) -> Result<Literal, SmtError> {
        let diff = left - right;
        let (from, to, d) = self.difference_form(&diff).ok_or_else(|| {
            SmtError::Unimplemented("comparator over general linear expressions in difference logic")
        })?;
        let d = if strict { d + D::epsilon_margin().negate() } else { d };
        Ok(self.new_distance(sat, from, to, d))
    }

    /// `expr <= 0` as `to - from <= d`, for `expr` shaped as `v0 - v1 + c`,
    /// `±v + c`, or a bare constant `c`.
    fn difference_form(&self, expr: &Lin) -> Option<(Variable, Variable, D)> {
        let terms: Vec<(Variable, Rational)> = expr.terms().collect();
        let neg_const = -expr.constant;
        match terms.len() {
            0 => Some((Variable::ZERO, Variable::ZERO, D::from_rational(neg_const))),
            1 => {
                let (v, c) = terms[0];
                if c == Rational::ONE {
                    Some((Variable::ZERO, v, D::from_rational(neg_const)))
                } else if c == -Rational::ONE {
                    Some((v, Variable::ZERO, D::from_rational(neg_const)))
                } else {
                    None
                }
            }
            2 => {
                let (v0, c0) = terms[0];
                let (v1, c1) = terms[1];
                if c0 == Rational::ONE && c1 == -Rational::ONE {
                    Some((v1, v0, D::from_rational(neg_const)))
                } else if c0 == -Rational::ONE && c1 == Rational::ONE {
                    Some((v0, v1, D::from_rational(neg_const)))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn new_lt(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Result<Literal, SmtError> {
        self.post(sat, left, right, true)
    }

    pub fn new_leq(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Result<Literal, SmtError> {
        self.post(sat, left, right, false)
    }

    pub fn new_eq(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Result<Literal, SmtError> {
        let leq = self.new_leq(sat, left, right)?;
        let geq = self.new_geq(sat, left, right)?;
        Ok(sat.new_conj(vec![leq, geq]))
    }

    pub fn new_geq(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Result<Literal, SmtError> {
        self.post(sat, right, left, false)
    }

    pub fn new_gt(&mut self, sat: &mut SatCore, left: &Lin, right: &Lin) -> Result<Literal, SmtError> {
        self.post(sat, right, left, true)
    }

    /// `bounds(l)` for expressions of 0, 1 or 2 unit-coefficient terms;
    /// larger expressions are out of range (source: `idl_theory::bounds`).
    pub fn bounds_lin(&self, l: &Lin) -> Result<(D, D), SmtError> {
        let terms: Vec<(Variable, Rational)> = l.terms().collect();
        let c = D::from_rational(l.constant);
        match terms.len() {
            0 => Ok((c, c)),
            1 => {
                let (v, coeff) = terms[0];
                if coeff == Rational::ONE {
                    Ok((c + self.lb(v), c + self.ub(v)))
                } else if coeff == -Rational::ONE {
                    Ok((c + self.ub(v).negate(), c + self.lb(v).negate()))
                } else {
                    Err(SmtError::OutOfRangeExpression { detail: l.to_string() })
                }
            }
            2 => {
                let (v0, c0) = terms[0];
                let (v1, c1) = terms[1];
                let (pos, neg) = if c0 == Rational::ONE && c1 == -Rational::ONE {
                    (v0, v1)
                } else if c0 == -Rational::ONE && c1 == Rational::ONE {
                    (v1, v0)
                } else {
                    return Err(SmtError::OutOfRangeExpression { detail: l.to_string() });
                };
                let d = self.distance(neg, pos);
                Ok((c + d.0, c + d.1))
            }
            _ => Err(SmtError::OutOfRangeExpression { detail: l.to_string() }),
        }
    }

    /// Do the admissible intervals of `l0` and `l1` overlap?
    pub fn matches(&self, l0: &Lin, l1: &Lin) -> Result<bool, SmtError> {
        let (lb0, ub0) = self.bounds_lin(l0)?;
        let (lb1, ub1) = self.bounds_lin(l1)?;
        Ok(ub0 >= lb1 && lb0 <= ub1)
    }

    pub fn listen(&mut self, v: Variable, listener: Rc<RefCell<dyn ValueListener>>) {
        self.listeners.listen(v, listener);
    }

    fn record_layer(&mut self, i: Variable, j: Variable) {
        if self.layers.is_empty() {
            return;
        }
        let old_d = self.dists[i.index()][j.index()];
        let old_p = self.preds[i.index()][j.index()];
        let old_c = self.cause.get(&(i, j)).copied();
        let layer = self.layers.last_mut().expect("checked nonempty above");
        layer.old_dists.entry((i, j)).or_insert(old_d);
        layer.old_preds.entry((i, j)).or_insert(old_p);
        layer.old_cause.entry((i, j)).or_insert(old_c);
    }

    /// `b` (controlling `to - from <= dist`) just became `True`. Relaxes
    /// every pair through the new edge and checks for a negative cycle.
    fn propagate_edge(&mut self, from: Variable, to: Variable, dist: D, asserting: Literal) -> bool {
        if !(self.dists[from.index()][to.index()] > dist) {
            return true; // already entailed, nothing to relax
        }
        let n = self.n_vars;
        let mut ground: Vec<Variable> = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let via = self.dists[i][from.index()] + dist + self.dists[to.index()][j];
                if via < self.dists[i][j] {
                    let vi = Variable::new(i as u32);
                    let vj = Variable::new(j as u32);
                    self.record_layer(vi, vj);
                    self.dists[i][j] = via;
                    self.preds[i][j] = to;
                    self.cause.insert((vi, vj), asserting);
                    if self.lb(vj) == self.ub(vj) {
                        ground.push(vj);
                    }
                }
            }
        }
        for i in 0..n {
            if self.dists[i][i].is_negative() {
                self.cnfl = self.negative_cycle_literals(Variable::new(i as u32));
                return false;
            }
        }
        for v in ground {
            self.listeners.fire_changed(v);
        }
        true
    }

    /// Traces the cycle at `v` (`dists[v][v] < 0`) back through `cause`,
    /// decomposing each hop into the edge literal that caused it plus the
    /// two sub-paths either side, down to the asserted edges at the leaves.
    fn negative_cycle_literals(&self, v: Variable) -> Vec<Literal> {
        let mut out = Vec::new();
        let mut seen = FnvHashSet::default();
        self.collect_path(v, v, &mut out, &mut seen);
        out
    }

    fn collect_path(&self, i: Variable, j: Variable, out: &mut Vec<Literal>, seen: &mut FnvHashSet<(Variable, Variable)>) {
        if i == j || !seen.insert((i, j)) {
            return;
        }
        if let Some(&b) = self.cause.get(&(i, j)) {
            out.push(b);
            let c = self.var_dists[&b.variable()];
            self.collect_path(i, c.from, out, seen);
            self.collect_path(c.to, j, out, seen);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "theory": D::theory_name(),
            "n_vars": self.n_vars,
            "bounds": (0..self.n_vars)
                .map(|i| {
                    let v = Variable::new(i as u32);
                    json!({ "var": v.to_string(), "lb": self.lb(v).to_string(), "ub": self.ub(v).to_string() })
                })
                .collect::<Vec<_>>(),
        })
    }
}

impl<D: DistanceValue> Theory for DistanceLogicTheory<D> {
    fn name(&self) -> &'static str {
        D::theory_name()
    }

    fn set_theory_id(&mut self, id: TheoryId) {
        self.id = Some(id);
    }

    fn propagate(&mut self, _sat: &mut SatCore, p: Literal) -> bool {
        let Some(&c) = self.var_dists.get(&p.variable()) else {
            return true;
        };
        if !p.sign() {
            // the negation of an edge control literal enforces nothing:
            // there is no dual bound to tighten, unlike an LRA assertion.
            return true;
        }
        self.propagate_edge(c.from, c.to, c.dist, p)
    }

    /// All consistency checking happens incrementally inside `propagate`;
    /// there is no separate global scan (unlike LRA's Bland's-rule
    /// re-pivoting), matching `idl_theory::check` in the retrieved source.
    fn check(&mut self, _sat: &mut SatCore) -> bool {
        true
    }

    fn push(&mut self) {
        self.layers.push(Layer::default());
    }

    fn pop(&mut self) {
        let layer = self.layers.pop().expect("pop without matching push");
        for ((i, j), d) in layer.old_dists {
            self.dists[i.index()][j.index()] = d;
        }
        for ((i, j), p) in layer.old_preds {
            self.preds[i.index()][j.index()] = p;
        }
        for ((i, j), c) in layer.old_cause {
            match c {
                Some(lit) => {
                    self.cause.insert((i, j), lit);
                }
                None => {
                    self.cause.remove(&(i, j));
                }
            }
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
    use crate::dl::IdlTheory;
    use crate::solver::Solver;

    fn setup() -> (Solver, TheoryId) {
        let mut solver = Solver::new();
        let id = solver.register_theory(Box::new(IdlTheory::new()));
        (solver, id)
    }

    #[test]
    fn origin_starts_at_zero_distance_from_itself() {
        let theory = IdlTheory::new();
        assert_eq!(theory.distance(Variable::ZERO, Variable::ZERO), (0, 0));
    }

    #[test]
    fn constraints_between_enumerates_posted_edges_in_order() {
        let (mut solver, id) = setup();
        let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
        let a = idl.new_var();
        let b = idl.new_var();
        assert!(idl.constraints_between(a, b).is_empty());
        let first = idl.new_distance(sat, a, b, 5);
        let second = idl.new_distance(sat, a, b, 3);
        assert_eq!(idl.constraints_between(a, b), &[first, second]);
        assert!(idl.constraints_between(b, a).is_empty());
    }

    #[test]
    fn trivially_entailed_distance_short_circuits_true() {
        let (mut solver, id) = setup();
        let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
        let a = idl.new_var();
        let lit = idl.new_distance(sat, Variable::ZERO, a, 100);
        // distance from origin defaults to +inf <= 100 is false initially,
        // so this should mint a fresh control literal, not short-circuit.
        assert_ne!(lit, true_literal());
    }

    #[test]
    fn asserting_an_edge_tightens_bounds_and_triangulates() {
        let (mut solver, id) = setup();
        let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
        let horizon = idl.new_var();
        let tp0 = idl.new_var();
        let tp1 = idl.new_var();
        let tp2 = idl.new_var();
        let ge0 = idl.new_distance(sat, horizon, Variable::ZERO, 0); // horizon >= 0
        assert!(solver.assume(ge0));

        let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
        let tp0_bounded = idl.new_distance_range(sat, Variable::ZERO, tp0, 0, 10);
        let tp1_bounded = idl.new_distance_range(sat, tp0, tp1, 0, 10);
        let tp2_bounded = idl.new_distance_range(sat, tp1, tp2, 0, 10);
        assert!(solver.assume(tp0_bounded));
        assert!(solver.assume(tp1_bounded));
        assert!(solver.assume(tp2_bounded));

        let (_, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
        assert_eq!(idl.bounds(tp2), (0, 30));
        assert_eq!(idl.distance(tp0, tp2), (0, 20));
    }

    #[test]
    fn contradictory_edges_are_detected_as_a_negative_cycle() {
        let (mut solver, id) = setup();
        let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
        let a = idl.new_var();
        let b = idl.new_var();
        let a_to_b = idl.new_distance(sat, a, b, 5); // b - a <= 5
        let b_to_a = idl.new_distance(sat, b, a, -10); // a - b <= -10, i.e. b - a >= 10
        assert!(solver.assume(a_to_b));
        assert!(!solver.assume(b_to_a));
    }

    #[test]
    fn out_of_range_expression_is_reported_not_panicked() {
        let theory = IdlTheory::new();
        let x = Variable::new(1);
        let y = Variable::new(2);
        let z = Variable::new(3);
        let mut expr = Lin::scaled_variable(x, Rational::ONE);
        expr.terms.insert(y, Rational::ONE);
        expr.terms.insert(z, Rational::ONE);
        assert!(matches!(theory.bounds_lin(&expr), Err(SmtError::OutOfRangeExpression { .. })));
    }
}
