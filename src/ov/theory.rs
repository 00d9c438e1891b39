use std::fmt::Debug;
use std::hash::Hash;

use fnv::FnvHashMap;
use serde_json::json;

use crate::basic_types::{true_literal, Lbool, Literal, FALSE_LITERAL};
use crate::sat::SatCore;
use crate::solver::Solver;
use crate::theory::{Theory, TheoryId};

/// Identity of a finite-domain variable registered with an [`OvTheory`].
/// An index into `domains`, distinct from the propositional [`crate::basic_types::Variable`]
/// space the literals it maps to live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjVar(usize);

impl std::fmt::Display for ObjVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// A finite-domain variable theory: each object variable owns a domain of
/// values, each value controlled by a literal that is true exactly when
/// that value is the one assigned. Every operation here compiles straight
/// to clauses; `propagate`/`check`/`push`/`pop` are all no-ops, matching
/// the private overrides in `ov_theory.h`.
pub struct OvTheory<V: Eq + Hash + Clone + Debug> {
    id: Option<TheoryId>,
    domains: Vec<FnvHashMap<V, Literal>>,
}

impl<V: Eq + Hash + Clone + Debug> Default for OvTheory<V> {
    fn default() -> Self {
        OvTheory {
            id: None,
            domains: Vec::new(),
        }
    }
}

impl<V: Eq + Hash + Clone + Debug> OvTheory<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&self) -> TheoryId {
        self.id.expect("OvTheory used before being registered")
    }

    /// Creates a variable over `domain`. With `enforce_exact_one` and a
    /// singleton domain, the sole value is pinned to `true_literal()`
    /// rather than wasting a propositional variable on it. Otherwise each
    /// value gets its own control literal, and (if `enforce_exact_one`)
    /// pairwise-exclusion clauses plus one cover clause enforce that
    /// exactly one value is ever true at once.
    pub fn new_var(&mut self, sat: &mut SatCore, domain: Vec<V>, enforce_exact_one: bool) -> ObjVar {
        assert!(!domain.is_empty(), "an object variable needs a nonempty domain");
        let x = ObjVar(self.domains.len());
        let mut assigns = FnvHashMap::default();
        if domain.len() == 1 && enforce_exact_one {
            assigns.insert(domain[0].clone(), true_literal());
        } else {
            let mut lits = Vec::with_capacity(domain.len());
            for val in &domain {
                let bv = sat.new_var();
                let lit = Literal::new(bv, true);
                sat.bind(bv, self.id());
                assigns.insert(val.clone(), lit);
                lits.push(lit);
            }
            if enforce_exact_one {
                for i in 0..lits.len() {
                    for j in (i + 1)..lits.len() {
                        sat.new_clause(vec![!lits[i], !lits[j]]);
                    }
                }
                sat.new_clause(lits);
            }
        }
        self.domains.push(assigns);
        x
    }

    /// Creates a variable whose domain presence is controlled by
    /// caller-supplied literals rather than freshly minted ones, e.g. when
    /// the presence of a value is itself conditioned on other theory
    /// constraints.
    pub fn new_var_with_lits(&mut self, sat: &mut SatCore, domain: Vec<(V, Literal)>) -> ObjVar {
        assert!(!domain.is_empty(), "an object variable needs a nonempty domain");
        let x = ObjVar(self.domains.len());
        for (_, lit) in &domain {
            sat.bind(lit.variable(), self.id());
        }
        self.domains.push(domain.into_iter().collect());
        x
    }

    /// The literal controlling `val`'s presence in `v`'s domain, or `None`
    /// if `val` is not in `v`'s domain at all.
    pub fn allows(&self, v: ObjVar, val: &V) -> Option<Literal> {
        self.domains[v.0].get(val).copied()
    }

    /// The values currently not ruled out of `v`'s domain.
    pub fn domain(&self, sat: &SatCore, v: ObjVar) -> Vec<V> {
        self.domains[v.0]
            .iter()
            .filter(|(_, &lit)| sat.value_lit(lit) != Lbool::False)
            .map(|(val, _)| val.clone())
            .collect()
    }

    /// Creates (or finds already-entailed/refuted) the literal asserting
    /// `left == right`: the domains must agree on a shared value, and
    /// whichever value is eventually assigned to one is forced onto the
    /// other.
    pub fn new_eq(&mut self, sat: &mut SatCore, left: ObjVar, right: ObjVar) -> Literal {
        if left == right {
            return true_literal();
        }
        let intersection: Vec<V> = self.domains[left.0]
            .keys()
            .filter(|val| self.domains[right.0].contains_key(val))
            .cloned()
            .collect();
        if intersection.is_empty() {
            return FALSE_LITERAL;
        }

        let ctr = Literal::new(sat.new_var(), true);
        sat.bind(ctr.variable(), self.id());

        for (val, &l) in self.domains[left.0].clone().iter() {
            if !intersection.contains(val) {
                sat.new_clause(vec![!ctr, !l]);
            }
        }
        for (val, &l) in self.domains[right.0].clone().iter() {
            if !intersection.contains(val) {
                sat.new_clause(vec![!ctr, !l]);
            }
        }
        for val in &intersection {
            let ll = self.domains[left.0][val];
            let rl = self.domains[right.0][val];
            sat.new_clause(vec![!ctr, ll, !rl]);
            sat.new_clause(vec![!ctr, !ll, rl]);
            sat.new_clause(vec![ctr, !ll, !rl]);
        }
        ctr
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "theory": "ov",
            "vars": self
                .domains
                .iter()
                .enumerate()
                .map(|(i, d)| json!({
                    "var": format!("o{i}"),
                    "domain_size": d.len(),
                }))
                .collect::<Vec<_>>(),
        })
    }
}

/// Decides `val` for `v`: asserts `v`'s control literal for `val` and
/// propagates. Matches `ov_theory::assign`, which calls straight through
/// to `sat->assume`.
pub fn assign<V: Eq + Hash + Clone + Debug + 'static>(solver: &mut Solver, id: TheoryId, v: ObjVar, val: &V) -> bool {
    let lit = solver
        .theory_as::<OvTheory<V>>(id)
        .and_then(|ov| ov.allows(v, val))
        .expect("value not in domain");
    solver.assume(lit)
}

/// Rules `val` out for `v`: asserts the negation of `v`'s control literal
/// for `val`. Matches `ov_theory::forbid`.
pub fn forbid<V: Eq + Hash + Clone + Debug + 'static>(solver: &mut Solver, id: TheoryId, v: ObjVar, val: &V) -> bool {
    let lit = solver
        .theory_as::<OvTheory<V>>(id)
        .and_then(|ov| ov.allows(v, val))
        .expect("value not in domain");
    solver.assume(!lit)
}

impl<V: Eq + Hash + Clone + Debug + 'static> Theory for OvTheory<V> {
    fn name(&self) -> &'static str {
        "ov"
    }

    fn set_theory_id(&mut self, id: TheoryId) {
        self.id = Some(id);
    }

    fn propagate(&mut self, _sat: &mut SatCore, _p: Literal) -> bool {
        true
    }

    fn check(&mut self, _sat: &mut SatCore) -> bool {
        true
    }

    fn push(&mut self) {}

    fn pop(&mut self) {}

    fn take_conflict(&mut self) -> Vec<Literal> {
        Vec::new()
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Solver, TheoryId) {
        let mut solver = Solver::new();
        let id = solver.register_theory(Box::new(OvTheory::<&'static str>::new()));
        (solver, id)
    }

    #[test]
    fn singleton_domain_with_exact_one_skips_a_fresh_variable() {
        let (mut solver, id) = setup();
        let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
        let v = ov.new_var(sat, vec!["red"], true);
        assert_eq!(ov.allows(v, &"red"), Some(true_literal()));
    }

    #[test]
    fn exact_one_domain_forbids_two_values_at_once() {
        let (mut solver, id) = setup();
        let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
        let v = ov.new_var(sat, vec!["red", "green", "blue"], true);
        let red = ov.allows(v, &"red").unwrap();
        let green = ov.allows(v, &"green").unwrap();
        assert!(solver.assume(red));
        assert!(!solver.assume(green));
    }

    #[test]
    fn equality_over_disjoint_domains_is_false() {
        let (mut solver, id) = setup();
        let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
        let a = ov.new_var(sat, vec!["red", "green"], true);
        let b = ov.new_var(sat, vec!["blue", "yellow"], true);
        let eq = ov.new_eq(sat, a, b);
        assert_eq!(eq, FALSE_LITERAL);
    }

    #[test]
    fn equality_over_overlapping_domains_couples_shared_values() {
        let (mut solver, id) = setup();
        let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
        let a = ov.new_var(sat, vec!["red", "green"], true);
        let b = ov.new_var(sat, vec!["green", "blue"], true);
        let eq = ov.new_eq(sat, a, b);
        assert!(solver.assume(eq));

        let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
        let a_green = ov.allows(a, &"green").unwrap();
        assert!(solver.assume(a_green));

        let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
        let b_green = ov.allows(b, &"green").unwrap();
        assert_eq!(sat.value_lit(b_green), Lbool::True);
        let _ = ov;
    }
}
