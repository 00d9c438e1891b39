//! End-to-end scenarios exercising the SAT core and all three theories
//! together, each built as a single self-contained problem instance rather
//! than a round-trip encode/decode grid.

use munchkin_smt::basic_types::{true_literal, InfRational, Lbool, Lin, Literal, Rational};
use munchkin_smt::dl::IdlTheory;
use munchkin_smt::lra::LraTheory;
use munchkin_smt::ov::OvTheory;
use munchkin_smt::sat::SatCore;
use munchkin_smt::solver::Solver;

#[test]
fn s1_sat_equality_over_unit_clause() {
    let mut sat = SatCore::new();
    let b0 = Literal::new(sat.new_var(), true);
    let b1 = Literal::new(sat.new_var(), true);
    let b2 = Literal::new(sat.new_var(), true);
    assert!(sat.new_clause(vec![b0, !b1, b2]));
    assert_eq!(sat.value_lit(b0), Lbool::Unassigned);
    assert_eq!(sat.value_lit(b1), Lbool::Unassigned);
    assert_eq!(sat.value_lit(b2), Lbool::Unassigned);
}

#[test]
fn s2_snapshot_independence() {
    let mut sat = SatCore::new();
    let b0 = Literal::new(sat.new_var(), true);
    let b1 = Literal::new(sat.new_var(), true);
    let b2 = Literal::new(sat.new_var(), true);
    assert!(sat.new_clause(vec![b0, !b1, b2]));

    let snapshot = sat.copy();
    let mut solver = Solver::from_sat(sat);
    assert!(solver.assume(b1));
    assert_eq!(solver.sat().value_lit(b1), Lbool::True);
    assert_eq!(snapshot.value_lit(b1), Lbool::Unassigned);
}

#[test]
fn s3_lra_tightening_and_refutation() {
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(LraTheory::new()));
    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    let x = lra.new_var();
    let y = lra.new_var();
    let s1 = lra.new_var_for(&Lin::variable(y) - &Lin::variable(x));
    let s2 = lra.new_var_for(&Lin::variable(x) + &Lin::variable(y));

    let x_leq_m4 = lra.new_leq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(-4)));
    let x_geq_m8 = lra.new_geq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(-8)));
    let s1_leq_1 = lra.new_leq(sat, &Lin::variable(s1), &Lin::constant(Rational::ONE));

    assert!(solver.assume(x_leq_m4));
    assert!(solver.assume(x_geq_m8));
    assert!(solver.assume(s1_leq_1));

    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    let refuted = lra.new_geq(sat, &Lin::variable(s2), &Lin::constant(Rational::from_int(-3)));
    assert_eq!(refuted, munchkin_smt::basic_types::FALSE_LITERAL);
}

#[test]
fn s4_lra_strict_inequality_uses_infinitesimal() {
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(LraTheory::new()));
    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    let x = lra.new_var();
    let y = lra.new_var();
    let x_gt_y = lra.new_gt(sat, &Lin::variable(x), &Lin::variable(y));
    assert!(solver.assume(x_gt_y));

    let (_, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    assert_eq!(lra.value(x), InfRational::plus_epsilon(Rational::ZERO));
    assert_eq!(lra.value(y), InfRational::ZERO);

    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    let y_geq_1 = lra.new_geq(sat, &Lin::variable(y), &Lin::constant(Rational::ONE));
    assert!(solver.assume(y_geq_1));

    let (_, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    assert_eq!(lra.value(y), InfRational::from_int(1));
    assert_eq!(lra.value(x), InfRational::plus_epsilon(Rational::from_int(1)));
}

#[test]
fn s5_non_root_assumption_interacts_with_bounds() {
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(LraTheory::new()));
    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    let x = lra.new_var();
    let y = lra.new_var();
    let p1 = lra.new_leq(sat, &Lin::variable(x), &Lin::variable(y));
    let p2 = lra.new_leq(sat, &Lin::variable(y), &Lin::variable(x));
    let y_leq_1 = lra.new_leq(sat, &Lin::variable(y), &Lin::constant(Rational::ONE));
    assert!(solver.assume(y_leq_1));
    let disj = sat.new_disj(vec![p1, p2]);
    assert!(solver.assume(disj));

    assert!(solver.assume(p1));

    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    assert!(lra.set_lb(sat, x, Rational::ONE, true_literal()));
    assert!(!lra.set_lb(sat, x, Rational::from_int(2), true_literal()));
}

#[test]
fn s6_idl_triangulation() {
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(IdlTheory::new()));
    let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
    let horizon = idl.new_var();
    let tp0 = idl.new_var();
    let tp1 = idl.new_var();
    let tp2 = idl.new_var();

    let horizon_geq_0 = idl.new_distance(sat, horizon, munchkin_smt::basic_types::Variable::ZERO, 0);
    assert!(solver.assume(horizon_geq_0));

    let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
    let tp1_range = idl.new_distance_range(sat, tp0, tp1, 0, 10);
    let tp2_range = idl.new_distance_range(sat, tp1, tp2, 0, 10);
    let tp0_range = idl.new_distance_range(sat, munchkin_smt::basic_types::Variable::ZERO, tp0, 0, 10);
    assert!(solver.assume(tp1_range));
    assert!(solver.assume(tp2_range));
    assert!(solver.assume(tp0_range));

    let (_, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
    assert_eq!(idl.bounds(tp2), (0, 30));
    assert_eq!(idl.distance(tp0, tp2), (0, 20));
}

#[test]
fn s7_ov_equality_forces_shared_assignment() {
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(OvTheory::<&'static str>::new()));
    let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
    let v0 = ov.new_var(sat, vec!["a", "b", "c"], true);
    let v1 = ov.new_var(sat, vec!["a", "b"], true);
    let eq = ov.new_eq(sat, v0, v1);
    assert!(solver.assume(eq));

    let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
    let mut d0 = ov.domain(sat, v0);
    let mut d1 = ov.domain(sat, v1);
    d0.sort();
    d1.sort();
    assert_eq!(d0, vec!["a", "b"]);
    assert_eq!(d1, vec!["a", "b"]);

    let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
    let allow_a = ov.allows(v0, &"a").unwrap();
    let _ = sat;
    assert!(solver.assume(allow_a));

    let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
    assert_eq!(ov.domain(sat, v1), vec!["a"]);
}
