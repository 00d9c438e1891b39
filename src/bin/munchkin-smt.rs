//! Fixed demonstration problem exercising the SAT core plus all three
//! theories end to end, for manual sanity checking. Not a general-purpose
//! front end: there is no input format and no solving strategy beyond the
//! literal sequence hard-coded below.

use log::info;
use munchkin_smt::basic_types::{Lin, Literal, Rational};
use munchkin_smt::dl::IdlTheory;
use munchkin_smt::lra::LraTheory;
use munchkin_smt::ov::OvTheory;
use munchkin_smt::solver::Solver;

fn main() {
    env_logger::init();

    sat_demo();
    lra_demo();
    idl_demo();
    ov_demo();
}

fn sat_demo() {
    info!("--- sat ---");
    let mut solver = Solver::new();
    let a = Literal::new(solver.sat_mut().new_var(), true);
    let b = Literal::new(solver.sat_mut().new_var(), true);
    let c = Literal::new(solver.sat_mut().new_var(), true);
    solver.sat_mut().new_clause(vec![a, !b, c]);
    let ok = solver.assume(!c);
    println!("sat: assume(!c) -> {ok}, b = {:?}", solver.sat().value_lit(b));
}

fn lra_demo() {
    info!("--- lra ---");
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(LraTheory::new()));
    let (sat, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    let x = lra.new_var();
    let lb = lra.new_leq(sat, &Lin::constant(Rational::from_int(-8)), &Lin::variable(x));
    let ub = lra.new_leq(sat, &Lin::variable(x), &Lin::constant(Rational::from_int(-4)));
    let ok = solver.assume(lb) && solver.assume(ub);
    let (_, lra): (_, &mut LraTheory) = solver.sat_and_theory(id);
    println!("lra: bounds ok -> {ok}, x in {:?}", lra.bounds_lin(&Lin::variable(x)));
}

fn idl_demo() {
    info!("--- idl ---");
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(IdlTheory::new()));
    let (sat, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
    let tp0 = idl.new_var();
    let tp1 = idl.new_var();
    let a = idl.new_distance_range(sat, tp0, tp1, 0, 10);
    let ok = solver.assume(a);
    let (_, idl): (_, &mut IdlTheory) = solver.sat_and_theory(id);
    println!("idl: ok -> {ok}, distance(tp0,tp1) = {:?}", idl.distance(tp0, tp1));
}

fn ov_demo() {
    info!("--- ov ---");
    let mut solver = Solver::new();
    let id = solver.register_theory(Box::new(OvTheory::<&'static str>::new()));
    let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
    let v0 = ov.new_var(sat, vec!["red", "green", "blue"], true);
    let red = ov.allows(v0, &"red").expect("red is in the domain");
    let ok = solver.assume(red);
    let (sat, ov): (_, &mut OvTheory<&'static str>) = solver.sat_and_theory(id);
    println!("ov: ok -> {ok}, domain(v0) = {:?}", ov.domain(sat, v0));

    println!("{}", serde_json::to_string_pretty(&solver.to_json()).expect("solver state serializes"));
}
