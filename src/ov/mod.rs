//! Object-variable theory: a finite-domain variable compiled straight down
//! to propositional literals, one per candidate value. Kept as a reference
//! decision procedure with a trivial propagation protocol, ported from
//! `include/ov/ov_theory.h` / `src/ov/ov_theory.cpp`.
//!
//! Value identity itself — what an `enum_val` *is* — is out of scope here
//! (the caller supplies any `Eq + Hash + Clone` value type); this theory
//! only tracks which propositional literal controls a value's presence in
//! a variable's domain.

mod theory;

pub use theory::{ObjVar, OvTheory};
