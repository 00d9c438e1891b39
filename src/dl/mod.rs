//! Incremental difference logic: an all-pairs shortest-path distance
//! matrix over literal-guarded edges `to - from <= d`. Ported from
//! `include/arith/dl/idl_theory.h` / `src/dl/idl_theory.cpp`; `rdl_theory.h`
//! mirrors it exactly except for the distance type, so this crate
//! implements both as one module generic over [`DistanceValue`].

mod theory;
mod value;

pub use theory::DistanceLogicTheory;
pub use value::DistanceValue;

use crate::basic_types::InfRational;

/// Integer difference logic: edge weights and distances are `i64`.
pub type IdlTheory = DistanceLogicTheory<i64>;

/// Rational difference logic: edge weights and distances are
/// [`InfRational`], so strict difference constraints are representable.
pub type RdlTheory = DistanceLogicTheory<InfRational>;
