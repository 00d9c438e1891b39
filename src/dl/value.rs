use serde::Serialize;

use crate::basic_types::{is_negative_inf, InfRational, Rational};

/// The edge-weight type a [`crate::dl::DistanceLogicTheory`] is
/// instantiated over: `i64` for integer difference logic, [`InfRational`]
/// for rational difference logic. Both theories are otherwise identical,
/// matching `src/dl/idl_theory.cpp` and `src/dl/rdl_theory.cpp`, which
/// differ only in this type.
pub trait DistanceValue:
    Copy + PartialOrd + std::ops::Add<Output = Self> + std::fmt::Display + Serialize + 'static
{
    fn zero() -> Self;

    /// A finite sentinel large enough that summing three of them (as the
    /// incremental relaxation does) never overflows.
    fn infinity() -> Self;

    fn negate(self) -> Self;

    fn is_negative(self) -> bool;

    /// Converts a [`Rational`] coefficient or constant from a [`crate::basic_types::Lin`]
    /// into this edge-weight type. Panics if the value has no exact
    /// representation (a non-integer rational against `i64`).
    fn from_rational(value: Rational) -> Self;

    /// The smallest positive margin this domain can represent: `1` for
    /// integer difference logic, one infinitesimal unit for rational
    /// difference logic. `new_lt`/`new_gt` subtract this from the
    /// corresponding non-strict distance.
    fn epsilon_margin() -> Self;

    /// Name of the theory this edge-weight type instantiates, for
    /// [`crate::theory::Theory::name`] and log messages.
    fn theory_name() -> &'static str;
}

impl DistanceValue for i64 {
    fn zero() -> Self {
        0
    }

    fn infinity() -> Self {
        i64::MAX / 8
    }

    fn negate(self) -> Self {
        -self
    }

    fn is_negative(self) -> bool {
        self < 0
    }

    fn from_rational(value: Rational) -> Self {
        assert_eq!(value.denominator(), 1, "integer difference logic requires integer coefficients");
        value.numerator()
    }

    fn epsilon_margin() -> Self {
        1
    }

    fn theory_name() -> &'static str {
        "idl"
    }
}

impl DistanceValue for InfRational {
    fn zero() -> Self {
        InfRational::ZERO
    }

    fn infinity() -> Self {
        InfRational::from_rational(Rational::POSITIVE_INFINITY)
    }

    fn negate(self) -> Self {
        -self
    }

    fn is_negative(self) -> bool {
        is_negative_inf(self)
    }

    fn from_rational(value: Rational) -> Self {
        InfRational::from_rational(value)
    }

    fn epsilon_margin() -> Self {
        InfRational::new(Rational::ZERO, Rational::ONE)
    }

    fn theory_name() -> &'static str {
        "rdl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_infinity_tolerates_three_way_summation() {
        let sum = i64::infinity() + i64::infinity() + i64::infinity();
        assert!(sum < i64::MAX);
        assert!(sum > 0);
    }

    #[test]
    fn inf_rational_epsilon_margin_is_pure_infinitesimal() {
        let margin = InfRational::epsilon_margin();
        assert_eq!(margin.rational(), Rational::ZERO);
        assert_eq!(margin.infinitesimal(), Rational::ONE);
    }
}
