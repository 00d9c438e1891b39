use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::Serialize;

use crate::basic_types::rational::{is_negative, is_positive, is_zero};
use crate::basic_types::Rational;

/// `q + r*eps`: a rational paired with an infinitesimal coefficient, used so
/// the simplex theory can represent strict inequalities (`x < v`) as
/// non-strict ones (`x <= v - eps`) without ever materializing an actual
/// infinitesimal value.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InfRational {
    rational: Rational,
    infinitesimal: Rational,
}

impl InfRational {
    pub const ZERO: InfRational = InfRational {
        rational: Rational::ZERO,
        infinitesimal: Rational::ZERO,
    };

    pub fn new(rational: Rational, infinitesimal: Rational) -> Self {
        InfRational {
            rational,
            infinitesimal,
        }
    }

    pub fn from_rational(rational: Rational) -> Self {
        InfRational {
            rational,
            infinitesimal: Rational::ZERO,
        }
    }

    pub fn from_int(value: i64) -> Self {
        Self::from_rational(Rational::from_int(value))
    }

    /// `value + eps`, the canonical way to express a strict lower bound.
    pub fn plus_epsilon(rational: Rational) -> Self {
        InfRational::new(rational, Rational::ONE)
    }

    /// `value - eps`, the canonical way to express a strict upper bound.
    pub fn minus_epsilon(rational: Rational) -> Self {
        InfRational::new(rational, -Rational::ONE)
    }

    pub fn rational(self) -> Rational {
        self.rational
    }

    pub fn infinitesimal(self) -> Rational {
        self.infinitesimal
    }

    pub fn is_infinite(self) -> bool {
        self.rational.is_infinite()
    }
}

pub fn is_zero_inf(value: InfRational) -> bool {
    is_zero(value.rational) && is_zero(value.infinitesimal)
}

pub fn is_positive_inf(value: InfRational) -> bool {
    is_positive(value.rational) || (is_zero(value.rational) && is_positive(value.infinitesimal))
}

pub fn is_negative_inf(value: InfRational) -> bool {
    is_negative(value.rational) || (is_zero(value.rational) && is_negative(value.infinitesimal))
}

impl PartialEq for InfRational {
    fn eq(&self, other: &Self) -> bool {
        self.rational == other.rational && self.infinitesimal == other.infinitesimal
    }
}
impl Eq for InfRational {}

impl PartialOrd for InfRational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InfRational {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rational
            .cmp(&other.rational)
            .then_with(|| self.infinitesimal.cmp(&other.infinitesimal))
    }
}

impl Add for InfRational {
    type Output = InfRational;
    fn add(self, rhs: InfRational) -> InfRational {
        InfRational::new(self.rational + rhs.rational, self.infinitesimal + rhs.infinitesimal)
    }
}

impl Sub for InfRational {
    type Output = InfRational;
    fn sub(self, rhs: InfRational) -> InfRational {
        InfRational::new(self.rational - rhs.rational, self.infinitesimal - rhs.infinitesimal)
    }
}

impl Neg for InfRational {
    type Output = InfRational;
    fn neg(self) -> InfRational {
        InfRational::new(-self.rational, -self.infinitesimal)
    }
}

impl Mul<Rational> for InfRational {
    type Output = InfRational;
    fn mul(self, rhs: Rational) -> InfRational {
        InfRational::new(self.rational * rhs, self.infinitesimal * rhs)
    }
}

impl fmt::Display for InfRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rational.is_infinite() || is_zero(self.infinitesimal) {
            return write!(f, "{}", self.rational);
        }
        if !is_zero(self.rational) {
            write!(f, "{}", self.rational)?;
        }
        if self.infinitesimal == Rational::ONE {
            write!(f, "{}eps", if is_zero(self.rational) { "" } else { "+" })
        } else if self.infinitesimal == -Rational::ONE {
            write!(f, "-eps")
        } else if is_negative(self.infinitesimal) {
            write!(f, "{}eps", self.infinitesimal)
        } else {
            write!(f, "{}{}eps", if is_zero(self.rational) { "" } else { "+" }, self.infinitesimal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_breaks_ties_on_infinitesimal() {
        let a = InfRational::from_int(3);
        let b = InfRational::plus_epsilon(Rational::from_int(3));
        assert!(a < b);
        assert!(InfRational::minus_epsilon(Rational::from_int(3)) < a);
    }

    #[test]
    fn arithmetic_is_componentwise() {
        let a = InfRational::plus_epsilon(Rational::from_int(1));
        let b = InfRational::minus_epsilon(Rational::from_int(1));
        assert_eq!(a + b, InfRational::from_int(2));
    }
}
