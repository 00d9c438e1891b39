use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::Serialize;

/// An exact field element: a reduced `numerator/denominator` pair of `i64`s,
/// plus positive/negative infinity sentinels.
///
/// This is not a general-purpose arbitrary-precision rational library: it
/// is the minimal exact-arithmetic type the CDCL core and LRA/IDL theories
/// need to stay correct, bounded by `i64` numerator/denominator pairs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Rational {
    numerator: i64,
    denominator: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational {
        numerator: 0,
        denominator: 1,
    };
    pub const ONE: Rational = Rational {
        numerator: 1,
        denominator: 1,
    };
    pub const POSITIVE_INFINITY: Rational = Rational {
        numerator: 1,
        denominator: 0,
    };
    pub const NEGATIVE_INFINITY: Rational = Rational {
        numerator: -1,
        denominator: 0,
    };

    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator != 0, "rational denominator must not be zero");
        Rational {
            numerator,
            denominator,
        }
        .reduced()
    }

    pub fn from_int(value: i64) -> Self {
        Rational {
            numerator: value,
            denominator: 1,
        }
    }

    fn reduced(self) -> Self {
        if self.denominator == 0 {
            return Rational {
                numerator: self.numerator.signum(),
                denominator: 0,
            };
        }
        let mut n = self.numerator;
        let mut d = self.denominator;
        if d < 0 {
            n = -n;
            d = -d;
        }
        let g = gcd(n.unsigned_abs(), d.unsigned_abs()).max(1);
        Rational {
            numerator: n / g as i64,
            denominator: d / g as i64,
        }
    }

    pub fn is_infinite(self) -> bool {
        self.denominator == 0
    }

    pub fn numerator(self) -> i64 {
        self.numerator
    }

    pub fn denominator(self) -> i64 {
        self.denominator
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn is_zero(value: Rational) -> bool {
    !value.is_infinite() && value.numerator == 0
}

pub fn is_positive(value: Rational) -> bool {
    value.numerator > 0
}

pub fn is_negative(value: Rational) -> bool {
    value.numerator < 0
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.numerator as i128 * other.denominator as i128
            == other.numerator as i128 * self.denominator as i128
    }
}
impl Eq for Rational {}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numerator as i128 * other.denominator as i128;
        let rhs = other.numerator as i128 * self.denominator as i128;
        lhs.cmp(&rhs)
    }
}

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational {
            numerator: -self.numerator,
            denominator: self.denominator,
        }
    }
}

impl Add for Rational {
    type Output = Rational;
    fn add(self, rhs: Rational) -> Rational {
        if self.is_infinite() || rhs.is_infinite() {
            return infinite_combine(self, rhs);
        }
        Rational::new(
            self.numerator * rhs.denominator + rhs.numerator * self.denominator,
            self.denominator * rhs.denominator,
        )
    }
}

impl Sub for Rational {
    type Output = Rational;
    fn sub(self, rhs: Rational) -> Rational {
        self + (-rhs)
    }
}

impl Mul for Rational {
    type Output = Rational;
    fn mul(self, rhs: Rational) -> Rational {
        if self.is_infinite() || rhs.is_infinite() {
            let sign = self.numerator.signum() * rhs.numerator.signum();
            return Rational {
                numerator: sign,
                denominator: 0,
            };
        }
        Rational::new(self.numerator * rhs.numerator, self.denominator * rhs.denominator)
    }
}

impl Div for Rational {
    type Output = Rational;
    fn div(self, rhs: Rational) -> Rational {
        if rhs.is_infinite() {
            return Rational::ZERO;
        }
        assert!(rhs.numerator != 0, "division by zero rational");
        if self.is_infinite() {
            let sign = self.numerator.signum() * rhs.numerator.signum();
            return Rational {
                numerator: sign,
                denominator: 0,
            };
        }
        Rational::new(self.numerator * rhs.denominator, self.denominator * rhs.numerator)
    }
}

fn infinite_combine(lhs: Rational, rhs: Rational) -> Rational {
    match (lhs.is_infinite(), rhs.is_infinite()) {
        (true, true) => {
            assert!(
                lhs.numerator.signum() == rhs.numerator.signum(),
                "undefined infinity - infinity"
            );
            lhs
        }
        (true, false) => lhs,
        (false, true) => rhs,
        (false, false) => unreachable!(),
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            return write!(f, "{}", if self.numerator > 0 { "+inf" } else { "-inf" });
        }
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduces_to_lowest_terms() {
        let r = Rational::new(4, 8);
        assert_eq!(r, Rational::new(1, 2));
    }

    #[test]
    fn arithmetic_matches_exact_fractions() {
        let a = Rational::new(1, 3);
        let b = Rational::new(1, 6);
        assert_eq!(a + b, Rational::new(1, 2));
        assert_eq!(a - b, Rational::new(1, 6));
        assert_eq!(a * Rational::from_int(3), Rational::ONE);
    }

    #[test]
    fn infinities_dominate_finite_values() {
        assert!(Rational::POSITIVE_INFINITY > Rational::from_int(1_000_000));
        assert!(Rational::NEGATIVE_INFINITY < Rational::from_int(-1_000_000));
        assert_eq!(
            Rational::POSITIVE_INFINITY + Rational::from_int(5),
            Rational::POSITIVE_INFINITY
        );
    }
}
