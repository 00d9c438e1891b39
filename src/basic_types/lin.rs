use fnv::FnvHashMap;

use crate::basic_types::rational::is_zero;
use crate::basic_types::{Rational, Variable};

/// A sparse linear expression: a map from variable to nonzero coefficient,
/// plus a constant term. Ported from `include/arith/lin.h` /
/// `src/arith/lin.cpp`.
#[derive(Debug, Clone, Default)]
pub struct Lin {
    pub(crate) terms: FnvHashMap<Variable, Rational>,
    pub constant: Rational,
}

impl Lin {
    pub fn constant(value: Rational) -> Self {
        Lin {
            terms: FnvHashMap::default(),
            constant: value,
        }
    }

    pub fn variable(v: Variable) -> Self {
        let mut terms = FnvHashMap::default();
        terms.insert(v, Rational::ONE);
        Lin {
            terms,
            constant: Rational::ZERO,
        }
    }

    pub fn scaled_variable(v: Variable, coefficient: Rational) -> Self {
        if is_zero(coefficient) {
            return Lin::default();
        }
        let mut terms = FnvHashMap::default();
        terms.insert(v, coefficient);
        Lin {
            terms,
            constant: Rational::ZERO,
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = (Variable, Rational)> + '_ {
        self.terms.iter().map(|(&v, &c)| (v, c))
    }

    pub fn coefficient(&self, v: Variable) -> Rational {
        self.terms.get(&v).copied().unwrap_or(Rational::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn add_term(&mut self, v: Variable, coefficient: Rational) {
        if is_zero(coefficient) {
            return;
        }
        let entry = self.terms.entry(v).or_insert(Rational::ZERO);
        *entry = *entry + coefficient;
        if is_zero(*entry) {
            self.terms.remove(&v);
        }
    }

    pub fn scale(&self, factor: Rational) -> Lin {
        if is_zero(factor) {
            return Lin::default();
        }
        let terms = self
            .terms
            .iter()
            .map(|(&v, &c)| (v, c * factor))
            .collect();
        Lin {
            terms,
            constant: self.constant * factor,
        }
    }

    /// Substitutes `v` out of this expression using the identity `v = row`,
    /// as required when a basic variable appears in a freshly-posted
    /// constraint.
    pub fn substitute(&self, v: Variable, row: &Lin) -> Lin {
        let Some(&coefficient) = self.terms.get(&v) else {
            return self.clone();
        };
        let mut result = self.clone();
        result.terms.remove(&v);
        result.constant = result.constant + coefficient * row.constant;
        for (rv, rc) in row.terms() {
            result.add_term(rv, coefficient * rc);
        }
        result
    }
}

impl std::ops::Add for &Lin {
    type Output = Lin;
    fn add(self, rhs: &Lin) -> Lin {
        let mut result = self.clone();
        for (v, c) in rhs.terms() {
            result.add_term(v, c);
        }
        result.constant = result.constant + rhs.constant;
        result
    }
}

impl std::ops::Sub for &Lin {
    type Output = Lin;
    fn sub(self, rhs: &Lin) -> Lin {
        let mut result = self.clone();
        for (v, c) in rhs.terms() {
            result.add_term(v, -c);
        }
        result.constant = result.constant - rhs.constant;
        result
    }
}

impl PartialEq for Lin {
    fn eq(&self, other: &Self) -> bool {
        self.constant == other.constant
            && self.terms.len() == other.terms.len()
            && self.terms.iter().all(|(v, c)| other.terms.get(v) == Some(c))
    }
}

impl std::fmt::Display for Lin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<_> = self.terms.iter().collect();
        entries.sort_by_key(|(v, _)| *v);
        for (v, c) in entries {
            write!(f, "{c}*{v} + ")?;
        }
        write!(f, "{}", self.constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_cancels_zero_coefficients() {
        let x = Variable::new(1);
        let a = Lin::scaled_variable(x, Rational::from_int(2));
        let b = Lin::scaled_variable(x, Rational::from_int(-2));
        let sum = &a + &b;
        assert!(sum.is_empty());
        assert_eq!(sum.constant, Rational::ZERO);
    }

    #[test]
    fn scale_by_zero_clears_everything() {
        let x = Variable::new(1);
        let mut l = Lin::scaled_variable(x, Rational::from_int(3));
        l.constant = Rational::from_int(7);
        let scaled = l.scale(Rational::ZERO);
        assert!(scaled.is_empty());
        assert_eq!(scaled.constant, Rational::ZERO);
    }

    #[test]
    fn substitute_inlines_basic_row() {
        let x = Variable::new(1);
        let y = Variable::new(2);
        let z = Variable::new(3);
        // expr = 2x + 1, row: x = y + z
        let mut expr = Lin::scaled_variable(x, Rational::from_int(2));
        expr.constant = Rational::ONE;
        let mut row = Lin::scaled_variable(y, Rational::ONE);
        row.terms.insert(z, Rational::ONE);
        let substituted = expr.substitute(x, &row);
        assert_eq!(substituted.coefficient(y), Rational::from_int(2));
        assert_eq!(substituted.coefficient(z), Rational::from_int(2));
        assert_eq!(substituted.constant, Rational::ONE);
    }
}
