//! Rational numbers for edit rates.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A rational number used for edit rates and frame rates.
///
/// DCP XML writes fractions as two space-separated decimals, e.g. `24 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fraction {
    /// Numerator.
    pub numerator: i64,
    /// Denominator (always positive).
    pub denominator: i64,
}

impl Fraction {
    /// Create a new fraction.
    ///
    /// # Panics
    ///
    /// Panics if the denominator is not positive.
    pub fn new(numerator: i64, denominator: i64) -> Self {
        assert!(denominator > 0, "Denominator must be positive");
        Self {
            numerator,
            denominator,
        }
    }

    /// Create a fraction from an integer.
    pub fn from_int(n: i64) -> Self {
        Self {
            numerator: n,
            denominator: 1,
        }
    }

    /// The XML form: numerator and denominator separated by one space.
    pub fn as_string(&self) -> String {
        format!("{} {}", self.numerator, self.denominator)
    }

    /// Convert to f64.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Reduce to simplest form.
    pub fn reduce(&self) -> Self {
        if self.numerator == 0 {
            return Self::from_int(0);
        }
        let g = gcd(self.numerator.unsigned_abs(), self.denominator.unsigned_abs()) as i64;
        Self {
            numerator: self.numerator / g,
            denominator: self.denominator / g,
        }
    }
}

impl fmt::Debug for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fraction({}/{})", self.numerator, self.denominator)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Fraction {
    type Err = Error;

    /// Parse the XML form `"num den"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let numerator = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| Error::misc(format!("bad fraction '{s}'")))?;
        let denominator: i64 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| Error::misc(format!("bad fraction '{s}'")))?;
        if denominator <= 0 || parts.next().is_some() {
            return Err(Error::misc(format!("bad fraction '{s}'")));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numerator as i128 * other.denominator as i128;
        let rhs = other.numerator as i128 * self.denominator as i128;
        lhs.cmp(&rhs)
    }
}

/// Greatest common divisor by the Euclidean algorithm.
fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
