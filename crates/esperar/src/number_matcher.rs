//! NumberMatcher: range/equality comparator for counts.
//!
//! Used by count-style matchers (array size, recorded request counts) either
//! as an exact number or an inclusive `gte`/`lte` range. Serializes as a bare
//! number when it is a pure `eq` matcher, so an array of eq-matchers
//! round-trips as a plain number array.

use serde::ser::{Serialize, Serializer};

use crate::result::{EsperarError, EsperarResult};

/// Rendered when a matcher carries no usable bound
const INVALID_SENTINEL: &str = "<invalid NumberMatcher: no eq/gte/lte bound>";

/// Equality or inclusive-range comparator for numbers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NumberMatcher {
    eq: Option<f64>,
    gte: Option<f64>,
    lte: Option<f64>,
}

impl NumberMatcher {
    /// Exact-equality matcher
    #[must_use]
    pub const fn exactly(n: f64) -> Self {
        Self {
            eq: Some(n),
            gte: None,
            lte: None,
        }
    }

    /// Lower-bound matcher (inclusive)
    #[must_use]
    pub const fn at_least(n: f64) -> Self {
        Self {
            eq: None,
            gte: Some(n),
            lte: None,
        }
    }

    /// Upper-bound matcher (inclusive)
    #[must_use]
    pub const fn at_most(n: f64) -> Self {
        Self {
            eq: None,
            gte: None,
            lte: Some(n),
        }
    }

    /// Inclusive range matcher
    #[must_use]
    pub const fn between(gte: f64, lte: f64) -> Self {
        Self {
            eq: None,
            gte: Some(gte),
            lte: Some(lte),
        }
    }

    /// Build from optional fields, rejecting a matcher with no usable bound.
    /// `eq` takes precedence when combined with range fields.
    pub fn from_options(
        eq: Option<f64>,
        gte: Option<f64>,
        lte: Option<f64>,
    ) -> EsperarResult<Self> {
        if eq.is_none() && gte.is_none() && lte.is_none() {
            return Err(EsperarError::InvalidOptions {
                message: format!(
                    "expected NumberMatcher options with eq, gte, or lte, received {{eq: {eq:?}, gte: {gte:?}, lte: {lte:?}}}"
                ),
            });
        }
        if eq.is_some() {
            // eq wins over range fields
            return Ok(Self {
                eq,
                gte: None,
                lte: None,
            });
        }
        Ok(Self { eq, gte, lte })
    }

    /// Whether any bound is present
    #[must_use]
    pub const fn has_bound(&self) -> bool {
        self.eq.is_some() || self.gte.is_some() || self.lte.is_some()
    }

    /// Whether this is a pure equality matcher
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.eq.is_some()
    }

    /// Test a received number. `None` never matches; a matcher with no
    /// usable bound matches nothing.
    #[must_use]
    pub fn equals(&self, received: Option<f64>) -> bool {
        let Some(received) = received else {
            return false;
        };
        if let Some(eq) = self.eq {
            return (received - eq).abs() < f64::EPSILON;
        }
        if !self.has_bound() {
            return false;
        }
        let above = self.gte.map_or(true, |g| received >= g);
        let below = self.lte.map_or(true, |l| received <= l);
        above && below
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl std::fmt::Display for NumberMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(eq) = self.eq {
            return f.write_str(&render_number(eq));
        }
        match (self.gte, self.lte) {
            (Some(g), Some(l)) => write!(f, ">= {} && <= {}", render_number(g), render_number(l)),
            (Some(g), None) => write!(f, ">= {}", render_number(g)),
            (None, Some(l)) => write!(f, "<= {}", render_number(l)),
            (None, None) => f.write_str(INVALID_SENTINEL),
        }
    }
}

impl Serialize for NumberMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.eq {
            Some(eq) if eq.fract() == 0.0 && eq.abs() < 1e15 => {
                serializer.serialize_i64(eq as i64)
            }
            Some(eq) => serializer.serialize_f64(eq),
            None => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<f64> for NumberMatcher {
    fn from(n: f64) -> Self {
        Self::exactly(n)
    }
}

impl From<usize> for NumberMatcher {
    fn from(n: usize) -> Self {
        Self::exactly(n as f64)
    }
}

impl From<u64> for NumberMatcher {
    fn from(n: u64) -> Self {
        Self::exactly(n as f64)
    }
}

/// One side of a count comparison: a literal number or a matcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountOperand {
    /// Plain number
    Number(f64),
    /// Matcher standing in for the expected value
    Matcher(NumberMatcher),
}

/// Symmetry tester for plugging [`NumberMatcher`] into a generic
/// deep-equality algorithm without special-casing call order.
///
/// Returns `Some(matched)` when exactly one side is a matcher and the other
/// a plain number; `None` (defer to default equality) for two numbers or
/// two matchers.
#[must_use]
pub fn symmetric_match(a: &CountOperand, b: &CountOperand) -> Option<bool> {
    match (a, b) {
        (CountOperand::Matcher(m), CountOperand::Number(n))
        | (CountOperand::Number(n), CountOperand::Matcher(m)) => Some(m.equals(Some(*n))),
        _ => None,
    }
}
