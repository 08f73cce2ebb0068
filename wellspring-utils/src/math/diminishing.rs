//! Diminishing-returns weighting.
//!
//! `D(n, start, min, decay) = Σ_{i=1}^{n} max(min, start / (1 + decay·(i-1)))`
//!
//! The first units count for `start` each, later units decay hyperbolically
//! towards the `min` floor. Small amounts are rewarded strongly while very
//! large amounts add little on the margin.

use serde::{Deserialize, Serialize};

/// Parameters of one diminishing-returns curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiminishingCurve {
    /// Weight of the first unit.
    pub start: f64,
    /// Floor every unit is worth at least.
    pub min: f64,
    /// How quickly per-unit weight falls off.
    pub decay: f64,
}

impl DiminishingCurve {
    /// Creates a new curve.
    #[must_use]
    pub const fn new(start: f64, min: f64, decay: f64) -> Self {
        Self { start, min, decay }
    }

    /// Weight of the `i`-th unit (1-based).
    #[inline]
    #[must_use]
    pub fn unit_weight(&self, i: u64) -> f64 {
        let step = i.saturating_sub(1) as f64;
        (self.start / (1.0 + self.decay * step)).max(self.min)
    }

    /// Evaluates the curve over `n` units.
    #[must_use]
    pub fn evaluate(&self, n: u64) -> f64 {
        diminishing_returns(n, self.start, self.min, self.decay)
    }

    /// Whether the parameters describe a usable curve.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.start.is_finite()
            && self.min.is_finite()
            && self.decay.is_finite()
            && self.start >= 0.0
            && self.min >= 0.0
            && self.decay >= 0.0
    }
}

/// Sums the diminishing weights of `n` units.
///
/// Once the hyperbola drops below `min` every further unit is worth exactly
/// `min`, so the tail is added in one step instead of iterating.
#[must_use]
pub fn diminishing_returns(n: u64, start: f64, min: f64, decay: f64) -> f64 {
    let curve = DiminishingCurve::new(start, min, decay);
    let mut total = 0.0;
    for i in 1..=n {
        let weight = curve.unit_weight(i);
        if weight <= min {
            return total + (n - i + 1) as f64 * min;
        }
        total += weight;
    }
    total
}
