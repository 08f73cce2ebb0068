//! This module contains math related utilities.
pub mod diminishing;

pub use diminishing::{DiminishingCurve, diminishing_returns};

/// Linearly remaps `value` from `[from_min, from_max]` to `[to_min, to_max]`,
/// clamping to the target range.
///
/// A degenerate source range maps everything to `to_min`.
#[must_use]
pub const fn map_clamped(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    let span = from_max - from_min;
    if span == 0.0 {
        return to_min;
    }
    let t = ((value - from_min) / span).clamp(0.0, 1.0);
    to_min + t * (to_max - to_min)
}

/// Divides `numerator` by `denominator`, returning `0.0` instead of a
/// non-finite result.
#[must_use]
pub const fn safe_div(numerator: f64, denominator: f64) -> f64 {
    let result = numerator / denominator;
    if result.is_finite() { result } else { 0.0 }
}
