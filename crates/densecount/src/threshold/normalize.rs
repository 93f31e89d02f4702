//! Batch-wide min-max normalization.
//!
//! Every normalized value depends on the minimum and maximum of the *whole* batch, so this is
//! done in two passes: first the extremes of all raw values are collected, then each value is
//! rescaled. Normalizing values one at a time is a bug.

use itertools::{Itertools, MinMaxResult};

/// Values min-max rescaled into `[lower, upper]` by [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub values: Vec<f64>,
    /// `true` if all input values were equal (or not all of them were finite), so that every
    /// output is the midpoint of the range.
    pub zero_spread: bool,
}

/// Linearly rescales `values` so that the smallest maps to `lower` and the largest to `upper`.
///
/// The transform is monotonic, and the extremes map to the bounds *exactly*. If all values are
/// equal (including the case of a single value), there's no spread to rescale and every value
/// maps to the midpoint `(lower + upper) / 2` instead of dividing by zero. The same happens if
/// any value is NaN or infinite, since no meaningful spread can be computed then.
///
/// # Panics
///
/// Panics if `lower` and `upper` aren't finite or `lower` isn't less than `upper`.
pub fn normalize(values: &[f64], lower: f64, upper: f64) -> Normalized {
    assert!(
        lower.is_finite() && upper.is_finite() && lower < upper,
        "invalid normalization range {lower}..{upper}"
    );

    let (min, max) = match values.iter().copied().minmax_by(f64::total_cmp) {
        MinMaxResult::NoElements => {
            return Normalized {
                values: Vec::new(),
                zero_spread: false,
            }
        }
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(min, max) => (min, max),
    };

    let spread = max - min;
    if !(spread.is_finite() && spread > 0.0) {
        return Normalized {
            values: vec![(lower + upper) / 2.0; values.len()],
            zero_spread: true,
        };
    }

    let range = upper - lower;
    let values = values
        .iter()
        .map(|&v| {
            if v == max {
                upper
            } else if v == min {
                lower
            } else {
                (lower + range * ((v - min) / spread)).clamp(lower, upper)
            }
        })
        .collect();

    Normalized {
        values,
        zero_spread: false,
    }
}
