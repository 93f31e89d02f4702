//! Utilities for numerics.

use std::f64::consts::PI;

use itertools::{Itertools, MinMaxResult};

/// The standard normal density, used as the smoothing kernel.
#[inline]
pub fn gaussian(u: f64) -> f64 {
    (-0.5 * u * u).exp() / (2.0 * PI).sqrt()
}

/// The convolution of [`gaussian`] with itself, i.e. the density of `N(0, 2)`.
///
/// Least-squares cross validation needs this to integrate the squared density estimate in closed
/// form.
#[inline]
pub fn gaussian_convolution(u: f64) -> f64 {
    (-0.25 * u * u).exp() / (4.0 * PI).sqrt()
}

/// Computes the standard deviation of `values`, treating them as the whole population (the sum
/// of squared deviations is divided by `values.len()`).
///
/// Returns 0.0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// Returns whether `values` contains at least two distinct values.
///
/// This is checked by exact comparison rather than via [`population_std_dev`], since the mean of
/// identical values can pick up rounding error and produce a tiny nonzero deviation.
pub fn has_spread(values: &[f64]) -> bool {
    match values.iter().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::MinMax(min, max) => min != max,
        MinMaxResult::NoElements | MinMaxResult::OneElement(_) => false,
    }
}
