//! Bandwidth selection.
//!
//! The bandwidth of a kernel density estimate controls how far the influence of each sample
//! reaches. This module implements the selectors understood by [`BandwidthMethod`]: the fast
//! *normal reference* rule of thumb, and two cross-validation methods that fit the bandwidth to
//! the data at the cost of an optimization loop over `O(n²)` objective evaluations.
//!
//! Only axes with nonzero spread are passed in here; degenerate axes are handled by
//! [`KernelDensity`][crate::KernelDensity] before selection.

use std::{fmt, str::FromStr};

use crate::{
    num::{gaussian, gaussian_convolution, population_std_dev},
    optimize::NelderMead,
    Axis, DensityError,
};

/// Method used to pick the kernel bandwidth of each axis.
///
/// Can be parsed from (and displayed as) the method names `normal_reference`, `cv_ml` and
/// `cv_ls`. A fixed bandwidth is written as two comma-separated numbers, eg. `2.5,4`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[non_exhaustive]
pub enum BandwidthMethod {
    /// Normal reference rule of thumb: `1.06 · σ · n^(-1/6)` per axis, where `σ` is the population
    /// standard deviation of the axis.
    ///
    /// This is optimal if the data is normally distributed and tends to oversmooth multimodal
    /// data.
    #[default]
    NormalReference,

    /// Maximum likelihood leave-one-out cross validation.
    CrossValidationMl,

    /// Least-squares cross validation, minimizing an estimate of the integrated squared error.
    CrossValidationLs,

    /// Caller-supplied bandwidths for the X and Y axis.
    Fixed([f64; 2]),
}

impl BandwidthMethod {
    /// The factor in the normal reference rule.
    pub const NORMAL_REFERENCE_FACTOR: f64 = 1.06;

    /// Fewer samples than this make leave-one-out cross validation meaningless; the normal
    /// reference rule is used instead.
    pub const MIN_CROSS_VALIDATION_SAMPLES: usize = 3;

    /// Checks that a [`BandwidthMethod::Fixed`] bandwidth is usable.
    pub fn validate(&self) -> Result<(), DensityError> {
        if let Self::Fixed(h) = self {
            for (axis, h) in Axis::ALL.into_iter().zip(h) {
                if !(h.is_finite() && *h > 0.0) {
                    return Err(DensityError::InvalidBandwidth { axis, value: *h });
                }
            }
        }
        Ok(())
    }

    /// Selects a bandwidth for each of `dims`.
    ///
    /// All dims must have the same, nonzero, number of samples and a nonzero spread.
    pub(crate) fn select(&self, dims: &[Dim<'_>]) -> Result<Vec<f64>, DensityError> {
        self.validate()?;

        let reference = normal_reference(dims);
        let n = dims.first().map_or(0, |d| d.coords.len());
        let cv = |objective: Objective| {
            if n < Self::MIN_CROSS_VALIDATION_SAMPLES {
                log::debug!("{n} samples are too few for cross validation, using normal reference");
                return reference.clone();
            }
            cross_validate(dims, &reference, objective)
        };

        let h = match self {
            Self::NormalReference => reference.clone(),
            Self::CrossValidationMl => cv(negative_loo_log_likelihood as Objective),
            Self::CrossValidationLs => cv(integrated_squared_error as Objective),
            Self::Fixed(h) => dims.iter().map(|d| h[d.axis.index()]).collect(),
        };

        log::trace!("{self} bandwidth for {n} samples: {h:?}");
        Ok(h)
    }
}

impl fmt::Display for BandwidthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NormalReference => f.write_str("normal_reference"),
            Self::CrossValidationMl => f.write_str("cv_ml"),
            Self::CrossValidationLs => f.write_str("cv_ls"),
            Self::Fixed([x, y]) => write!(f, "{x},{y}"),
        }
    }
}

impl FromStr for BandwidthMethod {
    type Err = DensityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || DensityError::UnknownBandwidthMethod(s.to_string());
        let method = match s.trim() {
            "normal_reference" => Self::NormalReference,
            "cv_ml" => Self::CrossValidationMl,
            "cv_ls" => Self::CrossValidationLs,
            other => {
                let (x, y) = other.split_once(',').ok_or_else(unknown)?;
                let x = x.trim().parse().map_err(|_| unknown())?;
                let y = y.trim().parse().map_err(|_| unknown())?;
                Self::Fixed([x, y])
            }
        };
        method.validate()?;
        Ok(method)
    }
}

/// The coordinates of all samples along one axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dim<'a> {
    pub axis: Axis,
    pub coords: &'a [f64],
}

/// Size of the initial simplex in log-bandwidth space; about a 28% change of the bandwidth.
const LOG_STEP: f64 = 0.25;

/// A cross-validation score to minimize, given the samples and candidate bandwidths.
type Objective = fn(&[Dim<'_>], &[f64]) -> f64;

fn normal_reference(dims: &[Dim<'_>]) -> Vec<f64> {
    // The exponent uses the dimensionality of the data as a whole, even if some axes are
    // degenerate and were dropped.
    let n = dims.first().map_or(0, |d| d.coords.len()) as f64;
    let d = Axis::ALL.len() as f64;
    let scale = BandwidthMethod::NORMAL_REFERENCE_FACTOR * n.powf(-1.0 / (4.0 + d));
    dims.iter()
        .map(|d| population_std_dev(d.coords) * scale)
        .collect()
}

/// Minimizes `objective` over the log-bandwidths, starting at `start`.
///
/// Searching in log space keeps every candidate bandwidth positive.
fn cross_validate(dims: &[Dim<'_>], start: &[f64], objective: Objective) -> Vec<f64> {
    let log_start = start.iter().map(|h| h.ln()).collect::<Vec<_>>();
    let mut h = vec![0.0; start.len()];
    let min = NelderMead::new()
        .with_step(LOG_STEP)
        .minimize(&log_start, |log_h| {
            for (h, log_h) in h.iter_mut().zip(log_h) {
                *h = log_h.exp();
            }
            objective(dims, &h)
        });

    if !min.converged {
        log::debug!(
            "bandwidth cross validation did not converge after {} iterations",
            min.iterations
        );
    }

    let h = min.x.iter().map(|log_h| log_h.exp()).collect::<Vec<_>>();
    if h.iter().all(|h| h.is_finite() && *h > 0.0) && min.value.is_finite() {
        h
    } else {
        log::debug!("bandwidth cross validation diverged, using normal reference");
        start.to_vec()
    }
}

/// Computes `Σ_j k((x_i - x_j) / h)` over all samples `j`, using the product of `kernel` across
/// `dims` as `k`. If `skip_self` is set, `j = i` is left out.
fn kernel_sum(
    dims: &[Dim<'_>],
    h: &[f64],
    i: usize,
    skip_self: bool,
    kernel: fn(f64) -> f64,
) -> f64 {
    let n = dims[0].coords.len();
    (0..n)
        .filter(|&j| !(skip_self && j == i))
        .map(|j| {
            dims.iter()
                .zip(h)
                .map(|(d, h)| kernel((d.coords[i] - d.coords[j]) / h))
                .product::<f64>()
        })
        .sum()
}

/// Negated leave-one-out log likelihood of the samples.
///
/// Each leave-one-out density is clamped to the smallest positive `f64`, so that samples far
/// away from all others penalize a bandwidth heavily instead of producing `-∞`.
pub(crate) fn negative_loo_log_likelihood(dims: &[Dim<'_>], h: &[f64]) -> f64 {
    let n = dims[0].coords.len();
    let norm = (n - 1) as f64 * h.iter().product::<f64>();
    let log_likelihood = (0..n)
        .map(|i| {
            let f = kernel_sum(dims, h, i, true, gaussian) / norm;
            f.max(f64::MIN_POSITIVE).ln()
        })
        .sum::<f64>();
    -log_likelihood
}

/// Least-squares cross validation score: `∫f̂² - 2/n Σ_i f̂₋ᵢ(x_i)`.
pub(crate) fn integrated_squared_error(dims: &[Dim<'_>], h: &[f64]) -> f64 {
    let n = dims[0].coords.len();
    let nf = n as f64;
    let h_prod = h.iter().product::<f64>();

    let mut squared = 0.0;
    let mut loo = 0.0;
    for i in 0..n {
        squared += kernel_sum(dims, h, i, false, gaussian_convolution);
        loo += kernel_sum(dims, h, i, true, gaussian);
    }

    squared / (nf * nf * h_prod) - 2.0 * loo / (nf * (nf - 1.0) * h_prod)
}
