//! Bivariate kernel density estimation.
//!
//! [`KernelDensity`] fits a continuous density to a set of 2D sample points using a product of
//! Gaussian kernels, one per axis:
//!
//! ```text
//! f(x, y) = 1 / (n·h_x·h_y) · Σ_i K((x - x_i) / h_x) · K((y - y_i) / h_y)
//! ```
//!
//! The per-axis bandwidths `h_x` and `h_y` are picked by a [`BandwidthMethod`].
//!
//! # Degenerate data
//!
//! Bandwidth selection breaks down when all samples share the same coordinate on an axis (this
//! includes the case of a single sample). For such an axis, the kernel factor is the same for
//! every pair of samples, so it carries no information about *relative* density; the axis is
//! dropped from the product and reported by [`KernelDensity::degenerate_axes`]. If both axes
//! are degenerate, the density is *uniform*: it evaluates to 1.0 everywhere.
//!
//! Consequently, density values are only meaningful relative to each other, and only for the
//! same fitted [`KernelDensity`].

mod bandwidth;
pub mod iter;
mod num;
mod optimize;

use std::fmt;

use thiserror::Error;

use crate::{bandwidth::Dim, iter::zip_exact};

pub use bandwidth::BandwidthMethod;

/// Errors that can occur while fitting a [`KernelDensity`].
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DensityError {
    #[error("cannot fit a density to zero samples")]
    Empty,

    #[error("coordinate slices have different lengths ({x} x-coordinates, {y} y-coordinates)")]
    LengthMismatch { x: usize, y: usize },

    #[error("{axis} coordinate of sample {index} is not finite ({value})")]
    NonFinite {
        index: usize,
        axis: Axis,
        value: f64,
    },

    #[error("{axis} bandwidth must be finite and greater than zero (got {value})")]
    InvalidBandwidth { axis: Axis, value: f64 },

    #[error(
        "unknown bandwidth selection method '{0}' (expected `normal_reference`, `cv_ml`, \
         `cv_ls` or two comma-separated bandwidths)"
    )]
    UnknownBandwidthMethod(String),
}

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

/// A kernel density estimate fitted to a set of 2D points.
#[derive(Debug, Clone)]
pub struct KernelDensity {
    /// Sample coordinates, indexed by [`Axis::index`].
    coords: [Vec<f64>; 2],
    /// Bandwidth per axis. 0.0 for degenerate axes (unless a fixed bandwidth was requested).
    bandwidth: [f64; 2],
    /// Axes with nonzero spread, in [`Axis::ALL`] order.
    active: Vec<Axis>,
}

impl KernelDensity {
    /// Fits a density to the points `(xs[i], ys[i])`.
    ///
    /// # Errors
    ///
    /// Fails if there are no points, if `xs` and `ys` differ in length, if any coordinate is not
    /// finite, or if `method` is a [`BandwidthMethod::Fixed`] bandwidth that isn't positive.
    pub fn fit(xs: &[f64], ys: &[f64], method: &BandwidthMethod) -> Result<Self, DensityError> {
        if xs.len() != ys.len() {
            return Err(DensityError::LengthMismatch {
                x: xs.len(),
                y: ys.len(),
            });
        }
        if xs.is_empty() {
            return Err(DensityError::Empty);
        }
        for (index, (&x, &y)) in zip_exact(xs, ys).enumerate() {
            for (axis, value) in [(Axis::X, x), (Axis::Y, y)] {
                if !value.is_finite() {
                    return Err(DensityError::NonFinite { index, axis, value });
                }
            }
        }
        method.validate()?;

        let coords = [xs.to_vec(), ys.to_vec()];
        // A spread so small that its variance underflows is as good as none.
        let mut active = Axis::ALL
            .into_iter()
            .filter(|axis| {
                let coords = &coords[axis.index()];
                num::has_spread(coords) && num::population_std_dev(coords) > 0.0
            })
            .collect::<Vec<_>>();

        let dims = active
            .iter()
            .map(|&axis| Dim {
                axis,
                coords: &coords[axis.index()],
            })
            .collect::<Vec<_>>();

        let mut bandwidth = match method {
            BandwidthMethod::Fixed(h) => *h,
            _ => [0.0; 2],
        };
        let selected = if dims.is_empty() {
            Vec::new()
        } else {
            method.select(&dims)?
        };
        for (axis, h) in zip_exact(&active, selected) {
            bandwidth[axis.index()] = h;
        }
        active.retain(|axis| {
            let h = bandwidth[axis.index()];
            let usable = h.is_finite() && h > 0.0;
            if !usable {
                log::debug!("dropping {axis} axis with unusable bandwidth {h}");
                bandwidth[axis.index()] = 0.0;
            }
            usable
        });

        if active.len() < Axis::ALL.len() {
            log::debug!(
                "degenerate density input: {} samples, spread along {:?} only",
                xs.len(),
                active
            );
        }

        Ok(Self {
            coords,
            bandwidth,
            active,
        })
    }

    /// Returns the number of samples the density was fitted to.
    pub fn len(&self) -> usize {
        self.coords[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bandwidths used for the X and Y axis.
    ///
    /// Degenerate axes have a bandwidth of 0.0 unless a [`BandwidthMethod::Fixed`] bandwidth was
    /// requested; either way they don't contribute to the density.
    pub fn bandwidth(&self) -> [f64; 2] {
        self.bandwidth
    }

    /// Returns an iterator over the axes along which all samples share the same coordinate.
    pub fn degenerate_axes(&self) -> impl Iterator<Item = Axis> + '_ {
        Axis::ALL
            .into_iter()
            .filter(|axis| !self.active.contains(axis))
    }

    /// Returns whether the density is constant, which happens when all samples coincide.
    pub fn is_uniform(&self) -> bool {
        self.active.is_empty()
    }

    /// Evaluates the density at `(x, y)`.
    ///
    /// Degenerate axes are ignored, so the result is constant along them.
    pub fn pdf(&self, x: f64, y: f64) -> f64 {
        if self.is_uniform() {
            return 1.0;
        }

        let query = [x, y];
        let norm = self.len() as f64
            * self
                .active
                .iter()
                .map(|axis| self.bandwidth[axis.index()])
                .product::<f64>();

        let sum = (0..self.len())
            .map(|i| {
                self.active
                    .iter()
                    .map(|axis| {
                        let a = axis.index();
                        num::gaussian((query[a] - self.coords[a][i]) / self.bandwidth[a])
                    })
                    .product::<f64>()
            })
            .sum::<f64>();

        sum / norm
    }

    /// Evaluates the density at each of the samples it was fitted to, in the original order.
    ///
    /// This is a *self-evaluation*: every sample contributes its own kernel peak to its own
    /// density value (as opposed to a leave-one-out estimate). Coinciding samples therefore
    /// reinforce each other, and an isolated sample still receives the density of its own kernel.
    pub fn evaluate_at_samples(&self) -> Vec<f64> {
        zip_exact(&self.coords[0], &self.coords[1])
            .map(|(&x, &y)| self.pdf(x, y))
            .collect()
    }
}

/// Fits a [`KernelDensity`] to the points `(xs[i], ys[i])` and evaluates it at those points.
///
/// This is a shorthand for [`KernelDensity::fit`] followed by
/// [`KernelDensity::evaluate_at_samples`].
pub fn self_density(
    xs: &[f64],
    ys: &[f64],
    method: &BandwidthMethod,
) -> Result<Vec<f64>, DensityError> {
    Ok(KernelDensity::fit(xs, ys, method)?.evaluate_at_samples())
}
