//! Counting parameters.

use std::env::{self, VarError};

use densecount_kde::BandwidthMethod;

use crate::error::CountError;

/// Parameters of the density-adaptive counting threshold.
///
/// Only the base threshold is required; everything else has a default that can be overridden
/// with the `with_*` methods:
///
/// ```
/// use densecount::{kde::BandwidthMethod, CountParams};
///
/// let params = CountParams::new(0.5)
///     .with_bounds(0.0, 0.5)
///     .with_bandwidth(BandwidthMethod::CrossValidationMl);
/// assert_eq!(params.upper_bound(), 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CountParams {
    threshold: f64,
    lower_bound: f64,
    upper_bound: f64,
    noise_cutoff: f64,
    bandwidth: BandwidthMethod,
}

impl CountParams {
    pub const DEFAULT_LOWER_BOUND: f64 = 0.0;
    pub const DEFAULT_UPPER_BOUND: f64 = 1.0;

    /// Detections with a confidence at or below this value are considered noise and are ignored
    /// entirely.
    pub const DEFAULT_NOISE_CUTOFF: f64 = 0.20;

    /// Environment variable consulted by [`CountParams::from_env`] to override the bandwidth
    /// selection method. Accepts anything [`BandwidthMethod`] can be parsed from.
    pub const BANDWIDTH_ENV_VAR: &'static str = "DENSECOUNT_BANDWIDTH";

    /// Creates counting parameters with the given base `threshold` and default settings for
    /// everything else.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            lower_bound: Self::DEFAULT_LOWER_BOUND,
            upper_bound: Self::DEFAULT_UPPER_BOUND,
            noise_cutoff: Self::DEFAULT_NOISE_CUTOFF,
            bandwidth: BandwidthMethod::default(),
        }
    }

    /// Like [`CountParams::new`], but takes the bandwidth selection method from the
    /// [`BANDWIDTH_ENV_VAR`][Self::BANDWIDTH_ENV_VAR] environment variable, if it is set.
    pub fn from_env(threshold: f64) -> Result<Self, CountError> {
        let var = Self::BANDWIDTH_ENV_VAR;
        let params = Self::new(threshold);
        match env::var(var) {
            Ok(value) => match value.parse() {
                Ok(method) => Ok(params.with_bandwidth(method)),
                Err(e) => {
                    log::debug!("{e}");
                    Err(CountError::InvalidEnvVar { var, value })
                }
            },
            Err(VarError::NotPresent) => Ok(params),
            Err(VarError::NotUnicode(s)) => Err(CountError::InvalidEnvVar {
                var,
                value: s.to_string_lossy().into_owned(),
            }),
        }
    }

    /// Sets the range the density values of a frame are rescaled into before they're subtracted
    /// from the threshold.
    ///
    /// By default, [`Self::DEFAULT_LOWER_BOUND`] and [`Self::DEFAULT_UPPER_BOUND`] are used.
    pub fn with_bounds(self, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
            ..self
        }
    }

    /// Sets the confidence at or below which detections are discarded as noise.
    ///
    /// By default, [`Self::DEFAULT_NOISE_CUTOFF`] is used.
    pub fn with_noise_cutoff(self, noise_cutoff: f64) -> Self {
        Self {
            noise_cutoff,
            ..self
        }
    }

    pub fn with_bandwidth(self, bandwidth: BandwidthMethod) -> Self {
        Self { bandwidth, ..self }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }

    pub fn noise_cutoff(&self) -> f64 {
        self.noise_cutoff
    }

    pub fn bandwidth(&self) -> &BandwidthMethod {
        &self.bandwidth
    }

    /// The value every normalized density takes when the densities of a frame carry no
    /// information (see [`Fallback`][crate::Fallback]).
    pub fn midpoint(&self) -> f64 {
        (self.lower_bound + self.upper_bound) / 2.0
    }

    /// Checks that the parameters are usable.
    pub fn validate(&self) -> Result<(), CountError> {
        if !self.threshold.is_finite() {
            return Err(CountError::NonFiniteThreshold(self.threshold));
        }
        if !(self.lower_bound.is_finite()
            && self.upper_bound.is_finite()
            && self.upper_bound > self.lower_bound)
        {
            return Err(CountError::InvalidBounds {
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        if !(0.0..1.0).contains(&self.noise_cutoff) {
            return Err(CountError::InvalidNoiseCutoff(self.noise_cutoff));
        }
        self.bandwidth.validate()?;
        Ok(())
    }
}
