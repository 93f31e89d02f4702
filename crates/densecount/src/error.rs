//! Error types.

use std::error::Error;

use densecount_kde::DensityError;
use thiserror::Error;

/// Errors reported when counting the detections of a single frame.
///
/// All of these are raised before any density estimation takes place. Values are never clamped
/// into range silently.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CountError {
    #[error("upper normalization bound ({upper}) must be greater than lower bound ({lower})")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("counting threshold must be finite (got {0})")]
    NonFiniteThreshold(f64),

    #[error("noise cutoff must lie in [0, 1) (got {0})")]
    InvalidNoiseCutoff(f64),

    #[error("detection table must have 5 columns (x1, y1, x2, y2, p), got {0}")]
    ColumnCount(usize),

    #[error("value in row {row}, column {column} is not finite ({value})")]
    NonFinite {
        row: usize,
        column: usize,
        value: f64,
    },

    #[error("confidence of detection {row} lies outside of [0, 1] ({value})")]
    ConfidenceOutOfRange { row: usize, value: f64 },

    #[error("invalid value '{value}' set for `{var}` variable")]
    InvalidEnvVar { var: &'static str, value: String },

    #[error(transparent)]
    Density(#[from] DensityError),
}

/// Errors reported when averaging counts over several frames.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AggregateError {
    /// No frame was processed, so there is nothing to average.
    #[error("cannot average the object count over zero frames")]
    NoFrames,

    #[error("invalid counting parameters")]
    Params(#[from] CountError),

    #[error("failed to count objects in frame {index}")]
    Frame {
        index: usize,
        #[source]
        source: CountError,
    },

    #[error("failed to load frame {index}")]
    Load {
        index: usize,
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
}

impl AggregateError {
    /// Returns the index of the frame that caused this error, if the error is specific to one
    /// frame.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::Frame { index, .. } | Self::Load { index, .. } => Some(*index),
            Self::NoFrames | Self::Params(_) => None,
        }
    }
}
