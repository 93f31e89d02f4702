//! Density-adaptive counting of noisy object detections.
//!
//! Object detectors report one bounding box per detected object, along with a confidence score.
//! Counting the boxes whose confidence exceeds a fixed threshold undercounts crowded scenes and
//! overcounts scenes with scattered false positives. This library instead shifts the threshold of
//! each detection based on how densely detections are packed around it (see [`threshold`]), and
//! averages the resulting counts over the frames of a video (see [`aggregate`]).
//!
//! ```
//! use ndarray::array;
//!
//! // Two overlapping boxes and a far-away one.
//! let frame = array![
//!     [0.0, 0.0, 2.0, 2.0, 0.5],
//!     [0.0, 0.0, 2.0, 2.0, 0.5],
//!     [100.0, 100.0, 102.0, 102.0, 0.9],
//! ];
//! assert_eq!(densecount::ldts(&frame, 0.5)?, 3);
//! # Ok::<_, densecount::CountError>(())
//! ```
//!
//! The density estimator lives in its own crate and is re-exported as [`kde`].
//!
//! # Environment Variables
//!
//! * `DENSECOUNT_BANDWIDTH`: Overrides the bandwidth selection method used by parameters created
//!   with [`CountParams::from_env`]. Allowed values are:
//!   * `normal_reference`: normal reference rule of thumb (the default).
//!   * `cv_ml`: maximum likelihood cross validation.
//!   * `cv_ls`: least-squares cross validation.
//!   * `<hx>,<hy>`: fixed bandwidths for the X and Y axis.
//! * `RUST_LOG`: Adjusts the log output of [`init_logger!`].

use log::LevelFilter;

pub mod aggregate;
pub mod detection;
pub mod error;
pub mod iter;
pub mod params;
pub mod threshold;

pub use densecount_kde as kde;

pub use aggregate::{video_count, FrameAggregator};
pub use detection::{BoundingBox, Detection};
pub use error::{AggregateError, CountError};
pub use params::CountParams;
pub use threshold::{ldts, normalize, AdaptiveCounter, CountReport, Fallback};

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("densecount_kde"), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and the densecount crates will log at *debug* level. `RUST_LOG` can be used
/// to change that, eg. `RUST_LOG=densecount=trace` also logs every raw density value.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
