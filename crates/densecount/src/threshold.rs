//! Density-adaptive threshold counting.
//!
//! Counting objects by thresholding detection confidence works poorly in crowded scenes: when
//! objects overlap, detectors tend to suppress each other's confidence scores, so real objects in
//! dense regions fall below the threshold. Meanwhile, isolated low-confidence detections are
//! frequently false positives.
//!
//! [`AdaptiveCounter`] compensates for both effects. It fits a kernel density estimate to the
//! centers of a frame's detections and shifts the counting threshold per detection: down where
//! detections are dense, up where they are sparse. In detail, for each frame:
//!
//! 1. Detections with a confidence at or below the noise cutoff are discarded.
//! 2. A [`KernelDensity`] is fitted to the centers of the remaining detections and evaluated at
//!    each of them.
//! 3. The densities are min-max [`normalize`]d into the configured bounds, jointly for the whole
//!    frame.
//! 4. A detection is counted if its confidence exceeds `threshold - normalized_density`.

mod normalize;

use densecount_kde::KernelDensity;
use ndarray::{AsArray, Ix2};

use crate::{detection::Detection, error::CountError, iter::zip_exact, params::CountParams};

pub use normalize::{normalize, Normalized};

/// Counts the objects in a frame with default parameters and the given base `threshold`.
///
/// `table` holds one `(x1, y1, x2, y2, p)` row per detection. See [`AdaptiveCounter`] for
/// details.
pub fn ldts<'a, V: AsArray<'a, f64, Ix2>>(table: V, threshold: f64) -> Result<usize, CountError> {
    AdaptiveCounter::new(CountParams::new(threshold))?.count(table)
}

/// Counts detections with a density-adaptive confidence threshold.
///
/// The counter holds no state besides its [`CountParams`], so every call is independent and a
/// single counter can be shared between threads.
#[derive(Debug, Clone)]
pub struct AdaptiveCounter {
    params: CountParams,
}

impl AdaptiveCounter {
    /// Creates a counter, validating `params` up front.
    pub fn new(params: CountParams) -> Result<Self, CountError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &CountParams {
        &self.params
    }

    /// Counts the objects in a detection table.
    ///
    /// The table must have the columns `(x1, y1, x2, y2, p)`; it may have zero rows.
    pub fn count<'a, V: AsArray<'a, f64, Ix2>>(&self, table: V) -> Result<usize, CountError> {
        Ok(self.report(table)?.count)
    }

    /// Counts the objects in a detection table and describes how the count was reached.
    pub fn report<'a, V: AsArray<'a, f64, Ix2>>(&self, table: V) -> Result<CountReport, CountError> {
        let detections = Detection::from_table(table.into())?;
        self.report_checked(&detections)
    }

    /// Counts a list of detections.
    pub fn count_detections(&self, detections: &[Detection]) -> Result<usize, CountError> {
        Ok(self.report_detections(detections)?.count)
    }

    /// Counts a list of detections and describes how the count was reached.
    pub fn report_detections(&self, detections: &[Detection]) -> Result<CountReport, CountError> {
        for (index, det) in detections.iter().enumerate() {
            det.check(index)?;
        }
        self.report_checked(detections)
    }

    /// Counts detections that have already passed [`Detection::check`].
    fn report_checked(&self, detections: &[Detection]) -> Result<CountReport, CountError> {
        let params = &self.params;
        let survivors = detections
            .iter()
            .filter(|det| det.confidence() > params.noise_cutoff())
            .collect::<Vec<_>>();

        let mut report = CountReport {
            count: 0,
            input_len: detections.len(),
            filtered_len: survivors.len(),
            fallback: Fallback::None,
        };

        if survivors.is_empty() {
            log::debug!(
                "all {} detections are at or below the noise cutoff of {}",
                detections.len(),
                params.noise_cutoff()
            );
            report.fallback = Fallback::NoDetections;
            return Ok(report);
        }

        let (xs, ys): (Vec<f64>, Vec<f64>) = survivors
            .iter()
            .map(|det| {
                let center = det.bounding_box().center();
                (center.x, center.y)
            })
            .unzip();

        let density = KernelDensity::fit(&xs, &ys, params.bandwidth())?;
        let normalized = if density.is_uniform() {
            report.fallback = Fallback::UniformDensity;
            vec![params.midpoint(); survivors.len()]
        } else {
            let raw = density.evaluate_at_samples();
            log::trace!("raw densities: {raw:?}");
            let normalized = normalize(&raw, params.lower_bound(), params.upper_bound());
            if normalized.zero_spread {
                report.fallback = Fallback::ZeroSpread;
            }
            normalized.values
        };

        report.count = zip_exact(&survivors, &normalized)
            .filter(|(det, z)| det.confidence() > params.threshold() - **z)
            .count();

        log::debug!(
            "counted {} of {} detections ({} above noise cutoff, bandwidth {:?}, fallback {:?})",
            report.count,
            report.input_len,
            report.filtered_len,
            density.bandwidth(),
            report.fallback,
        );

        Ok(report)
    }
}

/// The result of counting one frame, returned by [`AdaptiveCounter::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountReport {
    /// The estimated number of objects.
    pub count: usize,
    /// The number of detections in the frame.
    pub input_len: usize,
    /// The number of detections above the noise cutoff; only these are considered for counting.
    pub filtered_len: usize,
    /// The fallback that was used, if the frame's densities were degenerate.
    pub fallback: Fallback,
}

/// Describes how a frame with degenerate density information was counted.
///
/// When a frame's densities carry no information, every detection receives the *midpoint* of
/// the normalization bounds as its normalized density. The counting threshold is therefore
/// uniformly lowered by `(lower_bound + upper_bound) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Fallback {
    /// No fallback was needed.
    None,

    /// No detections were left after noise filtering; the count is 0.
    NoDetections,

    /// All remaining detections share the same center (this includes the case of a single
    /// detection), so no density can be estimated. Normalized densities are set to the midpoint.
    UniformDensity,

    /// A density was estimated, but it is identical at every detection (eg. for 2 detections, or
    /// symmetric layouts) or not finite everywhere, so min-max normalization is undefined.
    /// Normalized densities are set to the midpoint.
    ZeroSpread,
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use crate::detection::column;

    use super::*;

    fn counter(threshold: f64) -> AdaptiveCounter {
        AdaptiveCounter::new(CountParams::new(threshold)).unwrap()
    }

    #[test]
    fn dense_pair_and_isolated_box() {
        let table = array![
            [0.0, 0.0, 2.0, 2.0, 0.5],
            [0.0, 0.0, 2.0, 2.0, 0.5],
            [100.0, 100.0, 102.0, 102.0, 0.9],
        ];
        let report = counter(0.5).report(&table).unwrap();
        assert_eq!(report.count, 3);
        assert_eq!(report.fallback, Fallback::None);

        // The isolated detection has the lowest density, so its threshold isn't lowered at all.
        let table = array![
            [0.0, 0.0, 2.0, 2.0, 0.5],
            [0.0, 0.0, 2.0, 2.0, 0.5],
            [100.0, 100.0, 102.0, 102.0, 0.45],
        ];
        assert_eq!(counter(0.5).count(&table).unwrap(), 2);
    }

    #[test]
    fn all_noise() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.2], [5.0, 5.0, 9.0, 9.0, 0.05]];
        let report = counter(0.0).report(&table).unwrap();
        assert_eq!(report.count, 0);
        assert_eq!(report.filtered_len, 0);
        assert_eq!(report.fallback, Fallback::NoDetections);
    }

    #[test]
    fn empty_frame() {
        let table = Array2::<f64>::zeros((0, column::COUNT));
        assert_eq!(counter(0.5).count(&table).unwrap(), 0);
    }

    #[test]
    fn single_detection() {
        let table = array![[3.0, 3.0, 5.0, 9.0, 0.6], [0.0, 0.0, 1.0, 1.0, 0.1]];
        let report = counter(0.5).report(&table).unwrap();
        assert_eq!(report.fallback, Fallback::UniformDensity);
        assert_eq!(report.filtered_len, 1);
        // 0.6 > 0.5 - 0.5
        assert_eq!(report.count, 1);

        let table = array![[3.0, 3.0, 5.0, 9.0, 0.3]];
        // 0.3 <= 0.9 - 0.5
        assert_eq!(counter(0.9).count(&table).unwrap(), 0);
    }

    #[test]
    fn coincident_centers() {
        // Different boxes, same center.
        let table = array![
            [0.0, 0.0, 4.0, 4.0, 0.3],
            [1.0, 1.0, 3.0, 3.0, 0.55],
            [-2.0, 1.0, 6.0, 3.0, 0.9],
        ];
        let report = counter(0.9).report(&table).unwrap();
        assert_eq!(report.fallback, Fallback::UniformDensity);
        // Threshold is 0.9 - 0.5 for all of them.
        assert_eq!(report.count, 2);
    }

    #[test]
    fn vanishing_spread_uses_midpoint() {
        // The center spread along x is too small for its variance to be representable.
        let table = array![
            [0.0, 0.0, 0.0, 0.0, 0.9],
            [0.0, 0.0, 2e-170, 0.0, 0.9],
            [1e-170, 0.0, 1e-170, 0.0, 0.9],
        ];
        let report = counter(0.5).report(&table).unwrap();
        assert_eq!(report.fallback, Fallback::UniformDensity);
        assert_eq!(report.count, 3);
    }

    #[test]
    fn symmetric_pair_has_zero_spread() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.3], [10.0, 20.0, 12.0, 22.0, 0.7]];
        let params = CountParams::new(0.8).with_bounds(0.0, 0.6);
        let report = AdaptiveCounter::new(params).unwrap().report(&table).unwrap();
        assert_eq!(report.fallback, Fallback::ZeroSpread);
        // Threshold is 0.8 - 0.3 for both.
        assert_eq!(report.count, 1);
    }

    #[test]
    fn noise_cutoff_is_configurable() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.3]];
        let params = CountParams::new(0.0).with_noise_cutoff(0.35);
        let report = AdaptiveCounter::new(params).unwrap().report(&table).unwrap();
        assert_eq!(report.filtered_len, 0);
        assert_eq!(report.count, 0);

        // Strictly greater than the cutoff survives, equal doesn't.
        let params = CountParams::new(0.0).with_noise_cutoff(0.3);
        let report = AdaptiveCounter::new(params).unwrap().report(&table).unwrap();
        assert_eq!(report.filtered_len, 0);
    }

    #[test]
    fn count_detections_matches_table() {
        let rows = [
            [0.0, 0.0, 2.0, 2.0, 0.4],
            [1.0, 0.0, 3.0, 2.0, 0.45],
            [30.0, 30.0, 34.0, 35.0, 0.7],
            [60.0, 2.0, 62.0, 3.0, 0.25],
        ];
        let dets = rows.map(Detection::from_row);
        let table = ndarray::aview2(&rows);
        let counter = counter(0.6);
        assert_eq!(
            counter.count_detections(&dets).unwrap(),
            counter.count(table).unwrap()
        );
    }

    #[test]
    fn rejects_invalid_detections() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.5], [0.0, 0.0, 2.0, 2.0, -0.5]];
        assert!(matches!(
            counter(0.5).count(&table),
            Err(CountError::ConfidenceOutOfRange { row: 1, .. })
        ));

        let dets = [Detection::from_row([f64::NAN, 0.0, 1.0, 1.0, 0.9])];
        assert!(matches!(
            counter(0.5).count_detections(&dets),
            Err(CountError::NonFinite { row: 0, column: 0, .. })
        ));
    }

    #[test]
    fn rejects_invalid_params() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.5]];
        assert!(matches!(
            AdaptiveCounter::new(CountParams::new(0.5).with_bounds(1.0, 0.0)),
            Err(CountError::InvalidBounds { .. })
        ));
        assert!(matches!(
            ldts(&table, f64::INFINITY),
            Err(CountError::NonFiniteThreshold(_))
        ));
    }
}
