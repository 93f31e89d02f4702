//! Averaging object counts over video frames.
//!
//! A video's object count is estimated as the arithmetic mean of the per-frame counts of its
//! first `max_frames` frames. Every frame is counted with the same [`CountParams`], including the
//! bandwidth selection method.

use std::error::Error;

use ndarray::{Array2, AsArray, Ix2};
use rayon::prelude::*;

use crate::{
    error::AggregateError,
    params::CountParams,
    threshold::AdaptiveCounter,
};

/// Computes the average object count over a bounded number of frames.
#[derive(Debug, Clone)]
pub struct FrameAggregator {
    counter: AdaptiveCounter,
    max_frames: usize,
}

impl FrameAggregator {
    /// Creates an aggregator that counts frames with `params` and considers at most `max_frames`
    /// frames.
    pub fn new(params: CountParams, max_frames: usize) -> Result<Self, AggregateError> {
        Ok(Self {
            counter: AdaptiveCounter::new(params)?,
            max_frames,
        })
    }

    pub fn counter(&self) -> &AdaptiveCounter {
        &self.counter
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Counts the objects in each of the first `max_frames` frames.
    ///
    /// Frames after that are not pulled from the iterator at all. Stops at the first frame that
    /// fails to be counted.
    pub fn counts<'a, I, V>(&self, frames: I) -> Result<Vec<usize>, AggregateError>
    where
        I: IntoIterator<Item = V>,
        V: AsArray<'a, f64, Ix2>,
    {
        frames
            .into_iter()
            .take(self.max_frames)
            .enumerate()
            .map(|(index, frame)| self.count_frame(index, frame))
            .collect()
    }

    /// Computes the average object count over the first `max_frames` frames.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::NoFrames`] if no frame was counted (because `frames` is empty or
    /// `max_frames` is 0), and [`AggregateError::Frame`] if any frame can't be counted.
    pub fn average<'a, I, V>(&self, frames: I) -> Result<f64, AggregateError>
    where
        I: IntoIterator<Item = V>,
        V: AsArray<'a, f64, Ix2>,
    {
        mean(&self.counts(frames)?)
    }

    /// Like [`FrameAggregator::counts`], but for frames that are loaded on demand and may fail to
    /// load.
    ///
    /// A frame that fails to load aborts the aggregation with [`AggregateError::Load`].
    pub fn try_counts<I, E>(&self, frames: I) -> Result<Vec<usize>, AggregateError>
    where
        I: IntoIterator<Item = Result<Array2<f64>, E>>,
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        frames
            .into_iter()
            .take(self.max_frames)
            .enumerate()
            .map(|(index, frame)| {
                let frame = frame.map_err(|e| AggregateError::Load {
                    index,
                    source: e.into(),
                })?;
                self.count_frame(index, &frame)
            })
            .collect()
    }

    /// Like [`FrameAggregator::average`], but for frames that may fail to load.
    pub fn try_average<I, E>(&self, frames: I) -> Result<f64, AggregateError>
    where
        I: IntoIterator<Item = Result<Array2<f64>, E>>,
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        mean(&self.try_counts(frames)?)
    }

    /// Computes the same average as [`FrameAggregator::average`], but counts frames in parallel.
    ///
    /// If several frames fail to be counted, it is unspecified which of the errors is returned.
    pub fn average_par(&self, frames: &[Array2<f64>]) -> Result<f64, AggregateError> {
        let frames = &frames[..frames.len().min(self.max_frames)];
        let counts = frames
            .par_iter()
            .enumerate()
            .map(|(index, frame)| self.count_frame(index, frame))
            .collect::<Result<Vec<_>, _>>()?;
        mean(&counts)
    }

    fn count_frame<'a, V>(&self, index: usize, frame: V) -> Result<usize, AggregateError>
    where
        V: AsArray<'a, f64, Ix2>,
    {
        let count = self
            .counter
            .count(frame)
            .map_err(|source| AggregateError::Frame { index, source })?;
        log::debug!("frame {index}: {count} objects");
        Ok(count)
    }
}

/// Averages the object count over the first `max_frames` of `frames`.
///
/// Shorthand for [`FrameAggregator::new`] followed by [`FrameAggregator::average`].
pub fn video_count<'a, I, V>(
    frames: I,
    max_frames: usize,
    params: &CountParams,
) -> Result<f64, AggregateError>
where
    I: IntoIterator<Item = V>,
    V: AsArray<'a, f64, Ix2>,
{
    FrameAggregator::new(params.clone(), max_frames)?.average(frames)
}

/// Computes the arithmetic mean of per-frame counts.
///
/// Fails with [`AggregateError::NoFrames`] if `counts` is empty.
pub fn mean(counts: &[usize]) -> Result<f64, AggregateError> {
    if counts.is_empty() {
        return Err(AggregateError::NoFrames);
    }
    Ok(counts.iter().sum::<usize>() as f64 / counts.len() as f64)
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, io};

    use ndarray::array;

    use crate::error::CountError;

    use super::*;

    /// A frame with `n` isolated detections that all get counted at a threshold of 0.5.
    fn frame(n: usize) -> Array2<f64> {
        let mut table = Array2::zeros((n, 5));
        for (i, mut row) in table.rows_mut().into_iter().enumerate() {
            let x = i as f64 * 50.0;
            row.assign(&array![x, 0.0, x + 4.0, 4.0, 0.95]);
        }
        table
    }

    #[test]
    fn mean_of_counts() {
        assert_eq!(mean(&[2, 3, 4]).unwrap(), 3.0);
        assert_eq!(mean(&[1, 2]).unwrap(), 1.5);
        assert!(matches!(mean(&[]), Err(AggregateError::NoFrames)));
    }

    #[test]
    fn respects_max_frames() {
        let frames = [frame(2), frame(3), frame(4), frame(9)];
        let aggregator = FrameAggregator::new(CountParams::new(0.5), 3).unwrap();
        assert_eq!(aggregator.counts(&frames).unwrap(), [2, 3, 4]);
        assert_eq!(aggregator.average(&frames).unwrap(), 3.0);
        assert_eq!(aggregator.average_par(&frames).unwrap(), 3.0);
    }

    #[test]
    fn fewer_frames_than_max() {
        let frames = [frame(1), frame(4)];
        let avg = video_count(&frames, 10, &CountParams::new(0.5)).unwrap();
        assert_eq!(avg, 2.5);
    }

    #[test]
    fn later_frames_are_not_loaded() {
        let loaded = Cell::new(0);
        let frames = (0..10).map(|i| {
            loaded.set(loaded.get() + 1);
            Ok::<_, io::Error>(frame(i % 3 + 1))
        });
        let aggregator = FrameAggregator::new(CountParams::new(0.5), 4).unwrap();
        assert_eq!(aggregator.try_counts(frames).unwrap(), [1, 2, 3, 1]);
        assert_eq!(loaded.get(), 4);
    }

    #[test]
    fn no_frames() {
        let aggregator = FrameAggregator::new(CountParams::new(0.5), 0).unwrap();
        assert!(matches!(
            aggregator.average(&[frame(3)]),
            Err(AggregateError::NoFrames)
        ));
        assert!(matches!(
            aggregator.average_par(&[frame(3)]),
            Err(AggregateError::NoFrames)
        ));

        let aggregator = FrameAggregator::new(CountParams::new(0.5), 5).unwrap();
        let frames: [Array2<f64>; 0] = [];
        assert!(matches!(
            aggregator.average(&frames),
            Err(AggregateError::NoFrames)
        ));
    }

    #[test]
    fn failing_frame_is_identified() {
        let mut bad = frame(2);
        bad[[1, 4]] = 3.0;
        let frames = [frame(1), bad, frame(2)];
        let aggregator = FrameAggregator::new(CountParams::new(0.5), 3).unwrap();

        let err = aggregator.average(&frames).unwrap_err();
        assert_eq!(err.frame_index(), Some(1));
        assert!(matches!(
            err,
            AggregateError::Frame {
                index: 1,
                source: CountError::ConfidenceOutOfRange { row: 1, .. }
            }
        ));

        let err = aggregator.average_par(&frames).unwrap_err();
        assert_eq!(err.frame_index(), Some(1));
    }

    #[test]
    fn failing_load_is_identified() {
        let frames = vec![
            Ok(frame(1)),
            Err(io::Error::new(io::ErrorKind::NotFound, "frame_0001.npy")),
        ];
        let aggregator = FrameAggregator::new(CountParams::new(0.5), 3).unwrap();
        let err = aggregator.try_average(frames).unwrap_err();
        assert!(matches!(err, AggregateError::Load { index: 1, .. }));
        assert!(err.source().unwrap().to_string().contains("frame_0001"));
    }

    #[test]
    fn invalid_params() {
        let params = CountParams::new(0.5).with_bounds(0.0, 0.0);
        assert!(matches!(
            FrameAggregator::new(params, 3),
            Err(AggregateError::Params(CountError::InvalidBounds { .. }))
        ));
    }
}
