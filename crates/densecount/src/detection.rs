//! Detection records and conversion from detection tables.
//!
//! Object detectors typically hand their output over as a numeric table with one row per
//! detection. This crate expects the columns `(x1, y1, x2, y2, p)`: the corners of an
//! axis-aligned bounding box, followed by the classification confidence `p`.

use nalgebra::Point2;
use ndarray::ArrayView2;

use crate::error::CountError;

/// A detection table's column layout.
pub mod column {
    pub const X1: usize = 0;
    pub const Y1: usize = 1;
    pub const X2: usize = 2;
    pub const Y2: usize = 3;
    pub const CONFIDENCE: usize = 4;

    /// Number of columns in a detection table.
    pub const COUNT: usize = 5;
}

/// An axis-aligned bounding box, given by two opposite corners.
///
/// The corners don't have to be ordered; only the box center is used for counting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Returns the center point of the box.
    #[inline]
    pub fn center(&self) -> Point2<f64> {
        Point2::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    fn coords(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// A detected object: a bounding box and the detector's confidence in it.
///
/// Per convention, the confidence lies between 0.0 and 1.0. Counting rejects detections outside
/// of that range instead of clamping them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    bounding_box: BoundingBox,
    confidence: f64,
}

impl Detection {
    pub fn new(bounding_box: BoundingBox, confidence: f64) -> Self {
        Self {
            bounding_box,
            confidence,
        }
    }

    /// Creates a detection from a `[x1, y1, x2, y2, p]` row.
    pub fn from_row(row: [f64; column::COUNT]) -> Self {
        Self::new(
            BoundingBox::new(
                row[column::X1],
                row[column::Y1],
                row[column::X2],
                row[column::Y2],
            ),
            row[column::CONFIDENCE],
        )
    }

    /// Converts a detection table into a list of validated detections.
    ///
    /// # Errors
    ///
    /// Fails if the table doesn't have exactly [`column::COUNT`] columns, if any value is not
    /// finite, or if any confidence lies outside of `[0, 1]`. The error names the offending row.
    pub fn from_table(table: ArrayView2<'_, f64>) -> Result<Vec<Self>, CountError> {
        if table.ncols() != column::COUNT {
            return Err(CountError::ColumnCount(table.ncols()));
        }

        table
            .rows()
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let det = Self::from_row([row[0], row[1], row[2], row[3], row[4]]);
                det.check(index)?;
                Ok(det)
            })
            .collect()
    }

    /// Checks that this detection, found at position `index` of its frame, is usable for counting.
    pub fn check(&self, index: usize) -> Result<(), CountError> {
        let values = self.bounding_box.coords().into_iter().chain([self.confidence]);
        for (column, value) in values.enumerate() {
            if !value.is_finite() {
                return Err(CountError::NonFinite {
                    row: index,
                    column,
                    value,
                });
            }
        }

        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CountError::ConfidenceOutOfRange {
                row: index,
                value: self.confidence,
            });
        }

        Ok(())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn center() {
        let rect = BoundingBox::new(0.0, 10.0, 4.0, 2.0);
        assert_eq!(rect.center(), Point2::new(2.0, 6.0));
    }

    #[test]
    fn from_table() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.5], [10.0, 12.0, 14.0, 20.0, 1.0]];
        let dets = Detection::from_table(table.view()).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[1].bounding_box(), BoundingBox::new(10.0, 12.0, 14.0, 20.0));
        assert_eq!(dets[1].confidence(), 1.0);
        assert_eq!(dets[1].bounding_box().center(), Point2::new(12.0, 16.0));
    }

    #[test]
    fn empty_table() {
        let table = Array2::<f64>::zeros((0, column::COUNT));
        assert!(Detection::from_table(table.view()).unwrap().is_empty());
    }

    #[test]
    fn wrong_column_count() {
        let table = array![[0.0, 0.0, 2.0, 2.0]];
        assert!(matches!(
            Detection::from_table(table.view()),
            Err(CountError::ColumnCount(4))
        ));

        let table = Array2::<f64>::zeros((0, 0));
        assert!(matches!(
            Detection::from_table(table.view()),
            Err(CountError::ColumnCount(0))
        ));
    }

    #[test]
    fn confidence_out_of_range() {
        let table = array![[0.0, 0.0, 2.0, 2.0, 0.5], [0.0, 0.0, 2.0, 2.0, 1.2]];
        assert!(matches!(
            Detection::from_table(table.view()),
            Err(CountError::ConfidenceOutOfRange { row: 1, value }) if value == 1.2
        ));

        let det = Detection::from_row([0.0, 0.0, 1.0, 1.0, -0.1]);
        assert!(matches!(
            det.check(7),
            Err(CountError::ConfidenceOutOfRange { row: 7, .. })
        ));
    }

    #[test]
    fn non_finite() {
        let table = array![[0.0, f64::INFINITY, 2.0, 2.0, 0.5]];
        assert!(matches!(
            Detection::from_table(table.view()),
            Err(CountError::NonFinite {
                row: 0,
                column: column::Y1,
                ..
            })
        ));

        let det = Detection::from_row([0.0, 0.0, 1.0, 1.0, f64::NAN]);
        assert!(matches!(
            det.check(0),
            Err(CountError::NonFinite {
                column: column::CONFIDENCE,
                ..
            })
        ));
    }
}
