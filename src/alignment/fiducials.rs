//! Fiducial extraction and planar point helpers

use std::ops::{Add, Sub};
use tracing::warn;

use crate::alignment::AlignmentError;
use crate::entities::FeatureTable;

/// A point (or vector) in tray coordinates, millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Point2 {
    type Output = Point2;

    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;

    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Fiducial slots FD1..FD8
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiducialSet {
    slots: [Option<Point2>; 8],
}

impl FiducialSet {
    /// Collect fiducials from rows whose name carries `FD<n>`
    ///
    /// When the same index appears twice the later row wins.
    pub fn from_features(features: &FeatureTable) -> Self {
        let mut set = Self::default();
        for row in features.rows() {
            let (Some(index), Some((x, y, _))) = (row.fiducial_index(), row.point()) else {
                continue;
            };
            if set.slots[index - 1].is_some() {
                warn!(fiducial = index, feature = %row.name, "fiducial measured twice, keeping the later row");
            }
            set.slots[index - 1] = Some(Point2::new(x, y));
        }
        set
    }

    pub fn from_points(points: impl IntoIterator<Item = (usize, Point2)>) -> Self {
        let mut set = Self::default();
        for (index, p) in points {
            if (1..=8).contains(&index) {
                set.slots[index - 1] = Some(p);
            }
        }
        set
    }

    /// Fiducial `index` (1-based)
    pub fn get(&self, index: usize) -> Option<Point2> {
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get(i))
            .copied()
            .flatten()
    }

    pub fn present(&self) -> impl Iterator<Item = (usize, Point2)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|p| (i + 1, p)))
    }

    pub fn count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// A usable survey measures 2, 4, 6 or 8 fiducials
    pub fn check_count(&self) -> Result<(), AlignmentError> {
        match self.count() {
            2 | 4 | 6 | 8 => Ok(()),
            n => Err(AlignmentError::ValueMissing {
                message: format!("{n} fiducial(s) measured; expected 2, 4, 6 or 8"),
            }),
        }
    }

    /// Fiducial `index`, or `ValueMissing` naming it
    pub fn require(&self, index: usize) -> Result<Point2, AlignmentError> {
        self.get(index).ok_or_else(|| AlignmentError::ValueMissing {
            message: format!("fiducial FD{index} is required but was not measured"),
        })
    }

    /// Mean of the listed fiducials, all of which must be present
    pub fn centroid_of(&self, indices: &[usize]) -> Result<Point2, AlignmentError> {
        let mut sum = Point2::default();
        for &index in indices {
            sum = sum + self.require(index)?;
        }
        Ok(sum.scale(1.0 / indices.len() as f64))
    }

    /// Mean of every measured fiducial
    pub fn centroid(&self) -> Result<Point2, AlignmentError> {
        let indices: Vec<usize> = self.present().map(|(i, _)| i).collect();
        if indices.is_empty() {
            return Err(AlignmentError::ValueMissing {
                message: "no fiducials measured".to_string(),
            });
        }
        self.centroid_of(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FeatureRow;

    #[test]
    fn test_from_features() {
        let table = FeatureTable::from_rows(vec![
            FeatureRow::new("Point", "FD1").with_point(1.0, 2.0, 0.0),
            FeatureRow::new("Point", "Pad").with_point(9.0, 9.0, 0.0),
            FeatureRow::new("Circle", "FD3_sensor").with_point(3.0, 4.0, 0.0),
            FeatureRow::new("Plane", "FD2"),
        ]);
        let set = FiducialSet::from_features(&table);
        assert_eq!(set.count(), 2);
        assert_eq!(set.get(1), Some(Point2::new(1.0, 2.0)));
        assert_eq!(set.get(2), None);
        assert_eq!(set.get(3), Some(Point2::new(3.0, 4.0)));
        assert_eq!(set.get(0), None);
        assert_eq!(set.get(9), None);
    }

    #[test]
    fn test_later_duplicate_wins() {
        let table = FeatureTable::from_rows(vec![
            FeatureRow::new("Point", "FD1").with_point(1.0, 1.0, 0.0),
            FeatureRow::new("Point", "FD1 remeasured").with_point(2.0, 2.0, 0.0),
        ]);
        let set = FiducialSet::from_features(&table);
        assert_eq!(set.get(1), Some(Point2::new(2.0, 2.0)));
    }

    #[test]
    fn test_count_rule() {
        let three = FiducialSet::from_points((1..=3).map(|i| (i, Point2::new(i as f64, 0.0))));
        assert!(matches!(three.check_count(), Err(AlignmentError::ValueMissing { .. })));
        let four = FiducialSet::from_points((1..=4).map(|i| (i, Point2::new(i as f64, 0.0))));
        assert!(four.check_count().is_ok());
        assert!(FiducialSet::default().check_count().is_err());
    }

    #[test]
    fn test_centroids() {
        let set = FiducialSet::from_points([
            (1, Point2::new(0.0, 0.0)),
            (3, Point2::new(4.0, 2.0)),
        ]);
        let c = set.centroid_of(&[1, 3]).unwrap();
        assert!((c.x - 2.0).abs() < 1e-10 && (c.y - 1.0).abs() < 1e-10);
        assert!(set.centroid_of(&[1, 2]).is_err());
        assert_eq!(set.centroid().unwrap(), c);
    }
}
