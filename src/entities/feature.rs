//! Feature rows - measured points and shapes from the report's feature block

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One measured feature
///
/// Coordinates are absent for features the CMM reports without a `Point`
/// line (e.g. pure planes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(rename = "FeatureType")]
    pub feature_type: String,

    #[serde(rename = "FeatureName")]
    pub name: String,

    #[serde(rename = "X_coordinate")]
    pub x: Option<f64>,

    #[serde(rename = "Y_coordinate")]
    pub y: Option<f64>,

    #[serde(rename = "Z_coordinate")]
    pub z: Option<f64>,

    #[serde(rename = "I_coordinate")]
    pub i: Option<f64>,

    #[serde(rename = "J_coordinate")]
    pub j: Option<f64>,

    #[serde(rename = "K_coordinate")]
    pub k: Option<f64>,

    #[serde(rename = "Radius")]
    pub radius: Option<f64>,
}

impl FeatureRow {
    pub fn new(feature_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            feature_type: feature_type.into(),
            name: name.into(),
            x: None,
            y: None,
            z: None,
            i: None,
            j: None,
            k: None,
            radius: None,
        }
    }

    pub fn with_point(mut self, x: f64, y: f64, z: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self.z = Some(z);
        self
    }

    /// Full XYZ triple, if measured
    pub fn point(&self) -> Option<(f64, f64, f64)> {
        Some((self.x?, self.y?, self.z?))
    }

    /// Fiducial index 1-8 when the name contains `FD<n>`
    pub fn fiducial_index(&self) -> Option<usize> {
        let bytes = self.name.as_bytes();
        self.name.match_indices("FD").find_map(|(at, _)| {
            let digit = *bytes.get(at + 2)?;
            match digit {
                b'1'..=b'8' => Some((digit - b'0') as usize),
                _ => None,
            }
        })
    }

    /// Bit-exact identity used for duplicate detection
    fn identity(&self) -> (String, String, [Option<u64>; 7]) {
        let bits = |v: Option<f64>| v.map(f64::to_bits);
        (
            self.feature_type.clone(),
            self.name.clone(),
            [
                bits(self.x),
                bits(self.y),
                bits(self.z),
                bits(self.i),
                bits(self.j),
                bits(self.k),
                bits(self.radius),
            ],
        )
    }
}

/// Ordered feature rows with exact duplicates removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Build a table, keeping the first occurrence of each duplicated row
    pub fn from_rows(rows: impl IntoIterator<Item = FeatureRow>) -> Self {
        let mut seen = HashSet::new();
        let rows = rows
            .into_iter()
            .filter(|row| seen.insert(row.identity()))
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows with a complete XYZ triple
    pub fn points(&self) -> Vec<(f64, f64, f64)> {
        self.rows.iter().filter_map(FeatureRow::point).collect()
    }

    /// Mean height of the measured points, rounded to 3 decimals
    pub fn mean_height(&self) -> Option<f64> {
        let points = self.points();
        if points.is_empty() {
            return None;
        }
        let sum: f64 = points.iter().map(|p| p.2).sum();
        Some(round_to(sum / points.len() as f64, 3))
    }
}

/// Round half away from zero to the given number of decimals
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
