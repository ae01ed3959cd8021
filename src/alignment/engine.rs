//! Offset computation - part placement relative to the tray pins

use std::fmt;
use tracing::debug;

use crate::alignment::fiducials::{FiducialSet, Point2};
use crate::alignment::rules::{adjustment, cell_rules, CenterRule, PinOrder};
use crate::alignment::AlignmentError;
use crate::entities::{Density, Geometry, PartKind, Position};

/// Largest accepted rotation, degrees
pub const MAX_ANGLE_DEG: f64 = 20.0;
/// Largest accepted translation on either axis, mm
pub const MAX_OFFSET_MM: f64 = 5.0;

/// Centre offset thresholds (mm) for green / yellow / red
const CENTER_CLASSES: [f64; 3] = [0.05, 0.1, 10.0];
/// Rotation thresholds (degrees) for green / yellow / red
const ANGLE_CLASSES: [f64; 3] = [0.03, 0.06, 90.0];

/// The cell a survey falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentCell {
    pub geometry: Geometry,
    pub density: Density,
    pub position: Position,
    pub kind: PartKind,
}

/// Placement of a part relative to its nominal seat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentResult {
    /// Distance between measured and nominal centre, mm
    pub center_offset: f64,
    /// Part angle minus reference angle, degrees in (-180, 180]
    pub angle_offset: f64,
    /// Offset along the module x axis, mm
    pub x_offset: f64,
    /// Offset along the module y axis, mm
    pub y_offset: f64,
}

/// Placement quality band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QcClass {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for QcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QcClass::Green => f.write_str("GREEN"),
            QcClass::Yellow => f.write_str("YELLOW"),
            QcClass::Red => f.write_str("RED"),
        }
    }
}

fn classify(value: f64, limits: [f64; 3]) -> QcClass {
    let v = value.abs();
    if v <= limits[0] {
        QcClass::Green
    } else if v <= limits[1] {
        QcClass::Yellow
    } else {
        QcClass::Red
    }
}

impl AlignmentResult {
    /// Worse of the centre and rotation bands
    pub fn qc_class(&self) -> QcClass {
        classify(self.center_offset, CENTER_CLASSES).max(classify(self.angle_offset, ANGLE_CLASSES))
    }

    /// x offset in micrometres, as stored in inspection rows
    pub fn x_offset_um(&self) -> i64 {
        (self.x_offset * 1000.0).round() as i64
    }

    pub fn y_offset_um(&self) -> i64 {
        (self.y_offset * 1000.0).round() as i64
    }
}

/// Fold an angle into (-180, 180]
pub fn normalize_degrees(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Compute the placement of a part from its fiducials and tray pins
pub fn compute_offsets(
    hole: Point2,
    slot: Point2,
    fiducials: &FiducialSet,
    cell: AlignmentCell,
) -> Result<AlignmentResult, AlignmentError> {
    let AlignmentCell {
        geometry,
        density,
        position,
        kind,
    } = cell;

    fiducials.check_count()?;
    let rules = cell_rules(geometry, density, kind).ok_or_else(|| AlignmentError::ValueMissing {
        message: format!("no alignment rules for {geometry}/{density}"),
    })?;
    let adjust = adjustment(kind, geometry, density, position).ok_or_else(|| {
        AlignmentError::ValueMissing {
            message: format!("no geometry adjustment for {geometry}/{density}"),
        }
    })?;

    let pin = match rules.reference.order {
        PinOrder::HoleToSlot => slot - hole,
        PinOrder::SlotToHole => hole - slot,
    };
    let reference_angle = rules
        .reference
        .angle
        .apply(pin.scale(rules.reference.flip.sign(position)));

    let from = fiducials.require(rules.part.from)?;
    let to = fiducials.require(rules.part.to)?;
    let part_angle = rules
        .part
        .angle
        .apply((to - from).scale(rules.part.flip.sign(position)));

    let center = match rules.center {
        CenterRule::AllPresent => fiducials.centroid()?,
        CenterRule::Fiducials(indices) => fiducials.centroid_of(indices)?,
    };

    let raw = center - hole - adjust;
    let (x_offset, y_offset) = match position {
        Position::P1 => (raw.y, -raw.x),
        Position::P2 => (raw.y, raw.x),
    };
    let angle_offset = normalize_degrees(part_angle - reference_angle);
    let center_offset = raw.norm();

    debug!(
        %geometry, %density, %position,
        reference_angle, part_angle, angle_offset, x_offset, y_offset,
        "alignment computed"
    );

    if !(angle_offset.is_finite() && x_offset.is_finite() && y_offset.is_finite()) {
        return Err(AlignmentError::ValueRange {
            message: format!(
                "placement is not a number (x {x_offset}, y {y_offset}, angle {angle_offset})"
            ),
        });
    }
    if angle_offset.abs() > MAX_ANGLE_DEG {
        return Err(AlignmentError::ValueRange {
            message: format!("rotation {angle_offset:.3} deg exceeds {MAX_ANGLE_DEG} deg"),
        });
    }
    if x_offset.abs() > MAX_OFFSET_MM || y_offset.abs() > MAX_OFFSET_MM {
        return Err(AlignmentError::ValueRange {
            message: format!(
                "offset ({x_offset:.3}, {y_offset:.3}) mm exceeds {MAX_OFFSET_MM} mm"
            ),
        });
    }

    Ok(AlignmentResult {
        center_offset,
        angle_offset,
        x_offset,
        y_offset,
    })
}
