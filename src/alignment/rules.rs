//! Lookup tables behind the alignment computation
//!
//! Every (geometry, density) cell names how the reference angle is taken
//! from the tray pins, how the part angle is taken from the fiducials, and
//! which fiducials locate the part centre. Sign conventions follow the
//! assembly stations' survey routines and are kept as tabulated.

use crate::alignment::fiducials::Point2;
use crate::entities::{Density, Geometry, PartKind, Position};

/// Direction of the pin vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOrder {
    /// slot - hole
    HoleToSlot,
    /// hole - slot
    SlotToHole,
}

/// Angle convention applied to a direction vector, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleFn {
    /// -atan2(x, y)
    NegXY,
    /// atan2(y, x)
    YX,
    /// -atan2(y, x)
    NegYX,
    /// atan2(x, y)
    XY,
}

impl AngleFn {
    pub fn apply(self, v: Point2) -> f64 {
        let rad = match self {
            AngleFn::NegXY => -v.x.atan2(v.y),
            AngleFn::YX => v.y.atan2(v.x),
            AngleFn::NegYX => -v.y.atan2(v.x),
            AngleFn::XY => v.x.atan2(v.y),
        };
        rad.to_degrees()
    }
}

/// How the assembly position flips a direction vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    /// +1 in position 1, -1 in position 2
    Direct,
    /// -1 in position 1, +1 in position 2
    Inverted,
}

impl Flip {
    pub fn sign(self, position: Position) -> f64 {
        match self {
            Flip::Direct => position.sign(),
            Flip::Inverted => -position.sign(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceRule {
    pub order: PinOrder,
    pub angle: AngleFn,
    pub flip: Flip,
}

/// Part angle from the vector `to - from` between two fiducials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRule {
    pub from: usize,
    pub to: usize,
    pub angle: AngleFn,
    pub flip: Flip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenterRule {
    /// Mean of every measured fiducial
    AllPresent,
    /// Mean of the listed fiducials
    Fiducials(&'static [usize]),
}

/// Rules for one (geometry, density, part kind) cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRules {
    pub reference: ReferenceRule,
    pub part: PartRule,
    pub center: CenterRule,
}

const fn reference(order: PinOrder, angle: AngleFn, flip: Flip) -> ReferenceRule {
    ReferenceRule { order, angle, flip }
}

const fn part(from: usize, to: usize, angle: AngleFn, flip: Flip) -> PartRule {
    PartRule {
        from,
        to,
        angle,
        flip,
    }
}

/// Partial sensors are located from FD1 and FD3
const PARTIAL_CENTER: CenterRule = CenterRule::Fiducials(&[1, 3]);

/// Rules for a cell, or `None` when no tray layout exists for it
pub fn cell_rules(geometry: Geometry, density: Density, kind: PartKind) -> Option<CellRules> {
    use AngleFn::*;
    use Flip::*;
    use PinOrder::*;

    let rules = match (geometry, density) {
        (Geometry::Full, Density::LD) => match kind {
            PartKind::Module => CellRules {
                reference: reference(HoleToSlot, NegXY, Direct),
                part: part(6, 3, NegYX, Direct),
                center: CenterRule::Fiducials(&[3, 6]),
            },
            PartKind::Protomodule => CellRules {
                reference: reference(HoleToSlot, NegXY, Direct),
                part: part(1, 2, YX, Direct),
                center: CenterRule::Fiducials(&[1, 2, 3, 4]),
            },
        },
        (Geometry::Full, Density::HD) => CellRules {
            reference: reference(HoleToSlot, XY, Direct),
            part: part(1, 2, XY, Direct),
            center: CenterRule::AllPresent,
        },
        (Geometry::Top | Geometry::Left, _) => CellRules {
            reference: reference(HoleToSlot, NegXY, Direct),
            part: part(1, 3, NegXY, Direct),
            center: PARTIAL_CENTER,
        },
        (Geometry::Bottom | Geometry::Right, _) => CellRules {
            reference: reference(SlotToHole, NegXY, Direct),
            part: part(1, 3, NegXY, Direct),
            center: PARTIAL_CENTER,
        },
        (Geometry::Five, Density::LD) => CellRules {
            reference: reference(HoleToSlot, YX, Inverted),
            part: part(1, 3, YX, Inverted),
            center: PARTIAL_CENTER,
        },
        (Geometry::Five, Density::HD) => return None,
    };
    Some(rules)
}

/// Tray pin ids (hole, slot) for a cell
pub fn pin_ids(geometry: Geometry, density: Density, position: Position) -> Option<(String, String)> {
    if !geometry.supports(density) {
        return None;
    }
    let n = position.number();
    let slot = match density {
        Density::LD => format!("p{n}_offcenter_pin"),
        Density::HD => format!("p{n}_hd_offcenter_pin"),
    };
    Some((format!("p{n}_center_pin"), slot))
}

/// Offset (mm) between the fiducial centre and the nominal mounting axis
///
/// Values are for position 1; position 2 mirrors them.
pub fn adjustment(
    kind: PartKind,
    geometry: Geometry,
    density: Density,
    position: Position,
) -> Option<Point2> {
    let (proto, module) = match (geometry, density) {
        (Geometry::Full, _) => ((0.0, 0.0), (0.0, 0.0)),
        (Geometry::Top, Density::LD) => ((0.0, 24.5), (0.0, 25.1)),
        (Geometry::Bottom, Density::LD) => ((0.0, -24.5), (0.0, -25.1)),
        (Geometry::Left, Density::LD) => ((-22.15, 0.0), (-22.7, 0.0)),
        (Geometry::Right, Density::LD) => ((22.15, 0.0), (22.7, 0.0)),
        (Geometry::Five, Density::LD) => ((-8.875, 15.372), (-9.11, 15.78)),
        (Geometry::Top, Density::HD) => ((0.0, 19.8), (0.0, 20.35)),
        (Geometry::Bottom, Density::HD) => ((0.0, -19.8), (0.0, -20.35)),
        (Geometry::Left, Density::HD) => ((-21.47, 0.0), (-21.99, 0.0)),
        (Geometry::Right, Density::HD) => ((21.47, 0.0), (21.99, 0.0)),
        (Geometry::Five, Density::HD) => return None,
    };
    let (dx, dy) = match kind {
        PartKind::Protomodule => proto,
        PartKind::Module => module,
    };
    Some(Point2::new(dx, dy).scale(position.sign()))
}
