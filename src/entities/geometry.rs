//! Classification enums for surveyed parts
//!
//! A survey is keyed by the part's geometry class, its sensor density and
//! the tray position it was assembled in. The component kind is derived
//! from the folder the survey was dropped into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a classification value cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {what} (expected one of: {expected})")]
pub struct ClassParseError {
    pub what: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl ClassParseError {
    fn new(what: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            what,
            value: value.to_string(),
            expected,
        }
    }
}

/// Outline of the silicon sensor (full hexagon or one of the partials)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Geometry {
    Full,
    Top,
    Bottom,
    Left,
    Right,
    Five,
}

impl Geometry {
    pub const ALL: [Geometry; 6] = [
        Geometry::Full,
        Geometry::Top,
        Geometry::Bottom,
        Geometry::Left,
        Geometry::Right,
        Geometry::Five,
    ];

    /// Whether a tray pin layout exists for this geometry at the given density
    pub fn supports(self, density: Density) -> bool {
        match density {
            Density::LD => true,
            Density::HD => self != Geometry::Five,
        }
    }

    pub fn is_partial(self) -> bool {
        self != Geometry::Full
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Geometry::Full => "Full",
            Geometry::Top => "Top",
            Geometry::Bottom => "Bottom",
            Geometry::Left => "Left",
            Geometry::Right => "Right",
            Geometry::Five => "Five",
        };
        f.write_str(s)
    }
}

impl FromStr for Geometry {
    type Err = ClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Geometry::Full),
            "top" => Ok(Geometry::Top),
            "bottom" => Ok(Geometry::Bottom),
            "left" => Ok(Geometry::Left),
            "right" => Ok(Geometry::Right),
            "five" => Ok(Geometry::Five),
            _ => Err(ClassParseError::new(
                "geometry",
                s,
                "Full, Top, Bottom, Left, Right, Five",
            )),
        }
    }
}

/// Sensor cell density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Density {
    LD,
    HD,
}

impl fmt::Display for Density {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Density::LD => f.write_str("LD"),
            Density::HD => f.write_str("HD"),
        }
    }
}

impl FromStr for Density {
    type Err = ClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LD" => Ok(Density::LD),
            "HD" => Ok(Density::HD),
            _ => Err(ClassParseError::new("density", s, "LD, HD")),
        }
    }
}

/// Assembly position on the tray
///
/// Serialized as the bare position number so that metadata files keep the
/// `PositionID: 1` form found in the reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Position {
    P1,
    P2,
}

impl Position {
    pub fn number(self) -> u8 {
        match self {
            Position::P1 => 1,
            Position::P2 => 2,
        }
    }

    /// +1 for position 1, -1 for position 2
    pub fn sign(self) -> f64 {
        match self {
            Position::P1 => 1.0,
            Position::P2 => -1.0,
        }
    }
}

impl From<Position> for u8 {
    fn from(p: Position) -> u8 {
        p.number()
    }
}

impl TryFrom<u8> for Position {
    type Error = ClassParseError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(Position::P1),
            2 => Ok(Position::P2),
            _ => Err(ClassParseError::new("position", &n.to_string(), "1, 2")),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.number())
    }
}

impl FromStr for Position {
    type Err = ClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('P')
            .or_else(|| trimmed.strip_prefix('p'))
            .unwrap_or(trimmed);
        match digits {
            "1" => Ok(Position::P1),
            "2" => Ok(Position::P2),
            _ => Err(ClassParseError::new("position", s, "1, 2, P1, P2")),
        }
    }
}

/// Assembled parts that carry alignment offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Protomodule,
    Module,
}

/// Database naming for one component kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Column prefix, e.g. `bp` for `bp_name`
    pub prefix: &'static str,
    /// Inspection table receiving survey rows
    pub inspect_table: &'static str,
    /// Registry of components expected to be measured
    pub mother_table: &'static str,
}

impl TableSpec {
    pub fn name_column(&self) -> String {
        format!("{}_name", self.prefix)
    }

    pub fn number_column(&self) -> String {
        format!("{}_no", self.prefix)
    }
}

/// Component kind, one per watched survey subfolder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Baseplates,
    Hexaboards,
    Protomodules,
    Modules,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Baseplates,
        ComponentKind::Hexaboards,
        ComponentKind::Protomodules,
        ComponentKind::Modules,
    ];

    /// Folder name under the survey root
    pub fn folder(self) -> &'static str {
        match self {
            ComponentKind::Baseplates => "baseplates",
            ComponentKind::Hexaboards => "hexaboards",
            ComponentKind::Protomodules => "protomodules",
            ComponentKind::Modules => "modules",
        }
    }

    pub fn from_folder(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.folder().eq_ignore_ascii_case(name))
    }

    pub fn table(self) -> TableSpec {
        match self {
            ComponentKind::Baseplates => TableSpec {
                prefix: "bp",
                inspect_table: "bp_inspect",
                mother_table: "baseplate",
            },
            ComponentKind::Hexaboards => TableSpec {
                prefix: "hxb",
                inspect_table: "hxb_inspect",
                mother_table: "hexaboard",
            },
            ComponentKind::Protomodules => TableSpec {
                prefix: "proto",
                inspect_table: "proto_inspect",
                mother_table: "proto_assembly",
            },
            ComponentKind::Modules => TableSpec {
                prefix: "module",
                inspect_table: "module_inspect",
                mother_table: "module_assembly",
            },
        }
    }

    /// Colour scale limits (mm) for the height map
    pub fn plot_range(self) -> (f64, f64) {
        match self {
            ComponentKind::Baseplates => (1.2, 2.2),
            ComponentKind::Hexaboards => (1.2, 2.9),
            ComponentKind::Protomodules => (1.37, 1.79),
            ComponentKind::Modules => (2.75, 4.0),
        }
    }

    /// Rotation (degrees) applied when drawing the height map
    pub fn plot_rotation(self) -> f64 {
        match self {
            ComponentKind::Baseplates | ComponentKind::Hexaboards => 0.0,
            ComponentKind::Protomodules | ComponentKind::Modules => 270.0,
        }
    }

    /// Assembled kinds need alignment offsets; bare parts do not
    pub fn part_kind(self) -> Option<PartKind> {
        match self {
            ComponentKind::Protomodules => Some(PartKind::Protomodule),
            ComponentKind::Modules => Some(PartKind::Module),
            ComponentKind::Baseplates | ComponentKind::Hexaboards => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}

impl FromStr for ComponentKind {
    type Err = ClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_folder(s.trim()).ok_or_else(|| {
            ClassParseError::new(
                "component type",
                s,
                "baseplates, hexaboards, protomodules, modules",
            )
        })
    }
}
