//! Survey entities - header metadata, feature rows and classification enums

pub mod feature;
pub mod geometry;
pub mod header;

pub use feature::{FeatureRow, FeatureTable};
pub use geometry::{ClassParseError, ComponentKind, Density, Geometry, PartKind, Position, TableSpec};
pub use header::HeaderRecord;
