//! Plot collaborator
//!
//! Rendering lives outside this crate; the orchestrator only needs the
//! encoded image bytes to attach to the upload row.

use crate::entities::ComponentKind;
use crate::ingest::store::RecordedOffsets;

pub trait Visualizer {
    /// Height map of the measured points, encoded as an image
    fn height_map(
        &self,
        kind: ComponentKind,
        points: &[(f64, f64, f64)],
        flatness: f64,
        title: &str,
    ) -> Option<Vec<u8>>;

    /// Placement accuracy of the sensor and PCB layers of a module
    fn accuracy_plot(
        &self,
        name: &str,
        sensor_offsets: RecordedOffsets,
        pcb_offsets: RecordedOffsets,
    ) -> Option<Vec<u8>>;
}

/// Draws nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVisuals;

impl Visualizer for NoVisuals {
    fn height_map(
        &self,
        _kind: ComponentKind,
        _points: &[(f64, f64, f64)],
        _flatness: f64,
        _title: &str,
    ) -> Option<Vec<u8>> {
        None
    }

    fn accuracy_plot(
        &self,
        _name: &str,
        _sensor_offsets: RecordedOffsets,
        _pcb_offsets: RecordedOffsets,
    ) -> Option<Vec<u8>> {
        None
    }
}
