//! Fiducial alignment - rotation and translation of a part on its tray

pub mod engine;
pub mod fiducials;
pub mod rules;
pub mod tray;

use miette::Diagnostic;
use thiserror::Error;

pub use engine::{compute_offsets, AlignmentCell, AlignmentResult, QcClass};
pub use fiducials::{FiducialSet, Point2};
pub use tray::{TrayCatalog, TrayError};

#[derive(Debug, Error, Diagnostic)]
pub enum AlignmentError {
    #[error("Fiducials incomplete: {message}")]
    #[diagnostic(
        code(rwogp::alignment::value_missing),
        help("Surveys must measure 2, 4, 6 or 8 fiducials named FD1..FD8")
    )]
    ValueMissing { message: String },

    #[error("Alignment out of range: {message}")]
    #[diagnostic(
        code(rwogp::alignment::value_range),
        help("Check the tray number and position in the header; a real misplacement needs rework")
    )]
    ValueRange { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tray(#[from] TrayError),
}
