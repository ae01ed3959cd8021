//! rwogp: CMM survey ingestion and alignment
//!
//! Parses coordinate-measuring-machine survey reports of baseplates,
//! hexaboards, protomodules and modules, computes where assembled parts
//! sit on their assembly tray, and uploads each survey exactly once to
//! the inspection record.

pub mod alignment;
pub mod cli;
pub mod core;
pub mod entities;
pub mod ingest;
pub mod schema;
pub mod survey;
pub mod yaml;
