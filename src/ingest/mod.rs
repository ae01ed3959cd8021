//! Ingestion - upload rows, the inspection record and the per-file pipeline

pub mod orchestrator;
pub mod row;
pub mod store;
pub mod visual;

pub use orchestrator::{BatchOutcome, FileFailure, FileStage, FileSuccess, IngestError, IngestionOrchestrator};
pub use row::{RowValue, UploadRow};
pub use store::{InspectionStore, RecordedOffsets, SqliteStore, StoreError};
pub use visual::{NoVisuals, Visualizer};
