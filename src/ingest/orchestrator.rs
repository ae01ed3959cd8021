//! Ingestion run - scan, parse, align, upload, commit
//!
//! Files are processed one at a time in folder then file-name order. A
//! file that fails to parse or align is rejected and the batch moves on;
//! the first upload failure stops the batch. Every file committed before
//! that stays committed.

use miette::Diagnostic;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use ulid::Ulid;

use crate::alignment::{compute_offsets, AlignmentCell, AlignmentError, AlignmentResult, FiducialSet, QcClass, TrayCatalog};
use crate::core::{Config, InventoryError, InventoryTracker, SurveyScanner};
use crate::entities::{ComponentKind, PartKind};
use crate::ingest::row::UploadRow;
use crate::ingest::store::{InspectionStore, RecordedOffsets, StoreError};
use crate::ingest::visual::Visualizer;
use crate::survey::{ArtifactError, ArtifactWriter, ConfirmationPort, ParseError, ReportParser, SurveyReport};

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("Cannot read survey {}", path.display())]
    #[diagnostic(code(rwogp::ingest::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown component folder '{folder}'")]
    #[diagnostic(
        code(rwogp::ingest::unknown_kind),
        help("Survey folders are baseplates, hexaboards, protomodules and modules")
    )]
    UnknownComponentKind { folder: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Persistence failures stop the batch; everything else only rejects the file
    pub fn halts_batch(&self) -> bool {
        matches!(self, IngestError::Store(_) | IngestError::Inventory(_))
    }
}

/// Where a file was when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Scanning,
    Parsing,
    Aligning,
    Uploading,
    Committing,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStage::Scanning => "scanning",
            FileStage::Parsing => "parsing",
            FileStage::Aligning => "aligning",
            FileStage::Uploading => "uploading",
            FileStage::Committing => "committing",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub folder: String,
    pub file: String,
    pub stage: FileStage,
    pub error: IngestError,
}

/// Committed file with its placement, when the kind has one
#[derive(Debug, Clone, PartialEq)]
pub struct FileSuccess {
    pub folder: String,
    pub file: String,
    pub component: String,
    pub alignment: Option<AlignmentResult>,
}

/// Result of one run
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<FileSuccess>,
    /// Files rejected without stopping the batch
    pub rejected: Vec<FileFailure>,
    /// The failure that stopped the batch
    pub first_failure: Option<FileFailure>,
    /// Files left for the next run after a halt
    pub not_attempted: Vec<(String, String)>,
    /// Files recorded as already handled because backfill was declined
    pub baselined: usize,
    /// Inventory entries whose files are gone from disk
    pub missing_on_disk: usize,
}

impl BatchOutcome {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.first_failure.is_none()
    }
}

type StageResult<T> = Result<T, (FileStage, IngestError)>;

trait AtStage<T> {
    fn at(self, stage: FileStage) -> StageResult<T>;
}

impl<T, E: Into<IngestError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: FileStage) -> StageResult<T> {
        self.map_err(|e| (stage, e.into()))
    }
}

/// Drives one ingestion run over the survey directory
pub struct IngestionOrchestrator<'a> {
    scanner: SurveyScanner,
    inventory: InventoryTracker,
    store: &'a mut dyn InspectionStore,
    trays: TrayCatalog,
    port: &'a mut dyn ConfirmationPort,
    visuals: &'a dyn Visualizer,
    artifacts: ArtifactWriter,
    parser: ReportParser,
    run_id: Ulid,
}

impl<'a> IngestionOrchestrator<'a> {
    pub fn new(
        config: &Config,
        inventory: InventoryTracker,
        store: &'a mut dyn InspectionStore,
        port: &'a mut dyn ConfirmationPort,
        visuals: &'a dyn Visualizer,
    ) -> Self {
        Self {
            scanner: SurveyScanner::new(config.survey_dir(), config.extensions()),
            inventory,
            store,
            trays: TrayCatalog::new(config.tray_dir()),
            port,
            visuals,
            artifacts: ArtifactWriter::new(config.parsed_dir(), config.backup_dir()),
            parser: ReportParser::default(),
            run_id: Ulid::new(),
        }
    }

    /// Use a non-standard header template
    pub fn with_parser(mut self, parser: ReportParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    pub fn inventory(&self) -> &InventoryTracker {
        &self.inventory
    }

    /// Ingest every new survey, optionally restricted to one folder
    pub fn run(&mut self, filter: Option<&str>) -> Result<BatchOutcome, IngestError> {
        let span = info_span!("ingest", run_id = %self.run_id);
        let _guard = span.enter();

        let snapshot = self.scanner.scan(filter)?;
        let mut outcome = BatchOutcome::default();

        let untracked = self.inventory.untracked(&snapshot);
        if !untracked.is_empty() {
            let total: usize = untracked.values().map(|files| files.len()).sum();
            let folders: Vec<&str> = untracked.keys().map(String::as_str).collect();
            let backfill = total == 0
                || !self.port.is_interactive()
                || self.port.confirm(
                    &format!(
                        "No upload history for {}. Upload all {total} existing survey files?",
                        folders.join(", ")
                    ),
                    true,
                );
            if backfill {
                self.inventory.track(folders)?;
            } else {
                self.inventory.baseline(&untracked)?;
                outcome.baselined = total;
                info!(files = total, "backfill declined, existing files recorded as baseline");
            }
        }

        let delta = self.inventory.diff(&snapshot, filter);
        outcome.missing_on_disk = delta.removed_count();
        for (folder, files) in &delta.removed {
            for file in files {
                warn!(folder = %folder, file = %file, "inventoried survey no longer on disk");
            }
        }
        info!(new_files = delta.added_count(), "starting ingestion");

        let pending: Vec<(String, String)> = delta
            .added_files()
            .map(|(folder, file)| (folder.to_string(), file.to_string()))
            .collect();

        let mut queue = pending.into_iter();
        for (folder, file) in queue.by_ref() {
            match self.ingest_file(&folder, &file) {
                Ok(success) => {
                    info!(folder = %folder, file = %file, component = %success.component, "committed");
                    outcome.succeeded.push(success);
                }
                Err((stage, error)) => {
                    let halts = error.halts_batch();
                    warn!(folder = %folder, file = %file, %stage, "survey failed: {error}");
                    let failure = FileFailure {
                        folder,
                        file,
                        stage,
                        error,
                    };
                    if halts {
                        outcome.first_failure = Some(failure);
                        break;
                    }
                    outcome.rejected.push(failure);
                }
            }
        }
        outcome.not_attempted = queue.collect();

        info!(
            succeeded = outcome.succeeded.len(),
            rejected = outcome.rejected.len(),
            halted = outcome.first_failure.is_some(),
            "ingestion finished"
        );
        Ok(outcome)
    }

    /// Scanning → Parsing → Aligning → Uploading → Committed
    fn ingest_file(&mut self, folder: &str, file: &str) -> StageResult<FileSuccess> {
        let kind = ComponentKind::from_folder(folder)
            .ok_or_else(|| IngestError::UnknownComponentKind {
                folder: folder.to_string(),
            })
            .at(FileStage::Scanning)?;

        let path = self.scanner.path_of(folder, file);
        let raw = fs::read_to_string(&path)
            .map_err(|source| IngestError::Read { path, source })
            .at(FileStage::Scanning)?;

        self.artifacts.backup(folder, file, &raw).at(FileStage::Parsing)?;
        let report = self.parser.parse(&raw, &mut *self.port).at(FileStage::Parsing)?;
        self.artifacts.write(folder, &report).at(FileStage::Parsing)?;

        let alignment = match kind.part_kind() {
            Some(part) => Some(self.align(&report, part).at(FileStage::Aligning)?),
            None => None,
        };

        let header = &report.header;
        let hexplot = self.visuals.height_map(
            kind,
            &report.features.points(),
            header.flatness,
            &header.component_id,
        );
        if let (ComponentKind::Modules, Some(result)) = (kind, &alignment) {
            self.module_accuracy_plot(folder, &report, result);
        }

        let row = UploadRow::build(kind, &report, alignment.as_ref(), hexplot, self.run_id);
        self.upload(kind, &header.component_id, &row).at(FileStage::Uploading)?;
        self.inventory.commit(folder, file).at(FileStage::Committing)?;

        Ok(FileSuccess {
            folder: folder.to_string(),
            file: file.to_string(),
            component: header.component_id.clone(),
            alignment,
        })
    }

    fn align(&mut self, report: &SurveyReport, kind: PartKind) -> Result<AlignmentResult, AlignmentError> {
        let h = &report.header;
        let (hole, slot) = self.trays.pins(h.tray_no, h.geometry, h.density, h.position)?;
        let fiducials = FiducialSet::from_features(&report.features);
        let result = compute_offsets(
            hole,
            slot,
            &fiducials,
            AlignmentCell {
                geometry: h.geometry,
                density: h.density,
                position: h.position,
                kind,
            },
        )?;

        let qc = result.qc_class();
        info!(
            component = %h.component_id,
            center_mm = result.center_offset,
            angle_deg = result.angle_offset,
            %qc,
            "placement"
        );
        if qc == QcClass::Red {
            warn!(component = %h.component_id, "placement outside the yellow band");
        }
        Ok(result)
    }

    /// Sensor (protomodule) against PCB (module) placement
    fn module_accuracy_plot(&mut self, folder: &str, report: &SurveyReport, result: &AlignmentResult) {
        let name = &report.header.component_id;
        let proto_name = name.replacen("ML", "PL", 1);
        let sensor = match self.store.latest_offsets(&proto_name) {
            Ok(Some(offsets)) => offsets,
            Ok(None) => {
                warn!(protomodule = %proto_name, "no recorded protomodule offsets, plotting zeros");
                RecordedOffsets::default()
            }
            Err(e) => {
                warn!(protomodule = %proto_name, "cannot fetch protomodule offsets: {e}");
                RecordedOffsets::default()
            }
        };
        let pcb = RecordedOffsets {
            x_mu: result.x_offset_um(),
            y_mu: result.y_offset_um(),
            angle_deg: result.angle_offset,
        };

        if let Some(image) = self.visuals.accuracy_plot(name, sensor, pcb) {
            if let Err(e) = self
                .artifacts
                .write_plot(folder, &report.header.output_stem(), "accuracy", &image)
            {
                warn!(component = %name, "cannot store accuracy plot: {e}");
            }
        }
    }

    fn upload(&mut self, kind: ComponentKind, name: &str, row: &UploadRow) -> Result<(), StoreError> {
        if self.store.parent_exists(kind, name)? {
            self.store.insert_linked(kind, row)?;
            debug!(component = name, "linked insert");
            return Ok(());
        }

        let mother = kind.table().mother_table;
        let fallback = self.port.is_interactive()
            && self.port.confirm(
                &format!("{name} is not registered in {mother}. Upload without a link?"),
                false,
            );
        if !fallback {
            return Err(StoreError::ParentMissing {
                table: mother.to_string(),
                name: name.to_string(),
            });
        }
        self.store.insert_unlinked(kind, row)?;
        warn!(component = name, table = mother, "uploaded without a mother-table link");
        Ok(())
    }
}
