//! Files produced around a parse: the raw backup, metadata YAML and feature CSV

use miette::Diagnostic;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::survey::parser::SurveyReport;

#[derive(Debug, Error, Diagnostic)]
pub enum ArtifactError {
    #[error("Cannot write {}: {source}", path.display())]
    #[diagnostic(code(rwogp::artifact::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize metadata for {stem}: {message}")]
    #[diagnostic(code(rwogp::artifact::yaml))]
    Yaml { stem: String, message: String },

    #[error("Cannot write feature table {}: {source}", path.display())]
    #[diagnostic(code(rwogp::artifact::csv))]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Paths of the two derived artifacts for one survey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub meta: PathBuf,
    pub features: PathBuf,
}

/// Writes backups and parsed outputs under the configured roots
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    parsed_dir: PathBuf,
    backup_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(parsed_dir: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            parsed_dir: parsed_dir.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Copy the raw report to `<backup>/<folder>/<file>` before it is parsed
    ///
    /// An existing backup with identical content is left alone. A different
    /// file under the same name is kept as `<stem>.<hash8>.<ext>`.
    pub fn backup(&self, folder: &str, file_name: &str, raw: &str) -> Result<PathBuf, ArtifactError> {
        let dir = self.backup_dir.join(folder);
        create_dir(&dir)?;

        let mut target = dir.join(file_name);
        if target.exists() {
            let existing = fs::read(&target).map_err(|source| ArtifactError::Io {
                path: target.clone(),
                source,
            })?;
            if existing == raw.as_bytes() {
                debug!(path = %target.display(), "backup already present");
                return Ok(target);
            }
            target = dir.join(hashed_name(file_name, raw));
        }

        write_file(&target, raw.as_bytes())?;
        debug!(path = %target.display(), "raw report backed up");
        Ok(target)
    }

    /// Write `{ComponentID}_{Operator}_meta.yaml` and `{ComponentID}_{Operator}.csv`
    ///
    /// A later survey of the same component by the same operator replaces both.
    pub fn write(&self, folder: &str, report: &SurveyReport) -> Result<ArtifactPaths, ArtifactError> {
        let dir = self.parsed_dir.join(folder);
        create_dir(&dir)?;

        let stem = report.header.output_stem();
        let meta = dir.join(format!("{stem}_meta.yaml"));
        let features = dir.join(format!("{stem}.csv"));

        let yaml = serde_yml::to_string(&report.header).map_err(|e| ArtifactError::Yaml {
            stem: stem.clone(),
            message: e.to_string(),
        })?;
        write_file(&meta, yaml.as_bytes())?;

        let csv_err = |source| ArtifactError::Csv {
            path: features.clone(),
            source,
        };
        let mut wtr = csv::Writer::from_path(&features).map_err(csv_err)?;
        for row in report.features.rows() {
            wtr.serialize(row).map_err(csv_err)?;
        }
        wtr.flush().map_err(|source| ArtifactError::Io {
            path: features.clone(),
            source,
        })?;

        info!(meta = %meta.display(), features = %features.display(), "wrote survey artifacts");
        Ok(ArtifactPaths { meta, features })
    }

    /// Store a rendered plot next to the parsed artifacts as `{stem}_{suffix}.png`
    pub fn write_plot(
        &self,
        folder: &str,
        stem: &str,
        suffix: &str,
        image: &[u8],
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.parsed_dir.join(folder);
        create_dir(&dir)?;
        let path = dir.join(format!("{stem}_{suffix}.png"));
        write_file(&path, image)?;
        debug!(path = %path.display(), "wrote plot");
        Ok(path)
    }
}

fn hashed_name(file_name: &str, raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    match path.extension() {
        Some(ext) => format!("{stem}.{short}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{short}"),
    }
}

fn create_dir(dir: &Path) -> Result<(), ArtifactError> {
    fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    fs::write(path, bytes).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}
