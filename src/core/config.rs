//! Configuration management with layered hierarchy

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::yaml::YamlSyntaxError;

/// Name of the per-directory config file
pub const LOCAL_CONFIG_FILE: &str = "rwogp.yaml";

const DEFAULT_SURVEY_DIR: &str = "OGP_results";
const DEFAULT_PARSED_DIR: &str = "parsed_OGP_results";
const DEFAULT_BACKUP_DIR: &str = "OGP_results_backup";
const DEFAULT_TRAY_DIR: &str = "trays";
const DEFAULT_INVENTORY: &str = "inventory.json";
const DEFAULT_DATABASE: &str = "inspections.db";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Config file not found: {}", path.display())]
    #[diagnostic(
        code(rwogp::config::not_found),
        help("Create one with 'rwogp config init' or drop the --config flag")
    )]
    NotFound { path: PathBuf },

    #[error("Cannot read config file {}", path.display())]
    #[diagnostic(code(rwogp::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),
}

/// Ingestion configuration with layered hierarchy
///
/// Every field is optional so that layers only override what they set;
/// the accessors supply the built-in defaults.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root holding one subdirectory of survey reports per component kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey_dir: Option<PathBuf>,

    /// Where metadata YAML and feature CSV files are written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_dir: Option<PathBuf>,

    /// Verbatim copies of every report read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Directory of `tray_<N>.yaml` pin files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tray_dir: Option<PathBuf>,

    /// Persisted upload inventory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_path: Option<PathBuf>,

    /// SQLite inspection record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Report file extensions picked up by the scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,

    /// Assembly site recorded on registered components
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    ///
    /// An explicit path must exist and parse; the implicit global and
    /// local files are optional, but a local file that is present and
    /// malformed is still an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global user config (~/.config/rwogp/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                match Self::from_file(&global_path) {
                    Ok(global) => config.merge(global),
                    Err(e) => tracing::warn!(path = %global_path.display(), "ignoring global config: {e}"),
                }
            }
        }

        // 2. Local config in the working directory
        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            config.merge(Self::from_file(&local_path)?);
        }

        // 3. Explicit --config
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            config.merge(Self::from_file(path)?);
        }

        // 4. Environment variables
        config.apply_env(|key| std::env::var(key).ok());

        tracing::debug!(?config, "configuration resolved");
        Ok(config)
    }

    /// Parse a single config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents, &path.display().to_string())
    }

    pub fn from_yaml(contents: &str, filename: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str(contents)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, contents, filename).into())
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rwogp")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Override fields from `RWOGP_*` variables
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let path_var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        if let Some(p) = path_var("RWOGP_SURVEY_DIR") {
            self.survey_dir = Some(p);
        }
        if let Some(p) = path_var("RWOGP_PARSED_DIR") {
            self.parsed_dir = Some(p);
        }
        if let Some(p) = path_var("RWOGP_BACKUP_DIR") {
            self.backup_dir = Some(p);
        }
        if let Some(p) = path_var("RWOGP_TRAY_DIR") {
            self.tray_dir = Some(p);
        }
        if let Some(p) = path_var("RWOGP_INVENTORY") {
            self.inventory_path = Some(p);
        }
        if let Some(p) = path_var("RWOGP_DATABASE") {
            self.database = Some(p);
        }
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.survey_dir.is_some() {
            self.survey_dir = other.survey_dir;
        }
        if other.parsed_dir.is_some() {
            self.parsed_dir = other.parsed_dir;
        }
        if other.backup_dir.is_some() {
            self.backup_dir = other.backup_dir;
        }
        if other.tray_dir.is_some() {
            self.tray_dir = other.tray_dir;
        }
        if other.inventory_path.is_some() {
            self.inventory_path = other.inventory_path;
        }
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.extensions.is_some() {
            self.extensions = other.extensions;
        }
        if other.institution.is_some() {
            self.institution = other.institution;
        }
    }

    pub fn survey_dir(&self) -> PathBuf {
        self.survey_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SURVEY_DIR))
    }

    pub fn parsed_dir(&self) -> PathBuf {
        self.parsed_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PARSED_DIR))
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR))
    }

    pub fn tray_dir(&self) -> PathBuf {
        self.tray_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRAY_DIR))
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.inventory_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY))
    }

    pub fn database(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    /// Lowercased extensions without the leading dot
    pub fn extensions(&self) -> Vec<String> {
        match &self.extensions {
            Some(exts) if !exts.is_empty() => exts
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            _ => vec!["txt".to_string()],
        }
    }

    pub fn institution(&self) -> Option<&str> {
        self.institution.as_deref()
    }

    /// Fully resolved view with every default filled in
    pub fn resolved(&self) -> Config {
        Config {
            survey_dir: Some(self.survey_dir()),
            parsed_dir: Some(self.parsed_dir()),
            backup_dir: Some(self.backup_dir()),
            tray_dir: Some(self.tray_dir()),
            inventory_path: Some(self.inventory_path()),
            database: Some(self.database()),
            extensions: Some(self.extensions()),
            institution: self.institution.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.survey_dir(), PathBuf::from("OGP_results"));
        assert_eq!(config.parsed_dir(), PathBuf::from("parsed_OGP_results"));
        assert_eq!(config.inventory_path(), PathBuf::from("inventory.json"));
        assert_eq!(config.extensions(), vec!["txt".to_string()]);
        assert!(config.institution().is_none());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            survey_dir: Some("a".into()),
            tray_dir: Some("trays_a".into()),
            ..Config::default()
        };
        base.merge(Config {
            survey_dir: Some("b".into()),
            ..Config::default()
        });
        assert_eq!(base.survey_dir(), PathBuf::from("b"));
        assert_eq!(base.tray_dir(), PathBuf::from("trays_a"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("RWOGP_SURVEY_DIR", "/data/surveys"),
            ("RWOGP_DATABASE", "/data/db.sqlite"),
            ("RWOGP_TRAY_DIR", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config {
            tray_dir: Some("fixtures".into()),
            ..Config::default()
        };
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.survey_dir(), PathBuf::from("/data/surveys"));
        assert_eq!(config.database(), PathBuf::from("/data/db.sqlite"));
        assert_eq!(config.tray_dir(), PathBuf::from("fixtures"));
    }

    #[test]
    fn test_extensions_normalized() {
        let config = Config {
            extensions: Some(vec![".TXT".into(), "rpt".into()]),
            ..Config::default()
        };
        assert_eq!(config.extensions(), vec!["txt", "rpt"]);
    }

    #[test]
    fn test_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rwogp.yaml");
        std::fs::write(&path, "survey_dir: surveys\ninstitution: CMU\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.survey_dir(), PathBuf::from("surveys"));
        assert_eq!(config.institution(), Some("CMU"));
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_yaml("  \n", "x.yaml").unwrap(), Config::default());
    }

    #[test]
    fn test_syntax_error_reported() {
        let err = Config::from_yaml("survey_dir: [unclosed\n", "bad.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax(_)));
    }

    #[test]
    fn test_explicit_missing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.yaml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_resolved_fills_defaults() {
        let resolved = Config::default().resolved();
        assert_eq!(resolved.tray_dir, Some(PathBuf::from("trays")));
        assert_eq!(resolved.extensions, Some(vec!["txt".to_string()]));
    }
}
