//! Tray reference files
//!
//! Each assembly tray is described by `tray_<N>.yaml`, a flat mapping from
//! pin id to `[x, y]` in tray coordinates:
//!
//! ```yaml
//! p1_center_pin: [100.0, 100.0]
//! p1_offcenter_pin: [100.0, 150.0]
//! p1_hd_offcenter_pin: [100.0, 145.0]
//! ```

use miette::Diagnostic;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::alignment::fiducials::Point2;
use crate::alignment::rules::pin_ids;
use crate::entities::{Density, Geometry, Position};
use crate::yaml::YamlSyntaxError;

#[derive(Debug, Error, Diagnostic)]
pub enum TrayError {
    #[error("Tray file not found: {}", path.display())]
    #[diagnostic(
        code(rwogp::tray::not_found),
        help("Check `tray_dir` in the configuration and the TrayNo in the survey header")
    )]
    NotFound { path: PathBuf },

    #[error("Cannot read tray file {}: {source}", path.display())]
    #[diagnostic(code(rwogp::tray::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error("Tray {tray} has no pin '{pin}'")]
    #[diagnostic(code(rwogp::tray::missing_pin))]
    MissingPin { tray: u32, pin: String },

    #[error("Tray {tray} pin '{pin}' must be a [x, y] pair of numbers")]
    #[diagnostic(code(rwogp::tray::malformed_pin))]
    MalformedPin { tray: u32, pin: String },

    #[error("No tray pins are defined for {geometry}/{density}")]
    #[diagnostic(code(rwogp::tray::no_layout))]
    NoLayout { geometry: Geometry, density: Density },
}

/// Pin coordinates of one tray
#[derive(Debug, Clone, Default)]
pub struct Tray {
    number: u32,
    pins: BTreeMap<String, serde_yml::Value>,
}

impl Tray {
    pub fn parse(number: u32, content: &str, filename: &str) -> Result<Self, TrayError> {
        let pins: BTreeMap<String, serde_yml::Value> = serde_yml::from_str(content)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, content, filename))?;
        Ok(Self { number, pins })
    }

    pub fn pin(&self, id: &str) -> Result<Point2, TrayError> {
        let value = self.pins.get(id).ok_or_else(|| TrayError::MissingPin {
            tray: self.number,
            pin: id.to_string(),
        })?;
        let malformed = || TrayError::MalformedPin {
            tray: self.number,
            pin: id.to_string(),
        };
        match value.as_sequence().map(|s| s.as_slice()) {
            Some([x, y]) => Ok(Point2::new(
                x.as_f64().ok_or_else(malformed)?,
                y.as_f64().ok_or_else(malformed)?,
            )),
            _ => Err(malformed()),
        }
    }
}

/// Lazily loaded tray files from one directory
///
/// A catalog is created per run and passed to whoever needs pin
/// positions; files are read at most once per catalog.
#[derive(Debug)]
pub struct TrayCatalog {
    dir: PathBuf,
    trays: HashMap<u32, Tray>,
}

impl TrayCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            trays: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tray_path(&self, number: u32) -> PathBuf {
        self.dir.join(format!("tray_{number}.yaml"))
    }

    pub fn tray(&mut self, number: u32) -> Result<&Tray, TrayError> {
        if !self.trays.contains_key(&number) {
            let path = self.tray_path(number);
            if !path.exists() {
                return Err(TrayError::NotFound { path });
            }
            let content = fs::read_to_string(&path).map_err(|source| TrayError::Io {
                path: path.clone(),
                source,
            })?;
            let filename = path.display().to_string();
            let tray = Tray::parse(number, &content, &filename)?;
            debug!(tray = number, pins = tray.pins.len(), "loaded tray file");
            self.trays.insert(number, tray);
        }
        self.trays
            .get(&number)
            .ok_or_else(|| TrayError::NotFound {
                path: self.tray_path(number),
            })
    }

    /// Hole and slot pin positions for a survey's cell
    pub fn pins(
        &mut self,
        number: u32,
        geometry: Geometry,
        density: Density,
        position: Position,
    ) -> Result<(Point2, Point2), TrayError> {
        let (hole_id, slot_id) =
            pin_ids(geometry, density, position).ok_or(TrayError::NoLayout { geometry, density })?;
        let tray = self.tray(number)?;
        Ok((tray.pin(&hole_id)?, tray.pin(&slot_id)?))
    }
}

#[cfg(test)]
pub(crate) fn write_test_tray(dir: &Path, number: u32) {
    let yaml = "\
p1_center_pin: [100.0, 100.0]
p1_offcenter_pin: [100.0, 150.0]
p1_hd_offcenter_pin: [100.0, 145.0]
p2_center_pin: [300.0, 100.0]
p2_offcenter_pin: [300.0, 50.0]
p2_hd_offcenter_pin: [300.0, 55.0]
";
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("tray_{number}.yaml")), yaml).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pins_for_cell() {
        let tmp = tempdir().unwrap();
        write_test_tray(tmp.path(), 1);
        let mut catalog = TrayCatalog::new(tmp.path());

        let (hole, slot) = catalog
            .pins(1, Geometry::Full, Density::LD, Position::P1)
            .unwrap();
        assert_eq!(hole, Point2::new(100.0, 100.0));
        assert_eq!(slot, Point2::new(100.0, 150.0));

        let (_, slot) = catalog
            .pins(1, Geometry::Top, Density::HD, Position::P2)
            .unwrap();
        assert_eq!(slot, Point2::new(300.0, 55.0));
    }

    #[test]
    fn test_missing_tray_file() {
        let tmp = tempdir().unwrap();
        let mut catalog = TrayCatalog::new(tmp.path());
        let err = catalog.tray(7).unwrap_err();
        assert!(matches!(err, TrayError::NotFound { .. }));
    }

    #[test]
    fn test_missing_and_malformed_pins() {
        let tray = Tray::parse(3, "p1_center_pin: [1.0]\nlabel: tray three\n", "tray_3.yaml").unwrap();
        assert!(matches!(tray.pin("p1_center_pin"), Err(TrayError::MalformedPin { .. })));
        assert!(matches!(tray.pin("label"), Err(TrayError::MalformedPin { .. })));
        assert!(matches!(tray.pin("p2_center_pin"), Err(TrayError::MissingPin { .. })));
    }

    #[test]
    fn test_integer_coordinates_accepted() {
        let tray = Tray::parse(1, "p1_center_pin: [10, 20]\n", "tray_1.yaml").unwrap();
        assert_eq!(tray.pin("p1_center_pin").unwrap(), Point2::new(10.0, 20.0));
    }

    #[test]
    fn test_yaml_syntax_error() {
        let err = Tray::parse(1, "p1_center_pin: [1.0, 2.0\n", "tray_1.yaml").unwrap_err();
        assert!(matches!(err, TrayError::Syntax(_)));
    }

    #[test]
    fn test_files_read_once() {
        let tmp = tempdir().unwrap();
        write_test_tray(tmp.path(), 2);
        let mut catalog = TrayCatalog::new(tmp.path());
        catalog.tray(2).unwrap();
        fs::remove_file(catalog.tray_path(2)).unwrap();
        assert!(catalog.tray(2).is_ok());
    }
}
