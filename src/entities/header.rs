//! Survey header record - typed metadata from the report's header block

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entities::geometry::{Density, Geometry, Position};

/// Date format used by the CMM for `Runtime:` lines
pub const RUN_DATE_FORMAT: &str = "%m:%d:%y";
/// Time format used by the CMM for `Runtime:` lines
pub const RUN_TIME_FORMAT: &str = "%H:%M:%S";

/// Header keys that must be present (or confirmed) for a survey to be usable
pub const REQUIRED_KEYS: [&str; 7] = [
    "ComponentID",
    "Operator",
    "Geometry",
    "Density",
    "Flatness",
    "PositionID",
    "TrayNo",
];

/// Header keys whose absence is only worth a warning
pub const OPTIONAL_KEYS: [&str; 4] = ["Thickness", "Thickness_Offset", "SensorSize", "Comment"];

/// Validated header metadata
///
/// Field names serialize to the keys used in the report so the metadata
/// file reads like the header it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderRecord {
    #[serde(rename = "ProjectName", default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(rename = "LastModifiedDate", default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<String>,

    #[serde(rename = "LastModifiedTime", default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<String>,

    #[serde(rename = "RunDate", default, skip_serializing_if = "Option::is_none")]
    pub run_date: Option<String>,

    #[serde(rename = "RunTime", default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<String>,

    #[serde(rename = "ComponentID")]
    pub component_id: String,

    #[serde(rename = "Operator")]
    pub operator: String,

    #[serde(rename = "Geometry")]
    pub geometry: Geometry,

    #[serde(rename = "Density")]
    pub density: Density,

    #[serde(rename = "SensorSize", default, skip_serializing_if = "Option::is_none")]
    pub sensor_size: Option<String>,

    #[serde(rename = "Flatness")]
    pub flatness: f64,

    #[serde(rename = "Thickness", default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,

    #[serde(rename = "Thickness_Offset", default, skip_serializing_if = "Option::is_none")]
    pub thickness_offset: Option<f64>,

    #[serde(rename = "PositionID")]
    pub position: Position,

    #[serde(rename = "TrayNo")]
    pub tray_no: u32,

    #[serde(rename = "Weight", default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(rename = "Comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HeaderRecord {
    /// `{ComponentID}_{Operator}`, the stem shared by both output artifacts
    pub fn output_stem(&self) -> String {
        format!("{}_{}", self.component_id, self.operator)
    }

    /// Inspection date from the `Runtime:` line, if it parses
    pub fn inspected_on(&self) -> Option<NaiveDate> {
        let raw = self.run_date.as_deref()?;
        match NaiveDate::parse_from_str(raw, RUN_DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(component = %self.component_id, value = raw, error = %e, "unreadable run date");
                None
            }
        }
    }

    /// Inspection time from the `Runtime:` line, if it parses
    pub fn inspected_at(&self) -> Option<NaiveTime> {
        let raw = self.run_time.as_deref()?;
        match NaiveTime::parse_from_str(raw, RUN_TIME_FORMAT) {
            Ok(time) => Some(time),
            Err(e) => {
                warn!(component = %self.component_id, value = raw, error = %e, "unreadable run time");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_header() -> HeaderRecord {
    HeaderRecord {
        project_name: Some("OGP Survey".to_string()),
        last_modified_date: None,
        last_modified_time: None,
        run_date: Some("03:14:24".to_string()),
        run_time: Some("13:45:10".to_string()),
        component_id: "320MLF3WXCM0001".to_string(),
        operator: "jdoe".to_string(),
        geometry: Geometry::Full,
        density: Density::LD,
        sensor_size: Some("8".to_string()),
        flatness: 0.042,
        thickness: Some(3.41),
        thickness_offset: None,
        position: Position::P1,
        tray_no: 1,
        weight: None,
        comment: None,
    }
}
