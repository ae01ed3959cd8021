//! Upload rows - the flat column map sent to the inspection record

use chrono::{NaiveDate, NaiveTime};
use std::collections::BTreeMap;
use ulid::Ulid;

use crate::alignment::AlignmentResult;
use crate::entities::feature::round_to;
use crate::entities::ComponentKind;
use crate::survey::SurveyReport;

/// One column value
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    Text(String),
    Int(i64),
    Real(f64),
    RealList(Vec<f64>),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Null,
}

impl RowValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RowValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RowValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            RowValue::Real(v) => Some(*v),
            RowValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<Option<f64>> for RowValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(RowValue::Null, RowValue::Real)
    }
}

impl From<Option<String>> for RowValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(RowValue::Null, RowValue::Text)
    }
}

/// Column name to value, ordered by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadRow {
    columns: BTreeMap<String, RowValue>,
}

impl UploadRow {
    /// Assemble the row for one parsed survey
    ///
    /// `alignment` is only used for kinds that carry offsets.
    pub fn build(
        kind: ComponentKind,
        report: &SurveyReport,
        alignment: Option<&AlignmentResult>,
        hexplot: Option<Vec<u8>>,
        run_id: Ulid,
    ) -> Self {
        let header = &report.header;
        let table = kind.table();
        let points = report.features.points();

        let thickness = report
            .features
            .mean_height()
            .or(header.thickness)
            .map(|t| round_to(t, 3));

        let mut row = UploadRow::default();
        row.insert(table.name_column(), RowValue::Text(header.component_id.clone()));
        row.insert("flatness", RowValue::Real(header.flatness));
        row.insert("thickness", thickness.into());
        row.insert("x_points", RowValue::RealList(points.iter().map(|p| p.0).collect()));
        row.insert("y_points", RowValue::RealList(points.iter().map(|p| p.1).collect()));
        row.insert("z_points", RowValue::RealList(points.iter().map(|p| p.2).collect()));
        row.insert("hexplot", hexplot.map_or(RowValue::Null, RowValue::Blob));
        row.insert("inspector", RowValue::Text(header.operator.clone()));
        row.insert("comment", header.comment.clone().into());
        row.insert(
            "date_inspect",
            header.inspected_on().map_or(RowValue::Null, RowValue::Date),
        );
        row.insert(
            "time_inspect",
            header.inspected_at().map_or(RowValue::Null, RowValue::Time),
        );
        row.insert("weight", header.weight.into());
        row.insert("run_id", RowValue::Text(run_id.to_string()));

        if kind.part_kind().is_some() {
            match alignment {
                Some(result) => {
                    row.insert("x_offset_mu", RowValue::Int(result.x_offset_um()));
                    row.insert("y_offset_mu", RowValue::Int(result.y_offset_um()));
                    row.insert("ang_offset_deg", RowValue::Real(round_to(result.angle_offset, 3)));
                }
                None => {
                    row.insert("x_offset_mu", RowValue::Null);
                    row.insert("y_offset_mu", RowValue::Null);
                    row.insert("ang_offset_deg", RowValue::Null);
                }
            }
        }

        row
    }

    pub fn insert(&mut self, column: impl Into<String>, value: RowValue) {
        self.columns.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&RowValue> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValue)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::header::sample_header;
    use crate::entities::{FeatureRow, FeatureTable};

    fn report() -> SurveyReport {
        SurveyReport {
            header: sample_header(),
            features: FeatureTable::from_rows([
                FeatureRow::new("Point", "P1").with_point(1.0, 2.0, 3.2),
                FeatureRow::new("Point", "P2").with_point(4.0, 5.0, 3.3),
                FeatureRow::new("Circle", "Hole"),
            ]),
        }
    }

    #[test]
    fn test_bare_part_row() {
        let row = UploadRow::build(ComponentKind::Baseplates, &report(), None, None, Ulid::nil());

        assert_eq!(row.get("bp_name").and_then(RowValue::as_text), Some("320MLF3WXCM0001"));
        assert_eq!(row.get("thickness").and_then(RowValue::as_real), Some(3.25));
        assert_eq!(row.get("x_points"), Some(&RowValue::RealList(vec![1.0, 4.0])));
        assert_eq!(row.get("inspector").and_then(RowValue::as_text), Some("jdoe"));
        assert_eq!(row.get("hexplot"), Some(&RowValue::Null));
        assert_eq!(
            row.get("date_inspect"),
            Some(&RowValue::Date(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()))
        );
        assert!(row.get("x_offset_mu").is_none());
    }

    #[test]
    fn test_assembled_part_row_has_offsets() {
        let result = AlignmentResult {
            center_offset: 0.03,
            angle_offset: 0.012345,
            x_offset: 0.0244,
            y_offset: -0.0181,
        };
        let id = Ulid::new();
        let row = UploadRow::build(ComponentKind::Modules, &report(), Some(&result), Some(vec![1, 2]), id);

        assert_eq!(row.get("module_name").and_then(RowValue::as_text), Some("320MLF3WXCM0001"));
        assert_eq!(row.get("x_offset_mu").and_then(RowValue::as_int), Some(24));
        assert_eq!(row.get("y_offset_mu").and_then(RowValue::as_int), Some(-18));
        assert_eq!(row.get("ang_offset_deg").and_then(RowValue::as_real), Some(0.012));
        assert_eq!(row.get("hexplot"), Some(&RowValue::Blob(vec![1, 2])));
        assert_eq!(row.get("run_id").and_then(RowValue::as_text), Some(id.to_string().as_str()));
    }

    #[test]
    fn test_thickness_falls_back_to_header() {
        let mut report = report();
        report.features = FeatureTable::from_rows([FeatureRow::new("Circle", "Hole")]);
        let row = UploadRow::build(ComponentKind::Hexaboards, &report, None, None, Ulid::nil());
        assert_eq!(
            row.get("thickness").and_then(RowValue::as_real),
            report.header.thickness.map(|t| round_to(t, 3))
        );
    }
}
