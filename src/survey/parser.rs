//! Report parser - raw CMM text to a validated header and feature table

use miette::Diagnostic;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entities::header::{OPTIONAL_KEYS, REQUIRED_KEYS};
use crate::entities::{Density, FeatureRow, FeatureTable, Geometry, HeaderRecord, Position};
use crate::survey::confirm::ConfirmationPort;
use crate::survey::template::{HeaderTemplate, RawHeader};

/// Line separating the header block from the feature block
pub const DELIMITER: &str = "---";

/// Characters that may not appear in names used for output files
const ILLEGAL_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Errors raised while turning a report into a validated record
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("Malformed report: {message}")]
    #[diagnostic(
        code(rwogp::parse::format),
        help("A report is a header block, one '---' line, then 4-line feature records")
    )]
    Format { message: String },

    #[error("Missing required header key(s): {}", keys.join(", "))]
    #[diagnostic(
        code(rwogp::parse::missing_key),
        help("Add the key(s) to the report header, or re-run interactively to supply them")
    )]
    MissingKey { keys: Vec<String> },

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    #[diagnostic(code(rwogp::parse::invalid_value))]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("No tray pin layout for geometry {geometry} with density {density}")]
    #[diagnostic(
        code(rwogp::parse::unknown_geometry),
        help("Supported: every geometry for LD, every geometry except Five for HD")
    )]
    UnknownGeometry { geometry: Geometry, density: Density },

    #[error("{key} '{value}' cannot be used in a file name")]
    #[diagnostic(
        code(rwogp::parse::unsafe_name),
        help("Remove < > : \" / \\ | ? * and control characters from the value")
    )]
    UnsafeName { key: String, value: String },
}

/// A parsed and validated survey
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyReport {
    pub header: HeaderRecord,
    pub features: FeatureTable,
}

/// Template-driven report parser
#[derive(Debug, Clone, Default)]
pub struct ReportParser {
    template: HeaderTemplate,
}

impl ReportParser {
    pub fn new(template: HeaderTemplate) -> Self {
        Self { template }
    }

    /// Parse a report, asking `port` to settle anything the header leaves open
    pub fn parse(
        &self,
        text: &str,
        port: &mut dyn ConfirmationPort,
    ) -> Result<SurveyReport, ParseError> {
        let (header_block, feature_block) = split_blocks(text)?;
        let raw = self.template.extract(header_block);
        let features = parse_features(feature_block)?;
        let header = validate_header(raw, port)?;

        debug!(
            component = %header.component_id,
            features = features.len(),
            "parsed survey report"
        );
        Ok(SurveyReport { header, features })
    }
}

/// Split on the single delimiter line
fn split_blocks(text: &str) -> Result<(&str, &str), ParseError> {
    let mut offset = 0;
    let mut cut = None;
    let mut count = 0;

    for line in text.split_inclusive('\n') {
        if line.trim() == DELIMITER {
            count += 1;
            cut.get_or_insert((offset, offset + line.len()));
        }
        offset += line.len();
    }

    match (count, cut) {
        (1, Some((start, end))) => Ok((&text[..start], &text[end..])),
        _ => Err(ParseError::Format {
            message: format!("expected exactly one '{DELIMITER}' line, found {count}"),
        }),
    }
}

#[derive(Debug)]
struct PendingRecord {
    row: FeatureRow,
    line: usize,
    dropped: Option<&'static str>,
}

/// Parse 4-line feature records
///
/// The line right after a record's `{{FeatureType}} {{FeatureName}}` line
/// holds its coordinates when it starts with `Point`. A malformed direction
/// cosine or radius drops only that record; a malformed `Point` triple
/// rejects the report.
fn parse_features(block: &str) -> Result<FeatureTable, ParseError> {
    let mut rows = Vec::new();
    let mut pending: Option<PendingRecord> = None;
    let mut expect_point = false;

    let flush = |rec: Option<PendingRecord>, rows: &mut Vec<FeatureRow>| {
        if let Some(rec) = rec {
            match rec.dropped {
                Some(reason) => {
                    debug!(feature = %rec.row.name, line = rec.line, reason, "dropped feature record")
                }
                None => rows.push(rec.row),
            }
        }
    };

    for (idx, line) in block.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let after_header = std::mem::take(&mut expect_point);

        let point_data = keyword_rest(trimmed, "Point")
            .filter(|_| after_header)
            .and_then(|rest| pending.as_mut().map(|r| (rest, r)));

        if let Some((rest, rec)) = point_data {
            let [x, y, z] = parse_triple(rest).ok_or_else(|| ParseError::Format {
                message: format!(
                    "feature line {line_no}: '{}' has a malformed X/Y/Z triple",
                    rec.row.name
                ),
            })?;
            rec.row.x = Some(x);
            rec.row.y = Some(y);
            rec.row.z = Some(z);
        } else if let Some(rest) = trimmed.strip_prefix("direction cosine:") {
            if let Some(rec) = pending.as_mut() {
                match parse_triple(rest) {
                    Some([i, j, k]) => {
                        rec.row.i = Some(i);
                        rec.row.j = Some(j);
                        rec.row.k = Some(k);
                    }
                    None => rec.dropped = Some("malformed direction cosine"),
                }
            }
        } else if let Some(rest) = keyword_rest(trimmed, "Radius") {
            if let Some(rec) = pending.as_mut() {
                match parse_finite(rest.trim()) {
                    Some(r) => rec.row.radius = Some(r),
                    None => rec.dropped = Some("malformed radius"),
                }
            }
        } else {
            flush(pending.take(), &mut rows);
            let mut words = trimmed.splitn(2, char::is_whitespace);
            let feature_type = words.next().unwrap_or_default();
            let name = words.next().unwrap_or_default().trim();
            pending = Some(PendingRecord {
                row: FeatureRow::new(feature_type, name),
                line: line_no,
                dropped: None,
            });
            expect_point = true;
        }
    }
    flush(pending.take(), &mut rows);

    Ok(FeatureTable::from_rows(rows))
}

/// Text after `keyword` when it is the line's first word
fn keyword_rest<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    line.strip_prefix(keyword)
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Finite numbers only; `NaN` and `inf` are not measurements
fn parse_finite(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_triple(text: &str) -> Option<[f64; 3]> {
    let mut values = text.split_whitespace().map(parse_finite);
    let triple = [values.next()??, values.next()??, values.next()??];
    if values.next().is_some() {
        return None;
    }
    Some(triple)
}

/// Default used when a required key is absent and the operator agrees
fn default_for(key: &str) -> Option<&'static str> {
    match key {
        "Geometry" => Some("Full"),
        "Density" => Some("LD"),
        "TrayNo" => Some("1"),
        "PositionID" => Some("1"),
        _ => None,
    }
}

fn validate_header(
    mut raw: RawHeader,
    port: &mut dyn ConfirmationPort,
) -> Result<HeaderRecord, ParseError> {
    fill_missing_keys(&mut raw, port)?;

    for key in OPTIONAL_KEYS {
        if !raw.contains_key(key) {
            warn!(key, "optional header key not present");
        }
    }

    let mut geometry: Geometry = coerce(&raw, "Geometry")?;
    let mut density: Density = coerce(&raw, "Density")?;
    if !geometry.supports(density) {
        let prompt = format!(
            "No tray pin layout for {geometry}/{density}. Treat the part as Full/LD?"
        );
        if port.is_interactive() && port.confirm(&prompt, false) {
            info!(%geometry, %density, "geometry replaced by Full/LD on operator request");
            geometry = Geometry::Full;
            density = Density::LD;
        } else {
            return Err(ParseError::UnknownGeometry { geometry, density });
        }
    }

    let component_id: String = coerce(&raw, "ComponentID")?;
    let component_id = safe_name("ComponentID", &component_id, port)?;
    let operator: String = coerce(&raw, "Operator")?;
    let operator = safe_name("Operator", &operator, port)?;

    Ok(HeaderRecord {
        project_name: raw.get("ProjectName").cloned(),
        last_modified_date: raw.get("LastModifiedDate").cloned(),
        last_modified_time: raw.get("LastModifiedTime").cloned(),
        run_date: raw.get("RunDate").cloned(),
        run_time: raw.get("RunTime").cloned(),
        component_id,
        operator,
        geometry,
        density,
        sensor_size: raw.get("SensorSize").cloned(),
        flatness: coerce(&raw, "Flatness")?,
        thickness: coerce_opt(&raw, "Thickness")?,
        thickness_offset: coerce_opt(&raw, "Thickness_Offset")?,
        position: coerce::<Position>(&raw, "PositionID")?,
        tray_no: coerce(&raw, "TrayNo")?,
        weight: coerce_opt(&raw, "Weight")?,
        comment: raw.get("Comment").cloned(),
    })
}

/// Resolve absent required keys through defaults or operator input
fn fill_missing_keys(raw: &mut RawHeader, port: &mut dyn ConfirmationPort) -> Result<(), ParseError> {
    let missing: Vec<&str> = REQUIRED_KEYS
        .into_iter()
        .filter(|k| !raw.contains_key(*k))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    if !port.is_interactive() {
        return Err(ParseError::MissingKey {
            keys: missing.iter().map(|k| k.to_string()).collect(),
        });
    }

    for key in missing {
        let accepted_default = default_for(key)
            .filter(|default| port.confirm(&format!("{key} is missing. Use default '{default}'?"), true));
        let value = match accepted_default {
            Some(default) => Some(default.to_string()),
            None => port.input(&format!("Enter a value for {key}")),
        };
        match value {
            Some(value) => {
                info!(key, value = %value, "missing header key supplied by operator");
                raw.insert(key.to_string(), value);
            }
            None => {
                return Err(ParseError::MissingKey {
                    keys: vec![key.to_string()],
                })
            }
        }
    }
    Ok(())
}

fn coerce<T>(raw: &RawHeader, key: &str) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = raw.get(key).ok_or_else(|| ParseError::MissingKey {
        keys: vec![key.to_string()],
    })?;
    value.trim().parse().map_err(|e: T::Err| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.clone(),
        reason: e.to_string(),
    })
}

fn coerce_opt<T>(raw: &RawHeader, key: &str) -> Result<Option<T>, ParseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if raw.contains_key(key) {
        coerce(raw, key).map(Some)
    } else {
        Ok(None)
    }
}

/// Strip characters that cannot appear in file names
pub fn sanitize_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| !ILLEGAL_NAME_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

fn safe_name(key: &str, value: &str, port: &mut dyn ConfirmationPort) -> Result<String, ParseError> {
    let cleaned = sanitize_name(value);
    let unsafe_name = || ParseError::UnsafeName {
        key: key.to_string(),
        value: value.to_string(),
    };

    if cleaned.is_empty() {
        return Err(unsafe_name());
    }
    if cleaned == value {
        return Ok(cleaned);
    }

    let prompt = format!("{key} '{value}' contains illegal characters. Use '{cleaned}' instead?");
    if port.is_interactive() && port.confirm(&prompt, true) {
        Ok(cleaned)
    } else {
        Err(unsafe_name())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::PROTO_REPORT;
    use super::*;
    use crate::schema::{SchemaRegistry, Validator};
    use crate::survey::artifacts::ArtifactWriter;
    use crate::survey::confirm::{Answer, BatchMode, ScriptedPrompt};

    fn parse_batch(text: &str) -> Result<SurveyReport, ParseError> {
        ReportParser::default().parse(text, &mut BatchMode)
    }

    #[test]
    fn test_parse_complete_report() {
        let report = parse_batch(PROTO_REPORT).unwrap();
        let h = &report.header;
        assert_eq!(h.component_id, "320PLF3WXCM0001");
        assert_eq!(h.operator, "jdoe");
        assert_eq!(h.geometry, Geometry::Full);
        assert_eq!(h.density, Density::LD);
        assert_eq!(h.position, Position::P1);
        assert_eq!(h.tray_no, 1);
        assert!((h.flatness - 0.042).abs() < 1e-10);
        assert_eq!(h.thickness, Some(1.52));
        assert_eq!(h.sensor_size.as_deref(), Some("8"));
        assert_eq!(h.comment.as_deref(), Some("first pass"));
        assert_eq!(report.features.len(), 5);
        assert_eq!(report.features.rows()[0].name, "FD1");
        assert_eq!(report.features.rows()[4].radius, Some(0.0));
    }

    #[test]
    fn test_delimiter_count() {
        let err = parse_batch("Operator: a\nFlatness: 1\n").unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));

        let doubled = PROTO_REPORT.replace("Radius 0\n", "Radius 0\n---\n");
        let err = parse_batch(&doubled).unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn test_duplicate_rows_removed() {
        let text = format!("{PROTO_REPORT}Point Pad_1\nPoint 100 100 1.62\ndirection cosine: 0 0 1\nRadius 0\n");
        let report = parse_batch(&text).unwrap();
        assert_eq!(report.features.len(), 5);
    }

    #[test]
    fn test_malformed_optional_drops_row() {
        let text = PROTO_REPORT.replace("Radius 0\n", "Radius n/a\n");
        let report = parse_batch(&text).unwrap();
        assert_eq!(report.features.len(), 4);
        assert!(report.features.rows().iter().all(|r| r.name != "Pad_1"));
    }

    #[test]
    fn test_malformed_point_rejects_report() {
        let text = PROTO_REPORT.replace("Point 100 100 1.62", "Point 100 abc 1.62");
        let err = parse_batch(&text).unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));
        assert!(err.to_string().contains("Pad_1"));
    }

    #[test]
    fn test_non_finite_point_rejects_report() {
        for bad in ["Point NaN 160 1.5", "Point 40 inf 1.5", "Point 40 160 -infinity"] {
            let text = PROTO_REPORT.replace("Point 40 160 1.5", bad);
            let err = parse_batch(&text).unwrap_err();
            assert!(matches!(err, ParseError::Format { .. }), "{bad}: {err:?}");
            assert!(err.to_string().contains("FD1"));
        }
    }

    #[test]
    fn test_non_finite_radius_drops_row() {
        let text = PROTO_REPORT.replace("Radius 0\n", "Radius NaN\n");
        let report = parse_batch(&text).unwrap();
        assert_eq!(report.features.len(), 4);
        assert!(report.features.rows().iter().all(|r| r.radius.is_some_and(f64::is_finite)));
    }

    #[test]
    fn test_malformed_leading_x_rejects_report() {
        let text = PROTO_REPORT.replace("Point 40 160 1.5", "Point 4O 160 1.5");
        let err = parse_batch(&text).unwrap_err();
        assert!(matches!(err, ParseError::Format { .. }));
        assert!(err.to_string().contains("FD1"));
    }

    #[test]
    fn test_point_named_feature_after_coordinates_starts_record() {
        let text = format!("{PROTO_REPORT}Point 12\nPoint 1 2 3\ndirection cosine: 0 0 1\nRadius 0\n");
        let report = parse_batch(&text).unwrap();
        let last = report.features.rows().last().unwrap();
        assert_eq!(last.name, "12");
        assert_eq!(last.point(), Some((1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_record_without_point_keeps_empty_coordinates() {
        let text = format!("{PROTO_REPORT}Plane Top\ndirection cosine: 0 0 1\n");
        let report = parse_batch(&text).unwrap();
        let plane = report.features.rows().last().unwrap();
        assert_eq!(plane.feature_type, "Plane");
        assert_eq!(plane.x, None);
        assert_eq!(plane.k, Some(1.0));
    }

    #[test]
    fn test_missing_flatness_batch_mode() {
        let text = PROTO_REPORT.replace("Flatness: 0.042\n", "");
        match parse_batch(&text).unwrap_err() {
            ParseError::MissingKey { keys } => assert_eq!(keys, vec!["Flatness".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_flatness_interactive_value() {
        let text = PROTO_REPORT.replace("Flatness: 0.042\n", "");
        let mut port = ScriptedPrompt::new([Answer::Text("0.05")]);
        let report = ReportParser::default().parse(&text, &mut port).unwrap();
        assert!((report.header.flatness - 0.05).abs() < 1e-10);
        assert_eq!(port.asked.len(), 1);

        let tmp = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(tmp.path().join("parsed"), tmp.path().join("backup"));
        let paths = writer.write("protomodules", &report).unwrap();
        assert!(paths.meta.ends_with("320PLF3WXCM0001_jdoe_meta.yaml"));

        let meta = std::fs::read_to_string(&paths.meta).unwrap();
        assert!(meta.contains("Flatness: 0.05"), "{meta}");
        Validator::new(&SchemaRegistry::default())
            .unwrap()
            .validate_file(&paths.meta)
            .unwrap();
    }

    #[test]
    fn test_missing_tray_default_confirmed() {
        let text = PROTO_REPORT.replace("TrayNo: 1\n", "").replace("Geometry: Full\n", "");
        let mut port = ScriptedPrompt::new([Answer::Yes, Answer::Yes]);
        let report = ReportParser::default().parse(&text, &mut port).unwrap();
        assert_eq!(report.header.geometry, Geometry::Full);
        assert_eq!(report.header.tray_no, 1);
    }

    #[test]
    fn test_missing_default_declined_then_entered() {
        let text = PROTO_REPORT.replace("TrayNo: 1\n", "");
        let mut port = ScriptedPrompt::new([Answer::No, Answer::Text("3")]);
        let report = ReportParser::default().parse(&text, &mut port).unwrap();
        assert_eq!(report.header.tray_no, 3);
    }

    #[test]
    fn test_missing_key_nothing_entered() {
        let text = PROTO_REPORT.replace("Operator: jdoe\n", "");
        let mut port = ScriptedPrompt::new([Answer::Nothing]);
        let err = ReportParser::default().parse(&text, &mut port).unwrap_err();
        assert!(matches!(err, ParseError::MissingKey { .. }));
    }

    #[test]
    fn test_coercion_failure_is_fatal() {
        let text = PROTO_REPORT.replace("TrayNo: 1", "TrayNo: one");
        let err = parse_batch(&text).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { ref key, .. } if key == "TrayNo"));

        let text = PROTO_REPORT.replace("Thickness: 1.52", "Thickness: thick");
        assert!(matches!(parse_batch(&text), Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn test_hd_five_unknown_geometry() {
        let text = PROTO_REPORT
            .replace("Geometry: Full", "Geometry: Five")
            .replace("Density: LD", "Density: HD");
        assert!(matches!(parse_batch(&text), Err(ParseError::UnknownGeometry { .. })));

        let mut port = ScriptedPrompt::new([Answer::Yes]);
        let report = ReportParser::default().parse(&text, &mut port).unwrap();
        assert_eq!(report.header.geometry, Geometry::Full);
        assert_eq!(report.header.density, Density::LD);
    }

    #[test]
    fn test_unsafe_names() {
        assert_eq!(sanitize_name("a/b:c*?"), "abc");
        assert_eq!(sanitize_name("ok_name-1"), "ok_name-1");

        let text = PROTO_REPORT.replace("Operator: jdoe", "Operator: j/doe");
        assert!(matches!(parse_batch(&text), Err(ParseError::UnsafeName { .. })));

        let mut port = ScriptedPrompt::new([Answer::Yes]);
        let report = ReportParser::default().parse(&text, &mut port).unwrap();
        assert_eq!(report.header.operator, "jdoe");

        let mut port = ScriptedPrompt::new([Answer::No]);
        assert!(ReportParser::default().parse(&text, &mut port).is_err());

        let text = PROTO_REPORT.replace("Operator: jdoe", "Operator: ???");
        let mut port = ScriptedPrompt::new([Answer::Yes]);
        assert!(matches!(
            ReportParser::default().parse(&text, &mut port),
            Err(ParseError::UnsafeName { .. })
        ));
    }

    #[test]
    fn test_position_prefixed_form() {
        let text = PROTO_REPORT.replace("Position ID: 1", "Position ID: P2");
        assert_eq!(parse_batch(&text).unwrap().header.position, Position::P2);
    }
}
