//! Schema validation of metadata files with detailed error reporting

use jsonschema::error::ValidationErrorKind;
use jsonschema::{validator_for, ValidationError as JsonSchemaError, Validator as JsonValidator};
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::registry::{SchemaRegistry, SURVEY_META};
use crate::yaml::YamlSyntaxError;

/// Validation error with source location information
#[derive(Debug, Error, Diagnostic)]
#[error("Schema validation failed: {summary}")]
#[diagnostic(code(rwogp::schema::validation_error))]
pub struct ValidationError {
    summary: String,

    #[source_code]
    src: NamedSource<String>,

    #[related]
    violations: Vec<SchemaViolation>,
}

/// A single schema violation
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SchemaViolation {
    #[label("{}", self.hint)]
    span: SourceSpan,

    message: String,
    hint: String,

    #[help]
    help: Option<String>,
}

impl SchemaViolation {
    pub fn new(message: String, hint: String, span: SourceSpan, help: Option<String>) -> Self {
        Self {
            span,
            message,
            hint,
            help,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ValidationError {
    pub fn new(filename: &str, source: &str, violations: Vec<SchemaViolation>) -> Self {
        let count = violations.len();
        let summary = if count == 1 {
            "1 error".to_string()
        } else {
            format!("{count} errors")
        };
        Self {
            summary,
            src: NamedSource::new(filename, source.to_string()),
            violations,
        }
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

/// Why a metadata file did not validate
#[derive(Debug, Error, Diagnostic)]
pub enum MetaError {
    #[error("Cannot read {}", path.display())]
    #[diagnostic(code(rwogp::schema::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Embedded schema {name} is unusable: {message}")]
    #[diagnostic(code(rwogp::schema::broken))]
    BrokenSchema { name: String, message: String },
}

/// Compiled metadata schema
pub struct Validator {
    meta: JsonValidator,
}

impl Validator {
    pub fn new(registry: &SchemaRegistry) -> Result<Self, MetaError> {
        let broken = |message: String| MetaError::BrokenSchema {
            name: SURVEY_META.to_string(),
            message,
        };
        let text = registry
            .get(SURVEY_META)
            .ok_or_else(|| broken("not embedded".to_string()))?;
        let schema: JsonValue = serde_json::from_str(text).map_err(|e| broken(e.to_string()))?;
        let meta = validator_for(&schema).map_err(|e| broken(e.to_string()))?;
        Ok(Self { meta })
    }

    /// Check metadata YAML, collecting every violation
    pub fn validate(&self, content: &str, filename: &str) -> Result<(), MetaError> {
        let yaml_value: serde_yml::Value = serde_yml::from_str(content)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, content, filename))?;

        let json_value: JsonValue = match serde_json::to_value(&yaml_value) {
            Ok(v) => v,
            Err(e) => {
                let violation = SchemaViolation::new(
                    format!("Failed to convert YAML to JSON: {e}"),
                    "conversion error".to_string(),
                    (0, content.len()).into(),
                    None,
                );
                return Err(ValidationError::new(filename, content, vec![violation]).into());
            }
        };

        let violations: Vec<SchemaViolation> = self
            .meta
            .iter_errors(&json_value)
            .map(|e| error_to_violation(content, &e))
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(filename, content, violations).into())
        }
    }

    pub fn validate_file(&self, path: &Path) -> Result<(), MetaError> {
        let content = std::fs::read_to_string(path).map_err(|source| MetaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.validate(&content, &path.display().to_string())
    }
}

/// Metadata files are the ones the parser writes
pub fn is_meta_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_meta.yaml"))
}

fn error_to_violation(content: &str, error: &JsonSchemaError) -> SchemaViolation {
    let path = error.instance_path.to_string();
    let message = format_schema_error(error);
    let hint = format_error_hint(error);
    let help = generate_help_message(error);
    let span = find_path_span(content, &path);

    SchemaViolation::new(message, hint, span, help)
}

fn format_schema_error(error: &JsonSchemaError) -> String {
    let path = if error.instance_path.as_str().is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", error.instance_path.as_str().trim_start_matches('/'))
    };

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let prop = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            format!("Missing required key {prop} at {path}")
        }
        ValidationErrorKind::Type { kind } => {
            format!("Wrong type at {path}: expected {kind:?}")
        }
        ValidationErrorKind::Enum { options } => {
            format!("Invalid value at {path}: must be one of {}", format_enum_options(options))
        }
        ValidationErrorKind::Pattern { pattern } => {
            format!("Value at {path} doesn't match pattern {pattern}")
        }
        ValidationErrorKind::MinLength { .. } => format!("Value at {path} is empty"),
        ValidationErrorKind::Minimum { limit } => {
            format!("Value at {path} is too small: minimum {limit}")
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            format!("Unknown key(s): {}", unexpected.join(", "))
        }
        _ => format!("Validation error at {path}: {error}"),
    }
}

fn format_enum_options(options: &JsonValue) -> String {
    match options.as_array() {
        Some(arr) => arr
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        None => options.to_string(),
    }
}

fn format_error_hint(error: &JsonSchemaError) -> String {
    match &error.kind {
        ValidationErrorKind::Required { .. } => "required key missing",
        ValidationErrorKind::Type { .. } => "wrong type",
        ValidationErrorKind::Enum { .. } => "invalid value",
        ValidationErrorKind::Pattern { .. } => "pattern mismatch",
        ValidationErrorKind::MinLength { .. } => "empty",
        ValidationErrorKind::AdditionalProperties { .. } => "unknown key",
        _ => "validation error",
    }
    .to_string()
}

fn generate_help_message(error: &JsonSchemaError) -> Option<String> {
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let prop = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            Some(format!("Re-parse the survey after adding '{prop}' to its header"))
        }
        ValidationErrorKind::Enum { options } => {
            Some(format!("Valid values: {}", format_enum_options(options)))
        }
        ValidationErrorKind::Pattern { pattern } if pattern.contains("0-9") => {
            Some("Run dates and times are written as two-digit triples, e.g. 03:14:24".to_string())
        }
        ValidationErrorKind::Pattern { .. } => {
            Some("Names seed file names and may not contain < > : \" / \\ | ? *".to_string())
        }
        ValidationErrorKind::AdditionalProperties { unexpected } if unexpected.len() == 1 => {
            Some(format!("Remove the '{}' key or check spelling", unexpected[0]))
        }
        _ => None,
    }
}

/// Span for a JSON pointer in YAML content
fn find_path_span(content: &str, json_path: &str) -> SourceSpan {
    let first_line = || -> SourceSpan {
        let len = content.find('\n').unwrap_or(content.len()).max(1);
        (0, len).into()
    };

    let parts: Vec<&str> = json_path.split('/').filter(|s| !s.is_empty()).collect();
    match parts.last() {
        Some(key) => find_key_span(content, key).unwrap_or_else(first_line),
        None => first_line(),
    }
}

/// Span of a top-level `key:` line
fn find_key_span(content: &str, key: &str) -> Option<SourceSpan> {
    let pattern = format!("{key}:");
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(&pattern) {
            let start = offset + (line.len() - trimmed.len());
            return Some((start, trimmed.trim_end().len()).into());
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survey::confirm::BatchMode;
    use crate::survey::parser::fixtures::PROTO_REPORT;
    use crate::survey::{ArtifactWriter, ReportParser};
    use tempfile::tempdir;

    fn validator() -> Validator {
        Validator::new(&SchemaRegistry::default()).unwrap()
    }

    const VALID: &str = "\
ComponentID: 320PLF3WXCM0001
Operator: jdoe
Geometry: Full
Density: LD
Flatness: 0.042
PositionID: 1
TrayNo: 1
";

    #[test]
    fn test_valid_meta() {
        validator().validate(VALID, "a_meta.yaml").unwrap();
    }

    #[test]
    fn test_parser_output_validates() {
        let tmp = tempdir().unwrap();
        let report = ReportParser::default().parse(PROTO_REPORT, &mut BatchMode).unwrap();
        let paths = ArtifactWriter::new(tmp.path().join("parsed"), tmp.path().join("bk"))
            .write("protomodules", &report)
            .unwrap();
        validator().validate_file(&paths.meta).unwrap();
    }

    #[test]
    fn test_collects_every_violation() {
        let yaml = VALID
            .replace("Geometry: Full", "Geometry: Round")
            .replace("PositionID: 1\n", "")
            .replace("TrayNo: 1", "TrayNo: 1\nColour: red");
        let err = validator().validate(&yaml, "bad_meta.yaml").unwrap_err();
        match err {
            MetaError::Invalid(v) => {
                assert_eq!(v.violation_count(), 3);
                let messages: Vec<_> = v.violations().iter().map(|v| v.message().to_string()).collect();
                assert!(messages.iter().any(|m| m.contains("PositionID")));
                assert!(messages.iter().any(|m| m.contains("Colour")));
            }
            other => panic!("expected schema violations, got {other:?}"),
        }
    }

    #[test]
    fn test_unsafe_name_rejected() {
        let yaml = VALID.replace("Operator: jdoe", "Operator: \"j/doe\"");
        assert!(matches!(
            validator().validate(&yaml, "x_meta.yaml"),
            Err(MetaError::Invalid(_))
        ));
    }

    #[test]
    fn test_syntax_error() {
        let err = validator().validate("ComponentID: [oops\n", "x_meta.yaml").unwrap_err();
        assert!(matches!(err, MetaError::Syntax(_)));
    }

    #[test]
    fn test_find_key_span() {
        let span = find_key_span(VALID, "Density").unwrap();
        assert_eq!(&VALID[span.offset()..span.offset() + span.len()], "Density: LD");
    }

    #[test]
    fn test_is_meta_file() {
        assert!(is_meta_file(Path::new("parsed/modules/M1_jdoe_meta.yaml")));
        assert!(!is_meta_file(Path::new("parsed/modules/M1_jdoe.csv")));
    }
}
