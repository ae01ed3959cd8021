//! YAML syntax diagnostics for tray files, metadata and configuration

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax error pointing at the offending location
#[derive(Debug, Error, Diagnostic)]
#[error("YAML syntax error in {filename}: {message}")]
#[diagnostic(code(rwogp::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    filename: String,
    message: String,
}

impl YamlSyntaxError {
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        let offset = line_col_to_offset(source, line, column);
        let message = err.to_string();

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1).min(source.len().max(1))),
            help: suggest(&message),
            filename: filename.to_string(),
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Byte offset of a 1-based line/column, clamped to the source
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let line_text = source[line_start.min(source.len())..]
        .split('\n')
        .next()
        .unwrap_or_default();
    let col = line_text
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(line_text.len());
    (line_start + col).min(source.len())
}

fn suggest(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("tab") {
        return Some("Indent with spaces; YAML does not allow tabs".to_string());
    }
    if msg.contains("flow sequence") || msg.contains("expected ','") {
        return Some("Pin coordinates are written as [x, y] with a closing bracket".to_string());
    }
    if msg.contains("duplicate") {
        return Some("Each key may appear once; remove the repeated entry".to_string());
    }
    if msg.contains("mapping values are not allowed") {
        return Some("Quote values that contain ':' (e.g. run times)".to_string());
    }
    if msg.contains("invalid type") {
        return Some("The document must be a mapping of key: value lines".to_string());
    }
    None
}
