//! Line template for the report header block
//!
//! Each template line is a run of literal tokens and `{{ Var }}` slots.
//! A report line matches when its leading tokens equal the template line's
//! leading literals; slots then take one whitespace token each, and the last
//! slot takes the remainder of the line.

use std::collections::BTreeMap;
use tracing::debug;

/// Header layout written by the CMM routine
pub const STANDARD_HEADER: &str = "\
{{ ProjectName }}
LastModified: {{ LastModifiedDate }} {{ LastModifiedTime }}
Runtime: {{ RunDate }} {{ RunTime }}
Component ID: {{ ComponentID }}
Operator: {{ Operator }}
Geometry: {{ Geometry }}
Density: {{ Density }}
Sensor size: {{ SensorSize }}
Flatness: {{ Flatness }}
Thickness: {{ Thickness }}
Thickness_Offset: {{ Thickness_Offset }}
Position ID: {{ PositionID }}
TrayNo: {{ TrayNo }}
Weight: {{ Weight }}
Comment: {{ Comment }}
";

/// Raw captured header values, keyed by template variable
pub type RawHeader = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Slot(String),
}

#[derive(Debug, Clone)]
struct TemplateLine {
    tokens: Vec<Token>,
}

impl TemplateLine {
    fn compile(line: &str) -> Option<Self> {
        let normalized = line.replace("{{ ", "{{").replace(" }}", "}}");
        let tokens: Vec<Token> = normalized
            .split_whitespace()
            .map(|tok| match tok.strip_prefix("{{").and_then(|t| t.strip_suffix("}}")) {
                Some(name) => Token::Slot(name.trim().to_string()),
                None => Token::Literal(tok.to_string()),
            })
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    fn leading_literals(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map_while(|t| match t {
            Token::Literal(s) => Some(s.as_str()),
            Token::Slot(_) => None,
        })
    }

    fn is_bare_slot(&self) -> bool {
        matches!(self.tokens.as_slice(), [Token::Slot(_)])
    }

    /// Number of literal tokens matched, or `None` when the line does not fit
    fn match_len(&self, words: &[&str]) -> Option<usize> {
        let mut n = 0;
        for lit in self.leading_literals() {
            if words.get(n) != Some(&lit) {
                return None;
            }
            n += 1;
        }
        if n == 0 {
            None
        } else {
            Some(n)
        }
    }

    fn capture(&self, words: &[&str], into: &mut RawHeader) {
        let last_slot = self
            .tokens
            .iter()
            .rposition(|t| matches!(t, Token::Slot(_)));
        let mut cursor = 0;

        for (idx, token) in self.tokens.iter().enumerate() {
            match token {
                Token::Literal(lit) => {
                    if words.get(cursor) == Some(&lit.as_str()) {
                        cursor += 1;
                    }
                }
                Token::Slot(name) => {
                    let value = if Some(idx) == last_slot {
                        let rest = words.get(cursor..).unwrap_or_default().join(" ");
                        cursor = words.len();
                        rest
                    } else {
                        let word = words.get(cursor).copied().unwrap_or_default();
                        cursor += 1;
                        word.to_string()
                    };
                    if !value.is_empty() {
                        into.insert(name.clone(), value);
                    }
                }
            }
        }
    }
}

/// Compiled header template
#[derive(Debug, Clone)]
pub struct HeaderTemplate {
    lines: Vec<TemplateLine>,
}

impl Default for HeaderTemplate {
    fn default() -> Self {
        Self::compile(STANDARD_HEADER)
    }
}

impl HeaderTemplate {
    pub fn compile(text: &str) -> Self {
        Self {
            lines: text.lines().filter_map(TemplateLine::compile).collect(),
        }
    }

    /// Variable names in template order
    pub fn variables(&self) -> Vec<&str> {
        self.lines
            .iter()
            .flat_map(|l| l.tokens.iter())
            .filter_map(|t| match t {
                Token::Slot(s) => Some(s.as_str()),
                Token::Literal(_) => None,
            })
            .collect()
    }

    /// Capture slot values from a header block
    ///
    /// Lines matching no literal-led template line are offered, in order,
    /// to the bare-slot lines (e.g. the project name on the first line).
    pub fn extract(&self, block: &str) -> RawHeader {
        let mut raw = RawHeader::new();
        let mut bare = self.lines.iter().filter(|l| l.is_bare_slot());

        for line in block.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }

            let best = self
                .lines
                .iter()
                .filter_map(|tl| tl.match_len(&words).map(|n| (n, tl)))
                .max_by_key(|(n, _)| *n);

            match best {
                Some((_, tl)) => tl.capture(&words, &mut raw),
                None => match bare.next() {
                    Some(tl) => tl.capture(&words, &mut raw),
                    None => debug!(line, "header line matches no template line"),
                },
            }
        }

        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_variables() {
        let template = HeaderTemplate::default();
        let vars = template.variables();
        assert_eq!(vars.first(), Some(&"ProjectName"));
        assert!(vars.contains(&"Thickness_Offset"));
        assert!(vars.contains(&"ComponentID"));
        assert_eq!(vars.len(), 17);
    }

    #[test]
    fn test_extract_header_block() {
        let block = "\
Module Survey v3
LastModified: 03:12:24 09:00:01
Runtime: 03:14:24 13:45:10
Component ID: 320MLF3WXCM0001
Operator: jdoe
Geometry: Full
Density: LD
Flatness: 0.042
Thickness: 3.41
Thickness_Offset: 0.1
Position ID: 1
TrayNo: 2
Comment: re-measured after glue cure
";
        let raw = HeaderTemplate::default().extract(block);
        assert_eq!(raw["ProjectName"], "Module Survey v3");
        assert_eq!(raw["RunDate"], "03:14:24");
        assert_eq!(raw["RunTime"], "13:45:10");
        assert_eq!(raw["ComponentID"], "320MLF3WXCM0001");
        assert_eq!(raw["Thickness"], "3.41");
        assert_eq!(raw["Thickness_Offset"], "0.1");
        assert_eq!(raw["PositionID"], "1");
        assert_eq!(raw["TrayNo"], "2");
        assert_eq!(raw["Comment"], "re-measured after glue cure");
        assert!(!raw.contains_key("SensorSize"));
    }

    #[test]
    fn test_empty_value_is_absent() {
        let raw = HeaderTemplate::default().extract("Comment:\nOperator: ana\n");
        assert!(!raw.contains_key("Comment"));
        assert_eq!(raw["Operator"], "ana");
    }

    #[test]
    fn test_custom_template() {
        let template = HeaderTemplate::compile("Batch {{ Batch }} of {{ Total }}\n");
        let raw = template.extract("Batch 3 of 7 boxes\n");
        assert_eq!(raw["Batch"], "3");
        assert_eq!(raw["Total"], "7 boxes");
    }
}
