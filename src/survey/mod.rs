//! Survey reports - template parsing, operator prompts and derived artifacts

pub mod artifacts;
pub mod confirm;
pub mod parser;
pub mod template;

pub use artifacts::{ArtifactError, ArtifactPaths, ArtifactWriter};
pub use confirm::{BatchMode, ConfirmationPort, TerminalPrompt};
pub use parser::{ParseError, ReportParser, SurveyReport};
pub use template::HeaderTemplate;
