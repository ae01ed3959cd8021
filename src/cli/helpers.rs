//! Shared helper functions for CLI commands

use std::path::Path;

use crate::cli::GlobalOpts;
use crate::core::Config;
use crate::entities::ComponentKind;
use crate::survey::{BatchMode, ConfirmationPort, TerminalPrompt};

/// Resolved configuration for this invocation
pub fn load_config(global: &GlobalOpts) -> miette::Result<Config> {
    Ok(Config::load(global.config.as_deref())?)
}

/// Terminal prompts when a person is attached, batch answers otherwise
pub fn prompt_port(global: &GlobalOpts) -> Box<dyn ConfirmationPort> {
    if global.batch || !console::user_attended_stderr() {
        Box::new(BatchMode)
    } else {
        Box::new(TerminalPrompt::new())
    }
}

/// Component kind from a `--type` value
pub fn parse_kind(value: &str) -> miette::Result<ComponentKind> {
    value.parse::<ComponentKind>().map_err(|e| {
        miette::miette!(
            help = "Use one of: baseplates, hexaboards, protomodules, modules",
            "{e}"
        )
    })
}

/// Kind implied by a report's parent folder
pub fn kind_from_path(path: &Path) -> Option<ComponentKind> {
    path.parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .and_then(ComponentKind::from_folder)
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            kind_from_path(Path::new("OGP_results/modules/m1.txt")),
            Some(ComponentKind::Modules)
        );
        assert_eq!(kind_from_path(Path::new("m1.txt")), None);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("Hexaboards").unwrap(), ComponentKind::Hexaboards);
        assert!(parse_kind("sensors").is_err());
    }

    #[test]
    fn test_batch_flag_forces_batch_mode() {
        let global = GlobalOpts {
            batch: true,
            ..GlobalOpts::default()
        };
        assert!(!prompt_port(&global).is_interactive());
    }
}
