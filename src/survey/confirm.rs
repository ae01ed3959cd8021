//! Operator prompts used while repairing a survey
//!
//! Parsing and ingestion never talk to the terminal directly; they ask a
//! [`ConfirmationPort`]. The CLI picks [`TerminalPrompt`] when a person is
//! attached and [`BatchMode`] otherwise.

use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use tracing::debug;

/// Source of operator decisions
pub trait ConfirmationPort {
    /// Whether answers come from a person (batch mode aborts instead of asking)
    fn is_interactive(&self) -> bool;

    /// Ask a yes/no question
    fn confirm(&mut self, prompt: &str, default: bool) -> bool;

    /// Ask for a free-text value; `None` when the operator gives nothing
    fn input(&mut self, prompt: &str) -> Option<String>;
}

/// Prompts on the attached terminal
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationPort for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        true
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> bool {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .unwrap_or(false)
    }

    fn input(&mut self, prompt: &str) -> Option<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Unattended runs: every question is declined
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchMode;

impl ConfirmationPort for BatchMode {
    fn is_interactive(&self) -> bool {
        false
    }

    fn confirm(&mut self, prompt: &str, _default: bool) -> bool {
        debug!(prompt, "declined (batch mode)");
        false
    }

    fn input(&mut self, prompt: &str) -> Option<String> {
        debug!(prompt, "no input (batch mode)");
        None
    }
}

/// Pre-recorded answers, consumed in order
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<Answer>,
    pub asked: Vec<String>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub enum Answer {
    Yes,
    No,
    Text(&'static str),
    Nothing,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

#[cfg(test)]
impl ConfirmationPort for ScriptedPrompt {
    fn is_interactive(&self) -> bool {
        true
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> bool {
        self.asked.push(prompt.to_string());
        match self.answers.pop_front() {
            Some(Answer::Yes) => true,
            Some(Answer::No) => false,
            _ => default,
        }
    }

    fn input(&mut self, prompt: &str) -> Option<String> {
        self.asked.push(prompt.to_string());
        match self.answers.pop_front() {
            Some(Answer::Text(s)) => Some(s.to_string()),
            _ => None,
        }
    }
}
