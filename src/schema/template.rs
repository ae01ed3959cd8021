//! Template generation for configuration files

use miette::Diagnostic;
use rust_embed::Embed;
use tera::Tera;
use thiserror::Error;

use crate::core::Config;

#[derive(Embed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

const CONFIG_TEMPLATE: &str = "config.yaml.tera";

#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    #[diagnostic(code(rwogp::template::not_found))]
    NotFound(String),

    #[error("Template rendering error: {0}")]
    #[diagnostic(code(rwogp::template::render))]
    RenderError(String),
}

/// Template generator using Tera
pub struct TemplateGenerator {
    tera: Tera,
}

impl TemplateGenerator {
    /// Create a new template generator with embedded templates
    pub fn new() -> Result<Self, TemplateError> {
        let mut tera = Tera::default();

        for file in EmbeddedTemplates::iter() {
            let filename = file.as_ref();
            if let Some(content) = EmbeddedTemplates::get(filename) {
                if let Ok(template_str) = std::str::from_utf8(&content.data) {
                    tera.add_raw_template(filename, template_str)
                        .map_err(|e| TemplateError::RenderError(e.to_string()))?;
                }
            }
        }

        Ok(Self { tera })
    }

    /// Commented config file with every key resolved from `config`
    pub fn generate_config(&self, config: &Config) -> Result<String, TemplateError> {
        if !self.tera.get_template_names().any(|n| n == CONFIG_TEMPLATE) {
            return Err(TemplateError::NotFound(CONFIG_TEMPLATE.to_string()));
        }

        let mut context = tera::Context::new();
        context.insert("survey_dir", &config.survey_dir().display().to_string());
        context.insert("parsed_dir", &config.parsed_dir().display().to_string());
        context.insert("backup_dir", &config.backup_dir().display().to_string());
        context.insert("tray_dir", &config.tray_dir().display().to_string());
        context.insert("inventory_path", &config.inventory_path().display().to_string());
        context.insert("database", &config.database().display().to_string());
        context.insert("extensions", &config.extensions());
        context.insert("institution", &config.institution());

        self.tera
            .render(CONFIG_TEMPLATE, &context)
            .map_err(|e| TemplateError::RenderError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let text = TemplateGenerator::new()
            .unwrap()
            .generate_config(&Config::default())
            .unwrap();
        assert!(text.contains("survey_dir: OGP_results"));
        assert!(text.contains("# institution: CMU"));

        let parsed = Config::from_yaml(&text, "config.yaml").unwrap();
        assert_eq!(parsed, Config::default().resolved());
    }

    #[test]
    fn test_institution_rendered() {
        let config = Config {
            institution: Some("UCSB".to_string()),
            extensions: Some(vec!["txt".into(), "rpt".into()]),
            ..Config::default()
        };
        let text = TemplateGenerator::new().unwrap().generate_config(&config).unwrap();
        let parsed = Config::from_yaml(&text, "config.yaml").unwrap();
        assert_eq!(parsed.institution(), Some("UCSB"));
        assert_eq!(parsed.extensions(), vec!["txt", "rpt"]);
    }
}
