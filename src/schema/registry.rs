//! Embedded JSON schemas

use rust_embed::Embed;
use std::collections::BTreeMap;

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// Schema for `{ComponentID}_{Operator}_meta.yaml`
pub const SURVEY_META: &str = "survey_meta.schema.json";

/// Schemas by file name
pub struct SchemaRegistry {
    schemas: BTreeMap<String, String>,
}

impl SchemaRegistry {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.schemas.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        let schemas = EmbeddedSchemas::iter()
            .filter_map(|name| {
                let file = EmbeddedSchemas::get(&name)?;
                let text = String::from_utf8(file.data.into_owned()).ok()?;
                Some((name.into_owned(), text))
            })
            .collect();
        Self { schemas }
    }
}
