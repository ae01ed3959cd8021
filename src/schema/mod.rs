//! Schema system - metadata validation and config templates

pub mod registry;
pub mod template;
pub mod validator;

pub use registry::SchemaRegistry;
pub use template::{TemplateError, TemplateGenerator};
pub use validator::{MetaError, ValidationError, Validator};
