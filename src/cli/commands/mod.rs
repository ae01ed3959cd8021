//! CLI command implementations

pub mod completions;
pub mod config;
pub mod inventory;
pub mod offsets;
pub mod parse;
pub mod register;
pub mod run;
pub mod validate;
