//! Schema module - embedded schemas and entity templates

pub mod registry;
pub mod template;
