//! Variable Catalog
//!
//! Known variable definitions used for editor suggestions and template
//! validation, kept apart from the live context that actual lookups use.
//!
//! # Structure
//!
//! - [`model`]: Definitions, scopes, categories and partial updates
//! - [`schema`]: Workflow schema and execution snapshot inputs
//! - [`store`]: The catalog itself, with its queries

pub mod model;
pub mod schema;
pub mod store;

use std::path::Path;

use crate::error::LoadError;

pub use model::{VariableCategory, VariableDefinition, VariableScope, VariableType, VariableUpdate};
pub use schema::{
    ExecutionSnapshot, FormField, OutputField, StepOutputRecord, StepSchema, TriggerSchema,
    WorkflowSchema,
};
pub use store::{VariableCatalog, VariableGroup};

/// Loads a workflow schema from a YAML or JSON file.
pub fn load_schema(path: impl AsRef<Path>) -> Result<WorkflowSchema, LoadError> {
    WorkflowSchema::load(path)
}

/// Loads an execution snapshot from a YAML or JSON file.
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<ExecutionSnapshot, LoadError> {
    ExecutionSnapshot::load(path)
}
