//! Error Types
//!
//! Resolution never fails on bad templates or missing data; these errors
//! cover the operations that can: registering transformations, strict
//! resolution, catalog edits and loading input files.

use std::path::PathBuf;

use thiserror::Error;

/// Failure inside a single transformation, or while registering one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("{transformation}: invalid argument '{argument}'")]
    InvalidArgument {
        transformation: String,
        argument: String,
    },

    #[error("{transformation}: {reason}")]
    InvalidInput {
        transformation: String,
        reason: String,
    },

    #[error("transformation '{0}' panicked")]
    Panicked(String),

    #[error("transformation '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Strict resolution refused to degrade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unresolved variables: {}", .paths.join(", "))]
    Unresolved { paths: Vec<String> },
}

/// Catalog edits that reference a missing or duplicate definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("variable '{0}' already exists")]
    DuplicateVariable(String),

    #[error("variable '{0}' not found")]
    VariableNotFound(String),
}

/// Reading a schema, snapshot or options file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{}': {source}. Check the file format.", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
