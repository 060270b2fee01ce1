//! Document Loading
//!
//! Reads workflow schemas, execution snapshots and engine options from
//! disk. Files may be YAML or JSON; JSON is parsed by the YAML reader.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::de::DeserializeOwned;

use crate::error::LoadError;

/// Loads and deserializes a YAML or JSON document.
///
/// # Example
///
/// ```rust,no_run
/// use stepvars::catalog::WorkflowSchema;
/// use stepvars::loader::load_document;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let schema: WorkflowSchema = load_document("workflow.yaml")?;
///     println!("Loaded {} steps", schema.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, LoadError> {
    let path = path.as_ref();
    info!("Loading {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Document loaded ({} bytes)", content.len());

    serde_yaml::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
