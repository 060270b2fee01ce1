//! Stepvars - Variable Reference Resolution for Workflow Steps
//!
//! Substitutes `{{path|transform:arg}}` references in step configurations
//! with values from a layered runtime context, and keeps a catalog of the
//! variables a workflow makes available so editors can suggest and
//! validate references before anything runs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`reference`]: Reference syntax, paths and editor helpers
//! - [`value`]: The closed value type and its coercions
//! - [`transform`]: Transformation registry and built-in transformations
//! - [`resolve`]: Resolution context and the resolution engine
//! - [`catalog`]: Known variable definitions for suggestion and validation
//! - [`diagnostics`]: Non-fatal findings reported by resolution
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use stepvars::{ResolutionContext, ResolutionEngine};
//!
//! let mut context = ResolutionContext::new();
//! context.set_variable("form", json!({"email": " USER@X.COM "}));
//! context.set_step_output("fetch", json!({"items": ["a", "b", "c"]}));
//!
//! let engine = ResolutionEngine::default();
//! let text = engine.resolve_in_string(
//!     "Welcome {{form.email|lowercase|trim}}, first item {{fetch.items[0]}}",
//!     &context,
//! );
//! assert_eq!(text, "Welcome user@x.com, first item a");
//! ```

pub mod catalog;
pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod reference;
pub mod resolve;
pub mod transform;
pub mod value;

// Re-export commonly used types
pub use catalog::{VariableCatalog, VariableDefinition, WorkflowSchema};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{CatalogError, LoadError, ResolveError, TransformError};
pub use reference::{build_reference, parse_references, VariableReference};
pub use resolve::{EngineOptions, ResolutionContext, ResolutionEngine, UnresolvedPolicy};
pub use transform::{Transformation, TransformationRegistry};
pub use value::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Stepvars";
