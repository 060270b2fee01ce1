//! Reference Resolution
//!
//! Turns templates into concrete step inputs.
//!
//! # Structure
//!
//! - [`context`]: The layered global/workflow/step-output value store and
//!   the path walk over it
//! - [`engine`]: String and deep substitution, preview and diagnostics

pub mod context;
pub mod engine;

pub use context::ResolutionContext;
pub use engine::{
    EngineOptions, PreviewReport, ReferencePreview, Resolution, ResolutionEngine, UnresolvedPolicy,
};
