//! Variable Reference Syntax
//!
//! Parsing and serialization of `{{path|transform:arg}}` references
//! embedded in step configuration text.
//!
//! # Structure
//!
//! - [`parser`]: Token scanning, editor helpers and the inverse serializer
//! - [`path`]: Dotted/indexed path segments and path validation

pub mod parser;
pub mod path;

pub use parser::{
    build_reference, extract_paths, find_reference_at_offset, has_references, parse_references,
    partial_path_at, TransformStep, VariableReference,
};
pub use path::{is_valid_path, parse_path, PathSegment};
