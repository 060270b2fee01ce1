//! Resolution Diagnostics
//!
//! Non-fatal findings recorded while parsing, resolving or transforming.
//! They are returned to callers alongside values so an editor can show
//! them and an execution runtime can decide whether to be strict.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    EmptyReference,
    InvalidPath,
    UnresolvedPath,
    UnknownTransformation,
    TransformationFailed,
}

/// A single finding, tied to the path, reference or transformation it is
/// about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn empty_reference(raw: &str) -> Self {
        Self {
            kind: DiagnosticKind::EmptyReference,
            subject: raw.to_string(),
            message: format!("Reference '{}' has no path", raw),
        }
    }

    pub fn invalid_path(path: &str) -> Self {
        Self {
            kind: DiagnosticKind::InvalidPath,
            subject: path.to_string(),
            message: format!("'{}' is not a valid variable path", path),
        }
    }

    pub fn unresolved_path(path: &str) -> Self {
        Self {
            kind: DiagnosticKind::UnresolvedPath,
            subject: path.to_string(),
            message: format!("Variable '{}' could not be resolved", path),
        }
    }

    pub fn unknown_transformation(id: &str) -> Self {
        Self {
            kind: DiagnosticKind::UnknownTransformation,
            subject: id.to_string(),
            message: format!("Unknown transformation '{}'", id),
        }
    }

    pub fn transformation_failed(id: &str, reason: impl fmt::Display) -> Self {
        Self {
            kind: DiagnosticKind::TransformationFailed,
            subject: id.to_string(),
            message: format!("Transformation '{}' failed: {}", id, reason),
        }
    }

    /// Emits the diagnostic through the log facade. Unresolved paths are
    /// routine while editing and only logged at debug level.
    pub fn log(&self) {
        match self.kind {
            DiagnosticKind::UnresolvedPath | DiagnosticKind::EmptyReference => {
                debug!("{}", self.message)
            }
            _ => warn!("{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
