//! Reference Paths
//!
//! A path such as `steps.fetch.items[2].title` is split once into
//! [`PathSegment`]s so the resolver can fold over structured parts instead
//! of re-parsing strings.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// `name[digits]` as a single path part.
static INDEXED_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^\[\]]+)\[(\d+)\]$").expect("indexed part pattern is valid"));

/// `identifier('.'identifier)*`, each identifier optionally indexed.
static VALID_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\[\d+\])?(?:\.[A-Za-z_][A-Za-z0-9_]*(?:\[\d+\])?)*$")
        .expect("path pattern is valid")
});

/// One dotted part of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Plain key lookup.
    Field(String),
    /// Key lookup followed by a zero-based sequence index (`items[1]`).
    Index(String, usize),
}

impl PathSegment {
    /// Parses a single part. Anything that is not `name[N]` is a field,
    /// kept verbatim.
    pub fn parse(part: &str) -> Self {
        if let Some(caps) = INDEXED_PART.captures(part) {
            if let Ok(index) = caps[2].parse::<usize>() {
                return PathSegment::Index(caps[1].to_string(), index);
            }
        }
        PathSegment::Field(part.to_string())
    }

    /// The key this segment looks up.
    pub fn name(&self) -> &str {
        match self {
            PathSegment::Field(name) | PathSegment::Index(name, _) => name,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, "{}", name),
            PathSegment::Index(name, index) => write!(f, "{}[{}]", name, index),
        }
    }
}

/// Splits a path on `.` into segments. An empty path has no segments.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').map(PathSegment::parse).collect()
}

/// Checks that a path is a dotted chain of identifiers.
pub fn is_valid_path(path: &str) -> bool {
    VALID_PATH.is_match(path)
}
