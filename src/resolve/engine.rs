//! Resolution Engine
//!
//! Composes the reference parser, the context path walk and the
//! transformation registry to substitute references in strings and in
//! arbitrary JSON-shaped step configurations.
//!
//! Resolution never fails: missing data and faulty transformations degrade
//! to best-effort text and are reported as [`Diagnostic`]s. Callers that
//! need to refuse degraded output use [`ResolutionEngine::try_resolve_in_string`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::context::ResolutionContext;
use crate::diagnostics::Diagnostic;
use crate::error::{LoadError, ResolveError};
use crate::loader::load_document;
use crate::reference::{is_valid_path, parse_references, VariableReference};
use crate::transform::TransformationRegistry;
use crate::value::Value;

/// What to substitute when a reference ends up undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// The literal text `undefined`.
    #[default]
    Literal,
    /// Nothing.
    Empty,
    /// The original `{{...}}` token, untouched.
    Keep,
}

impl FromStr for UnresolvedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" => Ok(Self::Literal),
            "empty" => Ok(Self::Empty),
            "keep" => Ok(Self::Keep),
            other => Err(format!(
                "Invalid unresolved policy '{}' (expected literal, empty or keep)",
                other
            )),
        }
    }
}

impl fmt::Display for UnresolvedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Literal => "literal",
            Self::Empty => "empty",
            Self::Keep => "keep",
        };
        write!(f, "{}", name)
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    pub on_unresolved: UnresolvedPolicy,
}

impl EngineOptions {
    /// Loads options from a YAML or JSON file. Missing fields keep their
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_document(path)
    }
}

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Value after the transformation pipeline.
    pub value: Value,
    /// Whether the path addressed a definite (non-null) value.
    pub resolved: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-reference entry of a [`PreviewReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePreview {
    pub raw: String,
    pub path: String,
    pub value: Value,
    pub resolved: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Editor-facing view of a template against a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub original: String,
    pub resolved: String,
    pub variables: Vec<ReferencePreview>,
}

impl PreviewReport {
    /// Paths of references that did not resolve.
    pub fn unresolved(&self) -> impl Iterator<Item = &ReferencePreview> {
        self.variables.iter().filter(|v| !v.resolved)
    }
}

/// Resolves references against a [`ResolutionContext`].
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stepvars::resolve::{ResolutionContext, ResolutionEngine};
///
/// let mut context = ResolutionContext::new();
/// context.set_variable("user", json!({"name": "ada lovelace"}));
///
/// let engine = ResolutionEngine::default();
/// let text = engine.resolve_in_string("Hello {{user.name|capitalize}}", &context);
/// assert_eq!(text, "Hello Ada Lovelace");
/// ```
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    registry: Arc<TransformationRegistry>,
    options: EngineOptions,
}

impl Default for ResolutionEngine {
    fn default() -> Self {
        Self::new(Arc::new(TransformationRegistry::with_builtins()))
    }
}

impl ResolutionEngine {
    /// Creates an engine over a shared registry with default options.
    pub fn new(registry: Arc<TransformationRegistry>) -> Self {
        Self {
            registry,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<TransformationRegistry> {
        &self.registry
    }

    /// Resolves a reference's path, then folds its transformations left to
    /// right.
    pub fn resolve_reference(
        &self,
        reference: &VariableReference,
        context: &ResolutionContext,
    ) -> Resolution {
        let mut diagnostics = Vec::new();

        let found = context.resolve(&reference.segments);
        let resolved = !found.is_nullish();
        if !resolved {
            let diagnostic = if reference.is_empty() {
                Diagnostic::empty_reference(&reference.raw)
            } else {
                Diagnostic::unresolved_path(&reference.path)
            };
            diagnostic.log();
            diagnostics.push(diagnostic);
        }

        let value = reference
            .transformations
            .iter()
            .fold(found, |value, step| {
                let outcome = self.registry.apply_step(step, &value);
                diagnostics.extend(outcome.diagnostic);
                outcome.value
            });

        Resolution {
            value,
            resolved,
            diagnostics,
        }
    }

    /// Substitutes every reference in `text`.
    ///
    /// Each distinct reference is resolved once and its string form replaces
    /// every occurrence. Substituted values are not rescanned.
    pub fn resolve_in_string(&self, text: &str, context: &ResolutionContext) -> String {
        let references = parse_references(text);
        if references.is_empty() {
            return text.to_string();
        }

        let mut substitutions: HashMap<&str, String> = HashMap::new();
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for reference in &references {
            out.push_str(&text[last..reference.start]);
            let substitution = substitutions.entry(reference.raw.as_str()).or_insert_with(|| {
                let resolution = self.resolve_reference(reference, context);
                self.substitution_for(reference, &resolution)
            });
            out.push_str(substitution);
            last = reference.end;
        }
        out.push_str(&text[last..]);

        debug!(
            "Resolved {} reference(s) ({} distinct)",
            references.len(),
            substitutions.len()
        );
        out
    }

    /// Like [`resolve_in_string`](Self::resolve_in_string), but fails when
    /// any referenced path is unresolved.
    pub fn try_resolve_in_string(
        &self,
        text: &str,
        context: &ResolutionContext,
    ) -> Result<String, ResolveError> {
        let paths = self.unresolved_paths(text, context);
        if !paths.is_empty() {
            return Err(ResolveError::Unresolved { paths });
        }
        Ok(self.resolve_in_string(text, context))
    }

    /// Resolves every string inside a JSON-shaped value, preserving its
    /// structure and object keys. Non-string scalars are returned unchanged.
    pub fn resolve_deep(&self, value: &JsonValue, context: &ResolutionContext) -> JsonValue {
        match value {
            JsonValue::String(text) => JsonValue::String(self.resolve_in_string(text, context)),
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.resolve_deep(item, context))
                    .collect(),
            ),
            JsonValue::Object(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.resolve_deep(item, context)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Returns true when every referenced path resolves.
    pub fn can_resolve_all(&self, text: &str, context: &ResolutionContext) -> bool {
        self.unresolved_paths(text, context).is_empty()
    }

    /// Distinct referenced paths that do not resolve, in order of first use.
    pub fn unresolved_paths(&self, text: &str, context: &ResolutionContext) -> Vec<String> {
        let mut seen = HashSet::new();
        parse_references(text)
            .into_iter()
            .filter(|reference| seen.insert(reference.path.clone()))
            .filter(|reference| context.resolve(&reference.segments).is_nullish())
            .map(|reference| reference.path)
            .collect()
    }

    /// Resolves `text` and reports each distinct reference's outcome.
    pub fn preview(&self, text: &str, context: &ResolutionContext) -> PreviewReport {
        let mut seen = HashSet::new();
        let variables = parse_references(text)
            .into_iter()
            .filter(|reference| seen.insert(reference.raw.clone()))
            .map(|reference| {
                let resolution = self.resolve_reference(&reference, context);
                ReferencePreview {
                    raw: reference.raw,
                    path: reference.path,
                    value: resolution.value,
                    resolved: resolution.resolved,
                    diagnostics: resolution.diagnostics,
                }
            })
            .collect();

        PreviewReport {
            original: text.to_string(),
            resolved: self.resolve_in_string(text, context),
            variables,
        }
    }

    /// Flattens the merged context into every addressable path, e.g.
    /// `fetch`, `fetch.body`, `fetch.body.rows`, `fetch.body.rows[0]`.
    pub fn available_paths(&self, context: &ResolutionContext) -> Vec<String> {
        let mut paths = Vec::new();
        collect_paths(&context.merged(), "", &mut paths);
        paths
    }

    /// Static checks that need no context: empty references, invalid
    /// paths and unknown transformations.
    pub fn validate_template(&self, text: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for reference in parse_references(text) {
            if reference.is_empty() {
                diagnostics.push(Diagnostic::empty_reference(&reference.raw));
            } else if !is_valid_path(&reference.path) {
                diagnostics.push(Diagnostic::invalid_path(&reference.path));
            }
            for step in &reference.transformations {
                if !self.registry.has(&step.name) {
                    diagnostics.push(Diagnostic::unknown_transformation(&step.name));
                }
            }
        }
        diagnostics
    }

    fn substitution_for(&self, reference: &VariableReference, resolution: &Resolution) -> String {
        if !resolution.value.is_undefined() {
            return resolution.value.to_display_string();
        }
        match self.options.on_unresolved {
            UnresolvedPolicy::Literal => resolution.value.to_display_string(),
            UnresolvedPolicy::Empty => String::new(),
            UnresolvedPolicy::Keep => reference.raw.clone(),
        }
    }
}

fn collect_paths(map: &Map<String, JsonValue>, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        out.push(path.clone());
        collect_value_paths(value, &path, out);
    }
}

fn collect_value_paths(value: &JsonValue, path: &str, out: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) => collect_paths(map, path, out),
        JsonValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, index);
                out.push(item_path.clone());
                collect_value_paths(item, &item_path, out);
            }
        }
        _ => {}
    }
}
