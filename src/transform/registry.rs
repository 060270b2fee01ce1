//! Transformation Registry
//!
//! Holds named value-to-value functions and applies them on behalf of the
//! resolution engine. The registry is append-only: transformations can be
//! registered at any time but never replaced or removed, so readers sharing
//! it through an `Arc` always see a consistent set.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::builtins::builtin_transformations;
use crate::diagnostics::Diagnostic;
use crate::error::TransformError;
use crate::reference::TransformStep;
use crate::value::Value;

/// Signature every transformation implements: the current value plus the
/// positional arguments written after its name.
pub type TransformFn = dyn Fn(&Value, &[String]) -> Result<Value, TransformError> + Send + Sync;

/// Grouping used by editor pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformCategory {
    String,
    Number,
    Array,
    Date,
    Conversion,
    Utility,
    Custom,
}

impl TransformCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Array => "array",
            Self::Date => "date",
            Self::Conversion => "conversion",
            Self::Utility => "utility",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TransformCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered transformation: display metadata plus its function.
#[derive(Clone)]
pub struct Transformation {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: TransformCategory,
    /// Sample reference shown in pickers, e.g. `{{name|truncate:10}}`.
    pub example: Option<String>,
    func: Arc<TransformFn>,
}

impl Transformation {
    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        category: TransformCategory,
        func: F,
    ) -> Self
    where
        F: Fn(&Value, &[String]) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category,
            example: None,
            func: Arc::new(func),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Runs the function, turning a panic into an error so one faulty
    /// custom transformation cannot take down resolution.
    pub fn call(&self, value: &Value, args: &[String]) -> Result<Value, TransformError> {
        catch_unwind(AssertUnwindSafe(|| (self.func)(value, args)))
            .unwrap_or_else(|_| Err(TransformError::Panicked(self.id.clone())))
    }
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Result of applying one transformation. On failure `value` is the input,
/// unchanged, and `diagnostic` says why.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    pub value: Value,
    pub diagnostic: Option<Diagnostic>,
}

impl TransformOutcome {
    fn applied(value: Value) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }

    fn skipped(value: &Value, diagnostic: Diagnostic) -> Self {
        diagnostic.log();
        Self {
            value: value.clone(),
            diagnostic: Some(diagnostic),
        }
    }
}

/// Registry of transformations, in registration order.
#[derive(Debug, Default)]
pub struct TransformationRegistry {
    entries: RwLock<Vec<Arc<Transformation>>>,
}

impl TransformationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in transformation set.
    pub fn with_builtins() -> Self {
        let entries = builtin_transformations().into_iter().map(Arc::new).collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Adds a transformation. Ids are unique; an existing id is never
    /// replaced.
    pub fn register(&self, transformation: Transformation) -> Result<(), TransformError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|t| t.id == transformation.id) {
            return Err(TransformError::AlreadyRegistered(transformation.id));
        }
        info!(
            "Registered transformation '{}' ({})",
            transformation.id, transformation.category
        );
        entries.push(Arc::new(transformation));
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Transformation>> {
        self.read().iter().find(|t| t.id == id).cloned()
    }

    /// All transformations in registration order.
    pub fn get_all(&self) -> Vec<Arc<Transformation>> {
        self.read().clone()
    }

    pub fn get_by_category(&self, category: TransformCategory) -> Vec<Arc<Transformation>> {
        self.read()
            .iter()
            .filter(|t| t.category == category)
            .cloned()
            .collect()
    }

    /// Distinct categories, in order of first registration.
    pub fn get_categories(&self) -> Vec<TransformCategory> {
        let mut categories = Vec::new();
        for t in self.read().iter() {
            if !categories.contains(&t.category) {
                categories.push(t.category);
            }
        }
        categories
    }

    /// Applies a transformation by compound identifier (`id:arg1:arg2`).
    ///
    /// Arguments embedded in the identifier come first, followed by
    /// `extra_args`. Unknown ids and failing transformations leave the
    /// value unchanged and report a diagnostic.
    pub fn apply(
        &self,
        identifier: &str,
        value: &Value,
        extra_args: &[String],
    ) -> TransformOutcome {
        let mut parts = identifier.split(':');
        let id = parts.next().unwrap_or_default().trim();
        let args: Vec<String> = parts
            .map(|arg| arg.trim().to_string())
            .chain(extra_args.iter().cloned())
            .collect();
        self.apply_with_args(id, value, &args)
    }

    /// Applies a parsed transformation step.
    pub fn apply_step(&self, step: &TransformStep, value: &Value) -> TransformOutcome {
        self.apply_with_args(&step.name, value, &step.args)
    }

    fn apply_with_args(&self, id: &str, value: &Value, args: &[String]) -> TransformOutcome {
        let Some(transformation) = self.get(id) else {
            return TransformOutcome::skipped(value, Diagnostic::unknown_transformation(id));
        };

        match transformation.call(value, args) {
            Ok(result) => {
                debug!("Applied '{}' to {} value", id, value.type_name());
                TransformOutcome::applied(result)
            }
            Err(e) => TransformOutcome::skipped(value, Diagnostic::transformation_failed(id, e)),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Transformation>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }
}
