//! Variable Definitions
//!
//! Describes a value that may be available to references, for editor
//! suggestion and validation. A definition says nothing about whether the
//! live context can resolve it yet.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Declared type of a variable.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Date,
    Null,
    Undefined,
    Any,
}

impl VariableType {
    /// Maps a form field's UI type to the type of the value it produces.
    /// Unrecognized UI types are treated as text.
    pub fn from_field_type(field_type: &str) -> Self {
        match field_type {
            "text" | "textarea" | "email" | "url" => Self::String,
            "number" => Self::Number,
            "toggle" => Self::Boolean,
            "date" | "time" => Self::Date,
            "checklist" => Self::Array,
            _ => Self::String,
        }
    }

    /// Infers the type of a concrete JSON value.
    pub fn of_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(_) => Self::Boolean,
            JsonValue::Number(_) => Self::Number,
            JsonValue::String(_) => Self::String,
            JsonValue::Array(_) => Self::Array,
            JsonValue::Object(_) => Self::Object,
        }
    }
}

/// Visibility of a variable within a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    Global,
    Workflow,
    Step,
    Local,
}

/// Where a variable comes from, used to group suggestions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    Trigger,
    Step,
    Form,
    User,
    System,
    Custom,
}

impl VariableCategory {
    /// Display order for grouped suggestions.
    pub const ALL: [VariableCategory; 6] = [
        Self::Trigger,
        Self::Form,
        Self::Step,
        Self::User,
        Self::System,
        Self::Custom,
    ];
}

/// A potentially-available value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    /// Unique identifier within a catalog
    pub id: String,

    /// Human-readable name shown in pickers
    pub name: String,

    /// Dotted path used inside `{{...}}`
    pub path: String,

    #[serde(rename = "type")]
    pub var_type: VariableType,

    pub scope: VariableScope,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<VariableCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,

    /// Trigger or step that produces the value
    #[serde(default)]
    pub source: String,

    /// Current value, for previews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
}

impl VariableDefinition {
    /// Creates a definition whose id and path are both `path`.
    ///
    /// # Example
    ///
    /// ```
    /// use stepvars::catalog::{VariableCategory, VariableDefinition, VariableScope, VariableType};
    ///
    /// let email = VariableDefinition::new(
    ///     "form.email",
    ///     "Email",
    ///     VariableType::String,
    ///     VariableScope::Workflow,
    /// )
    /// .with_category(VariableCategory::Form)
    /// .with_source("intake");
    /// assert_eq!(email.id, "form.email");
    /// ```
    pub fn new(
        path: impl Into<String>,
        name: impl Into<String>,
        var_type: VariableType,
        scope: VariableScope,
    ) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            name: name.into(),
            path,
            var_type,
            scope,
            category: None,
            description: None,
            example: None,
            source: String::new(),
            value: None,
        }
    }

    pub fn with_category(mut self, category: VariableCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_value(mut self, value: JsonValue) -> Self {
        self.value = Some(value);
        self
    }

    /// Case-insensitive substring match over name, path and description.
    /// `query` must already be lowercase.
    pub(crate) fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query)
            || self.path.to_lowercase().contains(query)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(query))
    }

    /// Returns true if this definition addresses `path` or one of its
    /// ancestors (`form` covers `form.email` and `form[0]`).
    pub fn covers(&self, path: &str) -> bool {
        match path.strip_prefix(self.path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
            None => false,
        }
    }

    pub(crate) fn apply(&mut self, update: VariableUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(var_type) = update.var_type {
            self.var_type = var_type;
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(example) = update.example {
            self.example = Some(example);
        }
        if let Some(value) = update.value {
            self.value = Some(value);
        }
    }
}

/// Partial edit of a definition. Unset fields are left as they are; id,
/// path, scope and source are fixed once created.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub var_type: Option<VariableType>,
    pub category: Option<VariableCategory>,
    pub description: Option<String>,
    pub example: Option<String>,
    pub value: Option<JsonValue>,
}
