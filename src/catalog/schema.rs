//! Catalog Inputs
//!
//! Shapes of the workflow definition and execution snapshot the catalog is
//! initialized from.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: onboarding
//! trigger:
//!   type: form
//! steps:
//!   - id: intake
//!     formFields:
//!       - id: email
//!         label: Email
//!         type: email
//!       - id: plan
//!         label: Plan
//!         type: select
//!   - id: fetch_profile
//!     outputs:
//!       - key: status
//!         type: number
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::model::VariableType;
use crate::error::LoadError;
use crate::loader::load_document;
use crate::resolve::ResolutionContext;

/// Workflow definition as far as variables are concerned.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Present when the workflow starts from a trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerSchema>,

    /// Steps in workflow order
    #[serde(default)]
    pub steps: Vec<StepSchema>,
}

impl WorkflowSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(mut self, trigger: TriggerSchema) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_step(mut self, step: StepSchema) -> Self {
        self.steps.push(step);
        self
    }

    /// Loads a schema from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_document(path)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSchema {
    /// Trigger kind (e.g. "webhook", "form", "schedule")
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TriggerSchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: None,
        }
    }
}

/// One workflow step's declared inputs and outputs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepSchema {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_fields: Vec<FormField>,

    /// Declared shape of the step's output object
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputField>,
}

impl StepSchema {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: None,
            form_fields: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_form_field(mut self, field: FormField) -> Self {
        self.form_fields.push(field);
        self
    }

    pub fn with_output(mut self, output: OutputField) -> Self {
        self.outputs.push(output);
        self
    }
}

/// A form field declared by a step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FormField {
    pub id: String,

    #[serde(default)]
    pub label: String,

    /// UI type (text, email, number, toggle, date, checklist, ...)
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_field_type() -> String {
    "text".to_string()
}

impl FormField {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type: field_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Variable type of the value this field produces.
    pub fn variable_type(&self) -> VariableType {
        VariableType::from_field_type(&self.field_type)
    }
}

/// A key of a step's output object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputField {
    pub key: String,

    #[serde(rename = "type", default = "default_output_type")]
    pub output_type: VariableType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_output_type() -> VariableType {
    VariableType::Any
}

impl OutputField {
    pub fn new(key: impl Into<String>, output_type: VariableType) -> Self {
        Self {
            key: key.into(),
            output_type,
            description: None,
        }
    }
}

/// Runtime state captured from an execution.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub global_variables: Map<String, JsonValue>,

    #[serde(default)]
    pub variables: Map<String, JsonValue>,

    /// Completed steps, in completion order
    #[serde(default)]
    pub steps: Vec<StepOutputRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepOutputRecord {
    pub step_id: String,

    #[serde(default)]
    pub output: JsonValue,
}

impl ExecutionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn with_step_output(mut self, step_id: impl Into<String>, output: JsonValue) -> Self {
        self.steps.push(StepOutputRecord {
            step_id: step_id.into(),
            output,
        });
        self
    }

    /// Loads a snapshot from a YAML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        load_document(path)
    }

    /// Builds the live resolution context. A step recorded twice keeps its
    /// latest output.
    pub fn to_context(&self) -> ResolutionContext {
        let mut context = ResolutionContext {
            global_variables: self.global_variables.clone(),
            variables: self.variables.clone(),
            step_outputs: Map::new(),
        };
        for record in &self.steps {
            context.set_step_output(record.step_id.clone(), record.output.clone());
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_schema_yaml() {
        let yaml = r#"
id: onboarding
trigger:
  type: form
steps:
  - id: intake
    formFields:
      - id: email
        label: Email
        type: email
      - id: notes
        label: Notes
  - id: fetch_profile
    outputs:
      - key: status
        type: number
      - key: body
"#;
        let schema: WorkflowSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.id.as_deref(), Some("onboarding"));
        assert_eq!(schema.trigger.as_ref().unwrap().kind, "form");
        assert_eq!(schema.steps.len(), 2);
        assert_eq!(schema.steps[0].form_fields[1].field_type, "text");
        assert_eq!(schema.steps[1].outputs[0].output_type, VariableType::Number);
        assert_eq!(schema.steps[1].outputs[1].output_type, VariableType::Any);
    }

    #[test]
    fn test_builders_match_parsed() {
        let built = WorkflowSchema::new()
            .with_trigger(TriggerSchema::new("webhook"))
            .with_step(
                StepSchema::new(" intake ")
                    .with_form_field(FormField::new("email", "Email", "email")),
            );
        assert_eq!(built.steps[0].id, "intake");
        assert_eq!(built.steps[0].form_fields[0].variable_type(), VariableType::String);
    }

    #[test]
    fn test_snapshot_to_context() {
        let snapshot: ExecutionSnapshot = serde_json::from_value(json!({
            "variables": {"form": {"email": "a@b.c"}},
            "steps": [
                {"stepId": "fetch", "output": {"status": 500}},
                {"stepId": "fetch", "output": {"status": 200}}
            ]
        }))
        .unwrap();

        let context = snapshot.to_context();
        assert_eq!(context.variables["form"]["email"], "a@b.c");
        assert_eq!(context.step_outputs["fetch"]["status"], 200);
        assert!(context.global_variables.is_empty());
    }

    #[test]
    fn test_load_schema_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("workflow.json");
        std::fs::write(
            &path,
            r#"{"steps": [{"id": "s1",
                "formFields": [{"id": "age", "label": "Age", "type": "number"}]}]}"#,
        )
        .unwrap();

        let schema = WorkflowSchema::load(&path).unwrap();
        assert!(schema.trigger.is_none());
        assert_eq!(schema.steps[0].form_fields[0].variable_type(), VariableType::Number);
    }

    #[test]
    fn test_load_snapshot_missing_file() {
        assert!(ExecutionSnapshot::load("/nonexistent/snapshot.yaml").is_err());
    }
}
