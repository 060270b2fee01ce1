//! Variable Catalog
//!
//! Holds the known variable definitions for a workflow alongside the live
//! resolution context. The catalog has no internal locking: callers
//! serialize writes, and reads are safe while no write is in progress.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde_json::Value as JsonValue;

use super::model::{
    VariableCategory, VariableDefinition, VariableScope, VariableType, VariableUpdate,
};
use super::schema::{ExecutionSnapshot, WorkflowSchema};
use crate::error::CatalogError;
use crate::reference::{extract_paths, find_reference_at_offset, partial_path_at};
use crate::resolve::ResolutionContext;

/// Definitions sharing a category, as shown in a variable picker.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableGroup<'a> {
    /// `None` collects definitions without a category
    pub category: Option<VariableCategory>,
    pub variables: Vec<&'a VariableDefinition>,
}

/// Known variables plus the live context used to resolve them.
#[derive(Debug, Clone, Default)]
pub struct VariableCatalog {
    definitions: Vec<VariableDefinition>,
    context: ResolutionContext,
}

impl VariableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the definition set with what a workflow schema declares.
    ///
    /// Emits a `trigger` definition when the workflow has a trigger, one
    /// `form.<fieldId>` definition per form field, and one `<stepId>.<key>`
    /// definition per declared step output. The live context is untouched.
    pub fn initialize_from_workflow_schema(&mut self, schema: &WorkflowSchema) {
        let mut definitions = Vec::new();

        if let Some(trigger) = &schema.trigger {
            let description = match (&trigger.description, trigger.kind.as_str()) {
                (Some(description), _) => description.clone(),
                (None, "") => "Data received by the trigger".to_string(),
                (None, kind) => format!("Data received by the {} trigger", kind),
            };
            let scope = VariableScope::Global;
            definitions.push(
                VariableDefinition::new("trigger", "Trigger", VariableType::Object, scope)
                    .with_category(VariableCategory::Trigger)
                    .with_source("trigger")
                    .with_description(description),
            );
        }

        for step in &schema.steps {
            for field in &step.form_fields {
                let name = if field.label.is_empty() { &field.id } else { &field.label };
                let mut definition = VariableDefinition::new(
                    format!("form.{}", field.id),
                    name.clone(),
                    field.variable_type(),
                    VariableScope::Workflow,
                )
                .with_category(VariableCategory::Form)
                .with_source(step.id.clone());
                definition.description = field.description.clone();
                definitions.push(definition);
            }

            for output in &step.outputs {
                let mut definition = VariableDefinition::new(
                    format!("{}.{}", step.id, output.key),
                    output.key.clone(),
                    output.output_type,
                    VariableScope::Step,
                )
                .with_category(VariableCategory::Step)
                .with_source(step.id.clone());
                definition.description = output.description.clone();
                definitions.push(definition);
            }
        }

        self.definitions = dedupe(definitions);
        info!(
            "Catalog initialized from workflow schema ({} definitions)",
            self.definitions.len()
        );
    }

    /// Replaces both the definitions and the live context with what an
    /// execution has produced so far.
    ///
    /// Step outputs are flattened one level: each top-level key of an
    /// object output becomes its own `<stepId>.<key>` definition.
    pub fn initialize_from_execution_context(&mut self, snapshot: &ExecutionSnapshot) {
        let context = snapshot.to_context();

        let globals: Vec<VariableDefinition> = context
            .global_variables
            .iter()
            .map(|(key, value)| {
                tier_definition(key, value, VariableScope::Global, VariableCategory::System)
            })
            .collect();

        let variables: Vec<VariableDefinition> = context
            .variables
            .iter()
            .map(|(key, value)| {
                tier_definition(key, value, VariableScope::Workflow, VariableCategory::Custom)
            })
            .collect();

        // Completion order, each step once with the output the context holds.
        let mut steps = Vec::new();
        for (position, record) in snapshot.steps.iter().enumerate() {
            let recorded_again = snapshot.steps[position + 1..]
                .iter()
                .any(|later| later.step_id == record.step_id);
            if recorded_again {
                debug!("Step '{}' recorded again, keeping the latest output", record.step_id);
                continue;
            }
            let step_id = &record.step_id;
            match context.step_outputs.get(step_id) {
                Some(JsonValue::Object(fields)) => {
                    for (key, value) in fields {
                        steps.push(step_output_definition(
                            format!("{}.{}", step_id, key),
                            key.clone(),
                            step_id,
                            value,
                        ));
                    }
                }
                Some(other) => steps.push(step_output_definition(
                    step_id.clone(),
                    step_id.clone(),
                    step_id,
                    other,
                )),
                None => {}
            }
        }

        self.definitions = by_precedence(vec![globals, variables, steps]);
        self.context = context;
        info!(
            "Catalog initialized from execution context ({} definitions, {} steps)",
            self.definitions.len(),
            snapshot.steps.len()
        );
    }

    /// Adds a definition. Ids are unique within the catalog.
    pub fn add(&mut self, definition: VariableDefinition) -> Result<(), CatalogError> {
        if self.get(&definition.id).is_some() {
            return Err(CatalogError::DuplicateVariable(definition.id));
        }
        debug!("Adding variable '{}'", definition.id);
        self.definitions.push(definition);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<VariableDefinition, CatalogError> {
        let position = self
            .definitions
            .iter()
            .position(|definition| definition.id == id)
            .ok_or_else(|| CatalogError::VariableNotFound(id.to_string()))?;
        debug!("Removing variable '{}'", id);
        Ok(self.definitions.remove(position))
    }

    /// Applies a partial update to the definition with `id`.
    pub fn update(
        &mut self,
        id: &str,
        update: VariableUpdate,
    ) -> Result<&VariableDefinition, CatalogError> {
        let definition = self
            .definitions
            .iter_mut()
            .find(|definition| definition.id == id)
            .ok_or_else(|| CatalogError::VariableNotFound(id.to_string()))?;
        definition.apply(update);
        Ok(definition)
    }

    /// Drops every definition and empties the live context.
    pub fn clear(&mut self) {
        self.definitions.clear();
        self.context.clear();
    }

    pub fn get(&self, id: &str) -> Option<&VariableDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    /// All definitions in insertion order.
    pub fn all(&self) -> &[VariableDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn by_scope(&self, scope: VariableScope) -> Vec<&VariableDefinition> {
        self.definitions.iter().filter(|d| d.scope == scope).collect()
    }

    pub fn by_category(&self, category: VariableCategory) -> Vec<&VariableDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.category == Some(category))
            .collect()
    }

    pub fn by_source(&self, source: &str) -> Vec<&VariableDefinition> {
        self.definitions.iter().filter(|d| d.source == source).collect()
    }

    /// Case-insensitive substring search over name, path and description.
    /// Results keep catalog order.
    pub fn search(&self, query: &str) -> Vec<&VariableDefinition> {
        let query = query.to_lowercase();
        self.definitions.iter().filter(|d| d.matches(&query)).collect()
    }

    /// Groups definitions by category in picker order. Uncategorized
    /// definitions come last; empty groups are omitted.
    pub fn groups_by_category(&self) -> Vec<VariableGroup<'_>> {
        VariableCategory::ALL
            .iter()
            .map(|category| Some(*category))
            .chain(std::iter::once(None))
            .map(|category| VariableGroup {
                category,
                variables: self
                    .definitions
                    .iter()
                    .filter(|d| d.category == category)
                    .collect(),
            })
            .filter(|group| !group.variables.is_empty())
            .collect()
    }

    /// The live context resolution calls should use.
    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ResolutionContext {
        &mut self.context
    }

    /// Suggests definitions for the reference under the cursor.
    ///
    /// Works both while the reference is still being typed (`{{form.em`)
    /// and when the cursor sits inside a complete one.
    pub fn completions_at(&self, text: &str, offset: usize) -> Vec<&VariableDefinition> {
        let partial = partial_path_at(text, offset)
            .or_else(|| find_reference_at_offset(text, offset).map(|reference| reference.path));

        match partial {
            Some(prefix) => self
                .definitions
                .iter()
                .filter(|d| d.path.starts_with(prefix.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Paths referenced in `text` that no definition covers, in first-seen
    /// order. Empty references are ignored.
    pub fn unknown_paths(&self, text: &str) -> Vec<String> {
        extract_paths(text)
            .into_iter()
            .filter(|path| !path.is_empty())
            .filter(|path| !self.definitions.iter().any(|d| d.covers(path)))
            .collect()
    }
}

fn tier_definition(
    key: &str,
    value: &JsonValue,
    scope: VariableScope,
    category: VariableCategory,
) -> VariableDefinition {
    VariableDefinition::new(key, key, VariableType::of_json(value), scope)
        .with_category(category)
        .with_value(value.clone())
}

fn step_output_definition(
    path: String,
    name: String,
    step_id: &str,
    value: &JsonValue,
) -> VariableDefinition {
    VariableDefinition::new(path, name, VariableType::of_json(value), VariableScope::Step)
        .with_category(VariableCategory::Step)
        .with_source(step_id)
        .with_value(value.clone())
}

/// Concatenates tiers given in increasing precedence. When an id appears in
/// more than one tier, only the highest tier keeps it, matching the lookup
/// order of [`ResolutionContext::lookup_root`].
fn by_precedence(tiers: Vec<Vec<VariableDefinition>>) -> Vec<VariableDefinition> {
    let mut claimed = HashSet::new();
    let mut kept: Vec<Vec<VariableDefinition>> = tiers
        .into_iter()
        .rev()
        .map(|tier| {
            tier.into_iter()
                .filter(|definition| {
                    let fresh = claimed.insert(definition.id.clone());
                    if !fresh {
                        debug!("Variable '{}' shadowed by a higher tier", definition.id);
                    }
                    fresh
                })
                .collect()
        })
        .collect();
    kept.reverse();
    kept.concat()
}

/// Keeps the first definition for each id.
fn dedupe(definitions: Vec<VariableDefinition>) -> Vec<VariableDefinition> {
    let mut seen = HashSet::new();
    definitions
        .into_iter()
        .filter(|definition| {
            let fresh = seen.insert(definition.id.clone());
            if !fresh {
                warn!("Duplicate variable '{}' ignored", definition.id);
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::{FormField, OutputField, StepSchema, TriggerSchema};
    use crate::resolve::ResolutionEngine;
    use serde_json::json;

    fn onboarding_schema() -> WorkflowSchema {
        WorkflowSchema::new()
            .with_trigger(TriggerSchema::new("form"))
            .with_step(
                StepSchema::new("intake")
                    .with_form_field(FormField::new("email", "Email", "email")),
            )
    }

    #[test]
    fn test_schema_with_trigger_and_form_field() {
        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_workflow_schema(&onboarding_schema());

        assert_eq!(catalog.len(), 2);
        let trigger = catalog.get("trigger").unwrap();
        assert_eq!(trigger.category, Some(VariableCategory::Trigger));
        let email = catalog.get("form.email").unwrap();
        assert_eq!(email.category, Some(VariableCategory::Form));
        assert_eq!(email.var_type, VariableType::String);
        assert_eq!(email.source, "intake");

        let mut context = ResolutionContext::new();
        context.set_variable("form", json!({"email": " USER@X.COM "}));
        let engine = ResolutionEngine::default();
        assert_eq!(
            engine.resolve_in_string("Welcome {{form.email|lowercase|trim}}", &context),
            "Welcome user@x.com"
        );
    }

    #[test]
    fn test_schema_reinitialize_replaces_definitions() {
        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_workflow_schema(&onboarding_schema());

        let schema = WorkflowSchema::new().with_step(
            StepSchema::new("fetch")
                .with_output(OutputField::new("status", VariableType::Number))
                .with_form_field(FormField::new("age", "", "number")),
        );
        catalog.initialize_from_workflow_schema(&schema);

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("trigger").is_none());
        assert_eq!(catalog.get("form.age").unwrap().name, "age");
        let status = catalog.get("fetch.status").unwrap();
        assert_eq!(status.scope, VariableScope::Step);
        assert_eq!(status.var_type, VariableType::Number);
    }

    #[test]
    fn test_schema_duplicate_fields_keep_first() {
        let first = StepSchema::new("a").with_form_field(FormField::new("email", "First", "email"));
        let second =
            StepSchema::new("b").with_form_field(FormField::new("email", "Second", "text"));
        let schema = WorkflowSchema::new().with_step(first).with_step(second);
        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_workflow_schema(&schema);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("form.email").unwrap().name, "First");
    }

    #[test]
    fn test_execution_context_flattens_step_outputs() {
        let snapshot = ExecutionSnapshot::new()
            .with_variable("customer", json!({"name": "Sam"}))
            .with_step_output("fetch", json!({"status": 200, "body": {"ok": true}}))
            .with_step_output("count", json!(3));

        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_execution_context(&snapshot);

        let customer = catalog.get("customer").unwrap();
        assert_eq!(customer.scope, VariableScope::Workflow);
        assert_eq!(customer.category, Some(VariableCategory::Custom));

        let status = catalog.get("fetch.status").unwrap();
        assert_eq!(status.var_type, VariableType::Number);
        assert_eq!(status.value, Some(json!(200)));
        assert_eq!(catalog.get("fetch.body").unwrap().var_type, VariableType::Object);
        assert_eq!(catalog.get("count").unwrap().source, "count");
        assert_eq!(catalog.by_source("fetch").len(), 2);

        assert_eq!(catalog.context().step_outputs["fetch"]["status"], 200);
        let engine = ResolutionEngine::default();
        assert_eq!(
            engine.resolve_in_string("{{customer.name}}: {{fetch.status}}", catalog.context()),
            "Sam: 200"
        );
    }

    #[test]
    fn test_execution_context_keeps_latest_step_output() {
        let snapshot = ExecutionSnapshot::new()
            .with_step_output("fetch", json!({"status": 500}))
            .with_step_output("other", json!({"ok": true}))
            .with_step_output("fetch", json!({"status": 200}));

        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_execution_context(&snapshot);

        let status = catalog.get("fetch.status").unwrap();
        assert_eq!(status.value, Some(json!(200)));
        assert_eq!(catalog.context().step_outputs["fetch"]["status"], 200);
        let ids: Vec<_> = catalog.all().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["other.ok", "fetch.status"]);
    }

    #[test]
    fn test_execution_context_step_shadows_variable() {
        let mut snapshot = ExecutionSnapshot::new()
            .with_variable("count", json!("from variables"))
            .with_step_output("count", json!(3));
        snapshot.global_variables.insert("count".into(), json!(false));

        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_execution_context(&snapshot);

        assert_eq!(catalog.len(), 1);
        let count = catalog.get("count").unwrap();
        assert_eq!(count.scope, VariableScope::Step);
        assert_eq!(count.value, Some(json!(3)));
        assert_eq!(catalog.context().lookup_root("count"), Some(&json!(3)));
    }

    #[test]
    fn test_execution_context_globals_are_system() {
        let mut snapshot = ExecutionSnapshot::new();
        snapshot.global_variables.insert("env".into(), json!("prod"));

        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_execution_context(&snapshot);

        assert_eq!(catalog.by_scope(VariableScope::Global).len(), 1);
        assert_eq!(catalog.by_category(VariableCategory::System)[0].id, "env");
    }

    #[test]
    fn test_add_remove_update() {
        let mut catalog = VariableCatalog::new();
        let scope = VariableScope::Global;
        let def = VariableDefinition::new("user.id", "User ID", VariableType::String, scope);

        catalog.add(def.clone()).unwrap();
        assert!(matches!(
            catalog.add(def),
            Err(CatalogError::DuplicateVariable(id)) if id == "user.id"
        ));

        let updated = catalog
            .update(
                "user.id",
                VariableUpdate {
                    category: Some(VariableCategory::User),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.category, Some(VariableCategory::User));

        assert!(matches!(
            catalog.update("missing", VariableUpdate::default()),
            Err(CatalogError::VariableNotFound(_))
        ));

        let removed = catalog.remove("user.id").unwrap();
        assert_eq!(removed.name, "User ID");
        assert!(catalog.is_empty());
        assert!(catalog.remove("user.id").is_err());
    }

    #[test]
    fn test_clear_empties_context() {
        let mut catalog = VariableCatalog::new();
        let snapshot = ExecutionSnapshot::new().with_variable("a", json!(1));
        catalog.initialize_from_execution_context(&snapshot);
        assert!(!catalog.context().is_empty());

        catalog.clear();
        assert!(catalog.is_empty());
        assert!(catalog.context().is_empty());
    }

    #[test]
    fn test_search_keeps_catalog_order() {
        let mut catalog = VariableCatalog::new();
        for (path, name) in [("b.email", "Backup"), ("form.email", "Email"), ("phone", "Phone")] {
            catalog
                .add(VariableDefinition::new(
                    path,
                    name,
                    VariableType::String,
                    VariableScope::Workflow,
                ))
                .unwrap();
        }

        let ids: Vec<_> = catalog.search("EMAIL").iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b.email", "form.email"]);
        assert!(catalog.search("fax").is_empty());
    }

    #[test]
    fn test_groups_by_category() {
        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_workflow_schema(&onboarding_schema());
        catalog
            .add(VariableDefinition::new("loose", "Loose", VariableType::Any, VariableScope::Local))
            .unwrap();

        let groups = catalog.groups_by_category();
        let categories: Vec<_> = groups.iter().map(|g| g.category).collect();
        assert_eq!(
            categories,
            vec![Some(VariableCategory::Trigger), Some(VariableCategory::Form), None]
        );
        assert_eq!(groups[2].variables[0].id, "loose");
    }

    #[test]
    fn test_completions_at() {
        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_workflow_schema(
            &WorkflowSchema::new().with_step(
                StepSchema::new("s")
                    .with_form_field(FormField::new("email", "Email", "email"))
                    .with_form_field(FormField::new("name", "Name", "text")),
            ),
        );

        let typing = "Hi {{form.em";
        let ids: Vec<_> = catalog
            .completions_at(typing, typing.len())
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["form.email"]);

        let complete = "Hi {{form}} there";
        assert_eq!(catalog.completions_at(complete, 6).len(), 2);
        assert!(catalog.completions_at("no refs", 3).is_empty());
    }

    #[test]
    fn test_unknown_paths() {
        let mut catalog = VariableCatalog::new();
        catalog.initialize_from_workflow_schema(&onboarding_schema());

        let template = "{{form.email}} {{trigger.body.id}} {{user.name}} {{}} {{user.name}}";
        let unknown = catalog.unknown_paths(template);
        assert_eq!(unknown, vec!["user.name".to_string()]);
    }
}
