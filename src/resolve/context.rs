//! Resolution Context
//!
//! The three-tier value store a path is resolved against. Lookups overlay,
//! in increasing precedence, `globalVariables`, `variables` and
//! `stepOutputs`. Only the first path segment chooses a tier; the rest of
//! the path walks that tier's sub-tree without any deep merging.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::reference::{parse_path, PathSegment};
use crate::value::Value;

/// Values available to references during one editing or execution session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolutionContext {
    /// Lowest precedence.
    pub global_variables: Map<String, JsonValue>,
    /// Workflow and user-set values.
    pub variables: Map<String, JsonValue>,
    /// Step outputs keyed by step id. Highest precedence.
    pub step_outputs: Map<String, JsonValue>,
}

impl ResolutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.variables.insert(key.into(), value)
    }

    pub fn set_global_variable(
        &mut self,
        key: impl Into<String>,
        value: JsonValue,
    ) -> Option<JsonValue> {
        self.global_variables.insert(key.into(), value)
    }

    /// Records (or replaces) the output of a step as it completes.
    pub fn set_step_output(
        &mut self,
        step_id: impl Into<String>,
        output: JsonValue,
    ) -> Option<JsonValue> {
        self.step_outputs.insert(step_id.into(), output)
    }

    pub fn remove_step_output(&mut self, step_id: &str) -> Option<JsonValue> {
        self.step_outputs.remove(step_id)
    }

    /// Clears all three tiers.
    pub fn clear(&mut self) {
        self.global_variables.clear();
        self.variables.clear();
        self.step_outputs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.global_variables.is_empty()
            && self.variables.is_empty()
            && self.step_outputs.is_empty()
    }

    /// Looks up a top-level key across the tiers, highest precedence first.
    pub fn lookup_root(&self, key: &str) -> Option<&JsonValue> {
        self.step_outputs
            .get(key)
            .or_else(|| self.variables.get(key))
            .or_else(|| self.global_variables.get(key))
    }

    /// Overlays the tiers into one top-level map.
    pub fn merged(&self) -> Map<String, JsonValue> {
        let mut merged = self.global_variables.clone();
        merged.extend(self.variables.clone());
        merged.extend(self.step_outputs.clone());
        merged
    }

    /// Resolves a path string. Missing data yields [`Value::Undefined`].
    pub fn resolve_path(&self, path: &str) -> Value {
        self.resolve(&parse_path(path))
    }

    /// Folds over parsed segments. Absent keys, traversal through null or
    /// scalars, non-sequence containers and out-of-range indexes all yield
    /// [`Value::Undefined`].
    pub fn resolve(&self, segments: &[PathSegment]) -> Value {
        self.walk(segments)
            .map(|value| Value::from(value.as_ref()))
            .unwrap_or(Value::Undefined)
    }

    fn walk(&self, segments: &[PathSegment]) -> Option<Cow<'_, JsonValue>> {
        let (first, rest) = segments.split_first()?;
        let root = Cow::Borrowed(self.lookup_root(first.name())?);
        let mut current = match first {
            PathSegment::Field(_) => root,
            PathSegment::Index(_, index) => index_into(root, *index)?,
        };
        for segment in rest {
            current = step_into(current, segment)?;
        }
        Some(current)
    }
}

fn step_into<'a>(current: Cow<'a, JsonValue>, segment: &PathSegment) -> Option<Cow<'a, JsonValue>> {
    let child = field(current, segment.name())?;
    match segment {
        PathSegment::Field(_) => Some(child),
        PathSegment::Index(_, index) => index_into(child, *index),
    }
}

/// Property access on an object, plus `length` and numeric keys on arrays
/// and `length` on strings (counted in Unicode scalar values).
fn field<'a>(current: Cow<'a, JsonValue>, name: &str) -> Option<Cow<'a, JsonValue>> {
    match current {
        Cow::Borrowed(value) => lookup(value, name),
        Cow::Owned(value) => lookup(&value, name).map(|child| Cow::Owned(child.into_owned())),
    }
}

fn lookup<'a>(value: &'a JsonValue, name: &str) -> Option<Cow<'a, JsonValue>> {
    match value {
        JsonValue::Object(map) => map.get(name).map(Cow::Borrowed),
        JsonValue::Array(items) if name == "length" => {
            Some(Cow::Owned(JsonValue::from(items.len())))
        }
        JsonValue::Array(items) => name
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .map(Cow::Borrowed),
        JsonValue::String(s) if name == "length" => {
            Some(Cow::Owned(JsonValue::from(s.chars().count())))
        }
        _ => None,
    }
}

fn index_into(container: Cow<'_, JsonValue>, index: usize) -> Option<Cow<'_, JsonValue>> {
    match container {
        Cow::Borrowed(value) => value.as_array()?.get(index).map(Cow::Borrowed),
        Cow::Owned(value) => value.as_array()?.get(index).cloned().map(Cow::Owned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ResolutionContext {
        let mut ctx = ResolutionContext::new();
        ctx.set_global_variable("env", json!("prod"));
        ctx.set_global_variable("shared", json!({"from": "global"}));
        ctx.set_variable("shared", json!({"from": "variables"}));
        ctx.set_variable("items", json!(["a", "b", "c"]));
        ctx.set_variable("user", json!({"name": "Ada", "manager": null, "tags": [{"id": 7}]}));
        ctx.set_step_output("fetch", json!({"status": 200, "body": {"rows": [1, 2]}}));
        ctx
    }

    #[test]
    fn test_resolve_nested_fields() {
        let ctx = context();
        assert_eq!(ctx.resolve_path("user.name"), Value::from("Ada"));
        assert_eq!(ctx.resolve_path("fetch.status"), Value::Number(200.0));
        assert_eq!(ctx.resolve_path("env"), Value::from("prod"));
    }

    #[test]
    fn test_array_indexing() {
        let ctx = context();
        assert_eq!(ctx.resolve_path("items[1]"), Value::from("b"));
        assert_eq!(ctx.resolve_path("items[5]"), Value::Undefined);
        assert_eq!(ctx.resolve_path("user.tags[0].id"), Value::Number(7.0));
        assert_eq!(ctx.resolve_path("fetch.body.rows[1]"), Value::Number(2.0));
        assert_eq!(ctx.resolve_path("user.name[0]"), Value::Undefined);
        assert_eq!(ctx.resolve_path("missing[0]"), Value::Undefined);
    }

    #[test]
    fn test_array_and_string_properties() {
        let ctx = context();
        assert_eq!(ctx.resolve_path("items.length"), Value::Number(3.0));
        assert_eq!(ctx.resolve_path("items.0"), Value::from("a"));
        assert_eq!(ctx.resolve_path("user.name.length"), Value::Number(3.0));
        assert_eq!(ctx.resolve_path("items.length.foo"), Value::Undefined);
    }

    #[test]
    fn test_top_level_precedence_without_deep_merge() {
        let ctx = context();
        assert_eq!(ctx.resolve_path("shared.from"), Value::from("variables"));

        let mut ctx = ctx;
        ctx.set_step_output("shared", json!({"other": 1}));
        assert_eq!(ctx.resolve_path("shared.from"), Value::Undefined);
        assert_eq!(ctx.resolve_path("shared.other"), Value::Number(1.0));
    }

    #[test]
    fn test_traversal_through_null_short_circuits() {
        let ctx = context();
        assert_eq!(ctx.resolve_path("user.manager"), Value::Null);
        assert_eq!(ctx.resolve_path("user.manager.name"), Value::Undefined);
        assert_eq!(ctx.resolve_path("user.name.first"), Value::Undefined);
    }

    #[test]
    fn test_empty_path_is_unresolved() {
        let ctx = context();
        assert_eq!(ctx.resolve_path(""), Value::Undefined);
        assert_eq!(ctx.resolve(&[]), Value::Undefined);
    }

    #[test]
    fn test_merged_overlay() {
        let merged = context().merged();
        assert_eq!(merged["shared"], json!({"from": "variables"}));
        assert!(merged.contains_key("fetch"));
        assert!(merged.contains_key("env"));
    }

    #[test]
    fn test_mutators() {
        let mut ctx = context();
        assert!(ctx.remove_step_output("fetch").is_some());
        assert_eq!(ctx.resolve_path("fetch.status"), Value::Undefined);
        ctx.clear();
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let ctx: ResolutionContext = serde_json::from_value(json!({
            "variables": {"a": 1},
            "stepOutputs": {"s1": {"ok": true}}
        }))
        .unwrap();
        assert_eq!(ctx.resolve_path("s1.ok"), Value::Bool(true));
        assert!(ctx.global_variables.is_empty());
    }
}
