//! Template context built from a source record
//!
//! The whole record is serialized with serde into a JSON tree, so expressions
//! can reach any field the record serializes by its wire name:
//! - `{{ .metadata.name }}`, `{{ .metadata.namespace }}`
//! - `{{ .metadata.labels.team }}`, `{{ .metadata.annotations["example.com/owner"] }}`
//! - `{{ .spec.resourceID }}`, `{{ .kind }}`

use minijinja::Value;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::Error;

/// Template context containing all values available for expression resolution
#[derive(Debug, Clone)]
pub struct TemplateContext {
    root: JsonValue,
    value: Value,
}

impl Default for TemplateContext {
    fn default() -> Self {
        let root = JsonValue::Object(Default::default());
        let value = Value::from_serialize(&root);
        Self { root, value }
    }
}

impl TemplateContext {
    /// Build the context from a record's serialized form
    ///
    /// # Errors
    ///
    /// Returns `Error::InvariantViolation` if the record does not serialize
    /// to a JSON object.
    pub fn from_resource<K: Serialize>(record: &K) -> Result<Self, Error> {
        let root = serde_json::to_value(record)
            .map_err(|e| Error::invariant(format!("failed to serialize template record: {}", e)))?;
        Self::from_json(root)
    }

    /// Build the context from an already serialized tree
    pub fn from_json(root: JsonValue) -> Result<Self, Error> {
        if !root.is_object() {
            return Err(Error::invariant(format!(
                "template context must be an object, got {}",
                json_type_name(&root)
            )));
        }
        let value = Value::from_serialize(&root);
        Ok(Self { root, value })
    }

    /// Look up a dot-separated path, e.g. `metadata.namespace`
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.root, |node, segment| node.get(segment))
    }

    /// The serialized record
    pub fn as_json(&self) -> &JsonValue {
        &self.root
    }

    /// Convert to minijinja Value for rendering
    pub fn to_value(&self) -> Value {
        self.value.clone()
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
