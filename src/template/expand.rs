//! Value walker that renders every string inside a typed value
//!
//! The value is converted to a JSON tree once, walked, and converted back:
//! - strings are rendered by the [`TemplateEngine`]
//! - objects and arrays are walked recursively (keys are never rendered)
//! - null, numbers and booleans are copied unchanged
//!
//! The first failing field aborts the walk; no partially rendered value is
//! ever returned.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::context::TemplateContext;
use super::engine::TemplateEngine;
use super::error::TemplateError;
use crate::Error;

/// Render every string field of `value`, returning a new value of the same type
///
/// The caller's value is only borrowed and is never modified.
///
/// # Errors
///
/// Returns `Error::Template` for the first field that fails to render, and
/// `Error::InvariantViolation` if the rendered tree no longer fits `T`.
pub fn expand<T>(engine: &TemplateEngine, value: &T, ctx: &TemplateContext) -> Result<T, Error>
where
    T: Serialize + DeserializeOwned,
{
    let tree = serde_json::to_value(value)
        .map_err(|e| Error::invariant(format!("failed to serialize spec for rendering: {}", e)))?;

    let rendered = expand_json(engine, &tree, ctx)?;

    serde_json::from_value(rendered).map_err(|e| {
        Error::invariant(format!(
            "rendered spec does not match the target spec shape: {}",
            e
        ))
    })
}

/// Render every string inside a JSON tree
pub fn expand_json(
    engine: &TemplateEngine,
    value: &JsonValue,
    ctx: &TemplateContext,
) -> Result<JsonValue, TemplateError> {
    walk(engine, value, ctx, "")
}

fn walk(
    engine: &TemplateEngine,
    value: &JsonValue,
    ctx: &TemplateContext,
    path: &str,
) -> Result<JsonValue, TemplateError> {
    match value {
        JsonValue::String(s) => engine
            .render(s, ctx)
            .map(JsonValue::String)
            .map_err(|e| e.at(path)),
        JsonValue::Object(fields) => {
            let mut out = serde_json::Map::with_capacity(fields.len());
            for (key, field) in fields {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                out.insert(key.clone(), walk(engine, field, ctx, &child)?);
            }
            Ok(JsonValue::Object(out))
        }
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| walk(engine, item, ctx, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => Ok(value.clone()),
    }
}
