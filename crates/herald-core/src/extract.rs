//! Normalizes raw build documents into [`BuildSnapshot`]s.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::BuildSnapshot;

/// Discriminator of the action carrying build parameters.
pub const PARAMETERS_ACTION: &str = "hudson.model.ParametersAction";

/// Discriminator of the action carrying a published result document.
pub const PUBLISHED_RESULT_ACTION: &str =
    "io.jenkins.plugins.remote.result.trigger.RemoteResultAction";

const CLASS_KEY: &str = "_class";

/// Fields mapped into dedicated snapshot fields, or too volatile to keep.
const STRIPPED_FIELDS: &[&str] = &[
    CLASS_KEY,
    "number",
    "url",
    "building",
    "inProgress",
    "result",
    "timestamp",
    "duration",
    "estimatedDuration",
    "executor",
    "queueId",
];

/// Extract a [`BuildSnapshot`] from a build status document.
///
/// Only a missing build number is an error; every other field is optional.
pub fn extract(raw: &Value, source_url: &str) -> Result<BuildSnapshot, AppError> {
    let number = raw
        .get("number")
        .and_then(as_build_number)
        .ok_or_else(|| AppError::MalformedResponse {
            url: source_url.to_string(),
            reason: "build document has no 'number'".to_string(),
        })?;

    let building = flag(raw, "building") || flag(raw, "inProgress");

    let actions = raw
        .get("actions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(BuildSnapshot {
        number,
        url: raw
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        building,
        result: raw.get("result").and_then(Value::as_str).map(str::to_string),
        timestamp: raw.get("timestamp").and_then(Value::as_i64),
        parameters: extract_parameters(actions),
        attributes: scalar_attributes(raw),
        published_result: extract_published_result(actions),
    })
}

fn as_build_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn has_class(action: &Value, class: &str) -> bool {
    action.get(CLASS_KEY).and_then(Value::as_str) == Some(class)
}

fn extract_parameters(actions: &[Value]) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for action in actions.iter().filter(|a| has_class(a, PARAMETERS_ACTION)) {
        let Some(list) = action.get("parameters").and_then(Value::as_array) else {
            continue;
        };
        for param in list {
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };
            let value = param.get("value").map(render_value).unwrap_or_default();
            params.insert(name.to_string(), value);
        }
    }
    params
}

fn extract_published_result(actions: &[Value]) -> Option<Map<String, Value>> {
    let action = actions.iter().find(|a| has_class(a, PUBLISHED_RESULT_ACTION))?;
    let mut result = action.get("result")?.as_object()?.clone();
    result.remove(CLASS_KEY);
    Some(result)
}

fn scalar_attributes(raw: &Value) -> Map<String, Value> {
    let Some(object) = raw.as_object() else {
        return Map::new();
    };
    object
        .iter()
        .filter(|(key, value)| {
            !STRIPPED_FIELDS.contains(&key.as_str())
                && matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Render a JSON value as text: strings verbatim, `null` as empty, anything
/// else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
