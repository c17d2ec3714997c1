//! Normalization of raw recipe JSON into a [`RecipeDocument`].
//!
//! Accepts both on-disk shapes: the legacy array and the flat `stepN`
//! mapping (including the intermediate variant holding a `steps` array).

use crate::error::{AshError, Result};
use crate::recipe::{DEFAULT_DESCRIPTION, DEFAULT_TITLE, DisplayHints, RecipeDocument, Step};
use crate::version::{LEGACY_VERSION, detect_version, json_kind};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

/// Convert a raw recipe of any supported schema into the canonical document
pub fn normalize(raw: &Value) -> Result<RecipeDocument> {
    let version = detect_version(raw)?;
    match raw {
        Value::Array(items) => normalize_legacy(items, version),
        Value::Object(map) => normalize_flat(map, version),
        other => Err(AshError::UnrecognizedShape(json_kind(other).to_string())),
    }
}

fn normalize_legacy(items: &[Value], version: String) -> Result<RecipeDocument> {
    let (metadata, steps) = match items.split_first() {
        Some((Value::Object(meta), rest)) => (meta, rest),
        Some((other, _)) => {
            return Err(AshError::UnrecognizedShape(format!(
                "legacy recipe must start with a metadata object, found {}",
                json_kind(other)
            )));
        }
        None => {
            return Err(AshError::UnrecognizedShape(
                "legacy recipe is an empty array".to_string(),
            ));
        }
    };

    let steps = steps
        .iter()
        .enumerate()
        .map(|(i, step)| parse_step(format!("Step {}", i + 1), step))
        .collect::<Result<Vec<_>>>()?;

    debug!(steps = steps.len(), version = LEGACY_VERSION, "normalized legacy recipe");
    Ok(RecipeDocument {
        version,
        title: text_field(metadata, None, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: text_field(metadata, None, "description")
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        display_hints: display_hints(metadata, None),
        steps,
    })
}

fn normalize_flat(map: &Map<String, Value>, version: String) -> Result<RecipeDocument> {
    let nested = map.get("metadata").and_then(Value::as_object);

    let steps = match map.get("steps") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, step)| parse_step(format!("Step {}", i + 1), step))
            .collect::<Result<Vec<_>>>()?,
        _ => {
            let mut numbered: Vec<(u64, &Value)> = Vec::new();
            for (key, value) in map.iter().filter(|(key, _)| is_step_key(key)) {
                let n = step_number(key).ok_or_else(|| {
                    AshError::invalid_step(key, "step number does not fit in 64 bits")
                })?;
                numbered.push((n, value));
            }
            numbered.sort_by_key(|(n, _)| *n);
            numbered
                .into_iter()
                .map(|(n, step)| parse_step(format!("Step {n}"), step))
                .collect::<Result<Vec<_>>>()?
        }
    };

    debug!(steps = steps.len(), %version, "normalized flat recipe");
    Ok(RecipeDocument {
        version,
        title: text_field(map, nested, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        description: text_field(map, nested, "description")
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        display_hints: display_hints(map, nested),
        steps,
    })
}

/// Returns true for `step` followed by one or more ASCII digits
pub fn is_step_key(key: &str) -> bool {
    key.strip_prefix("step")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse `stepN` keys; anything else (including `step`, `step1a`) is not a
/// step. A step key whose number overflows `u64` also yields `None`.
pub fn step_number(key: &str) -> Option<u64> {
    if !is_step_key(key) {
        return None;
    }
    key.strip_prefix("step")?.parse().ok()
}

fn parse_step(display_name: String, raw: &Value) -> Result<Step> {
    let Value::Object(fields) = raw else {
        return Err(AshError::invalid_step(
            display_name,
            format!("step must be an object, found {}", json_kind(raw)),
        ));
    };

    let mut step = Step::statement(display_name, String::new());
    for (key, value) in fields {
        match key.as_str() {
            "statement" => {
                step.statement = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
            }
            "function_name" | "functionName" => {
                step.function_name = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => {
                        return Err(AshError::invalid_step(
                            &step.display_name,
                            format!("function_name must be a string, found {}", json_kind(other)),
                        ));
                    }
                };
            }
            "prompt_for" | "promptFor" => {
                step.prompt_for = parse_prompts(&step.display_name, value)?;
            }
            _ => {
                step.extra_params.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(step)
}

fn parse_prompts(step: &str, value: &Value) -> Result<IndexMap<String, String>> {
    match value {
        Value::Null => Ok(IndexMap::new()),
        Value::Object(entries) => entries
            .iter()
            .map(|(param, prompt)| match prompt {
                Value::String(text) => Ok((param.clone(), text.clone())),
                other => Err(AshError::invalid_step(
                    step,
                    format!(
                        "prompt text for '{param}' must be a string, found {}",
                        json_kind(other)
                    ),
                )),
            })
            .collect(),
        other => Err(AshError::invalid_step(
            step,
            format!("prompt_for must be an object, found {}", json_kind(other)),
        )),
    }
}

/// Read a non-empty string field top-level first, then from the nested
/// metadata block
fn text_field(
    top: &Map<String, Value>,
    nested: Option<&Map<String, Value>>,
    key: &str,
) -> Option<String> {
    fn non_empty(value: Option<&Value>) -> Option<&str> {
        value.and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    non_empty(top.get(key))
        .or_else(|| non_empty(nested.and_then(|m| m.get(key))))
        .map(str::to_string)
}

fn display_hints(
    top: &Map<String, Value>,
    nested: Option<&Map<String, Value>>,
) -> Option<DisplayHints> {
    let hints = DisplayHints {
        color: text_field(top, nested, "color"),
        color_end: text_field(top, nested, "color_end")
            .or_else(|| text_field(top, nested, "colorEnd")),
    };
    (!hints.is_empty()).then_some(hints)
}
