//! Key-level schema checks for Apployd JSON5 configuration.
//!
//! Each object is described by a table of allowed keys and their kinds, so a
//! typo or wrong type is reported with its dotted path before serde runs.

use super::SchemaMode;
use crate::ConfigError;
use serde_json::{Map, Value};

const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

const HARM_THRESHOLDS: &[&str] = &[
    "BLOCK_NONE",
    "BLOCK_ONLY_HIGH",
    "BLOCK_MEDIUM_AND_ABOVE",
    "BLOCK_LOW_AND_ABOVE",
];

/// Expected shape of a single key.
#[derive(Clone, Copy)]
enum Kind {
    Text,
    Flag,
    Count,
    Number,
    /// `null` is accepted in place of the inner kind.
    Nullable(&'static Kind),
    /// String drawn from a fixed set.
    OneOf(&'static [&'static str]),
    Object(&'static [Field]),
    /// Array whose elements are all objects of the given shape.
    ListOf(&'static [Field]),
}

/// Allowed key, its kind, and whether it must be present.
struct Field {
    key: &'static str,
    kind: Kind,
    required: bool,
}

const fn field(key: &'static str, kind: Kind) -> Field {
    Field {
        key,
        kind,
        required: false,
    }
}

const fn required(key: &'static str, kind: Kind) -> Field {
    Field {
        key,
        kind,
        required: true,
    }
}

const CAPTURE: &[Field] = &[
    field("extract_facts", Kind::Flag),
    field("track_context", Kind::Flag),
    field("track_consistency", Kind::Flag),
];

const MEMORY: &[Field] = &[
    field("path", Kind::Text),
    field("recall_limit", Kind::Count),
    field("personal_recall_limit", Kind::Count),
    field("history_limit", Kind::Count),
    field("capture", Kind::Object(CAPTURE)),
];

const PROMPT: &[Field] = &[
    field("system_prompt", Kind::Nullable(&Kind::Text)),
    field("system_prompt_path", Kind::Nullable(&Kind::Text)),
    field("max_context_chars", Kind::Nullable(&Kind::Count)),
];

const SAFETY_SETTING: &[Field] = &[
    required("category", Kind::OneOf(HARM_CATEGORIES)),
    required("threshold", Kind::OneOf(HARM_THRESHOLDS)),
];

const COMPLETION: &[Field] = &[
    field("provider", Kind::Text),
    field("model", Kind::Text),
    field("api_key_env", Kind::Text),
    field("base_url", Kind::Text),
    field("temperature", Kind::Number),
    field("top_p", Kind::Number),
    field("top_k", Kind::Count),
    field("max_output_tokens", Kind::Nullable(&Kind::Count)),
    field("safety_settings", Kind::ListOf(SAFETY_SETTING)),
];

const ROOT: &[Field] = &[
    field("$schema", Kind::Text),
    field("memory", Kind::Object(MEMORY)),
    field("prompt", Kind::Object(PROMPT)),
    field("completion", Kind::Object(COMPLETION)),
];

/// Validate a single config layer against the schema.
///
/// In [`SchemaMode::Full`] the merged document is also checked for settings
/// that may not be combined.
pub(super) fn validate_layer_schema(
    value: &Value,
    mode: SchemaMode,
    layer: &str,
) -> Result<(), ConfigError> {
    check(value, Kind::Object(ROOT), layer, "")?;
    if matches!(mode, SchemaMode::Full) {
        check_prompt_source(value, layer)?;
    }
    Ok(())
}

fn check(value: &Value, kind: Kind, layer: &str, path: &str) -> Result<(), ConfigError> {
    match kind {
        Kind::Text if value.is_string() => Ok(()),
        Kind::Text => Err(invalid_field(layer, path, "expected string")),
        Kind::Flag if value.is_boolean() => Ok(()),
        Kind::Flag => Err(invalid_field(layer, path, "expected bool")),
        Kind::Count if value.is_u64() => Ok(()),
        Kind::Count => Err(invalid_field(layer, path, "expected non-negative integer")),
        Kind::Number if value.is_number() => Ok(()),
        Kind::Number => Err(invalid_field(layer, path, "expected number")),
        Kind::Nullable(_) if value.is_null() => Ok(()),
        Kind::Nullable(inner) => check(value, *inner, layer, path),
        Kind::OneOf(allowed) => match value.as_str() {
            Some(found) if allowed.contains(&found) => Ok(()),
            Some(found) => Err(invalid_field(
                layer,
                path,
                &format!(
                    "unknown value `{found}` (expected one of: {})",
                    allowed.join(", ")
                ),
            )),
            None => Err(invalid_field(layer, path, "expected string")),
        },
        Kind::Object(fields) => {
            let Value::Object(map) = value else {
                return Err(invalid_field(layer, path, "expected object"));
            };
            check_fields(map, fields, layer, path)
        }
        Kind::ListOf(fields) => {
            let Value::Array(items) = value else {
                return Err(invalid_field(layer, path, "expected array"));
            };
            for (idx, item) in items.iter().enumerate() {
                check(item, Kind::Object(fields), layer, &format!("{path}[{idx}]"))?;
            }
            Ok(())
        }
    }
}

fn check_fields(
    map: &Map<String, Value>,
    fields: &[Field],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !fields.iter().any(|field| field.key == key) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    for field in fields {
        let field_path = join_path(path, field.key);
        match map.get(field.key) {
            Some(value) => check(value, field.kind, layer, &field_path)?,
            None if field.required => {
                return Err(invalid_field(layer, &field_path, "missing required field"));
            }
            None => {}
        }
    }
    Ok(())
}

/// Layers may each set one prompt source; the merged config must not set both.
fn check_prompt_source(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let Some(prompt) = value.get("prompt") else {
        return Ok(());
    };
    let set = |key: &str| prompt.get(key).is_some_and(|value| !value.is_null());
    if set("system_prompt") && set("system_prompt_path") {
        return Err(invalid_field(
            layer,
            "prompt.system_prompt_path",
            "cannot be combined with system_prompt",
        ));
    }
    Ok(())
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
