//! Value normalization
//!
//! Maps any [`Value`] to a `serde_json::Value` the visualization server can
//! ingest. Generation results, chat results and role-tagged messages get
//! dedicated shapes; everything else goes through the structural fallback
//! chain. Rule order matters: earlier rules shadow later ones.

use serde_json::{json, Map, Number, Value as Json};

use crate::value::{ChatResult, ConversionError, DictConvertible, FPart, LlmResult, Role, Value};

/// Nesting depth past which a subtree is replaced by a placeholder string
pub const MAX_DEPTH: usize = 256;

/// Key wrapping the parts of a templated string
pub const FSTRING_KEY: &str = "__fstring__";

/// Field nulled in the converted copy of memory-carrying objects
pub const MEMORY_FIELD: &str = "memory";

/// Normalize a value into JSON.
///
/// Total: every input produces some JSON value. Uninterpretable values fall
/// back to their printable form.
pub fn normalize(value: &Value) -> Json {
    normalize_at(value, 0)
}

fn normalize_at(value: &Value, depth: usize) -> Json {
    if depth > MAX_DEPTH {
        tracing::debug!(depth = depth, kind = value.kind(), "Nesting limit reached");
        return Json::String(format!("<{} nested beyond {}>", value.kind(), MAX_DEPTH));
    }

    match value {
        Value::LlmResult(result) => fallback(&generation_texts(result), depth),
        Value::ChatResult(result) => fallback(&chat_texts(result), depth),
        Value::Message(message) => match message.role {
            Role::System => tagged("System", &message.content),
            Role::Ai => tagged("AI", &message.content),
            Role::Human => tagged("Human", &message.content),
            Role::Other(_) => fallback(value, depth),
        },
        other => fallback(other, depth),
    }
}

fn tagged(label: &str, content: &str) -> Json {
    let mut map = Map::new();
    map.insert(label.to_string(), Json::String(content.to_string()));
    Json::Object(map)
}

/// All generation texts, unwrapped twice when there is only one.
fn generation_texts(result: &LlmResult) -> Value {
    let texts = Value::Sequence(result.texts().map(Value::from).collect());
    // A batch of one prompt with one candidate arrives nested; unwrap both levels.
    unwrap_single(unwrap_single(texts))
}

fn chat_texts(result: &ChatResult) -> Value {
    let texts = Value::Sequence(
        result
            .generations
            .iter()
            .map(|generation| Value::from(generation.text.as_str()))
            .collect(),
    );
    unwrap_single(texts)
}

/// Collapse a one-element sequence to its element.
///
/// Indexing a one-character string yields the same string, so only
/// sequences change shape here.
fn unwrap_single(value: Value) -> Value {
    match value {
        Value::Sequence(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

fn fallback(value: &Value, depth: usize) -> Json {
    let next = depth + 1;

    match value {
        Value::Map(entries) => normalize_entries(entries, next),
        Value::Sequence(items) | Value::Tuple(items) | Value::Set(items) => {
            Json::Array(items.iter().map(|item| normalize_at(item, next)).collect())
        }
        Value::FString(fstring) => {
            let parts = fstring
                .parts
                .iter()
                .map(|part| normalize_part(part, next))
                .collect();
            json!({ FSTRING_KEY: Json::Array(parts) })
        }
        Value::Object(object) => match convert(object.as_ref()) {
            Some(entries) => normalize_at(&Value::Map(entries), next),
            None => match object.fields() {
                Some(record) => normalize_at(&Value::Record(record), next),
                None => Json::String(value.to_string()),
            },
        },
        Value::Message(message) => normalize_at(&Value::Map(message.to_dict()), next),
        Value::Record(record) => {
            let mut map = Map::new();
            for (name, field) in &record.fields {
                map.insert(name.clone(), normalize_at(field, next));
            }
            Json::Object(map)
        }
        Value::Function(callable) => json!({
            "class_name": callable.owner,
            "name": callable.name,
        }),
        Value::Float(x) => Number::from_f64(*x).map_or(Json::Null, Json::Number),
        Value::Int(i) => Json::from(*i),
        Value::UInt(u) => Json::from(*u),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bool(b) => Json::Bool(*b),
        Value::None => Json::Null,
        Value::LlmResult(_) | Value::ChatResult(_) | Value::Opaque(_) => {
            Json::String(value.to_string())
        }
    }
}

/// Later entries overwrite earlier ones whose keys print the same.
fn normalize_entries(entries: &[(Value, Value)], depth: usize) -> Json {
    let mut map = Map::new();
    for (key, value) in entries {
        let key = match key {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        };
        map.insert(key, normalize_at(value, depth));
    }
    Json::Object(map)
}

fn normalize_part(part: &FPart, depth: usize) -> Json {
    match part {
        FPart::Literal(text) => Json::String(text.clone()),
        FPart::Interpolation {
            source,
            value,
            formatted,
        } => json!({
            "formatted": formatted,
            "source": source,
            "value": normalize_at(value, depth + 1),
        }),
    }
}

/// Convert an object to its entries, nulling `memory` in the copy.
///
/// Returns `None` when the conversion cannot be used; the caller then falls
/// through to the object's field record, or its printable form.
fn convert(object: &dyn DictConvertible) -> Option<Vec<(Value, Value)>> {
    match object.to_dict() {
        Ok(mut entries) => {
            if object.has_memory() {
                strip_memory(&mut entries);
            }
            Some(entries)
        }
        Err(ConversionError::ArityMismatch { expected }) => {
            tracing::debug!(
                type_name = object.type_name(),
                expected = expected,
                "Dictionary conversion needs arguments, skipping"
            );
            None
        }
        Err(e) => {
            tracing::warn!(
                type_name = object.type_name(),
                error = %e,
                "Dictionary conversion failed"
            );
            None
        }
    }
}

fn strip_memory(entries: &mut Vec<(Value, Value)>) {
    match entries
        .iter()
        .position(|(key, _)| key.as_str() == Some(MEMORY_FIELD))
    {
        Some(index) => entries[index].1 = Value::None,
        None => entries.push((Value::from(MEMORY_FIELD), Value::None)),
    }
}
