//! Parameter schema generation and compaction.
//!
//! Declared parameters are projected once, at compile time, into a JSON
//! Schema object the model consumes.  Compaction strips the keys that only
//! help humans (descriptions, defaults, examples, titles) so the payload
//! fits providers with small request-size limits, while preserving
//! everything argument validation needs.

use serde_json::{Map, Value, json};

use apibridge_manifest::{DeclaredParameter, ParamType};

/// Schema keys removed by [`compact_schema`].  Everything else survives, in
/// particular `type`, `properties`, `required`, `items`, and `enum`.
const COMPACTED_KEYS: [&str; 6] = ["description", "default", "examples", "title", "$id", "$schema"];

/// Project a parameter list into a `type: object` JSON Schema.
pub fn parameters_to_schema(parameters: &[DeclaredParameter]) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for param in parameters {
        let mut prop = match param.param_type {
            ParamType::String => json!({"type": "string"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Integer => json!({"type": "integer"}),
            ParamType::Boolean => json!({"type": "boolean"}),
            // Arrays must always carry an `items` field; several backends
            // reject array schemas without one.
            ParamType::Array => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Object => json!({"type": "object", "additionalProperties": true}),
        };

        if !param.description.is_empty() {
            prop["description"] = json!(param.description);
        }
        if let Some(default) = &param.default {
            prop["default"] = default.clone();
        }
        if let Some(values) = &param.enum_values {
            prop["enum"] = json!(values);
        }

        properties.insert(param.name.clone(), prop);
        if param.required {
            required.push(json!(param.name));
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = Value::Array(required);
    }
    schema
}

/// Recursively strip non-validation keys from a schema.
///
/// Idempotent: compacting twice yields the same result as compacting once.
pub fn compact_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                if COMPACTED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                out.insert(key.clone(), compact_schema(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(compact_schema).collect()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
