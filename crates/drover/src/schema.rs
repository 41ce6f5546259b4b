//! Flattening of tool input schemas into the closed, reference-free form that
//! every provider is sent.
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Input schema must describe an object")]
    NotAnObject,

    #[error("Unresolved schema reference: {0}")]
    UnresolvedRef(String),

    #[error("Recursive schema reference: {0}")]
    RecursiveRef(String),

    #[error("Schema 'properties' must be an object")]
    InvalidProperties,
}

const DEFINITION_KEYS: [&str; 2] = ["$defs", "definitions"];
const DROPPED_KEYS: [&str; 4] = ["$defs", "definitions", "$schema", "$id"];
/// Keywords whose values are instance data, not schemas
const DATA_KEYS: [&str; 4] = ["default", "const", "enum", "examples"];

/// Flatten a tool's input schema.
///
/// Local `$ref`s are inlined and their definitions removed, every object schema is
/// closed with `additionalProperties: false`, and objects without an explicit
/// `required` list require all of their properties.
pub fn flatten(schema: &Value) -> Result<Value, SchemaError> {
    let mut definitions = Map::new();
    if let Some(root) = schema.as_object() {
        for key in DEFINITION_KEYS {
            if let Some(Value::Object(defs)) = root.get(key) {
                for (name, def) in defs {
                    definitions.insert(name.clone(), def.clone());
                }
            }
        }
    }

    let flattened = inline(schema, &definitions, &mut Vec::new())?;
    if flattened.get("type").and_then(Value::as_str) != Some("object") {
        return Err(SchemaError::NotAnObject);
    }
    Ok(flattened)
}

fn inline(
    node: &Value,
    definitions: &Map<String, Value>,
    stack: &mut Vec<String>,
) -> Result<Value, SchemaError> {
    match node {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref") {
                return inline_ref(reference, map, definitions, stack);
            }

            let mut out = Map::new();
            for (key, value) in map {
                if DROPPED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                // Property names are not keywords, only their schemas are walked.
                if let ("properties", Value::Object(properties)) = (key.as_str(), value) {
                    let mut walked = Map::new();
                    for (name, property) in properties {
                        walked.insert(name.clone(), inline(property, definitions, stack)?);
                    }
                    out.insert(key.clone(), Value::Object(walked));
                    continue;
                }
                out.insert(key.clone(), inline_keyword(key, value, definitions, stack)?);
            }
            close_object(&mut out)?;
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| inline(item, definitions, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn inline_ref(
    reference: &Value,
    siblings: &Map<String, Value>,
    definitions: &Map<String, Value>,
    stack: &mut Vec<String>,
) -> Result<Value, SchemaError> {
    let reference = reference
        .as_str()
        .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;
    let name = reference
        .strip_prefix("#/$defs/")
        .or_else(|| reference.strip_prefix("#/definitions/"))
        .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;
    if stack.iter().any(|seen| seen == name) {
        return Err(SchemaError::RecursiveRef(reference.to_string()));
    }
    let target = definitions
        .get(name)
        .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;

    stack.push(name.to_string());
    let resolved = inline(target, definitions, stack);
    stack.pop();

    let mut resolved = resolved?;
    // Keywords next to the reference (usually a description) win over the definition's.
    if let Value::Object(ref mut out) = resolved {
        for (key, value) in siblings {
            if key != "$ref" && !DROPPED_KEYS.contains(&key.as_str()) {
                out.insert(key.clone(), inline_keyword(key, value, definitions, stack)?);
            }
        }
    }
    Ok(resolved)
}

fn inline_keyword(
    key: &str,
    value: &Value,
    definitions: &Map<String, Value>,
    stack: &mut Vec<String>,
) -> Result<Value, SchemaError> {
    if DATA_KEYS.contains(&key) {
        Ok(value.clone())
    } else {
        inline(value, definitions, stack)
    }
}

fn close_object(schema: &mut Map<String, Value>) -> Result<(), SchemaError> {
    let is_object = schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.contains_key("properties");
    if !is_object {
        return Ok(());
    }

    let property_names: Vec<Value> = match schema.get("properties") {
        None => Vec::new(),
        Some(Value::Object(properties)) => properties.keys().cloned().map(Value::String).collect(),
        Some(_) => return Err(SchemaError::InvalidProperties),
    };

    schema.insert("additionalProperties".to_string(), Value::Bool(false));
    if !schema.contains_key("required") {
        schema.insert("required".to_string(), Value::Array(property_names));
    }
    Ok(())
}
