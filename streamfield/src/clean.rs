use std::collections::BTreeMap;

use blocks::schema::{Leaf, Schema, SchemaKind};
use blocks::value::{StreamItem, Value};
use tracing::debug;

use crate::error::ValidationError;

const REQUIRED: &str = "This field is required.";

/// Validate and normalize `value` against `schema`.
///
/// Every child is attempted even after a sibling fails, so the error tree
/// reports all failures at once and has the same shape as `value`.
pub fn clean(schema: &Schema, value: &Value) -> Result<Value, ValidationError> {
    let result = clean_node(schema, value);
    if let Err(err) = &result {
        debug!(
            id = %schema.id(),
            failures = err.flatten("").len(),
            "validation failed"
        );
    }
    result
}

fn clean_node(schema: &Schema, value: &Value) -> Result<Value, ValidationError> {
    match schema.kind() {
        SchemaKind::Leaf(leaf) => clean_leaf(schema, leaf, value),
        SchemaKind::Struct(structure) => {
            let entries = match value {
                Value::Map(entries) => Some(entries),
                Value::Null => None,
                other => return Err(mismatch("a mapping", other)),
            };
            let mut cleaned = BTreeMap::new();
            let mut errors = BTreeMap::new();
            for child in structure.children() {
                let child_value = entries
                    .and_then(|e| e.get(&child.name))
                    .unwrap_or(child.schema.default());
                match clean_node(&child.schema, child_value) {
                    Ok(v) => {
                        cleaned.insert(child.name.clone(), v);
                    }
                    Err(e) => {
                        errors.insert(child.name.clone(), e);
                    }
                }
            }
            if errors.is_empty() {
                Ok(Value::Map(cleaned))
            } else {
                Err(ValidationError::Struct(errors))
            }
        }
        SchemaKind::List(list) => {
            let items: &[Value] = match value {
                Value::List(items) => items,
                Value::Null => &[],
                other => return Err(mismatch("a list", other)),
            };
            if schema.is_required() && items.is_empty() {
                return Err(ValidationError::message(REQUIRED));
            }
            let results = items.iter().map(|item| clean_node(list.child(), item));
            collect_items(results).map(Value::List)
        }
        SchemaKind::Stream(stream) => {
            let items: &[StreamItem] = match value {
                Value::Stream(items) => items,
                Value::Null => &[],
                other => return Err(mismatch("a stream", other)),
            };
            if schema.is_required() && items.is_empty() {
                return Err(ValidationError::message(REQUIRED));
            }
            let results = items.iter().map(|item| match stream.child(&item.block_type) {
                Some(child) => clean_node(&child.schema, &item.value)
                    .map(|v| StreamItem::new(child.name.clone(), v)),
                None => Err(ValidationError::message(format!(
                    "Unknown block type \"{}\".",
                    item.block_type
                ))),
            });
            collect_items(results).map(Value::Stream)
        }
    }
}

fn clean_leaf(schema: &Schema, leaf: &Leaf, value: &Value) -> Result<Value, ValidationError> {
    match leaf {
        Leaf::TextInput { max_length } => {
            let text = match value {
                Value::Null
                | Value::Text(_)
                | Value::Integer(_)
                | Value::Number(_)
                | Value::Boolean(_) => {
                    value.to_scalar_string()
                }
                other => return Err(mismatch("text", other)),
            };
            if schema.is_required() && text.trim().is_empty() {
                return Err(ValidationError::message(REQUIRED));
            }
            if let Some(limit) = *max_length {
                let length = text.chars().count();
                if length > limit {
                    return Err(ValidationError::message(format!(
                        "Ensure this value has at most {} characters (it has {}).",
                        limit, length
                    )));
                }
            }
            Ok(Value::Text(text))
        }
        Leaf::Chooser => match value {
            Value::Null | Value::Text(_) | Value::Integer(_) | Value::Number(_) => {
                if schema.is_required() && value.is_empty() {
                    Err(ValidationError::message(REQUIRED))
                } else {
                    Ok(value.clone())
                }
            }
            other => Err(mismatch("a chosen item", other)),
        },
        Leaf::Field(widget) => {
            if schema.is_required() && value.is_empty() {
                return Err(ValidationError::message(REQUIRED));
            }
            widget.clean(value).map_err(ValidationError::Invalid)
        }
    }
}

/// Keep positional correspondence: one slot per item, `None` where it passed.
fn collect_items<T>(
    results: impl Iterator<Item = Result<T, ValidationError>>,
) -> Result<Vec<T>, ValidationError> {
    let mut cleaned = Vec::new();
    let mut errors = Vec::new();
    let mut failed = false;
    for result in results {
        match result {
            Ok(v) => {
                cleaned.push(v);
                errors.push(None);
            }
            Err(e) => {
                failed = true;
                errors.push(Some(e));
            }
        }
    }
    if failed {
        Err(ValidationError::List(errors))
    } else {
        Ok(cleaned)
    }
}

fn mismatch(expected: &str, found: &Value) -> ValidationError {
    ValidationError::message(format!(
        "Expected {}, found {}.",
        expected,
        found.type_name()
    ))
}
