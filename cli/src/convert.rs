//! TOML inputs to value trees and form submissions.

use blocks::form::FormData;
use blocks::schema::{Schema, SchemaKind};
use blocks::value::{StreamItem, Value};

/// Convert a TOML value into a value tree shaped by `schema`.
/// Stream items are tables with a `type` key and an optional `value` key;
/// an item whose type the stream does not declare is kept as-is.
pub fn value_from_toml(schema: &Schema, toml: &toml::Value) -> Result<Value, String> {
    match schema.kind() {
        SchemaKind::Leaf(_) => scalar(toml),
        SchemaKind::Struct(structure) => {
            let table = toml
                .as_table()
                .ok_or_else(|| format!("expected a table, found {}", toml.type_str()))?;
            let mut entries = Vec::new();
            for (key, item) in table {
                let child = structure
                    .child(key)
                    .ok_or_else(|| format!("unknown struct member `{}`", key))?;
                let value = value_from_toml(&child.schema, item)
                    .map_err(|e| format!("{}: {}", key, e))?;
                entries.push((key.clone(), value));
            }
            Ok(Value::map(entries))
        }
        SchemaKind::List(list) => {
            let items = toml
                .as_array()
                .ok_or_else(|| format!("expected an array, found {}", toml.type_str()))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    value_from_toml(list.child(), item).map_err(|e| format!("[{}]: {}", i, e))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        SchemaKind::Stream(stream) => {
            let items = toml
                .as_array()
                .ok_or_else(|| format!("expected an array, found {}", toml.type_str()))?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let block_type = item
                    .get("type")
                    .and_then(toml::Value::as_str)
                    .ok_or_else(|| format!("[{}]: stream item needs a string `type`", i))?;
                let value = match (stream.child(block_type), item.get("value")) {
                    (Some(child), Some(raw)) => value_from_toml(&child.schema, raw)
                        .map_err(|e| format!("[{}]: {}", i, e))?,
                    (Some(child), None) => child.schema.default().clone(),
                    (None, Some(raw)) => untyped(raw),
                    (None, None) => Value::Null,
                };
                out.push(StreamItem::new(block_type, value));
            }
            Ok(Value::Stream(out))
        }
    }
}

fn scalar(toml: &toml::Value) -> Result<Value, String> {
    match toml {
        toml::Value::String(s) => Ok(Value::text(s.as_str())),
        toml::Value::Integer(n) => Ok(Value::Integer(*n)),
        toml::Value::Float(f) => Ok(Value::Number(*f)),
        toml::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        other => Err(format!("expected a scalar, found {}", other.type_str())),
    }
}

fn untyped(toml: &toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::text(s.as_str()),
        toml::Value::Integer(n) => Value::Integer(*n),
        toml::Value::Float(f) => Value::Number(*f),
        toml::Value::Boolean(b) => Value::Boolean(*b),
        toml::Value::Datetime(d) => Value::text(d.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(untyped).collect()),
        toml::Value::Table(table) => Value::map(table.iter().map(|(k, v)| (k.clone(), untyped(v)))),
    }
}

/// A flat table of field names to scalars, as a form submission.
pub fn form_from_toml(table: &toml::Table) -> Result<FormData, String> {
    let mut data = FormData::new();
    for (name, value) in table {
        let text = match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(n) => n.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            other => {
                return Err(format!(
                    "submitted field `{}` must be a scalar, found {}",
                    name,
                    other.type_str()
                ));
            }
        };
        data.insert_text(name.as_str(), text);
    }
    Ok(data)
}
