use blocks::form::FormData;
use blocks::schema::{Leaf, Schema, SchemaKind};
use blocks::value::{StreamItem, Value};
use tracing::debug;

use crate::error::MalformedSubmission;

/// Read the value tree for `schema` back out of a flat form submission.
///
/// Sequence bookkeeping (`-count`, `-order`, `-deleted`, `-type`) is trusted
/// only as far as its syntax: a missing or non-numeric count, a non-numeric
/// order or an unknown type tag fails the whole parse.
pub fn value_from_submission(
    schema: &Schema,
    data: &FormData,
    prefix: &str,
) -> Result<Value, MalformedSubmission> {
    match schema.kind() {
        SchemaKind::Leaf(leaf) => Ok(leaf_value(schema, leaf, data, prefix)),
        SchemaKind::Struct(structure) => {
            let mut entries = Vec::with_capacity(structure.children().len());
            for child in structure.children() {
                let child_prefix = format!("{}-{}", prefix, child.name);
                let value = value_from_submission(&child.schema, data, &child_prefix)?;
                entries.push((child.name.clone(), value));
            }
            Ok(Value::map(entries))
        }
        SchemaKind::List(list) => {
            let slots = slots(data, prefix)?;
            debug!(prefix, items = slots.len(), "parsing list submission");
            let mut items = Vec::with_capacity(slots.len());
            for slot in slots {
                let value_prefix = value_prefix(data, &slot.prefix, slot.prefix.clone());
                items.push(value_from_submission(list.child(), data, &value_prefix)?);
            }
            Ok(Value::List(items))
        }
        SchemaKind::Stream(stream) => {
            let slots = slots(data, prefix)?;
            debug!(prefix, items = slots.len(), "parsing stream submission");
            let mut items = Vec::with_capacity(slots.len());
            for slot in slots {
                let type_field = format!("{}-type", slot.prefix);
                let Some(block_type) = data.text(&type_field) else {
                    return Err(MalformedSubmission::MissingType { field: type_field });
                };
                let Some(child) = stream.child(block_type) else {
                    return Err(MalformedSubmission::UnknownType {
                        field: type_field,
                        block_type: block_type.to_string(),
                    });
                };
                let rendered = format!("{}-item", slot.prefix);
                let value_prefix = value_prefix(data, &slot.prefix, rendered);
                let value = value_from_submission(&child.schema, data, &value_prefix)?;
                items.push(StreamItem::new(child.name.clone(), value));
            }
            Ok(Value::Stream(items))
        }
    }
}

fn leaf_value(schema: &Schema, leaf: &Leaf, data: &FormData, prefix: &str) -> Value {
    match leaf {
        Leaf::TextInput { .. } => data
            .text(prefix)
            .map(Value::text)
            .unwrap_or_else(|| schema.default().clone()),
        Leaf::Chooser => match data.text(prefix).map(str::trim) {
            None => schema.default().clone(),
            Some("") => Value::Null,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Value::Integer(id),
                Err(_) => Value::text(raw),
            },
        },
        Leaf::Field(widget) => widget
            .value_from_submission(data, prefix)
            .unwrap_or_else(|| schema.default().clone()),
    }
}

/// A submitted sequence item that survived deletion.
struct Slot {
    /// `<prefix>-<i>`
    prefix: String,
    order: i64,
}

/// The live items of the sequence at `prefix`, sorted by submitted order.
/// Ties keep index order.
fn slots(data: &FormData, prefix: &str) -> Result<Vec<Slot>, MalformedSubmission> {
    let count_field = format!("{}-count", prefix);
    let Some(raw) = data.text(&count_field) else {
        return Err(MalformedSubmission::MissingCount { field: count_field });
    };
    let count = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| MalformedSubmission::InvalidCount {
            field: count_field.clone(),
            value: raw.to_string(),
        })?;
    // Every rendered item submits at least one field of its own.
    if count > data.len() {
        return Err(MalformedSubmission::InvalidCount {
            field: count_field,
            value: raw.to_string(),
        });
    }

    let mut slots = Vec::with_capacity(count);
    for index in 0..count {
        let item = format!("{}-{}", prefix, index);
        if is_deleted(data.text(&format!("{}-deleted", item))) {
            continue;
        }
        let order_field = format!("{}-order", item);
        let order = match data.text(&order_field).map(str::trim) {
            None | Some("") => index as i64,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| MalformedSubmission::InvalidOrder {
                    field: order_field.clone(),
                    value: raw.to_string(),
                })?,
        };
        slots.push(Slot {
            prefix: item,
            order,
        });
    }
    slots.sort_by_key(|slot| slot.order);
    Ok(slots)
}

fn is_deleted(flag: Option<&str>) -> bool {
    match flag.map(str::trim) {
        None | Some("") => false,
        Some(flag) => !(flag == "0" || flag.eq_ignore_ascii_case("false")),
    }
}

/// Item values live under `<item>-value` on the wire. Forms rendered by this
/// crate name them by the rendered prefix instead; read that when nothing
/// was submitted under `-value`.
fn value_prefix(data: &FormData, item: &str, rendered: String) -> String {
    let wire = format!("{}-value", item);
    if data.has_prefix(&wire) { wire } else { rendered }
}
