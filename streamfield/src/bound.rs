use blocks::schema::{Schema, SchemaKind};
use blocks::value::{StreamItem, Value};

use crate::error::{RenderError, ValidationError};
use crate::render::{self, RenderOptions};

/// A schema paired with a value and a namespace prefix, for one render pass.
/// Borrows both schema and value; only the prefix is owned.
#[derive(Debug, Clone)]
pub struct BoundBlock<'a> {
    schema: &'a Schema,
    /// The slot name a parent struct or stream gave this schema.
    name: Option<&'a str>,
    prefix: String,
    value: &'a Value,
    errors: Option<&'a ValidationError>,
}

/// Where a bound child sits inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position<'a> {
    Member(&'a str),
    Item(usize),
    /// A stream member: its index among rendered members and its type tag.
    StreamItem { index: usize, block_type: &'a str },
}

#[derive(Debug, Clone)]
pub struct BoundChild<'a> {
    pub position: Position<'a>,
    pub block: BoundBlock<'a>,
}

/// Bind a schema to a value at `prefix`.
pub fn bind<'a>(schema: &'a Schema, value: &'a Value, prefix: &str) -> BoundBlock<'a> {
    BoundBlock {
        schema,
        name: None,
        prefix: prefix.to_string(),
        value,
        errors: None,
    }
}

/// A stream entry resolved against the stream's child types.
pub(crate) enum StreamEntry<'a> {
    Member(BoundChild<'a>),
    Unknown { block_type: &'a str },
}

impl<'a> BoundBlock<'a> {
    /// Attach a validation error tree for inline display.
    pub fn with_errors(mut self, errors: &'a ValidationError) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Bind as if a parent had registered the schema under `name`.
    pub(crate) fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name
    }

    pub fn errors(&self) -> Option<&'a ValidationError> {
        self.errors
    }

    pub fn label(&self) -> Option<String> {
        self.schema.label_for(self.name)
    }

    pub fn render(&self) -> Result<String, RenderError> {
        render::render(self)
    }

    pub fn render_with(&self, options: &RenderOptions) -> Result<String, RenderError> {
        render::render_with(self, options)
    }

    /// Child bindings in render order. Stream items of unknown type are skipped.
    pub fn children(&self) -> Vec<BoundChild<'a>> {
        match self.schema.kind() {
            SchemaKind::Leaf(_) => Vec::new(),
            SchemaKind::Struct(_) | SchemaKind::List(_) => self.container_children(),
            SchemaKind::Stream(_) => self
                .stream_entries()
                .into_iter()
                .filter_map(|entry| match entry {
                    StreamEntry::Member(child) => Some(child),
                    StreamEntry::Unknown { .. } => None,
                })
                .collect(),
        }
    }

    /// Struct members or list items.
    pub(crate) fn container_children(&self) -> Vec<BoundChild<'a>> {
        let schema: &'a Schema = self.schema;
        let value: &'a Value = self.value;
        match schema.kind() {
            SchemaKind::Struct(structure) => structure
                .children()
                .iter()
                .map(|child| {
                    let value = value.get(&child.name).unwrap_or(child.schema.default());
                    BoundChild {
                        position: Position::Member(&child.name),
                        block: BoundBlock {
                            schema: &child.schema,
                            name: Some(child.name.as_str()),
                            prefix: format!("{}-{}", self.prefix, child.name),
                            value,
                            errors: self.errors.and_then(|e| e.member(&child.name)),
                        },
                    }
                })
                .collect(),
            SchemaKind::List(list) => list_items(value)
                .iter()
                .enumerate()
                .map(|(index, value)| BoundChild {
                    position: Position::Item(index),
                    block: BoundBlock {
                        schema: list.child(),
                        name: None,
                        prefix: format!("{}-{}", self.prefix, index),
                        value,
                        errors: self.errors.and_then(|e| e.item(index)),
                    },
                })
                .collect(),
            SchemaKind::Leaf(_) | SchemaKind::Stream(_) => Vec::new(),
        }
    }

    /// Stream items in value order. Members are numbered consecutively;
    /// unknown items take no index. Errors are matched by value position.
    pub(crate) fn stream_entries(&self) -> Vec<StreamEntry<'a>> {
        let schema: &'a Schema = self.schema;
        let SchemaKind::Stream(stream) = schema.kind() else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        let mut index = 0;
        let value: &'a Value = self.value;
        for (position, item) in stream_items(value).iter().enumerate() {
            let Some(child) = stream.child(&item.block_type) else {
                entries.push(StreamEntry::Unknown {
                    block_type: &item.block_type,
                });
                continue;
            };
            entries.push(StreamEntry::Member(BoundChild {
                position: Position::StreamItem {
                    index,
                    block_type: &child.name,
                },
                block: BoundBlock {
                    schema: &child.schema,
                    name: Some(child.name.as_str()),
                    prefix: format!("{}-{}-item", self.prefix, index),
                    value: &item.value,
                    errors: self.errors.and_then(|e| e.item(position)),
                },
            }));
            index += 1;
        }
        entries
    }
}

fn list_items(value: &Value) -> &[Value] {
    match value {
        Value::List(items) => items,
        _ => &[],
    }
}

fn stream_items(value: &Value) -> &[StreamItem] {
    match value {
        Value::Stream(items) => items,
        _ => &[],
    }
}
