use std::sync::Arc;

use tracing::trace;

use crate::field::FieldWidget;
use crate::identity::{BlockId, IdGenerator, process_counter};
use crate::value::Value;

/// Errors raised while assembling a schema tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate child name `{name}`")]
    DuplicateChildName { name: String },
}

/// An immutable block definition. Schemas are shared through `Arc` so the
/// same instance can sit at several places in a tree; its `BlockId` stays
/// the same wherever it appears.
#[derive(Debug)]
pub struct Schema {
    id: BlockId,
    label: Option<String>,
    help_text: Option<String>,
    required: bool,
    default: Value,
    kind: SchemaKind,
}

#[derive(Debug)]
pub enum SchemaKind {
    Leaf(Leaf),
    Struct(StructSchema),
    List(ListSchema),
    Stream(StreamSchema),
}

/// Atomic value editors.
#[derive(Debug, Clone)]
pub enum Leaf {
    TextInput { max_length: Option<usize> },
    /// Opaque picker for a referenced object; the value is its id.
    Chooser,
    Field(Arc<dyn FieldWidget>),
}

/// A named slot in a struct or stream. The name belongs to the slot, not the
/// schema: one schema instance may be registered under several names.
#[derive(Debug, Clone)]
pub struct Child {
    pub name: String,
    pub schema: Arc<Schema>,
}

impl Child {
    /// Display label for this slot: the schema's explicit label, else one
    /// derived from the slot name.
    pub fn label(&self) -> String {
        self.schema
            .label_for(Some(&self.name))
            .unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug)]
pub struct StructSchema {
    children: Vec<Child>,
}

impl StructSchema {
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Child> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[derive(Debug)]
pub struct ListSchema {
    child: Arc<Schema>,
}

impl ListSchema {
    pub fn child(&self) -> &Arc<Schema> {
        &self.child
    }
}

#[derive(Debug)]
pub struct StreamSchema {
    children: Vec<Child>,
}

impl StreamSchema {
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Resolve a stream item's type tag.
    pub fn child(&self, block_type: &str) -> Option<&Child> {
        self.children.iter().find(|c| c.name == block_type)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.name.as_str())
    }
}

impl Schema {
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// `blockdef-<id>`: the namespace for this schema's one-time declarations.
    pub fn definition_prefix(&self) -> String {
        self.id.definition_prefix()
    }

    /// The explicit label, if one was given.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The explicit label, else a label derived from the name a parent gave
    /// this schema. A root or list child without a label has none.
    pub fn label_for(&self, name: Option<&str>) -> Option<String> {
        self.label.clone().or_else(|| name.map(label_from_name))
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> &Value {
        &self.default
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    /// Direct child schemas, in declaration order. A list contributes its
    /// single child; leaves have none.
    pub fn child_schemas(&self) -> Vec<&Arc<Schema>> {
        match &self.kind {
            SchemaKind::Leaf(_) => Vec::new(),
            SchemaKind::Struct(s) => s.children.iter().map(|c| &c.schema).collect(),
            SchemaKind::List(l) => vec![&l.child],
            SchemaKind::Stream(s) => s.children.iter().map(|c| &c.schema).collect(),
        }
    }

    /// Short name of the schema variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            SchemaKind::Leaf(Leaf::TextInput { .. }) => "text",
            SchemaKind::Leaf(Leaf::Chooser) => "chooser",
            SchemaKind::Leaf(Leaf::Field(_)) => "field",
            SchemaKind::Struct(_) => "struct",
            SchemaKind::List(_) => "list",
            SchemaKind::Stream(_) => "stream",
        }
    }
}

/// `job_title` -> `Job title`.
pub fn label_from_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Per-schema settings shared by every variant.
#[derive(Debug, Clone, Default)]
pub struct BlockOptions {
    pub label: Option<String>,
    pub default: Option<Value>,
    pub help_text: Option<String>,
    pub required: bool,
}

impl BlockOptions {
    pub fn new() -> Self {
        BlockOptions::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Constructs schemas, stamping each with a fresh identity token.
pub struct SchemaBuilder<'a> {
    ids: &'a dyn IdGenerator,
}

impl SchemaBuilder<'static> {
    /// A builder drawing ids from the process-wide counter.
    pub fn new() -> Self {
        SchemaBuilder {
            ids: process_counter(),
        }
    }
}

impl Default for SchemaBuilder<'static> {
    fn default() -> Self {
        SchemaBuilder::new()
    }
}

impl<'a> SchemaBuilder<'a> {
    pub fn with_ids(ids: &'a dyn IdGenerator) -> Self {
        SchemaBuilder { ids }
    }

    pub fn leaf(&self, leaf: Leaf, options: BlockOptions) -> Arc<Schema> {
        let fallback = match &leaf {
            Leaf::TextInput { .. } | Leaf::Chooser => Value::text(""),
            Leaf::Field(widget) => widget.default_value(),
        };
        self.make(SchemaKind::Leaf(leaf), fallback, options)
    }

    pub fn text_input(&self, options: BlockOptions) -> Arc<Schema> {
        self.leaf(Leaf::TextInput { max_length: None }, options)
    }

    pub fn chooser(&self, options: BlockOptions) -> Arc<Schema> {
        self.leaf(Leaf::Chooser, options)
    }

    pub fn field(&self, widget: Arc<dyn FieldWidget>, options: BlockOptions) -> Arc<Schema> {
        self.leaf(Leaf::Field(widget), options)
    }

    /// A struct with the given children, in the given order.
    pub fn structure<N: Into<String>>(
        &self,
        children: impl IntoIterator<Item = (N, Arc<Schema>)>,
        options: BlockOptions,
    ) -> Result<Arc<Schema>, SchemaError> {
        let children = collect_children(children)?;
        Ok(self.make(
            SchemaKind::Struct(StructSchema { children }),
            Value::empty_map(),
            options,
        ))
    }

    pub fn list(&self, child: Arc<Schema>, options: BlockOptions) -> Arc<Schema> {
        self.make(
            SchemaKind::List(ListSchema { child }),
            Value::List(Vec::new()),
            options,
        )
    }

    /// A stream whose item types are the given children's names.
    pub fn stream<N: Into<String>>(
        &self,
        children: impl IntoIterator<Item = (N, Arc<Schema>)>,
        options: BlockOptions,
    ) -> Result<Arc<Schema>, SchemaError> {
        let children = collect_children(children)?;
        Ok(self.make(
            SchemaKind::Stream(StreamSchema { children }),
            Value::Stream(Vec::new()),
            options,
        ))
    }

    fn make(&self, kind: SchemaKind, fallback: Value, options: BlockOptions) -> Arc<Schema> {
        let id = self.ids.next_id();
        let schema = Schema {
            id,
            label: options.label,
            help_text: options.help_text,
            required: options.required,
            default: options.default.unwrap_or(fallback),
            kind,
        };
        trace!(id = %id, kind = schema.kind_name(), "schema constructed");
        Arc::new(schema)
    }
}

fn collect_children<N: Into<String>>(
    children: impl IntoIterator<Item = (N, Arc<Schema>)>,
) -> Result<Vec<Child>, SchemaError> {
    let mut out: Vec<Child> = Vec::new();
    for (name, schema) in children {
        let name = name.into();
        if out.iter().any(|c| c.name == name) {
            return Err(SchemaError::DuplicateChildName { name });
        }
        out.push(Child { name, schema });
    }
    Ok(out)
}

/// Derive a child list from a base one. An override naming an existing child
/// replaces it in place (`Some`) or removes it (`None`); an override with a
/// new name is appended.
pub fn compose_children(
    base: &[Child],
    overrides: impl IntoIterator<Item = (String, Option<Arc<Schema>>)>,
) -> Vec<(String, Arc<Schema>)> {
    let mut slots: Vec<(String, Option<Arc<Schema>>)> = base
        .iter()
        .map(|c| (c.name.clone(), Some(Arc::clone(&c.schema))))
        .collect();
    for (name, replacement) in overrides {
        match slots.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = replacement,
            None => slots.push((name, replacement)),
        }
    }
    slots
        .into_iter()
        .filter_map(|(name, schema)| schema.map(|s| (name, s)))
        .collect()
}
