//! One-time page fragments: `<script type="text/template">` declarations,
//! asset lists and client initializer expressions. All three are computed
//! per schema node, never per bound instance.

use std::collections::{HashMap, HashSet};

use blocks::asset::Media;
use blocks::html::{escape, escape_js_string};
use blocks::identity::BlockId;
use blocks::schema::{Leaf, Schema, SchemaKind};
use tracing::debug;

use crate::bound::bind;
use crate::error::RenderError;
use crate::render::{render, stream_menu};

/// Prefix the client replaces with a real prefix when it instantiates a
/// template.
pub const TEMPLATE_PREFIX: &str = "__PREFIX__";

/// `root` and every schema reachable from it, pre-order, each identity
/// once no matter how many times it is referenced.
pub fn dependency_closure(root: &Schema) -> Vec<&Schema> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(schema) = stack.pop() {
        if !seen.insert(schema.id()) {
            continue;
        }
        out.push(schema);
        for child in schema.child_schemas().into_iter().rev() {
            stack.push(child.as_ref());
        }
    }
    out
}

/// Concatenated one-time declarations of the dependency closure.
pub fn all_declarations(root: &Schema) -> Result<String, RenderError> {
    let closure = dependency_closure(root);
    debug!(root = %root.id(), nodes = closure.len(), "collecting declarations");
    let mut fragments = Vec::new();
    for schema in closure {
        let fragment = own_declarations(schema)?;
        if !fragment.is_empty() {
            fragments.push(fragment);
        }
    }
    Ok(fragments.join("\n"))
}

/// Assets the dependency closure needs, in first-use order.
pub fn all_media(root: &Schema) -> Media {
    let mut media = Media::new();
    for schema in dependency_closure(root) {
        media.extend(own_media(schema));
    }
    media
}

/// The initializer expression for `schema`, or `None` when nothing under
/// it needs client behavior.
pub fn js_initializer(schema: &Schema) -> Option<String> {
    InitializerCache::new().initializer(schema)
}

fn own_declarations(schema: &Schema) -> Result<String, RenderError> {
    let def = schema.definition_prefix();
    match schema.kind() {
        SchemaKind::Leaf(Leaf::Field(widget)) => Ok(widget.declarations(&def)),
        SchemaKind::Leaf(_) | SchemaKind::Struct(_) => Ok(String::new()),
        SchemaKind::List(list) => {
            let child = list.child();
            let template = render(&bind(child, child.default(), TEMPLATE_PREFIX))?;
            Ok(format!(
                "<script type=\"text/template\" id=\"{}-template\">{}</script>",
                def, template
            ))
        }
        SchemaKind::Stream(stream) => {
            let mut out = String::new();
            for child in stream.children() {
                let bound = bind(&child.schema, child.schema.default(), TEMPLATE_PREFIX)
                    .with_name(&child.name);
                out.push_str(&format!(
                    "<script type=\"text/template\" id=\"{}-template-{}\">{}</script>\n",
                    def,
                    escape(&child.name),
                    render(&bound)?
                ));
            }
            out.push_str(&format!(
                "<script type=\"text/template\" id=\"{}-menutemplate\">{}</script>",
                def,
                stream_menu(TEMPLATE_PREFIX, stream)
            ));
            Ok(out)
        }
    }
}

fn own_media(schema: &Schema) -> Media {
    match schema.kind() {
        SchemaKind::Leaf(Leaf::TextInput { .. }) => Media::new(),
        SchemaKind::Leaf(Leaf::Chooser) => Media::scripts(["js/blocks/chooser.js"]),
        SchemaKind::Leaf(Leaf::Field(widget)) => widget.media(),
        SchemaKind::Struct(_) => Media::scripts(["js/blocks/struct.js"]),
        SchemaKind::List(_) => Media::scripts(["js/blocks/macro.js", "js/blocks/list.js"]),
        SchemaKind::Stream(_) => Media::scripts(["js/blocks/stream.js"]),
    }
}

/// Memo of initializer expressions by schema identity. A node's expression
/// is built at most once per cache, however often the node is shared.
#[derive(Debug, Default)]
pub struct InitializerCache {
    computed: HashMap<BlockId, Option<String>>,
    builds: usize,
}

impl InitializerCache {
    pub fn new() -> Self {
        InitializerCache::default()
    }

    /// Number of distinct schema nodes seen so far.
    pub fn distinct_nodes(&self) -> usize {
        self.computed.len()
    }

    /// Number of times an expression was actually built, cache misses only.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn initializer(&mut self, schema: &Schema) -> Option<String> {
        if let Some(cached) = self.computed.get(&schema.id()) {
            return cached.clone();
        }
        self.builds += 1;
        let built = self.build(schema);
        self.computed.insert(schema.id(), built.clone());
        built
    }

    fn build(&mut self, schema: &Schema) -> Option<String> {
        let def = escape_js_string(&schema.definition_prefix());
        match schema.kind() {
            SchemaKind::Leaf(Leaf::TextInput { .. }) => None,
            SchemaKind::Leaf(Leaf::Chooser) => Some(format!("Chooser('{}')", def)),
            SchemaKind::Leaf(Leaf::Field(widget)) => {
                widget.js_initializer(&schema.definition_prefix())
            }
            SchemaKind::Struct(structure) => {
                let entries: Vec<String> = structure
                    .children()
                    .iter()
                    .filter_map(|child| {
                        self.initializer(&child.schema).map(|init| {
                            format!("['{}', {}]", escape_js_string(&child.name), init)
                        })
                    })
                    .collect();
                if entries.is_empty() {
                    return None;
                }
                Some(format!("StructBlock('{}', [\n{}\n])", def, entries.join(",\n")))
            }
            SchemaKind::List(list) => Some(match self.initializer(list.child()) {
                Some(child) => format!("ListBlock('{}', {})", def, child),
                None => format!("ListBlock('{}')", def),
            }),
            SchemaKind::Stream(stream) => {
                let entries: Vec<String> = stream
                    .children()
                    .iter()
                    .map(|child| {
                        let init = self
                            .initializer(&child.schema)
                            .unwrap_or_else(|| "null".to_string());
                        format!(
                            "{{'name': '{}', 'initializer': {}}}",
                            escape_js_string(&child.name),
                            init
                        )
                    })
                    .collect();
                Some(format!("StreamBlock('{}', [\n{}\n])", def, entries.join(",\n")))
            }
        }
    }
}
