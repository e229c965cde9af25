use blocks::html::escape;
use blocks::schema::{Leaf, SchemaKind, StreamSchema};
use tracing::{debug, warn};

use crate::bound::{BoundBlock, BoundChild, Position, StreamEntry};
use crate::error::RenderError;

/// What to do with a stream item whose type tag the stream does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownTypePolicy {
    /// Omit the item and log a warning.
    Drop,
    /// Render a visible marker in the item's place. It carries no inputs, so
    /// the item is lost on the next submission.
    #[default]
    Placeholder,
    Fail,
}

impl std::str::FromStr for UnknownTypePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(UnknownTypePolicy::Drop),
            "placeholder" => Ok(UnknownTypePolicy::Placeholder),
            "fail" => Ok(UnknownTypePolicy::Fail),
            other => Err(format!(
                "unknown policy `{}` (expected drop, placeholder or fail)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub unknown_stream_type: UnknownTypePolicy,
}

impl RenderOptions {
    pub fn new() -> Self {
        RenderOptions::default()
    }

    pub fn unknown_stream_type(mut self, policy: UnknownTypePolicy) -> Self {
        self.unknown_stream_type = policy;
        self
    }
}

pub fn render(bound: &BoundBlock<'_>) -> Result<String, RenderError> {
    render_with(bound, &RenderOptions::default())
}

pub fn render_with(bound: &BoundBlock<'_>, options: &RenderOptions) -> Result<String, RenderError> {
    debug!(
        prefix = bound.prefix(),
        kind = bound.schema().kind_name(),
        "rendering block"
    );
    let renderer = Renderer { options };
    let mut out = String::new();
    renderer.block(bound, &mut out)?;
    Ok(out)
}

/// The "insert an item of type T" menu of a stream rendered at `prefix`.
pub(crate) fn stream_menu(prefix: &str, stream: &StreamSchema) -> String {
    let mut out = format!("<div class=\"stream-menu\" id=\"{}-menu\">", escape(prefix));
    for child in stream.children() {
        out.push_str(&format!(
            "<button type=\"button\" class=\"action-add-block\" data-type=\"{}\">{}</button>",
            escape(&child.name),
            escape(&child.label())
        ));
    }
    out.push_str("</div>");
    out
}

struct Renderer<'o> {
    options: &'o RenderOptions,
}

impl Renderer<'_> {
    fn block(&self, bound: &BoundBlock<'_>, out: &mut String) -> Result<(), RenderError> {
        match bound.schema().kind() {
            SchemaKind::Leaf(leaf) => {
                self.leaf(bound, leaf, out);
                Ok(())
            }
            SchemaKind::Struct(_) => self.structure(bound, out),
            SchemaKind::List(_) => self.list(bound, out),
            SchemaKind::Stream(_) => self.stream(bound, out),
        }
    }

    fn leaf(&self, bound: &BoundBlock<'_>, leaf: &Leaf, out: &mut String) {
        let prefix = escape(bound.prefix());
        if let Some(label) = bound.label() {
            out.push_str(&format!("<label for=\"{}\">{}</label>", prefix, escape(&label)));
        }
        let value = bound.value();
        match leaf {
            Leaf::TextInput { max_length } => {
                let limit = max_length
                    .map(|n| format!(" maxlength=\"{}\"", n))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "<input type=\"text\" name=\"{}\" id=\"{}\" value=\"{}\"{}>",
                    prefix,
                    prefix,
                    escape(&value.to_scalar_string()),
                    limit
                ));
            }
            Leaf::Chooser => {
                out.push_str(&format!(
                    "<input type=\"hidden\" name=\"{}\" id=\"{}\" value=\"{}\">",
                    prefix,
                    prefix,
                    escape(&value.to_scalar_string())
                ));
                out.push_str(&format!(
                    "<button type=\"button\" id=\"{}-button\">Choose</button>",
                    prefix
                ));
            }
            Leaf::Field(widget) => out.push_str(&widget.render(bound.prefix(), value)),
        }
        self.help_and_errors(bound, out);
    }

    fn structure(&self, bound: &BoundBlock<'_>, out: &mut String) -> Result<(), RenderError> {
        out.push_str(&format!(
            "<div class=\"struct-block\" id=\"{}\">",
            escape(bound.prefix())
        ));
        self.container_label(bound, out);
        self.help_and_errors(bound, out);
        out.push_str("<ul>");
        for child in bound.container_children() {
            out.push_str("<li>");
            self.block(&child.block, out)?;
            out.push_str("</li>");
        }
        out.push_str("</ul></div>");
        Ok(())
    }

    fn list(&self, bound: &BoundBlock<'_>, out: &mut String) -> Result<(), RenderError> {
        let prefix = escape(bound.prefix());
        let children = bound.container_children();
        out.push_str(&format!("<div class=\"list-block\" id=\"{}\">", prefix));
        self.container_label(bound, out);
        self.help_and_errors(bound, out);
        hidden(&format!("{}-count", bound.prefix()), &children.len().to_string(), out);
        out.push_str(&format!("<ul id=\"{}-list\">", prefix));
        for BoundChild { position, block } in &children {
            let Position::Item(index) = *position else {
                continue;
            };
            let item_prefix = format!("{}-{}", bound.prefix(), index);
            self.member(&item_prefix, &index.to_string(), None, block, out)?;
        }
        out.push_str("</ul>");
        out.push_str(&format!(
            "<button type=\"button\" id=\"{}-add\">Add</button></div>",
            prefix
        ));
        Ok(())
    }

    fn stream(&self, bound: &BoundBlock<'_>, out: &mut String) -> Result<(), RenderError> {
        let SchemaKind::Stream(stream) = bound.schema().kind() else {
            return Ok(());
        };
        let prefix = escape(bound.prefix());
        let entries = bound.stream_entries();
        let members = entries
            .iter()
            .filter(|entry| matches!(entry, StreamEntry::Member(_)))
            .count();

        out.push_str(&format!("<div class=\"stream-block\" id=\"{}\">", prefix));
        self.container_label(bound, out);
        self.help_and_errors(bound, out);
        hidden(&format!("{}-count", bound.prefix()), &members.to_string(), out);
        out.push_str(&format!("<ul id=\"{}-list\">", prefix));
        for entry in &entries {
            match entry {
                StreamEntry::Member(BoundChild {
                    position: Position::StreamItem { index, block_type },
                    block,
                }) => {
                    let item_prefix = format!("{}-{}", bound.prefix(), index);
                    self.member(&item_prefix, &index.to_string(), Some(*block_type), block, out)?;
                }
                StreamEntry::Member(_) => {}
                StreamEntry::Unknown { block_type } => {
                    self.unknown(bound.prefix(), block_type, out)?;
                }
            }
        }
        out.push_str("</ul>");

        out.push_str(&stream_menu(bound.prefix(), stream));
        out.push_str("</div>");
        Ok(())
    }

    fn unknown(&self, prefix: &str, block_type: &str, out: &mut String) -> Result<(), RenderError> {
        match self.options.unknown_stream_type {
            UnknownTypePolicy::Drop => {
                warn!(prefix, block_type, "dropping stream item of unknown type");
            }
            UnknownTypePolicy::Placeholder => {
                warn!(prefix, block_type, "rendering placeholder for stream item of unknown type");
                out.push_str(&format!(
                    "<li><div class=\"stream-unknown\" data-type=\"{}\">Unknown block type &quot;{}&quot;</div></li>",
                    escape(block_type),
                    escape(block_type)
                ));
            }
            UnknownTypePolicy::Fail => {
                return Err(RenderError::UnknownBlockType {
                    prefix: prefix.to_string(),
                    block_type: block_type.to_string(),
                });
            }
        }
        Ok(())
    }

    /// A sequence member: bookkeeping inputs, reorder/delete controls and
    /// the child's own markup.
    fn member(
        &self,
        item_prefix: &str,
        order: &str,
        block_type: Option<&str>,
        child: &BoundBlock<'_>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let escaped = escape(item_prefix);
        match block_type {
            Some(block_type) => out.push_str(&format!(
                "<li class=\"stream-member\" data-type=\"{}\" id=\"{}-container\">",
                escape(block_type),
                escaped
            )),
            None => out.push_str(&format!(
                "<li class=\"list-member\" id=\"{}-container\">",
                escaped
            )),
        }
        hidden(&format!("{}-deleted", item_prefix), "", out);
        hidden(&format!("{}-order", item_prefix), order, out);
        if let Some(block_type) = block_type {
            hidden(&format!("{}-type", item_prefix), block_type, out);
        }
        for (action, text) in [("moveup", "Move up"), ("movedown", "Move down"), ("delete", "Delete")] {
            out.push_str(&format!(
                "<button type=\"button\" id=\"{}-{}\">{}</button>",
                escaped, action, text
            ));
        }
        self.block(child, out)?;
        out.push_str("</li>");
        Ok(())
    }

    fn container_label(&self, bound: &BoundBlock<'_>, out: &mut String) {
        if let Some(label) = bound.label() {
            out.push_str(&format!("<h3>{}</h3>", escape(&label)));
        }
    }

    fn help_and_errors(&self, bound: &BoundBlock<'_>, out: &mut String) {
        if let Some(help) = bound.schema().help_text() {
            out.push_str(&format!("<p class=\"help\">{}</p>", escape(help)));
        }
        if let Some(errors) = bound.errors() {
            for message in errors.messages() {
                out.push_str(&format!("<p class=\"error-message\">{}</p>", escape(message)));
            }
        }
    }
}

fn hidden(name: &str, value: &str, out: &mut String) {
    let name = escape(name);
    out.push_str(&format!(
        "<input type=\"hidden\" name=\"{}\" id=\"{}\" value=\"{}\">",
        name,
        name,
        escape(value)
    ));
}
