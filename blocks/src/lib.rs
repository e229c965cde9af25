pub mod asset;
pub mod field;
pub mod form;
pub mod html;
pub mod identity;
pub mod parser;
pub mod schema;
pub mod value;

use std::ops::Range;
use std::sync::Arc;

pub use crate::asset::{Asset, Media};
pub use crate::field::{FieldWidget, IntegerField};
pub use crate::form::{FormData, FormValue};
pub use crate::identity::{BlockId, IdGenerator, SequentialIds};
pub use crate::schema::{BlockOptions, Child, Leaf, Schema, SchemaBuilder, SchemaError, SchemaKind};
pub use crate::value::{StreamItem, Value};

/// A parsed schema document.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    /// Top-level definitions (heading level 1), in document order.
    pub definitions: Vec<Definition>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

/// A named top-level block definition.
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub schema: Arc<Schema>,
    /// Byte span in source for error reporting.
    pub span: Range<usize>,
}

impl SchemaDocument {
    /// Case-insensitive definition lookup. Tries exact match first.
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions
            .iter()
            .find(|d| d.name == name)
            .or_else(|| {
                let lower = name.to_lowercase();
                self.definitions
                    .iter()
                    .find(|d| d.name.to_lowercase() == lower)
            })
    }

    /// The first definition, used when no block is named.
    pub fn first(&self) -> Option<&Definition> {
        self.definitions.first()
    }
}
