mod build;
pub mod error;
pub mod heading;
mod structural;

pub use error::ParseError;

use crate::SchemaDocument;
use crate::identity::IdGenerator;
use crate::schema::SchemaBuilder;

/// Schema document parser entry point.
pub struct Parser<'g> {
    source: String,
    file_id: usize,
    builder: SchemaBuilder<'g>,
}

impl Parser<'static> {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            builder: SchemaBuilder::new(),
        }
    }
}

impl<'g> Parser<'g> {
    /// A parser whose schemas draw identity tokens from `ids`.
    pub fn with_ids(source: String, file_id: usize, ids: &'g dyn IdGenerator) -> Self {
        Parser {
            source,
            file_id,
            builder: SchemaBuilder::with_ids(ids),
        }
    }

    /// Parse the source Markdown into its block definitions.
    pub fn parse(&self) -> Result<SchemaDocument, Vec<ParseError>> {
        let declarations = structural::parse_declarations(&self.source, self.file_id)?;
        let definitions =
            build::SchemaAssembler::new(&self.builder, self.file_id).assemble(&declarations)?;
        Ok(SchemaDocument {
            definitions,
            source_id: self.file_id,
        })
    }
}
