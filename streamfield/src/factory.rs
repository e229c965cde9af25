use std::sync::Arc;

use blocks::asset::Media;
use blocks::form::FormData;
use blocks::schema::Schema;
use blocks::value::Value;
use tracing::debug;

use crate::bound::{BoundBlock, bind};
use crate::clean::clean;
use crate::declarations::{all_declarations, all_media, js_initializer};
use crate::error::{MalformedSubmission, RenderError, ValidationError};
use crate::render::{RenderOptions, render_with};
use crate::submission::value_from_submission;

/// Per-page entry point for one root schema: binds instances, renders them
/// with a fixed set of options and produces the page-level declarations.
#[derive(Debug, Clone)]
pub struct BlockFactory {
    root: Arc<Schema>,
    options: RenderOptions,
}

impl BlockFactory {
    pub fn new(root: Arc<Schema>) -> Self {
        BlockFactory {
            root,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.root
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn definition_prefix(&self) -> String {
        self.root.definition_prefix()
    }

    pub fn bind<'a>(&'a self, value: &'a Value, prefix: &str) -> BoundBlock<'a> {
        debug!(
            definition = %self.root.definition_prefix(),
            prefix,
            "binding root block"
        );
        bind(&self.root, value, prefix)
    }

    pub fn render(&self, value: &Value, prefix: &str) -> Result<String, RenderError> {
        render_with(&self.bind(value, prefix), &self.options)
    }

    /// Render with an error tree from a failed `clean` shown inline.
    pub fn render_with_errors(
        &self,
        value: &Value,
        errors: &ValidationError,
        prefix: &str,
    ) -> Result<String, RenderError> {
        render_with(&self.bind(value, prefix).with_errors(errors), &self.options)
    }

    pub fn media(&self) -> Media {
        all_media(&self.root)
    }

    pub fn html_declarations(&self) -> Result<String, RenderError> {
        all_declarations(&self.root)
    }

    pub fn js_initializer(&self) -> Option<String> {
        js_initializer(&self.root)
    }

    pub fn value_from_submission(
        &self,
        data: &FormData,
        prefix: &str,
    ) -> Result<Value, MalformedSubmission> {
        value_from_submission(&self.root, data, prefix)
    }

    pub fn clean(&self, value: &Value) -> Result<Value, ValidationError> {
        clean(&self.root, value)
    }
}
