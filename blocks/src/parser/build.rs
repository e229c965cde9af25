use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::Definition;
use crate::field::IntegerField;
use crate::parser::error::ParseError;
use crate::parser::heading::{HeadingKind, OptionLine};
use crate::parser::structural::Declaration;
use crate::schema::{BlockOptions, Leaf, Schema, SchemaBuilder, SchemaError};
use crate::value::Value;

/// Turns declarations into schemas. Top-level definitions are registered as
/// they complete, so a reference must name an earlier definition.
pub struct SchemaAssembler<'b, 'g> {
    builder: &'b SchemaBuilder<'g>,
    file_id: usize,
    definitions: HashMap<String, (Arc<Schema>, Range<usize>)>,
    errors: Vec<ParseError>,
}

/// Settings that only apply to particular leaf kinds.
#[derive(Default)]
struct LeafSettings {
    max_length: Option<usize>,
    min: Option<i64>,
    max: Option<i64>,
}

impl<'b, 'g> SchemaAssembler<'b, 'g> {
    pub fn new(builder: &'b SchemaBuilder<'g>, file_id: usize) -> Self {
        SchemaAssembler {
            builder,
            file_id,
            definitions: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn assemble(
        mut self,
        declarations: &[Declaration],
    ) -> Result<Vec<Definition>, Vec<ParseError>> {
        let mut out = Vec::new();
        for declaration in declarations {
            if let Some((_, first_span)) = self.definitions.get(&declaration.name) {
                let err = ParseError::error(
                    format!("duplicate definition `{}`", declaration.name),
                    declaration.heading_span.clone(),
                    self.file_id,
                )
                .with_related(first_span.clone(), "first defined here");
                self.errors.push(err);
                continue;
            }
            let Some(schema) = self.build(declaration) else {
                continue;
            };
            debug!(
                name = %declaration.name,
                id = %schema.id(),
                kind = schema.kind_name(),
                "definition assembled"
            );
            self.definitions.insert(
                declaration.name.clone(),
                (Arc::clone(&schema), declaration.heading_span.clone()),
            );
            out.push(Definition {
                name: declaration.name.clone(),
                schema,
                span: declaration.span.clone(),
            });
        }

        if self.errors.is_empty() {
            Ok(out)
        } else {
            Err(self.errors)
        }
    }

    fn build(&mut self, decl: &Declaration) -> Option<Arc<Schema>> {
        if !decl.kind.takes_children() {
            if let Some(child) = decl.children.first() {
                self.errors.push(
                    ParseError::error(
                        format!("`{}` cannot have child blocks", decl.name),
                        child.heading_span.clone(),
                        self.file_id,
                    )
                    .with_related(decl.heading_span.clone(), "declared here"),
                );
                return None;
            }
        }

        match &decl.kind {
            HeadingKind::Reference(name) => {
                if let Some(option) = decl.options.first() {
                    self.errors.push(
                        ParseError::error(
                            format!("option `{}` cannot be applied to a reference", option.key),
                            option.span.clone(),
                            self.file_id,
                        )
                        .with_note(format!("`{}` is shared; set options on its definition", name)),
                    );
                    return None;
                }
                self.resolve(name, &decl.heading_span)
            }
            HeadingKind::Text | HeadingKind::Chooser | HeadingKind::Integer => {
                let (options, settings) = self.options(decl)?;
                Some(self.leaf(&decl.kind, options, settings))
            }
            HeadingKind::ListOf(inner) => {
                let (options, _) = self.options(decl)?;
                let child = match inner.as_ref() {
                    HeadingKind::Reference(name) => self.resolve(name, &decl.heading_span)?,
                    kind => self.leaf(kind, BlockOptions::new(), LeafSettings::default()),
                };
                Some(self.builder.list(child, options))
            }
            HeadingKind::List => {
                let (options, _) = self.options(decl)?;
                let [only] = decl.children.as_slice() else {
                    self.errors.push(
                        ParseError::error(
                            format!(
                                "list `{}` needs exactly one child block, found {}",
                                decl.name,
                                decl.children.len()
                            ),
                            decl.heading_span.clone(),
                            self.file_id,
                        )
                        .with_note("or write `list of <kind>`"),
                    );
                    return None;
                };
                let child = self.build(only)?;
                Some(self.builder.list(child, options))
            }
            HeadingKind::Struct | HeadingKind::Stream => {
                let options = self.options(decl).map(|(options, _)| options);
                let mut children = Vec::new();
                let mut complete = true;
                for child in &decl.children {
                    match self.build(child) {
                        Some(schema) => children.push((child.name.clone(), schema)),
                        None => complete = false,
                    }
                }
                let options = options?;
                if !complete {
                    return None;
                }
                let built = if decl.kind == HeadingKind::Struct {
                    self.builder.structure(children, options)
                } else {
                    self.builder.stream(children, options)
                };
                match built {
                    Ok(schema) => Some(schema),
                    Err(SchemaError::DuplicateChildName { name }) => {
                        self.duplicate_child(decl, &name);
                        None
                    }
                }
            }
        }
    }

    fn leaf(&self, kind: &HeadingKind, options: BlockOptions, settings: LeafSettings) -> Arc<Schema> {
        match kind {
            HeadingKind::Chooser => self.builder.chooser(options),
            HeadingKind::Integer => {
                let widget = IntegerField {
                    min: settings.min,
                    max: settings.max,
                };
                self.builder.field(Arc::new(widget), options)
            }
            _ => self.builder.leaf(
                Leaf::TextInput {
                    max_length: settings.max_length,
                },
                options,
            ),
        }
    }

    fn resolve(&mut self, name: &str, span: &Range<usize>) -> Option<Arc<Schema>> {
        match self.definitions.get(name) {
            Some((schema, _)) => Some(Arc::clone(schema)),
            None => {
                self.errors.push(
                    ParseError::error(
                        format!("unknown block kind or definition `{}`", name),
                        span.clone(),
                        self.file_id,
                    )
                    .with_note("definitions must appear before they are referenced"),
                );
                None
            }
        }
    }

    fn duplicate_child(&mut self, decl: &Declaration, name: &str) {
        let mut clashing = decl.children.iter().filter(|c| c.name == name);
        let first = clashing.next().map(|c| c.heading_span.clone());
        let second = clashing
            .next()
            .map(|c| c.heading_span.clone())
            .unwrap_or_else(|| decl.heading_span.clone());
        let mut err = ParseError::error(
            format!("duplicate child name `{}` in `{}`", name, decl.name),
            second,
            self.file_id,
        );
        if let Some(first) = first {
            err = err.with_related(first, "first used here");
        }
        self.errors.push(err);
    }

    /// Interpret a declaration's option lines and help paragraphs.
    fn options(&mut self, decl: &Declaration) -> Option<(BlockOptions, LeafSettings)> {
        let mut options = BlockOptions::new();
        let mut settings = LeafSettings::default();
        let mut ok = true;

        if !decl.help.is_empty() {
            options.help_text = Some(decl.help.join(" "));
        }

        for line in &decl.options {
            match self.apply_option(decl, line, &mut options, &mut settings) {
                Ok(()) => {}
                Err(err) => {
                    self.errors.push(err);
                    ok = false;
                }
            }
        }

        ok.then_some((options, settings))
    }

    fn apply_option(
        &self,
        decl: &Declaration,
        line: &OptionLine,
        options: &mut BlockOptions,
        settings: &mut LeafSettings,
    ) -> Result<(), ParseError> {
        let value = line.value.as_deref();
        match (line.key.as_str(), &decl.kind) {
            ("required", _) => options.required = true,
            ("label", _) => options.label = Some(self.require_value(line, value)?.to_string()),
            ("help", _) => options.help_text = Some(self.require_value(line, value)?.to_string()),
            ("default", HeadingKind::Text | HeadingKind::Chooser) => {
                options.default = Some(Value::text(self.require_value(line, value)?));
            }
            ("default", HeadingKind::Integer) => {
                let n = self.integer(line, value)?;
                options.default = Some(Value::Integer(n));
            }
            ("default", _) => {
                return Err(ParseError::error(
                    "`default` is only supported on leaf blocks",
                    line.span.clone(),
                    self.file_id,
                ));
            }
            ("max_length", HeadingKind::Text) => {
                let n = self.integer(line, value)?;
                let n = usize::try_from(n).map_err(|_| {
                    ParseError::error("`max_length` must not be negative", line.span.clone(), self.file_id)
                })?;
                settings.max_length = Some(n);
            }
            ("min", HeadingKind::Integer) => settings.min = Some(self.integer(line, value)?),
            ("max", HeadingKind::Integer) => settings.max = Some(self.integer(line, value)?),
            (key, kind) => {
                return Err(ParseError::error(
                    format!("unknown option `{}` for {} block `{}`", key, kind, decl.name),
                    line.span.clone(),
                    self.file_id,
                )
                .with_note("common options: label, default, help, required"));
            }
        }
        Ok(())
    }

    fn require_value<'v>(
        &self,
        line: &OptionLine,
        value: Option<&'v str>,
    ) -> Result<&'v str, ParseError> {
        value.ok_or_else(|| {
            ParseError::error(
                format!("option `{}` needs a value", line.key),
                line.span.clone(),
                self.file_id,
            )
        })
    }

    fn integer(&self, line: &OptionLine, value: Option<&str>) -> Result<i64, ParseError> {
        let raw = self.require_value(line, value)?;
        raw.parse::<i64>().map_err(|_| {
            ParseError::error(
                format!("option `{}` expects an integer, found `{}`", line.key, raw),
                line.span.clone(),
                self.file_id,
            )
        })
    }
}
