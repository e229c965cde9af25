use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::parser::error::ParseError;
use crate::parser::heading::{self, HeadingKind, OptionLine};

/// A block declaration as written in the document, before schema construction.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub kind: HeadingKind,
    pub level: u8,
    pub options: Vec<OptionLine>,
    /// Paragraph text under the heading.
    pub help: Vec<String>,
    pub children: Vec<Declaration>,
    /// Span of the heading line.
    pub heading_span: Range<usize>,
    /// Span from the heading to the start of the next sibling or outer heading.
    pub span: Range<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse Markdown source text into a list of top-level declarations.
pub fn parse_declarations(
    source: &str,
    file_id: usize,
) -> Result<Vec<Declaration>, Vec<ParseError>> {
    let parser = CmarkParser::new_ext(source, Options::empty());
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = ParseState::new(source, file_id);
    state.process_events(&events);
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    /// Stack of declarations being built. Innermost = current scope.
    stack: Vec<DeclarationBuilder>,
    /// Completed top-level declarations.
    top: Vec<Declaration>,
    errors: Vec<ParseError>,
    /// Set after a malformed heading: content up to the next heading is skipped.
    skipping: bool,
}

struct DeclarationBuilder {
    name: String,
    kind: HeadingKind,
    level: u8,
    options: Vec<OptionLine>,
    help: Vec<String>,
    children: Vec<Declaration>,
    heading_span: Range<usize>,
}

impl DeclarationBuilder {
    fn into_declaration(self, span_end: usize) -> Declaration {
        let span = self.heading_span.start..span_end;
        Declaration {
            name: self.name,
            kind: self.kind,
            level: self.level,
            options: self.options,
            help: self.help,
            children: self.children,
            heading_span: self.heading_span,
            span,
        }
    }
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            stack: Vec::new(),
            top: Vec::new(),
            errors: Vec::new(),
            skipping: false,
        }
    }

    fn process_events(&mut self, events: &[(Event<'_>, Range<usize>)]) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];

            match ev {
                Event::Start(Tag::Heading { level, .. }) => {
                    let heading_level = heading_level_to_u8(level);

                    i += 1;
                    let text = normalize_text(&collect_text_until(events, &mut i, |e| {
                        matches!(e, TagEnd::Heading(_))
                    }));
                    let heading_span = trim_span(self.source, range.clone());

                    // A new heading closes every open declaration at the same or deeper level
                    self.close_to_level(heading_level, range.start);

                    match heading::parse_heading(&text, heading_span.clone(), self.file_id) {
                        Ok(parsed) => {
                            self.skipping = false;
                            self.stack.push(DeclarationBuilder {
                                name: parsed.name,
                                kind: parsed.kind,
                                level: heading_level,
                                options: Vec::new(),
                                help: Vec::new(),
                                children: Vec::new(),
                                heading_span,
                            });
                        }
                        Err(err) => {
                            self.errors.push(err);
                            self.skipping = true;
                        }
                    }
                }

                // Unordered list = options of the current declaration
                Event::Start(Tag::List(None)) => {
                    i += 1;
                    let options = self.collect_options(events, &mut i);
                    if self.skipping {
                        continue;
                    }
                    if let Some(builder) = self.stack.last_mut() {
                        builder.options.extend(options);
                    }
                }

                // Paragraph = help text
                Event::Start(Tag::Paragraph) => {
                    i += 1;
                    let text = normalize_text(&collect_text_until(events, &mut i, |e| {
                        matches!(e, TagEnd::Paragraph)
                    }));
                    if self.skipping || text.is_empty() {
                        continue;
                    }
                    if let Some(builder) = self.stack.last_mut() {
                        builder.help.push(text);
                    }
                }

                _ => {
                    i += 1;
                }
            }
        }
    }

    /// Collect the items of an unordered list as option lines.
    fn collect_options(
        &self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
    ) -> Vec<OptionLine> {
        let mut options = Vec::new();
        let mut depth = 1u32;

        while *i < events.len() {
            let (ref ev, ref range) = events[*i];
            match ev {
                Event::Start(Tag::List(_)) => {
                    depth += 1;
                    *i += 1;
                }
                Event::End(TagEnd::List(_)) => {
                    *i += 1;
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Event::Start(Tag::Item) if depth == 1 => {
                    *i += 1;
                    let text = collect_text_until(events, i, |e| matches!(e, TagEnd::Item));
                    let span = trim_span(self.source, range.clone());
                    options.push(heading::parse_option(&normalize_text(&text), span));
                }
                _ => {
                    *i += 1;
                }
            }
        }

        options
    }

    /// Close declarations from the stack down to the given heading level.
    fn close_to_level(&mut self, new_level: u8, span_end: usize) {
        while let Some(top) = self.stack.last() {
            if top.level < new_level {
                break;
            }
            let Some(builder) = self.stack.pop() else {
                break;
            };
            self.attach(builder.into_declaration(span_end));
        }
    }

    fn attach(&mut self, declaration: Declaration) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(declaration);
        } else {
            self.top.push(declaration);
        }
    }

    fn finalize(mut self) -> Result<Vec<Declaration>, Vec<ParseError>> {
        let end = self.source.len();

        while let Some(builder) = self.stack.pop() {
            let declaration = builder.into_declaration(end);
            self.attach(declaration);
        }

        if self.errors.is_empty() {
            Ok(self.top)
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Collect all text content until a matching End tag.
fn collect_text_until(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) | Event::Code(s) => {
                text.push_str(s);
                *i += 1;
            }
            Event::SoftBreak | Event::HardBreak => {
                text.push(' ');
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}

/// Strip leading/trailing whitespace, collapse interior whitespace.
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop the trailing newline pulldown-cmark includes in block ranges, so
/// diagnostics underline a single line.
fn trim_span(source: &str, span: Range<usize>) -> Range<usize> {
    let text = &source[span.clone()];
    let trimmed = text.trim_end();
    span.start..span.start + trimmed.len()
}
