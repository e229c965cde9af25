//! Line-level grammar of schema documents: `name: kind` headings and
//! `key: value` option items.

use std::fmt;
use std::ops::Range;

use crate::parser::error::ParseError;

/// What a heading declares its block to be.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadingKind {
    Text,
    Chooser,
    Integer,
    Struct,
    Stream,
    /// `list` with its child given as the single sub-heading.
    List,
    /// `list of <kind>` with a leaf kind or a definition name.
    ListOf(Box<HeadingKind>),
    /// The name of an earlier top-level definition.
    Reference(String),
}

impl HeadingKind {
    pub fn takes_children(&self) -> bool {
        matches!(self, HeadingKind::Struct | HeadingKind::Stream | HeadingKind::List)
    }
}

impl fmt::Display for HeadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadingKind::Text => write!(f, "text"),
            HeadingKind::Chooser => write!(f, "chooser"),
            HeadingKind::Integer => write!(f, "integer"),
            HeadingKind::Struct => write!(f, "struct"),
            HeadingKind::Stream => write!(f, "stream"),
            HeadingKind::List => write!(f, "list"),
            HeadingKind::ListOf(inner) => write!(f, "list of {}", inner),
            HeadingKind::Reference(name) => write!(f, "{}", name),
        }
    }
}

/// A parsed `name: kind` heading.
#[derive(Debug, Clone)]
pub struct Heading {
    pub name: String,
    pub kind: HeadingKind,
}

/// One `- key: value` (or bare `- key`) option line.
#[derive(Debug, Clone)]
pub struct OptionLine {
    pub key: String,
    pub value: Option<String>,
    pub span: Range<usize>,
}

pub fn parse_heading(
    text: &str,
    span: Range<usize>,
    file_id: usize,
) -> Result<Heading, ParseError> {
    let Some((name, kind)) = text.split_once(':') else {
        return Err(ParseError::error(
            format!("expected `name: kind` heading, found `{}`", text),
            span,
            file_id,
        )
        .with_note("e.g. `## job_title: text`"));
    };
    let name = name.trim();
    if !is_identifier(name) {
        return Err(ParseError::error(
            format!("invalid block name `{}`", name),
            span,
            file_id,
        )
        .with_note("block names use letters, digits and underscores, and do not start with a digit"));
    }
    let kind = parse_kind(kind.trim(), span, file_id)?;
    Ok(Heading {
        name: name.to_string(),
        kind,
    })
}

fn parse_kind(text: &str, span: Range<usize>, file_id: usize) -> Result<HeadingKind, ParseError> {
    let words: Vec<&str> = text.split_whitespace().collect();
    match words.as_slice() {
        [] => Err(ParseError::error("missing block kind", span, file_id)),
        ["list"] => Ok(HeadingKind::List),
        ["list", "of", inner] => {
            let inner = parse_kind(inner, span.clone(), file_id)?;
            if inner.takes_children() {
                return Err(ParseError::error(
                    "`list of` takes a leaf kind or a definition name",
                    span,
                    file_id,
                )
                .with_note("declare the item inline with `list` and a single sub-heading"));
            }
            Ok(HeadingKind::ListOf(Box::new(inner)))
        }
        [word] => Ok(match *word {
            "text" => HeadingKind::Text,
            "chooser" => HeadingKind::Chooser,
            "integer" => HeadingKind::Integer,
            "struct" => HeadingKind::Struct,
            "stream" => HeadingKind::Stream,
            name if is_identifier(name) => HeadingKind::Reference(name.to_string()),
            other => {
                return Err(ParseError::error(
                    format!("unknown block kind `{}`", other),
                    span,
                    file_id,
                ));
            }
        }),
        _ => Err(ParseError::error(
            format!("unknown block kind `{}`", text),
            span,
            file_id,
        )),
    }
}

/// Parse the text of an unordered-list item as an option.
pub fn parse_option(text: &str, span: Range<usize>) -> OptionLine {
    match text.split_once(':') {
        Some((key, value)) => OptionLine {
            key: key.trim().to_lowercase(),
            value: Some(value.trim().to_string()),
            span,
        },
        None => OptionLine {
            key: text.trim().to_lowercase(),
            value: None,
            span,
        },
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
