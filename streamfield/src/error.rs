use std::collections::BTreeMap;

/// A submission whose bookkeeping fields are missing or tampered with.
/// This is a client error for the request, never a validation message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedSubmission {
    #[error("missing count field `{field}`")]
    MissingCount { field: String },
    #[error("count field `{field}` is not a non-negative integer: `{value}`")]
    InvalidCount { field: String, value: String },
    #[error("order field `{field}` is not an integer: `{value}`")]
    InvalidOrder { field: String, value: String },
    #[error("missing type field `{field}`")]
    MissingType { field: String },
    #[error("type field `{field}` names unknown block type `{block_type}`")]
    UnknownType { field: String, block_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("stream `{prefix}` holds an item of unknown block type `{block_type}`")]
    UnknownBlockType { prefix: String, block_type: String },
}

/// Validation failure, shaped like the value that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Messages for a leaf, or for any node whose value has the wrong shape.
    #[error("{}", .0.join(" "))]
    Invalid(Vec<String>),
    /// Failures of a struct's children, by child name. Children that
    /// passed are absent.
    #[error("{} child block(s) failed validation", .0.len())]
    Struct(BTreeMap<String, ValidationError>),
    /// One slot per list or stream item, `None` where the item passed.
    #[error("{} item(s) failed validation", .0.iter().filter(|e| e.is_some()).count())]
    List(Vec<Option<ValidationError>>),
}

impl ValidationError {
    pub fn message(message: impl Into<String>) -> Self {
        ValidationError::Invalid(vec![message.into()])
    }

    /// Messages attached directly to this node.
    pub fn messages(&self) -> &[String] {
        match self {
            ValidationError::Invalid(messages) => messages,
            ValidationError::Struct(_) | ValidationError::List(_) => &[],
        }
    }

    pub fn member(&self, name: &str) -> Option<&ValidationError> {
        match self {
            ValidationError::Struct(children) => children.get(name),
            _ => None,
        }
    }

    pub fn item(&self, index: usize) -> Option<&ValidationError> {
        match self {
            ValidationError::List(items) => items.get(index).and_then(Option::as_ref),
            _ => None,
        }
    }

    /// Every message in the tree paired with the field path it belongs to,
    /// paths built with the same `-` joining as field prefixes.
    pub fn flatten(&self, prefix: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.flatten_into(prefix, &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        match self {
            ValidationError::Invalid(messages) => {
                for message in messages {
                    out.push((prefix.to_string(), message.clone()));
                }
            }
            ValidationError::Struct(children) => {
                for (name, error) in children {
                    error.flatten_into(&format!("{}-{}", prefix, name), out);
                }
            }
            ValidationError::List(items) => {
                for (index, error) in items.iter().enumerate() {
                    if let Some(error) = error {
                        error.flatten_into(&format!("{}-{}", prefix, index), out);
                    }
                }
            }
        }
    }
}
