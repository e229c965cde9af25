use std::collections::BTreeMap;
use std::ops::Bound;

/// A single submitted form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    /// An uploaded file. Only its metadata is kept; storage is the host's concern.
    File {
        filename: String,
        content_type: Option<String>,
        size: u64,
    },
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(s) => Some(s),
            FormValue::File { .. } => None,
        }
    }
}

/// The flat field mapping produced by an HTML form POST, keyed by the
/// prefix-derived field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: BTreeMap<String, FormValue>,
}

impl FormData {
    pub fn new() -> Self {
        FormData::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), FormValue::Text(v.into())))
            .collect();
        FormData { fields }
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    /// A repeated key keeps its last value, as a form field map does.
    pub fn from_urlencoded(body: &str) -> Self {
        let fields = url::form_urlencoded::parse(body.trim().as_bytes())
            .map(|(k, v)| (k.into_owned(), FormValue::Text(v.into_owned())))
            .collect();
        FormData { fields }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FormValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name, FormValue::Text(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FormValue::as_text)
    }

    /// True if any field is named `prefix` itself or starts with `prefix-`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let nested = format!("{}-", prefix);
        self.fields
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(prefix))
            .any(|(name, _)| name == prefix || name.starts_with(&nested))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
