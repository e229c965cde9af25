use std::collections::BTreeMap;
use std::fmt;

/// A value tree whose shape follows the schema it is bound to.
///
/// Leaf schemas hold scalars (`Null`, `Text`, `Integer`, `Number`, `Boolean`), struct
/// schemas hold a `Map`, list schemas a `List` and stream schemas a `Stream`
/// of typed items.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    /// Whole numbers such as chosen item ids, kept exact.
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
    Stream(Vec<StreamItem>),
}

/// One entry of a stream value: the child type tag plus that child's value.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem {
    pub block_type: String,
    pub value: Value,
}

impl StreamItem {
    pub fn new(block_type: impl Into<String>, value: Value) -> Self {
        StreamItem {
            block_type: block_type.into(),
            value,
        }
    }
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Look up a struct member. Returns `None` for non-map values.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(name),
            _ => None,
        }
    }

    /// True for `Null`, the empty string and empty containers.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Integer(_) | Value::Number(_) | Value::Boolean(_) => false,
            Value::Map(entries) => entries.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Stream(items) => items.is_empty(),
        }
    }

    /// Scalar as it appears in an HTML `value` attribute.
    /// Containers have no scalar form and yield the empty string.
    pub fn to_scalar_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Boolean(b) => b.to_string(),
            Value::Map(_) | Value::List(_) | Value::Stream(_) => String::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Map(_) => "mapping",
            Value::List(_) => "list",
            Value::Stream(_) => "stream",
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (name, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Stream(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for StreamItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"type\": {:?}, \"value\": {}}}", self.block_type, self.value)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<StreamItem>> for Value {
    fn from(items: Vec<StreamItem>) -> Self {
        Value::Stream(items)
    }
}
