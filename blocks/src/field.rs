use std::fmt;

use crate::asset::Media;
use crate::form::FormData;
use crate::html::escape;
use crate::value::Value;

/// 2^53: floats at or beyond this no longer hold every whole number.
const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// The capability surface of a delegated leaf: something that knows how to
/// draw a control, read it back from a submission and validate the result.
///
/// Blocks treat a widget as opaque. Everything a widget emits for the
/// element named `name` must derive its ids from `name` so that several
/// bound instances can share a page.
pub trait FieldWidget: fmt::Debug + Send + Sync {
    /// HTML for the control itself, without any label.
    fn render(&self, name: &str, value: &Value) -> String;

    /// Read the field's value back. `None` means the field was not submitted.
    fn value_from_submission(&self, data: &FormData, name: &str) -> Option<Value>;

    /// Validate and normalize. Errors are user-facing messages.
    fn clean(&self, value: &Value) -> Result<Value, Vec<String>>;

    /// Value used when none is supplied.
    fn default_value(&self) -> Value {
        Value::Null
    }

    fn media(&self) -> Media {
        Media::new()
    }

    /// One-time HTML this widget needs on the page, ids namespaced by
    /// `definition_prefix`.
    fn declarations(&self, _definition_prefix: &str) -> String {
        String::new()
    }

    /// Client expression wiring up dynamic behavior for every instance.
    fn js_initializer(&self, _definition_prefix: &str) -> Option<String> {
        None
    }
}

/// A whole-number input with optional bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerField {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl IntegerField {
    pub fn new() -> Self {
        IntegerField::default()
    }

    pub fn with_min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }
}

impl FieldWidget for IntegerField {
    fn render(&self, name: &str, value: &Value) -> String {
        let mut attrs = String::new();
        if let Some(min) = self.min {
            attrs.push_str(&format!(" min=\"{}\"", min));
        }
        if let Some(max) = self.max {
            attrs.push_str(&format!(" max=\"{}\"", max));
        }
        format!(
            "<input type=\"number\" name=\"{}\" id=\"{}\" value=\"{}\"{}>",
            escape(name),
            escape(name),
            escape(&value.to_scalar_string()),
            attrs
        )
    }

    fn value_from_submission(&self, data: &FormData, name: &str) -> Option<Value> {
        let raw = data.text(name)?.trim();
        if raw.is_empty() {
            return Some(Value::Null);
        }
        Some(match raw.parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Text(raw.to_string()),
        })
    }

    fn clean(&self, value: &Value) -> Result<Value, Vec<String>> {
        let n = match value {
            Value::Null => return Ok(Value::Null),
            Value::Integer(n) => *n,
            Value::Number(n) if n.fract() == 0.0 && n.abs() < EXACT_LIMIT => *n as i64,
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| vec!["Enter a whole number.".to_string()])?,
            _ => return Err(vec!["Enter a whole number.".to_string()]),
        };
        let mut errors = Vec::new();
        if let Some(min) = self.min.filter(|min| n < *min) {
            errors.push(format!(
                "Ensure this value is greater than or equal to {}.",
                min
            ));
        }
        if let Some(max) = self.max.filter(|max| n > *max) {
            errors.push(format!("Ensure this value is less than or equal to {}.", max));
        }
        if errors.is_empty() {
            Ok(Value::Integer(n))
        } else {
            Err(errors)
        }
    }
}
