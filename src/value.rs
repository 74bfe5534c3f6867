//! Field values produced by the conversion pipeline.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::Serialize;
use std::borrow::Cow;

/// A field value.
///
/// Freshly read fields are [`Value::String`] (or [`Value::Null`] for columns a
/// short row did not fill); converters turn them into the other variants.
/// Numbers produced by `number`/`int` stay textual to avoid precision loss.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    String(String),
    /// A JSON number.
    Number(serde_json::Number),
    Date(DateTime<FixedOffset>),
    List(Vec<Value>),
    /// An ordered map, e.g. a JSON object decoded in `array` mode.
    Map(IndexMap<String, Value>),
    /// A structured JSON object, decoded in `object` mode.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `true` for null, the empty string and whitespace-only strings.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Textual form used when the value is written to a CSV field; `None` for null.
    pub fn to_field_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(Cow::Borrowed(s)),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Date(d) => Some(Cow::Owned(d.to_rfc3339())),
            Value::List(_) | Value::Map(_) | Value::Json(_) => {
                Some(Cow::Owned(serde_json::to_string(self).unwrap_or_default()))
            }
        }
    }

    /// Converts parsed JSON. Objects become [`Value::Map`], or stay structured
    /// [`Value::Json`] objects when `keep_objects` is set.
    pub fn from_json(json: serde_json::Value, keep_objects: bool) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(|v| Value::from_json(v, keep_objects))
                    .collect(),
            ),
            obj @ serde_json::Value::Object(_) if keep_objects => Value::Json(obj),
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v, keep_objects)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(d: DateTime<FixedOffset>) -> Self {
        Value::Date(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json, false)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank() {
        assert!(Value::Null.is_blank());
        assert!(Value::from(" \t").is_blank());
        assert!(!Value::from("0").is_blank());
        assert!(!Value::Bool(false).is_blank());
    }

    #[test]
    fn test_field_text() {
        assert_eq!(Value::Null.to_field_text(), None);
        assert_eq!(Value::from(12i64).to_field_text().unwrap(), "12");
        assert_eq!(Value::from(true).to_field_text().unwrap(), "true");
        assert_eq!(
            Value::from(vec!["a", "b"]).to_field_text().unwrap(),
            r#"["a","b"]"#
        );
    }

    #[test]
    fn test_from_json_modes() {
        let parsed = json!({"b": 9, "a": [1, {"c": null}]});
        let Value::Map(map) = Value::from_json(parsed.clone(), false) else {
            panic!("expected map");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(map["b"], Value::from(9i64));

        assert_eq!(Value::from_json(parsed.clone(), true), Value::Json(parsed));
        assert_eq!(
            Value::from_json(json!([5, 8]), true),
            Value::List(vec![Value::from(5i64), Value::from(8i64)])
        );
    }
}
