//! Column schemas and column-keyed records.

use crate::error::{CsvError, Result};
use crate::value::Value;
use indexmap::{Equivalent, IndexMap};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Index;

/// Key of a record field.
///
/// Fields covered by the schema use the column name; surplus fields of a row
/// longer than the schema keep their zero-based position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Key {
    Name(String),
    Index(usize),
}

/// Borrowed lookup form of [`Key`]; must hash identically.
#[derive(Debug, Clone, Copy)]
enum KeyRef<'a> {
    Name(&'a str),
    Index(usize),
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::Name(name) => KeyRef::Name(name).hash(state),
            Key::Index(i) => KeyRef::Index(*i).hash(state),
        }
    }
}

impl Hash for KeyRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            KeyRef::Name(name) => {
                0u8.hash(state);
                name.hash(state);
            }
            KeyRef::Index(i) => {
                1u8.hash(state);
                i.hash(state);
            }
        }
    }
}

impl Equivalent<Key> for KeyRef<'_> {
    fn equivalent(&self, key: &Key) -> bool {
        match (self, key) {
            (KeyRef::Name(a), Key::Name(b)) => *a == b,
            (KeyRef::Index(a), Key::Index(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(name.clone())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// A column-keyed row; iteration follows schema order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<Key, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a named column.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(&KeyRef::Name(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(&KeyRef::Name(name))
    }

    /// Value stored under any key, including positional surplus fields.
    pub fn get_key(&self, key: &Key) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&KeyRef::Name(name))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.fields.keys()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Key, Value> {
        self.fields.iter()
    }

    pub fn into_map(self) -> IndexMap<Key, Value> {
        self.fields
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(value) => value,
            None => panic!("record has no column \"{name}\""),
        }
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (Key, Value);
    type IntoIter = indexmap::map::IntoIter<Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a Key, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Key, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Read-side schema with its precomputed all-null template record.
#[derive(Debug, Clone)]
pub(crate) struct ReadSchema {
    keys: Vec<String>,
    template: Record,
}

impl ReadSchema {
    pub(crate) fn new(keys: Vec<String>) -> Self {
        let template = keys.iter().map(|k| (k, Value::Null)).collect();
        Self { keys, template }
    }

    pub(crate) fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Maps field `i` onto schema key `i`; surplus fields keep their position as key.
    pub(crate) fn map_row(&self, fields: Vec<String>) -> Record {
        let mut record = self.template.clone();
        for (i, field) in fields.into_iter().enumerate() {
            match self.keys.get(i) {
                Some(key) => {
                    if let Some(slot) = record.get_mut(key) {
                        *slot = Value::String(field);
                    }
                }
                None => {
                    record.insert(i, field);
                }
            }
        }
        record
    }

    pub(crate) fn contains_all<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().all(|k| self.template.contains(k.as_ref()))
    }
}

/// A writer column: the key used in records and the label written as header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub header: String,
}

impl Column {
    /// Column whose header is its own key.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            header: key.clone(),
            key,
        }
    }

    pub fn with_header(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
        }
    }
}

impl From<&str> for Column {
    fn from(key: &str) -> Self {
        Column::new(key)
    }
}

impl From<String> for Column {
    fn from(key: String) -> Self {
        Column::new(key)
    }
}

impl<K: Into<String>, H: Into<String>> From<(K, H)> for Column {
    fn from((key, header): (K, H)) -> Self {
        Column::with_header(key, header)
    }
}

/// Write-side schema binding keys to header labels.
#[derive(Debug, Clone)]
pub(crate) struct WriteSchema {
    columns: Vec<Column>,
    positions: HashMap<String, usize>,
}

impl WriteSchema {
    /// A repeated key keeps its first position and takes the last header.
    pub(crate) fn new(columns: Vec<Column>) -> Self {
        let mut unique: Vec<Column> = Vec::with_capacity(columns.len());
        let mut positions = HashMap::new();
        for column in columns {
            match positions.get(&column.key).copied() {
                Some(i) => unique[i] = column,
                None => {
                    positions.insert(column.key.clone(), unique.len());
                    unique.push(column);
                }
            }
        }
        Self {
            columns: unique,
            positions,
        }
    }

    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Orders `values` by the schema. Missing columns become empty strings.
    pub(crate) fn project<I, K, V>(&self, values: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let mut row = vec![Value::String(String::new()); self.columns.len()];
        let mut unknown = Vec::new();

        for (key, value) in values {
            let key = key.into();
            let position = match &key {
                Key::Name(name) => self.positions.get(name).copied(),
                Key::Index(i) => self.positions.get(&i.to_string()).copied(),
            };
            match position {
                Some(i) => row[i] = value.into(),
                None => unknown.push(key.to_string()),
            }
        }

        if !unknown.is_empty() {
            return Err(CsvError::UnknownColumns(unknown));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(keys: &[&str]) -> ReadSchema {
        ReadSchema::new(keys.iter().map(|k| k.to_string()).collect())
    }

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_map_row_exact() {
        let record = schema(&["a1", "b", "c"]).map_row(fields(&["v1", "v2", "v3"]));
        assert_eq!(record, Record::from_iter([("a1", "v1"), ("b", "v2"), ("c", "v3")]));
    }

    #[test]
    fn test_map_row_short() {
        let record = schema(&["a1", "b", "c"]).map_row(fields(&["v4", "v5"]));
        assert_eq!(record["c"], Value::Null);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_map_row_long() {
        let record = schema(&["a1", "b", "c"]).map_row(fields(&["v1", "v2", "v3", "vv"]));
        assert_eq!(record.get_key(&Key::Index(3)), Some(&Value::from("vv")));
        let keys: Vec<String> = record.keys().map(Key::to_string).collect();
        assert_eq!(keys, ["a1", "b", "c", "3"]);
    }

    #[test]
    fn test_contains_all() {
        let s = schema(&["a1", "b", "c"]);
        assert!(s.contains_all(&["b"]));
        assert!(s.contains_all(&["a1", "b", "c"]));
        assert!(!s.contains_all(&["a1", "b2", "c"]));
    }

    #[test]
    fn test_project() {
        let ws = WriteSchema::new(vec![
            Column::with_header("a", "Col1"),
            Column::with_header("b", "Col2"),
            Column::with_header("c", "Col3"),
        ]);
        let row = ws.project([("a", "22"), ("c", "26")]).unwrap();
        assert_eq!(row, vec![Value::from("22"), Value::from(""), Value::from("26")]);

        let err = ws.project([("a", "12"), ("colz", "19")]).unwrap_err();
        assert!(matches!(err, CsvError::UnknownColumns(cols) if cols == ["colz"]));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let ws = WriteSchema::new(vec![
            Column::with_header("a", "First"),
            Column::with_header("a", "Second"),
            Column::new("b"),
        ]);
        let headers: Vec<&str> = ws.columns().iter().map(|c| c.header.as_str()).collect();
        assert_eq!(headers, ["Second", "b"]);
        let row = ws.project([("a", "x"), ("b", "y")]).unwrap();
        assert_eq!(row, vec![Value::from("x"), Value::from("y")]);
    }

    #[test]
    fn test_project_positional_key() {
        let ws = WriteSchema::new(vec![Column::new("0"), Column::new("1")]);
        let row = ws.project([(1usize, "x")]).unwrap();
        assert_eq!(row, vec![Value::from(""), Value::from("x")]);
    }

    #[test]
    fn test_column_conversions() {
        assert_eq!(Column::from("Col1"), Column::with_header("Col1", "Col1"));
        assert_eq!(Column::from(("a", "Col1")).header, "Col1");
    }
}
