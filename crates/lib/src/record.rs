//! Records: open maps from field names to values.
//!
//! A [`Record`] carries no schema of its own; field typing and the meaning of
//! special fields (id, parent, level, order) are supplied by the store that
//! owns it. Equality is own-field, field-for-field, which is what snapshot
//! diffing relies on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::{Id, Value};

/// A single data item: an open set of named fields.
///
/// # Examples
///
/// ```
/// use rowset::{Record, Value};
///
/// let mut record = Record::new();
/// record.set("name", "Alice");
/// record.set("age", 30);
///
/// assert_eq!(record.get("name"), Some(&Value::Str("Alice".into())));
/// assert_eq!(record.get("age").and_then(Value::as_i64), Some(30));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object into a record. Anything but an object is
    /// rejected.
    pub fn from_json(json: serde_json::Value) -> crate::Result<Record> {
        match Value::from_json(json) {
            Value::Map(record) => Ok(record),
            other => Err(crate::Error::Serialize(serde::de::Error::custom(format!(
                "expected a JSON object, found {}",
                other.type_name()
            )))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: impl AsRef<str>) -> Option<&Value> {
        self.fields.get(field.as_ref())
    }

    pub fn get_mut(&mut self, field: impl AsRef<str>) -> Option<&mut Value> {
        self.fields.get_mut(field.as_ref())
    }

    pub fn contains(&self, field: impl AsRef<str>) -> bool {
        self.fields.contains_key(field.as_ref())
    }

    /// Sets a field, returning the previous value if there was one.
    pub fn set<K, V>(&mut self, field: K, value: V) -> Option<Value>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: impl AsRef<str>) -> Option<Value> {
        self.fields.remove(field.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// Reads the identifier stored under the given field, if any.
    pub fn id(&self, id_field: impl AsRef<str>) -> Option<Id> {
        self.get(id_field).and_then(Id::from_value)
    }

    /// Copies a subset of fields into a new record.
    pub fn project(&self, projection: &Projection) -> Record {
        let mut out = Record::new();
        match projection {
            Projection::Keep(fields) => {
                for field in fields {
                    if let Some(value) = self.get(field) {
                        out.set(field.clone(), value.clone());
                    }
                }
            }
            Projection::Rename(mapping) => {
                for (field, renamed) in mapping {
                    if let Some(value) = self.get(field) {
                        out.set(renamed.clone(), value.clone());
                    }
                }
            }
        }
        out
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A field projection: either keep a list of fields as-is, or keep and
/// rename fields per the mapping. Fields absent from a record are skipped.
#[derive(Debug, Clone)]
pub enum Projection {
    Keep(Vec<String>),
    Rename(HashMap<String, String>),
}

impl Projection {
    pub fn keep<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Keep(fields.into_iter().map(Into::into).collect())
    }

    pub fn rename<I, S, T>(mapping: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Projection::Rename(
            mapping
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        )
    }
}
