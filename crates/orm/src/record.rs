//! Record instances and kind identifiers
//!
//! A `Record` is a loaded or to-be-saved row of some record kind. Column
//! values live in `fields` and are what the storage engine persists.
//! Hydrated polymorphic values live in `relations`; the engine never sees
//! them.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{OrmError, OrmResult};
use crate::relationships::resolution::Resolved;

/// Stable identifier of a record kind, e.g. `"Post"` or `"Comment"`.
///
/// This is the value written into a child's type discriminator column, so it
/// must not change when the Rust type backing the kind is renamed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindId(String);

impl KindId {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KindId {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

impl From<String> for KindId {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

impl From<&KindId> for KindId {
    fn from(kind: &KindId) -> Self {
        kind.clone()
    }
}

impl AsRef<str> for KindId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for KindId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<KindId> for Value {
    fn from(kind: KindId) -> Self {
        Value::String(kind.0)
    }
}

/// A single record of a known kind
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: KindId,
    fields: Map<String, Value>,
    relations: BTreeMap<String, Resolved>,
}

impl Record {
    /// Create an empty record of the given kind
    pub fn new(kind: impl Into<KindId>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Create a record from already-known column values
    pub fn from_fields(kind: impl Into<KindId>, fields: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            fields,
            relations: BTreeMap::new(),
        }
    }

    /// Create a record from a JSON object
    pub fn from_json(kind: impl Into<KindId>, value: Value) -> OrmResult<Self> {
        let kind = kind.into();
        match value {
            Value::Object(fields) => Ok(Self::from_fields(kind, fields)),
            other => Err(OrmError::Serialization(format!(
                "Record of kind '{}' must be a JSON object, got {}",
                kind, other
            ))),
        }
    }

    pub fn kind(&self) -> &KindId {
        &self.kind
    }

    /// Builder-style column assignment
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Builder-style relation assignment
    pub fn with_relation(mut self, property: &str, value: Resolved) -> Self {
        self.set_relation(property, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        self.fields.insert(column.to_string(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.fields.remove(column)
    }

    /// True if the column is present and not null
    pub fn has_value(&self, column: &str) -> bool {
        matches!(self.fields.get(column), Some(value) if !value.is_null())
    }

    /// The non-null value of the given primary column, if any
    pub fn primary_key(&self, column: &str) -> Option<&Value> {
        self.fields.get(column).filter(|value| !value.is_null())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Overwrite columns with the given values, keeping relations intact
    pub fn merge_fields(&mut self, fields: &Map<String, Value>) {
        for (column, value) in fields {
            self.fields.insert(column.clone(), value.clone());
        }
    }

    pub fn relation(&self, property: &str) -> Option<&Resolved> {
        self.relations.get(property)
    }

    pub fn set_relation(&mut self, property: &str, value: Resolved) {
        self.relations.insert(property.to_string(), value);
    }

    pub fn take_relation(&mut self, property: &str) -> Option<Resolved> {
        self.relations.remove(property)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Resolved)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The single record held by a parent-style relation
    pub fn parent(&self, property: &str) -> Option<&Record> {
        self.relations.get(property).and_then(Resolved::as_single)
    }

    /// The records held by a collection relation (empty when unset)
    pub fn children(&self, property: &str) -> &[Record] {
        self.relations
            .get(property)
            .map(Resolved::as_many)
            .unwrap_or(&[])
    }

    /// Columns plus hydrated relations, nested recursively
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        for (property, resolved) in &self.relations {
            map.insert(property.clone(), resolved.to_json());
        }
        Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
