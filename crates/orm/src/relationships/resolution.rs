//! Resolution outcomes for polymorphic relations
//!
//! A relation resolves to exactly one of two shapes, chosen once from the
//! descriptor's `has_many` flag. Per-kind lookup results are merged into
//! that shape here and nowhere else.

use serde_json::Value;

use crate::record::Record;

/// The hydrated value of a polymorphic relation
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// At most one related record
    Single(Option<Box<Record>>),
    /// All related records, in candidate-kind order
    Many(Vec<Record>),
}

/// The raw result of a single per-kind lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Result of a `find_one`
    One(Option<Record>),
    /// Result of a `find`
    Many(Vec<Record>),
}

impl Resolved {
    pub fn single(record: Option<Record>) -> Self {
        Resolved::Single(record.map(Box::new))
    }

    /// The empty value for a relation of the given shape
    pub fn empty(has_many: bool) -> Self {
        if has_many {
            Resolved::Many(Vec::new())
        } else {
            Resolved::Single(None)
        }
    }

    /// Merge per-kind lookups, given in candidate-kind order.
    ///
    /// Collections are concatenated and flattened one level. Single values
    /// keep the first present record; later candidates are ignored.
    pub fn merge(has_many: bool, lookups: Vec<Lookup>) -> Self {
        if has_many {
            let mut records = Vec::new();
            for lookup in lookups {
                match lookup {
                    Lookup::One(Some(record)) => records.push(record),
                    Lookup::One(None) => {}
                    Lookup::Many(found) => records.extend(found),
                }
            }
            Resolved::Many(records)
        } else {
            let first = lookups.into_iter().find_map(|lookup| match lookup {
                Lookup::One(record) => record,
                Lookup::Many(found) => found.into_iter().next(),
            });
            Resolved::single(first)
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Resolved::Many(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Resolved::Single(record) => record.is_none(),
            Resolved::Many(records) => records.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Resolved::Single(record) => usize::from(record.is_some()),
            Resolved::Many(records) => records.len(),
        }
    }

    /// The held record of a single-valued relation
    pub fn as_single(&self) -> Option<&Record> {
        match self {
            Resolved::Single(record) => record.as_deref(),
            Resolved::Many(_) => None,
        }
    }

    /// The held records of a collection relation
    pub fn as_many(&self) -> &[Record] {
        match self {
            Resolved::Single(_) => &[],
            Resolved::Many(records) => records,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Resolved::Single(Some(record)) => record.to_json(),
            Resolved::Single(None) => Value::Null,
            Resolved::Many(records) => Value::Array(records.iter().map(Record::to_json).collect()),
        }
    }
}
