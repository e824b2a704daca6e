//! Immutable snapshots of the normalized cache.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::entity::EntityKey;
use crate::entity::ROOT_QUERY;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;

/// A flat record: field storage keys to values, entity-valued fields holding keys.
pub type Record = Object;

/// A flat map from entity key to record, plus the synthetic `ROOT_QUERY` record.
///
/// Snapshots are values: [`write`](crate::write()) returns a new snapshot and never
/// modifies its input. Untouched records are shared between snapshots.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: IndexMap<EntityKey, Arc<Record>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key).map(|record| &**record)
    }

    pub fn root(&self) -> Option<&Record> {
        self.get(ROOT_QUERY)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &Record)> {
        self.records.iter().map(|(key, record)| (key, &**record))
    }

    /// Whether both snapshots hold the same records, both in the same order.
    pub fn eq_and_ordered(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.records.iter().zip(other.records.iter()).all(
                |((key, record), (other_key, other_record))| {
                    key == other_key
                        && (Arc::ptr_eq(record, other_record)
                            || Value::Object((**record).clone())
                                .eq_and_ordered(&Value::Object((**other_record).clone())))
                },
            )
    }

    /// Whether `key` holds the very same record allocation in both snapshots.
    pub fn shares_record(&self, other: &Self, key: &str) -> bool {
        match (self.records.get(key), other.records.get(key)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Converts the snapshot into a single JSON object, for inspection.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.records
                .iter()
                .map(|(key, record)| (key.as_str().into(), Value::Object((**record).clone())))
                .collect(),
        )
    }

    /// Shallow-merges `record` into the record at `key`: fields of `record`
    /// overwrite, fields it lacks are kept.
    pub(crate) fn merge_record(&mut self, key: EntityKey, record: Record) {
        match self.records.get_mut(&key) {
            Some(existing) => {
                let merged = Arc::make_mut(existing);
                for (field, value) in record {
                    merged.insert(field, value);
                }
            }
            None => {
                self.records.insert(key, Arc::new(record));
            }
        }
    }
}

impl FromIterator<(EntityKey, Record)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (EntityKey, Record)>>(iter: T) -> Self {
        Snapshot {
            records: iter
                .into_iter()
                .map(|(key, record)| (key, Arc::new(record)))
                .collect(),
        }
    }
}
