//! Normalization of responses into snapshots.

use indexmap::IndexMap;

use crate::entity::EntityKey;
use crate::error::WriteError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::plan::Cardinality;
use crate::plan::PlanField;
use crate::plan::QueryPlan;
use crate::snapshot::Record;
use crate::snapshot::Snapshot;

/// Writes `data`, a response shaped like `plan`, on top of `previous`.
///
/// Each entity found in `data` is shallow-merged into its record, and the
/// top-level fields are merged into `ROOT_QUERY`. Lists of entities replace the
/// previous list. `previous` is left untouched, and on error no snapshot is produced.
#[tracing::instrument(skip_all, level = "trace")]
pub fn write(plan: &QueryPlan, data: &Value, previous: &Snapshot) -> Result<Snapshot, WriteError> {
    let mut writer = Writer {
        path: Path::empty(),
        pending: IndexMap::new(),
    };
    writer.write_root(plan, data).inspect_err(|err| {
        tracing::debug!("could not write response to the cache: {err}");
    })?;

    tracing::trace!(records = writer.pending.len(), "normalized response");
    let mut next = previous.clone();
    for (key, record) in writer.pending {
        next.merge_record(key, record);
    }
    Ok(next)
}

struct Writer {
    path: Path,
    /// Records produced by this write, in the order their entities were first met.
    pending: IndexMap<EntityKey, Record>,
}

impl Writer {
    fn write_root(&mut self, plan: &QueryPlan, data: &Value) -> Result<(), WriteError> {
        let Value::Object(data) = data else {
            return Err(self.invalid_value("object", data));
        };
        let root = EntityKey::root_query();
        self.pending.insert(root.clone(), Record::new());
        let record = self.write_selections(&plan.root, data, None)?;
        self.stage(root, record);
        Ok(())
    }

    fn write_selections(
        &mut self,
        fields: &[PlanField],
        input: &Object,
        typename: Option<&str>,
    ) -> Result<Record, WriteError> {
        let mut record = Record::with_capacity(fields.len());
        for field in fields {
            if !field.applies_to(typename) {
                continue;
            }
            // fields missing from the response keep whatever the cache holds
            let Some(value) = input.get(field.response_key.as_str()) else {
                continue;
            };
            self.path.push_key(field.response_key.as_str());
            let value = self.write_field(field, value)?;
            self.path.pop();
            record.insert(field.storage_key.as_str(), value);
        }
        Ok(record)
    }

    fn write_field(&mut self, field: &PlanField, value: &Value) -> Result<Value, WriteError> {
        match field.cardinality {
            Cardinality::ScalarLeaf | Cardinality::ListScalar => Ok(value.clone()),
            Cardinality::ObjectEntity => self.write_reference(field, value),
            Cardinality::ListEntity => self.write_list(field, value, field.list_depth.max(1)),
        }
    }

    /// Normalizes the entities of a list nested `depth` times, keeping its shape.
    fn write_list(
        &mut self,
        field: &PlanField,
        value: &Value,
        depth: usize,
    ) -> Result<Value, WriteError> {
        if depth == 0 {
            return self.write_reference(field, value);
        }
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => {
                let mut keys = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push_index(index);
                    keys.push(self.write_list(field, item, depth - 1)?);
                    self.path.pop();
                }
                Ok(Value::Array(keys))
            }
            other => Err(self.invalid_value("list", other)),
        }
    }

    /// Normalizes one entity and returns the value referencing it.
    fn write_reference(&mut self, field: &PlanField, value: &Value) -> Result<Value, WriteError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Object(object) => {
                let key = EntityKey::from_object(object).map_err(|missing| {
                    WriteError::MissingIdentity {
                        path: self.path.clone(),
                        field: missing.to_string(),
                    }
                })?;
                // reserve the position before children register their own records
                self.pending.entry(key.clone()).or_default();
                let record = self.write_selections(&field.selections, object, key.typename())?;
                self.stage(key.clone(), record);
                Ok(key.into())
            }
            other => Err(self.invalid_value("object", other)),
        }
    }

    /// Shallow-merges `record` into the pending record for `key`.
    fn stage(&mut self, key: EntityKey, record: Record) {
        let pending = self.pending.entry(key).or_default();
        for (field, value) in record {
            pending.insert(field, value);
        }
    }

    fn invalid_value(&self, expected: &str, found: &Value) -> WriteError {
        WriteError::InvalidValue {
            path: self.path.clone(),
            expected: expected.to_string(),
            found: found.json_type_name().to_string(),
        }
    }
}
