//! Denormalization of snapshots back into responses.

use std::collections::HashMap;

use crate::entity::ROOT_QUERY;
use crate::entity::typename_of;
use crate::error::ReadError;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::plan::Cardinality;
use crate::plan::PlanField;
use crate::plan::QueryPlan;
use crate::snapshot::Record;
use crate::snapshot::Snapshot;

/// Rebuilds the response for `plan` from `snapshot`.
///
/// Fields come out in plan order. A reference to a key the snapshot does not
/// hold is an error, never a `null`.
#[tracing::instrument(skip_all, level = "trace")]
pub fn read(plan: &QueryPlan, snapshot: &Snapshot) -> Result<Value, ReadError> {
    let mut reader = Reader {
        snapshot,
        path: Path::empty(),
        memo: vec![HashMap::new(); plan.slot_count],
    };
    let result = match snapshot.root() {
        Some(root) => reader
            .read_selections(&plan.root, ROOT_QUERY, root)
            .map(Value::Object),
        None => Err(ReadError::DanglingReference {
            path: Path::empty(),
            key: ROOT_QUERY.to_string(),
        }),
    };
    result.inspect_err(|err| {
        tracing::debug!("could not read response from the cache: {err}");
    })
}

struct Reader<'a> {
    snapshot: &'a Snapshot,
    path: Path,
    /// Objects already rebuilt during this read, per slot and entity key.
    memo: Vec<HashMap<String, Value>>,
}

impl Reader<'_> {
    fn read_selections(
        &mut self,
        fields: &[PlanField],
        key: &str,
        record: &Record,
    ) -> Result<Object, ReadError> {
        let typename = typename_of(key);
        let mut output = Object::with_capacity(fields.len());
        for field in fields {
            if !field.applies_to(typename) {
                continue;
            }
            self.path.push_key(field.response_key.as_str());
            let Some(value) = record.get(field.storage_key.as_str()) else {
                return Err(ReadError::MissingField {
                    path: self.path.clone(),
                    key: key.to_string(),
                    field: field.storage_key.clone(),
                });
            };
            let value = self.read_field(field, key, value)?;
            self.path.pop();
            output.insert(field.response_key.as_str(), value);
        }
        Ok(output)
    }

    fn read_field(&mut self, field: &PlanField, key: &str, value: &Value) -> Result<Value, ReadError> {
        match (field.cardinality, value) {
            (Cardinality::ScalarLeaf | Cardinality::ListScalar, value) => Ok(value.clone()),
            (_, Value::Null) => Ok(Value::Null),
            (Cardinality::ObjectEntity, Value::String(reference)) => {
                self.read_entity(field, reference.as_str())
            }
            (Cardinality::ListEntity, value) => {
                self.read_list(field, key, value, field.list_depth.max(1))
            }
            _ => Err(self.invalid_reference(field, key)),
        }
    }

    /// Resolves the keys of a list nested `depth` times, keeping its shape.
    fn read_list(
        &mut self,
        field: &PlanField,
        key: &str,
        value: &Value,
        depth: usize,
    ) -> Result<Value, ReadError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(reference) if depth == 0 => self.read_entity(field, reference.as_str()),
            Value::Array(references) if depth > 0 => {
                let mut items = Vec::with_capacity(references.len());
                for (index, reference) in references.iter().enumerate() {
                    self.path.push_index(index);
                    items.push(self.read_list(field, key, reference, depth - 1)?);
                    self.path.pop();
                }
                Ok(Value::Array(items))
            }
            _ => Err(self.invalid_reference(field, key)),
        }
    }

    fn read_entity(&mut self, field: &PlanField, reference: &str) -> Result<Value, ReadError> {
        let memo = field.slot.map(|slot| slot.0);
        if let Some(value) = memo.and_then(|slot| self.memo.get(slot)?.get(reference)) {
            return Ok(value.clone());
        }

        let snapshot = self.snapshot;
        let Some(record) = snapshot.get(reference) else {
            return Err(ReadError::DanglingReference {
                path: self.path.clone(),
                key: reference.to_string(),
            });
        };
        let value = Value::Object(self.read_selections(&field.selections, reference, record)?);

        if let Some(entries) = memo.and_then(|slot| self.memo.get_mut(slot)) {
            entries.insert(reference.to_string(), value.clone());
        }
        Ok(value)
    }

    fn invalid_reference(&self, field: &PlanField, key: &str) -> ReadError {
        ReadError::InvalidReference {
            path: self.path.clone(),
            key: key.to_string(),
            field: field.storage_key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::entity::EntityKey;
    use crate::spec::FieldType;
    use crate::spec::SelectionNode;
    use crate::test_utils::*;
    use crate::write::write;

    fn snapshot(value: Value) -> Snapshot {
        object(value)
            .into_iter()
            .map(|(key, record)| {
                let key = if key.as_str() == ROOT_QUERY {
                    EntityKey::root_query()
                } else {
                    let (typename, id) = key.as_str().split_once(':').unwrap();
                    crate::entity::key_for(typename, &json!(id)).unwrap()
                };
                (key, object(record))
            })
            .collect()
    }

    #[test]
    fn reads_back_the_written_response() {
        let plan = hero_plan();
        let data = json!({"hero": {"id": "foo", "__typename": "Droid", "name": "R2D2"}});
        let cache = write(&plan, &data, &Snapshot::new()).unwrap();
        assert_eq_and_ordered!(read(&plan, &cache).unwrap(), data);
    }

    #[test]
    fn output_follows_plan_order() {
        let cache = snapshot(json!({
            "ROOT_QUERY": {"hero": "Droid:foo"},
            "Droid:foo": {"name": "R2D2", "__typename": "Droid", "id": "foo"},
        }));
        assert_eq_and_ordered!(
            read(&hero_plan(), &cache).unwrap(),
            json!({"hero": {"id": "foo", "__typename": "Droid", "name": "R2D2"}}),
        );
    }

    #[test]
    fn extra_record_fields_are_not_returned() {
        let cache = snapshot(json!({
            "ROOT_QUERY": {"hero": "Droid:foo", "motd": "hello"},
            "Droid:foo": {"id": "foo", "__typename": "Droid", "name": "R2D2", "primaryFunction": "Astromech"},
        }));
        assert_eq_and_ordered!(
            read(&hero_plan(), &cache).unwrap(),
            json!({"hero": {"id": "foo", "__typename": "Droid", "name": "R2D2"}}),
        );
    }

    #[test]
    fn self_referencing_records_are_resolved_per_occurrence() {
        let cache = snapshot(json!({
            "ROOT_QUERY": {"hero": "Human:1"},
            "Human:1": {"id": "1", "__typename": "Human", "name": "Luke", "friends": ["Human:1"]},
        }));
        assert_eq_and_ordered!(
            read(&friends_plan(), &cache).unwrap(),
            json!({"hero": {"id": "1", "__typename": "Human", "name": "Luke", "friends": [
                {"id": "1", "__typename": "Human", "name": "Luke", "friends": [
                    {"id": "1", "__typename": "Human", "name": "Luke"},
                ]},
            ]}}),
        );
    }

    #[test]
    fn cyclic_graphs_round_trip() {
        let plan = friends_plan();
        let data = json!({"hero": {"id": "1", "__typename": "Human", "name": "Luke", "friends": [
            {"id": "2", "__typename": "Droid", "name": "R2", "friends": [
                {"id": "1", "__typename": "Human", "name": "Luke"},
                {"id": "2", "__typename": "Droid", "name": "R2"},
            ]},
            {"id": "3", "__typename": "Human", "name": "Han", "friends": [
                {"id": "1", "__typename": "Human", "name": "Luke"},
            ]},
        ]}});
        let cache = write(&plan, &data, &Snapshot::new()).unwrap();
        assert_eq_and_ordered!(read(&plan, &cache).unwrap(), data);
    }

    #[test]
    fn dangling_reference_is_an_error() {
        let cache = snapshot(json!({
            "ROOT_QUERY": {"hero": "Human:1"},
            "Human:1": {"id": "1", "__typename": "Human", "name": "Luke", "friends": ["Droid:2"]},
        }));
        assert_eq!(
            read(&friends_plan(), &cache).unwrap_err(),
            ReadError::DanglingReference {
                path: Path::from("hero/friends/0"),
                key: "Droid:2".into(),
            }
        );
    }

    #[test]
    fn missing_root_is_a_dangling_reference() {
        assert_eq!(
            read(&hero_plan(), &Snapshot::new()).unwrap_err(),
            ReadError::DanglingReference {
                path: Path::empty(),
                key: ROOT_QUERY.into(),
            }
        );
    }

    #[test]
    fn missing_field_is_an_error() {
        let cache = snapshot(json!({
            "ROOT_QUERY": {"hero": "Droid:foo"},
            "Droid:foo": {"id": "foo", "__typename": "Droid"},
        }));
        assert_eq!(
            read(&hero_plan(), &cache).unwrap_err(),
            ReadError::MissingField {
                path: Path::from("hero/name"),
                key: "Droid:foo".into(),
                field: "name".into(),
            }
        );
    }

    #[test]
    fn non_key_values_in_entity_fields_are_rejected() {
        let cache = snapshot(json!({
            "ROOT_QUERY": {"hero": {"id": "foo"}},
        }));
        assert_eq!(
            read(&hero_plan(), &cache).unwrap_err(),
            ReadError::InvalidReference {
                path: Path::from("hero"),
                key: ROOT_QUERY.into(),
                field: "hero".into(),
            }
        );
    }

    #[test]
    fn nulls_are_read_back() {
        let plan = friends_plan();
        let data = json!({"hero": {"id": "1", "__typename": "Human", "name": null, "friends": [
            null,
            {"id": "2", "__typename": "Droid", "name": "R2", "friends": null},
        ]}});
        let cache = write(&plan, &data, &Snapshot::new()).unwrap();
        assert_eq_and_ordered!(read(&plan, &cache).unwrap(), data);
        let empty = write(&plan, &json!({"hero": null}), &Snapshot::new()).unwrap();
        assert_eq!(read(&plan, &empty).unwrap(), json!({"hero": null}));
    }

    #[test]
    fn reads_aliased_fields_from_storage_keys() {
        let plan = plan(vec![
            SelectionNode::object("hero", FieldType::named("Character"), vec![id(), typename()])
                .with_alias("jediHero")
                .with_argument("episode", "JEDI"),
            SelectionNode::object("hero", FieldType::named("Character"), vec![id(), typename()])
                .with_alias("empireHero")
                .with_argument("episode", "EMPIRE"),
        ]);
        let data = json!({
            "jediHero": {"id": "2001", "__typename": "Droid"},
            "empireHero": {"id": "1000", "__typename": "Human"},
        });
        let cache = write(&plan, &data, &Snapshot::new()).unwrap();
        assert_eq_and_ordered!(read(&plan, &cache).unwrap(), data);
    }

    #[test]
    fn type_conditions_use_the_record_typename() {
        let plan = plan(vec![SelectionNode::object(
            "search",
            FieldType::named("SearchResult").list_of(),
            vec![
                id(),
                typename(),
                string("primaryFunction").with_possible_types(["Droid"]),
                string("height").with_possible_types(["Human"]),
            ],
        )]);
        let data = json!({"search": [
            {"id": "2001", "__typename": "Droid", "primaryFunction": "Astromech"},
            {"id": "1000", "__typename": "Human", "height": "1.72"},
        ]});
        let cache = write(&plan, &data, &Snapshot::new()).unwrap();
        assert_eq_and_ordered!(read(&plan, &cache).unwrap(), data);
    }

    #[test]
    fn nested_entity_lists_round_trip() {
        let plan = plan(vec![SelectionNode::object(
            "grid",
            FieldType::named("Droid").list_of().non_null().list_of(),
            vec![id(), typename(), string("name")],
        )]);
        let data = json!({"grid": [
            [{"id": "1", "__typename": "Droid", "name": "R2"}, null],
            null,
            [{"id": "2", "__typename": "Droid", "name": "C3PO"}, {"id": "1", "__typename": "Droid", "name": "R2"}],
        ]});
        let cache = write(&plan, &data, &Snapshot::new()).unwrap();
        assert_eq_and_ordered!(read(&plan, &cache).unwrap(), data);
    }

    #[test]
    fn nested_entity_lists_must_keep_their_depth() {
        let plan = plan(vec![SelectionNode::object(
            "grid",
            FieldType::named("Droid").list_of().list_of(),
            vec![id(), typename()],
        )]);
        let cache = snapshot(json!({
            "ROOT_QUERY": {"grid": ["Droid:1"]},
            "Droid:1": {"id": "1", "__typename": "Droid"},
        }));
        assert_eq!(
            read(&plan, &cache).unwrap_err(),
            ReadError::InvalidReference {
                path: Path::from("grid/0"),
                key: ROOT_QUERY.into(),
                field: "grid".into(),
            }
        );
    }

    #[test]
    fn reads_older_snapshots_after_newer_writes() {
        let plan = hero_plan();
        let first = write(
            &plan,
            &json!({"hero": {"id": "foo", "__typename": "Droid", "name": "R2D2"}}),
            &Snapshot::new(),
        )
        .unwrap();
        let second = write(
            &plan,
            &json!({"hero": {"id": "foo", "__typename": "Droid", "name": "Artoo"}}),
            &first,
        )
        .unwrap();
        assert_eq!(
            read(&plan, &first).unwrap(),
            json!({"hero": {"id": "foo", "__typename": "Droid", "name": "R2D2"}})
        );
        assert_eq!(
            read(&plan, &second).unwrap(),
            json!({"hero": {"id": "foo", "__typename": "Droid", "name": "Artoo"}})
        );
    }
}
