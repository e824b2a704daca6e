//! Compilation of selection trees into query plans.
//!
//! A [`QueryPlan`] is computed once per query shape and then drives every
//! [`write`](crate::write()) and [`read`](crate::read()) for that shape. It is
//! immutable and can be shared between threads.

use serde::Deserialize;
use serde::Serialize;

use crate::error::ListCardinality;
use crate::error::PlanError;
use crate::json_ext::Path;
use crate::spec::SelectionNode;
use crate::spec::TypeOracle;

/// How a planned field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    /// A scalar or enum value, copied as is.
    ScalarLeaf,
    /// A list of scalars or enums, copied as is.
    ListScalar,
    /// An object, stored as a separate record and referenced by key.
    ObjectEntity,
    /// A list of objects, stored as a list of keys.
    ListEntity,
}

impl Cardinality {
    fn classify(is_list: bool, has_children: bool) -> Self {
        match (is_list, has_children) {
            (false, false) => Cardinality::ScalarLeaf,
            (true, false) => Cardinality::ListScalar,
            (false, true) => Cardinality::ObjectEntity,
            (true, true) => Cardinality::ListEntity,
        }
    }

    /// Whether values of this field are stored in their own records.
    pub fn is_entity(&self) -> bool {
        matches!(self, Cardinality::ObjectEntity | Cardinality::ListEntity)
    }
}

/// Index of the scratch slot assigned to an entity boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub usize);

/// A compiled field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanField {
    pub response_key: String,
    pub storage_key: String,
    pub cardinality: Cardinality,
    /// Number of nested lists around entities, `[[Droid]]` is 2. Zero unless
    /// the field is a [`Cardinality::ListEntity`].
    #[serde(default, skip_serializing_if = "is_zero")]
    pub list_depth: usize,
    /// Set on entity boundaries only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_types: Option<Vec<String>>,
    /// Child fields of entity boundaries, in selection order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<PlanField>,
}

fn is_zero(depth: &usize) -> bool {
    *depth == 0
}

impl PlanField {
    /// Whether this field is selected on objects of type `typename`.
    ///
    /// Fields without a type condition, and fields of the root record, always apply.
    pub(crate) fn applies_to(&self, typename: Option<&str>) -> bool {
        match (&self.possible_types, typename) {
            (Some(types), Some(typename)) => types.iter().any(|ty| ty == typename),
            _ => true,
        }
    }
}

/// The compiled, reusable form of a selection tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub root: Vec<PlanField>,
    pub slot_count: usize,
}

impl QueryPlan {
    /// Compiles `selections` against the schema knowledge of `oracle`.
    ///
    /// Fails when a selection declares a cardinality that the oracle contradicts;
    /// no partial plan is returned.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn compile(
        selections: &[SelectionNode],
        oracle: &dyn TypeOracle,
    ) -> Result<Self, PlanError> {
        let mut compiler = Compiler {
            oracle,
            path: Path::empty(),
            slot_count: 0,
        };
        let root = compiler.compile_selections(selections).inspect_err(|err| {
            tracing::debug!("could not compile query plan: {err}");
        })?;
        tracing::trace!(slots = compiler.slot_count, "compiled query plan");
        Ok(QueryPlan {
            root,
            slot_count: compiler.slot_count,
        })
    }

    /// Iterates over every entity boundary of the plan, depth first.
    pub fn entity_boundaries(&self) -> impl Iterator<Item = &PlanField> {
        let mut stack: Vec<&PlanField> = self.root.iter().rev().collect();
        std::iter::from_fn(move || {
            while let Some(field) = stack.pop() {
                stack.extend(field.selections.iter().rev());
                if field.cardinality.is_entity() {
                    return Some(field);
                }
            }
            None
        })
    }
}

/// Compiles a selection tree into a [`QueryPlan`].
pub fn compile(
    selections: &[SelectionNode],
    oracle: &dyn TypeOracle,
) -> Result<QueryPlan, PlanError> {
    QueryPlan::compile(selections, oracle)
}

struct Compiler<'a> {
    oracle: &'a dyn TypeOracle,
    path: Path,
    slot_count: usize,
}

impl Compiler<'_> {
    fn compile_selections(
        &mut self,
        selections: &[SelectionNode],
    ) -> Result<Vec<PlanField>, PlanError> {
        selections
            .iter()
            .map(|selection| {
                self.path.push_key(selection.response_key());
                let field = self.compile_field(selection);
                self.path.pop();
                field
            })
            .collect()
    }

    fn compile_field(&mut self, selection: &SelectionNode) -> Result<PlanField, PlanError> {
        let expected = self.oracle.is_list_type(&selection.field_type);
        if expected != selection.is_list {
            return Err(PlanError::SchemaMismatch {
                path: self.path.clone(),
                declared: ListCardinality::from_is_list(selection.is_list),
                expected: ListCardinality::from_is_list(expected),
                field_type: selection.field_type.to_string(),
            });
        }

        let cardinality = Cardinality::classify(selection.is_list, selection.children.is_some());
        let list_depth = match cardinality {
            Cardinality::ListEntity => selection.field_type.list_depth().max(1),
            _ => 0,
        };
        let (slot, selections) = match &selection.children {
            Some(children) => {
                // slots are numbered in pre-order
                let slot = SlotId(self.slot_count);
                self.slot_count += 1;
                (Some(slot), self.compile_selections(children)?)
            }
            None => (None, Vec::new()),
        };

        Ok(PlanField {
            response_key: selection.response_key().to_string(),
            storage_key: selection.storage_key(),
            cardinality,
            list_depth,
            slot,
            possible_types: selection.possible_types.clone(),
            selections,
        })
    }
}
