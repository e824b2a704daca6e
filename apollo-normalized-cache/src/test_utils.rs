//! Fixtures shared by unit tests.

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::plan::QueryPlan;
use crate::spec::FieldType;
use crate::spec::SelectionNode;
use crate::spec::TypeOracle;

macro_rules! assert_eq_and_ordered {
    ($a:expr, $b:expr $(,)?) => {
        assert_eq!($a, $b,);
        assert!(
            $crate::json_ext::ValueExt::eq_and_ordered(&$a, &$b),
            "assertion failed: objects are not ordered the same:\
            \n  left: `{:?}`\n right: `{:?}`",
            $a,
            $b,
        );
    };
}
pub(crate) use assert_eq_and_ordered;

/// Answers list questions from the type itself.
pub(crate) struct Structural;

impl TypeOracle for Structural {
    fn is_list_type(&self, field_type: &FieldType) -> bool {
        field_type.is_list()
    }
}

pub(crate) fn object(value: Value) -> Object {
    match value {
        Value::Object(object) => object,
        other => panic!("expected an object, got {other:?}"),
    }
}

pub(crate) fn plan(selections: Vec<SelectionNode>) -> QueryPlan {
    QueryPlan::compile(&selections, &Structural).expect("selection compiles")
}

pub(crate) fn id() -> SelectionNode {
    SelectionNode::leaf("id", FieldType::Id.non_null())
}

pub(crate) fn typename() -> SelectionNode {
    SelectionNode::leaf("__typename", FieldType::String.non_null())
}

pub(crate) fn string(name: &str) -> SelectionNode {
    SelectionNode::leaf(name, FieldType::String)
}

/// `{ hero { id __typename name } }`
pub(crate) fn hero_plan() -> QueryPlan {
    plan(vec![SelectionNode::object(
        "hero",
        FieldType::named("Character"),
        vec![id(), typename(), string("name")],
    )])
}

/// `{ hero { id __typename name friends { id __typename name friends { id __typename name } } } }`
pub(crate) fn friends_plan() -> QueryPlan {
    let character = FieldType::named("Character");
    plan(vec![SelectionNode::object(
        "hero",
        character.clone(),
        vec![
            id(),
            typename(),
            string("name"),
            SelectionNode::object(
                "friends",
                character.clone().list_of(),
                vec![
                    id(),
                    typename(),
                    string("name"),
                    SelectionNode::object(
                        "friends",
                        character.list_of(),
                        vec![id(), typename(), string("name")],
                    ),
                ],
            ),
        ],
    )])
}
