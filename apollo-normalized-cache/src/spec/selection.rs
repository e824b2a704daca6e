use serde::Deserialize;
use serde::Serialize;

use crate::spec::FieldType;

/// Answers cardinality questions about field types, as introspected from a schema.
#[cfg_attr(test, mockall::automock)]
pub trait TypeOracle {
    /// Whether values of `field_type` are lists.
    fn is_list_type(&self, field_type: &FieldType) -> bool;
}

/// A literal field argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// The value, printed as GraphQL.
    pub value: String,
}

/// One field of a validated selection tree.
///
/// Scalar leaves have no `children`; object-valued fields always do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub field_type: FieldType,
    /// Cardinality as written by whoever produced the tree.
    pub is_list: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
    /// Concrete typenames this field applies to, when it was selected through a
    /// narrower type condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SelectionNode>>,
}

impl SelectionNode {
    /// A scalar leaf; the cardinality is taken from `field_type`.
    pub fn leaf(name: impl Into<String>, field_type: FieldType) -> Self {
        let is_list = field_type.is_list();
        SelectionNode {
            name: name.into(),
            alias: None,
            field_type,
            is_list,
            arguments: Vec::new(),
            possible_types: None,
            children: None,
        }
    }

    /// An object-valued field; the cardinality is taken from `field_type`.
    pub fn object(
        name: impl Into<String>,
        field_type: FieldType,
        children: Vec<SelectionNode>,
    ) -> Self {
        SelectionNode {
            children: Some(children),
            ..SelectionNode::leaf(name, field_type)
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_possible_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the declared cardinality.
    pub fn with_is_list(mut self, is_list: bool) -> Self {
        self.is_list = is_list;
        self
    }

    /// The key under which this field appears in a response.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(self.name.as_str())
    }

    /// The key under which this field is stored in a record: the field name
    /// followed by its arguments, sorted by name.
    pub fn storage_key(&self) -> String {
        if self.arguments.is_empty() {
            return self.name.clone();
        }
        let mut arguments: Vec<&Argument> = self.arguments.iter().collect();
        arguments.sort_by(|a, b| a.name.cmp(&b.name));
        let arguments = arguments
            .iter()
            .map(|argument| format!("{}: {}", argument.name, argument.value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({arguments})", self.name)
    }
}
