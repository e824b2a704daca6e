use apollo_compiler::ast;
use serde::Deserialize;
use serde::Serialize;

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// An object, interface, union, enum or custom scalar, by name.
    Named(String),
    /// A list of the inner type.
    List(Box<FieldType>),
    /// The inner type, marked non-null.
    NonNull(Box<FieldType>),
    String,
    Int,
    Float,
    Id,
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Named(ty) => write!(f, "{ty}"),
            FieldType::List(ty) => write!(f, "[{ty}]"),
            FieldType::NonNull(ty) => write!(f, "{ty}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Id => write!(f, "ID"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FieldType {
    /// Shorthand for a named type.
    pub fn named(name: impl Into<String>) -> Self {
        FieldType::Named(name.into())
    }

    /// Wraps this type in a list.
    pub fn list_of(self) -> Self {
        FieldType::List(Box::new(self))
    }

    /// Wraps this type in a non-null marker.
    pub fn non_null(self) -> Self {
        FieldType::NonNull(Box::new(self))
    }

    /// Whether values of this type are lists, looking through a non-null wrapper.
    pub fn is_list(&self) -> bool {
        match self {
            FieldType::List(_) => true,
            FieldType::NonNull(inner) => inner.is_list(),
            _ => false,
        }
    }

    /// How many list wrappers this type has, looking through non-null markers.
    ///
    /// `[[Droid!]]!` has a depth of 2.
    pub fn list_depth(&self) -> usize {
        match self {
            FieldType::List(inner) => 1 + inner.list_depth(),
            FieldType::NonNull(inner) => inner.list_depth(),
            _ => 0,
        }
    }
}

fn from_named(name: &str) -> FieldType {
    match name {
        "String" => FieldType::String,
        "Int" => FieldType::Int,
        "Float" => FieldType::Float,
        "ID" => FieldType::Id,
        "Boolean" => FieldType::Boolean,
        _ => FieldType::Named(name.to_string()),
    }
}

// Spec: https://spec.graphql.org/draft/#sec-Type-References
impl From<&'_ ast::Type> for FieldType {
    fn from(ty: &'_ ast::Type) -> Self {
        match ty {
            ast::Type::Named(name) => from_named(name.as_str()),
            ast::Type::NonNullNamed(name) => from_named(name.as_str()).non_null(),
            ast::Type::List(inner) => FieldType::from(&**inner).list_of(),
            ast::Type::NonNullList(inner) => FieldType::from(&**inner).list_of().non_null(),
        }
    }
}
