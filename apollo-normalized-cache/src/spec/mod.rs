//! Selection trees and the schema knowledge needed to compile them.

mod field_type;
mod schema;
mod selection;

pub use field_type::FieldType;
pub use schema::Schema;
#[cfg(test)]
pub(crate) use selection::MockTypeOracle;
pub use selection::Argument;
pub use selection::SelectionNode;
pub use selection::TypeOracle;

pub(crate) const TYPENAME: &str = "__typename";
pub(crate) const ID: &str = "id";
