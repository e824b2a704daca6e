//! Entity keys: the addressing scheme of snapshot records.

use std::borrow::Borrow;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::ID;
use crate::spec::TYPENAME;

/// Key of the synthetic record holding top-level query fields.
pub const ROOT_QUERY: &str = "ROOT_QUERY";

/// The key of a record in a [`Snapshot`](crate::Snapshot): `<typename>:<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn root_query() -> Self {
        EntityKey(ROOT_QUERY.to_string())
    }

    /// Derives the key of a response object from its `__typename` and `id`.
    ///
    /// Returns the name of the first identity field that is missing or not
    /// string-coercible.
    pub fn from_object(object: &Object) -> Result<Self, &'static str> {
        let typename = object
            .get(TYPENAME)
            .and_then(|typename| typename.as_str())
            .ok_or(TYPENAME)?;
        let id = object.get(ID).ok_or(ID)?;
        key_for(typename, id).ok_or(ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The typename part of the key, `None` for synthetic records.
    pub fn typename(&self) -> Option<&str> {
        typename_of(&self.0)
    }
}

/// Builds the key for `(typename, id)`, `None` if `id` is not a string or a number.
pub fn key_for(typename: &str, id: &Value) -> Option<EntityKey> {
    match id {
        Value::String(id) => Some(EntityKey(format!("{typename}:{}", id.as_str()))),
        Value::Number(id) => Some(EntityKey(format!("{typename}:{id}"))),
        _ => None,
    }
}

/// The typename part of a record key; GraphQL names never contain `:`.
pub(crate) fn typename_of(key: &str) -> Option<&str> {
    key.split_once(':').map(|(typename, _)| typename)
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntityKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EntityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<EntityKey> for Value {
    fn from(key: EntityKey) -> Self {
        Value::String(key.0.into())
    }
}
