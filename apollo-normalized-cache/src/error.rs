use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;

/// Trait used to get extension type from an error
pub trait ErrorExtension {
    fn extension_code(&self) -> String;

    fn custom_extension_details(&self) -> Option<Object> {
        None
    }

    /// Builds the `extensions` object of a GraphQL error from this error.
    fn to_extensions(&self) -> Object {
        let mut extensions = self.custom_extension_details().unwrap_or_default();
        extensions.insert("code", Value::from(self.extension_code()));
        extensions
    }
}

/// Error types for plan compilation.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum PlanError {
    /// selection at '{path}' is declared {declared} but its type '{field_type}' is {expected}
    ///
    /// The selection tree and the schema disagree on whether the field holds a list.
    SchemaMismatch {
        /// Response path of the offending selection.
        path: Path,
        /// Cardinality written in the selection tree.
        declared: ListCardinality,
        /// Cardinality reported by the type oracle.
        expected: ListCardinality,
        /// The field type, as printed GraphQL.
        field_type: String,
    },
}

/// Whether a field holds one value or a list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListCardinality {
    Single,
    List,
}

impl ListCardinality {
    pub(crate) fn from_is_list(is_list: bool) -> Self {
        if is_list {
            ListCardinality::List
        } else {
            ListCardinality::Single
        }
    }
}

impl std::fmt::Display for ListCardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListCardinality::Single => write!(f, "single-valued"),
            ListCardinality::List => write!(f, "list-valued"),
        }
    }
}

impl ErrorExtension for PlanError {
    fn extension_code(&self) -> String {
        match self {
            PlanError::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut obj = Object::new();
        match self {
            PlanError::SchemaMismatch {
                path, field_type, ..
            } => {
                obj.insert("path", path.to_string().into());
                obj.insert("type", field_type.clone().into());
            }
        }
        Some(obj)
    }
}

/// Error types for writes into a snapshot.
///
/// A failed write never produces a partial snapshot.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum WriteError {
    /// object at '{path}' has no usable '{field}' and cannot be identified
    MissingIdentity {
        /// Response path of the object.
        path: Path,
        /// The identity field that is absent or not coercible to a string.
        field: String,
    },

    /// invalid value at '{path}': expected {expected}, found {found}
    InvalidValue {
        /// Response path of the value.
        path: Path,
        /// What the plan expected at this position.
        expected: String,
        /// JSON type of the value found instead.
        found: String,
    },
}

impl ErrorExtension for WriteError {
    fn extension_code(&self) -> String {
        match self {
            WriteError::MissingIdentity { .. } => "MISSING_IDENTITY",
            WriteError::InvalidValue { .. } => "INVALID_VALUE",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut obj = Object::new();
        match self {
            WriteError::MissingIdentity { path, field } => {
                obj.insert("path", path.to_string().into());
                obj.insert("field", field.clone().into());
            }
            WriteError::InvalidValue { path, .. } => {
                obj.insert("path", path.to_string().into());
            }
        }
        Some(obj)
    }
}

/// Error types for reads from a snapshot.
///
/// A failed read never substitutes `null` for missing data.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum ReadError {
    /// reference '{key}' at '{path}' is not in the snapshot
    ///
    /// This means the snapshot is corrupted or the record was evicted too early.
    DanglingReference {
        /// Response path holding the reference.
        path: Path,
        /// The missing entity key.
        key: String,
    },

    /// record '{key}' has no field '{field}' (needed at '{path}')
    MissingField {
        /// Response path of the missing field.
        path: Path,
        /// The record that lacks the field.
        key: String,
        /// Storage key of the field.
        field: String,
    },

    /// field '{field}' of record '{key}' does not hold an entity reference (needed at '{path}')
    InvalidReference {
        /// Response path of the field.
        path: Path,
        /// The record holding the field.
        key: String,
        /// Storage key of the field.
        field: String,
    },
}

impl ErrorExtension for ReadError {
    fn extension_code(&self) -> String {
        match self {
            ReadError::DanglingReference { .. } => "DANGLING_REFERENCE",
            ReadError::MissingField { .. } => "MISSING_FIELD",
            ReadError::InvalidReference { .. } => "INVALID_REFERENCE",
        }
        .to_string()
    }

    fn custom_extension_details(&self) -> Option<Object> {
        let mut obj = Object::new();
        match self {
            ReadError::DanglingReference { path, key } => {
                obj.insert("path", path.to_string().into());
                obj.insert("key", key.clone().into());
            }
            ReadError::MissingField { path, key, field }
            | ReadError::InvalidReference { path, key, field } => {
                obj.insert("path", path.to_string().into());
                obj.insert("key", key.clone().into());
                obj.insert("field", field.clone().into());
            }
        }
        Some(obj)
    }
}

/// GraphQL document errors.
#[derive(Error, Display, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[non_exhaustive]
pub enum SpecError {
    /// parsing error: {0}
    ParsingError(String),
    /// validation error: {0}
    ValidationError(String),
    /// Unknown operation named "{0}"
    UnknownOperation(String),
    /// {0} operations cannot be normalized, only queries can
    UnsupportedOperation(String),
    /// operation declares variable '${0}', variables are not supported
    UnsupportedVariable(String),
    /// directive '@{0}' is not supported
    UnsupportedDirective(String),
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::ParsingError(_) => "PARSING_ERROR",
            SpecError::ValidationError(_) => "GRAPHQL_VALIDATION_FAILED",
            SpecError::UnknownOperation(_) => "GRAPHQL_VALIDATION_FAILED",
            SpecError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            SpecError::UnsupportedVariable(_) => "UNSUPPORTED_VARIABLE",
            SpecError::UnsupportedDirective(_) => "UNSUPPORTED_DIRECTIVE",
        }
        .to_string()
    }
}

/// Configuration errors.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// could not deserialize configuration: {0}
    DeserializeConfigError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn display_messages() {
        let err = WriteError::MissingIdentity {
            path: Path::from("hero/friends/2"),
            field: "id".into(),
        };
        assert_eq!(
            err.to_string(),
            "object at '/hero/friends/2' has no usable 'id' and cannot be identified"
        );

        let err = PlanError::SchemaMismatch {
            path: Path::from("hero/friends"),
            declared: ListCardinality::Single,
            expected: ListCardinality::List,
            field_type: "[Character]".into(),
        };
        assert_eq!(
            err.to_string(),
            "selection at '/hero/friends' is declared single-valued but its type '[Character]' is list-valued"
        );
    }

    #[test]
    fn read_error_extensions() {
        let err = ReadError::DanglingReference {
            path: Path::from("hero"),
            key: "Droid:foo".into(),
        };
        assert_eq!(
            Value::Object(err.to_extensions()),
            json!({
                "path": "/hero",
                "key": "Droid:foo",
                "code": "DANGLING_REFERENCE",
            })
        );
    }

    #[test]
    fn errors_serialize_with_type_tag() {
        let err = WriteError::InvalidValue {
            path: Path::from("hero"),
            expected: "object".into(),
            found: "string".into(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["type"], "InvalidValue");
        assert_eq!(value["path"], serde_json::json!(["hero"]));
    }
}
