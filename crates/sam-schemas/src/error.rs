use thiserror::Error;

use crate::Kind;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Validation failures raised while constructing schema values.
///
/// `Field` always names the offending field with its dotted manifest path
/// (e.g. `metadata.name`, `spec.config.email`) so callers can surface it
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{field}: {message}")]
    Field { field: String, message: String },

    #[error("unknown kind '{0}'")]
    UnknownKind(String),

    #[error("spec describes a {found}, not a {expected}")]
    KindMismatch { expected: Kind, found: Kind },

    #[error("apiVersion '{found}' is not supported (expected {expected})")]
    ApiVersion {
        expected: &'static str,
        found: String,
    },
}

impl SchemaError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Dotted path of the offending field, when the error is field-level.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field { field, .. } => Some(field),
            _ => None,
        }
    }
}
