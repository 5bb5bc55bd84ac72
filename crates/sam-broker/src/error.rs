use sam_db::DbError;
use sam_loader::LoaderError;
use sam_schemas::{Kind, SchemaError};
use thiserror::Error;

use crate::Command;

pub type SamResult<T> = Result<T, SamError>;

/// Every failure a broker verb can report.
///
/// The dispatcher renders these through [`SamError::class`] and
/// [`SamError::status_code`]; nothing else about the transport leaks in here.
#[derive(Debug, Error)]
pub enum SamError {
    #[error("{0}")]
    Validation(String),

    #[error("unsupported kind '{kind}'; known kinds: {}", known.join(", "))]
    UnsupportedKind { kind: String, known: Vec<String> },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: Kind, name: String },

    #[error("{0}")]
    NotReady(String),

    #[error("{kind} is read-only; {command} is not allowed")]
    ReadOnly { kind: Kind, command: Command },

    #[error("{command} is not implemented for {kind}")]
    NotImplemented { kind: Kind, command: Command },

    #[error("{0}")]
    BusinessRule(String),

    #[error("{0}")]
    Conflict(String),

    /// `error_type` names the underlying failure (`sqlx::Error`,
    /// `DbError::Corrupt`, ...) for the error envelope context.
    #[error("internal error: {message}")]
    Internal {
        error_type: &'static str,
        message: String,
    },
}

impl SamError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    /// Broken invariant inside a broker, with no lower-level source.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::internal_from("BrokerInvariant", msg)
    }

    pub fn internal_from(error_type: &'static str, msg: impl Into<String>) -> Self {
        Self::Internal {
            error_type,
            message: msg.into(),
        }
    }

    pub fn not_found(kind: Kind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Stable `errorClass` string used in error envelopes.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::UnsupportedKind { .. } => "UnsupportedKind",
            Self::NotFound { .. } => "NotFound",
            Self::NotReady(_) => "NotReady",
            Self::ReadOnly { .. } => "ReadOnly",
            Self::NotImplemented { .. } => "NotImplemented",
            Self::BusinessRule(_) => "BusinessRuleViolation",
            Self::Conflict(_) => "Conflict",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// The underlying error type for internal errors, the class otherwise.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Internal { error_type, .. } => error_type,
            other => other.class(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::UnsupportedKind { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::ReadOnly { .. } => 405,
            Self::Conflict(_) => 409,
            Self::NotReady(_) => 412,
            Self::BusinessRule(_) => 422,
            Self::NotImplemented { .. } => 501,
            Self::Internal { .. } => 500,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl From<SchemaError> for SamError {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::KindMismatch { .. } => Self::BusinessRule(e.to_string()),
            SchemaError::UnknownKind(kind) => Self::UnsupportedKind {
                kind,
                known: Kind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<LoaderError> for SamError {
    fn from(e: LoaderError) -> Self {
        match e {
            LoaderError::Schema(inner) => inner.into(),
            LoaderError::KindMismatch { .. } => Self::BusinessRule(e.to_string()),
            LoaderError::Io { .. } => Self::internal_from("std::io::Error", e.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<DbError> for SamError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conflict { .. } => Self::Conflict(e.to_string()),
            other => Self::internal_from(other.error_type(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_has_a_distinct_status() {
        let cases = [
            (SamError::validation("x"), "ValidationError", 400),
            (
                SamError::UnsupportedKind { kind: "Widget".into(), known: vec!["User".into()] },
                "UnsupportedKind",
                400,
            ),
            (SamError::not_found(Kind::User, "joe"), "NotFound", 404),
            (SamError::NotReady("x".into()), "NotReady", 412),
            (
                SamError::ReadOnly { kind: Kind::ChatHistory, command: Command::Apply },
                "ReadOnly",
                405,
            ),
            (
                SamError::NotImplemented { kind: Kind::User, command: Command::Deploy },
                "NotImplemented",
                501,
            ),
            (SamError::business_rule("x"), "BusinessRuleViolation", 422),
            (SamError::Conflict("x".into()), "Conflict", 409),
            (SamError::internal("x"), "InternalError", 500),
        ];
        for (err, class, status) in cases {
            assert_eq!(err.class(), class);
            assert_eq!(err.status_code(), status, "{class}");
        }
    }

    #[test]
    fn unsupported_kind_lists_known_kinds() {
        let err: SamError = SchemaError::UnknownKind("Widget".into()).into();
        let msg = err.to_string();
        assert!(msg.contains("Widget"));
        assert!(msg.contains("SqlConnection"), "{msg}");
    }

    #[test]
    fn kind_mismatch_is_a_business_rule() {
        let err: SamError = SchemaError::KindMismatch {
            expected: Kind::User,
            found: Kind::Account,
        }
        .into();
        assert_eq!(err.class(), "BusinessRuleViolation");
    }

    #[test]
    fn internal_errors_keep_their_source_type() {
        let err: SamError = DbError::Corrupt("fields is not an object".into()).into();
        assert_eq!(err.class(), "InternalError");
        assert_eq!(err.error_type(), "DbError::Corrupt");
        assert_eq!(SamError::internal("x").error_type(), "BrokerInvariant");
        assert_eq!(SamError::not_found(Kind::User, "joe").error_type(), "NotFound");
    }

    #[test]
    fn missing_key_stays_verbatim() {
        let err: SamError = LoaderError::MissingKey("apiVersion").into();
        assert_eq!(err.to_string(), "Missing required key apiVersion");
        assert_eq!(err.status_code(), 400);
    }
}
