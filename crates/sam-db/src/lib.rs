//! Persistence collaborator for manifest entities.
//!
//! Brokers never talk to a database directly; they go through
//! [`EntityStore`]. Two implementations ship here: [`MemoryStore`] for tests
//! and single-process deployments, and [`PgStore`] backed by Postgres.
//!
//! Writes are optimistic: [`EntityStore::upsert`] takes the revision the
//! caller last saw and fails with [`DbError::Conflict`] if the row moved on.

mod memory;
mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use pg::{connect, connect_from_env, migrate, PgStore, ENV_DB_URL};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// The row changed (or appeared, or vanished) since the caller read it.
    #[error(
        "{kind} '{name}' was modified concurrently (expected revision {expected:?}, found {found:?})"
    )]
    Conflict {
        kind: String,
        name: String,
        expected: Option<i64>,
        found: Option<i64>,
    },

    #[error("stored row is malformed: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl DbError {
    /// Name of the underlying failure, for error reports.
    pub fn error_type(&self) -> &'static str {
        match self {
            DbError::Conflict { .. } => "DbError::Conflict",
            DbError::Corrupt(_) => "DbError::Corrupt",
            DbError::Backend(_) => "sqlx::Error",
        }
    }
}

/// One persisted resource.
///
/// `fields` holds the kind-specific spec values as flat snake_case columns;
/// references to other entities are stored as their id (as a string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub account: String,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub tags: Vec<String>,
    pub annotations: Vec<String>,
    pub fields: Map<String, Value>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Starts at 1 on insert and increments on every successful write.
    pub revision: i64,
}

impl Entity {
    /// A not-yet-stored entity with a fresh id and empty fields.
    pub fn new(account: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            account: account.into(),
            kind: kind.into(),
            name: name.into(),
            description: String::new(),
            version: String::new(),
            tags: Vec::new(),
            annotations: Vec::new(),
            fields: Map::new(),
            created: now,
            modified: now,
            revision: 0,
        }
    }

    pub fn field(&self, column: &str) -> Option<&Value> {
        self.fields.get(column).filter(|v| !v.is_null())
    }

    pub fn field_str(&self, column: &str) -> Option<&str> {
        self.field(column).and_then(Value::as_str)
    }

    pub fn field_bool(&self, column: &str) -> Option<bool> {
        self.field(column).and_then(Value::as_bool)
    }
}

/// Append-only record attached to a named entity.
///
/// `stream` groups records by what wrote them: a chat kind name such as
/// `ChatHistory`, or an owning kind such as `Chatbot` for lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: Uuid,
    pub account: String,
    pub stream: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub message: String,
    pub data: Value,
}

impl LogRecord {
    pub fn new(
        account: impl Into<String>,
        stream: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account: account.into(),
            stream: stream.into(),
            name: name.into(),
            created: Utc::now(),
            message: message.into(),
            data,
        }
    }
}

/// Storage seam used by every broker.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn fetch(&self, account: &str, kind: &str, name: &str) -> DbResult<Option<Entity>>;

    async fn fetch_by_id(&self, account: &str, id: Uuid) -> DbResult<Option<Entity>>;

    /// Entities of `kind`, ordered by name. `name_contains` is a
    /// case-sensitive substring filter.
    async fn list(
        &self,
        account: &str,
        kind: &str,
        name_contains: Option<&str>,
    ) -> DbResult<Vec<Entity>>;

    /// Insert (`expected_revision == None`) or compare-and-swap update.
    ///
    /// On update, `id`, `created` and `name` of the stored row are kept; the
    /// returned entity carries the new revision.
    async fn upsert(&self, entity: Entity, expected_revision: Option<i64>) -> DbResult<Entity>;

    /// Returns whether a row was removed.
    async fn delete(&self, account: &str, kind: &str, name: &str) -> DbResult<bool>;

    async fn append_log(&self, record: LogRecord) -> DbResult<()>;

    /// The most recent `limit` records for `(stream, name)`, oldest first.
    async fn logs(
        &self,
        account: &str,
        stream: &str,
        name: &str,
        limit: usize,
    ) -> DbResult<Vec<LogRecord>>;

    /// Names with at least one record in `stream`, sorted.
    async fn log_names(&self, account: &str, stream: &str) -> DbResult<Vec<String>>;
}
