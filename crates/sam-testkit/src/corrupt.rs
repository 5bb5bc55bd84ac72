use async_trait::async_trait;
use sam_db::{DbError, DbResult, Entity, EntityStore, LogRecord, MemoryStore};
use uuid::Uuid;

/// Store whose row reads by name fail as if the stored row were unreadable.
/// Listing, writes and logs go to an in-memory store.
#[derive(Default)]
pub struct CorruptStore {
    inner: MemoryStore,
}

impl CorruptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for CorruptStore {
    async fn fetch(&self, _account: &str, kind: &str, name: &str) -> DbResult<Option<Entity>> {
        Err(DbError::Corrupt(format!("{kind} '{name}': fields is not an object")))
    }

    async fn fetch_by_id(&self, account: &str, id: Uuid) -> DbResult<Option<Entity>> {
        self.inner.fetch_by_id(account, id).await
    }

    async fn list(
        &self,
        account: &str,
        kind: &str,
        name_contains: Option<&str>,
    ) -> DbResult<Vec<Entity>> {
        self.inner.list(account, kind, name_contains).await
    }

    async fn upsert(&self, entity: Entity, expected_revision: Option<i64>) -> DbResult<Entity> {
        self.inner.upsert(entity, expected_revision).await
    }

    async fn delete(&self, account: &str, kind: &str, name: &str) -> DbResult<bool> {
        self.inner.delete(account, kind, name).await
    }

    async fn append_log(&self, record: LogRecord) -> DbResult<()> {
        self.inner.append_log(record).await
    }

    async fn logs(
        &self,
        account: &str,
        stream: &str,
        name: &str,
        limit: usize,
    ) -> DbResult<Vec<LogRecord>> {
        self.inner.logs(account, stream, name, limit).await
    }

    async fn log_names(&self, account: &str, stream: &str) -> DbResult<Vec<String>> {
        self.inner.log_names(account, stream).await
    }
}
