use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sam_db::{DbResult, Entity, EntityStore, LogRecord, MemoryStore};
use uuid::Uuid;

/// Store that lets one concurrent writer win the next compare-and-swap.
///
/// After [`ContendedStore::arm`], the next update with an expected revision
/// first writes a competing edit of the same row, so the caller's write sees
/// a stale revision.
#[derive(Default)]
pub struct ContendedStore {
    inner: MemoryStore,
    armed: AtomicBool,
}

impl ContendedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntityStore for ContendedStore {
    async fn fetch(&self, account: &str, kind: &str, name: &str) -> DbResult<Option<Entity>> {
        self.inner.fetch(account, kind, name).await
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
        if expected_revision.is_some() && self.armed.swap(false, Ordering::SeqCst) {
            let current = self
                .inner
                .fetch(&entity.account, &entity.kind, &entity.name)
                .await?;
            if let Some(mut rival) = current {
                rival.description = format!("{} (concurrent edit)", rival.description);
                let revision = rival.revision;
                self.inner.upsert(rival, Some(revision)).await?;
            }
        }
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
