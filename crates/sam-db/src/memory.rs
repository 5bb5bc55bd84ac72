use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::{DbError, DbResult, Entity, EntityStore, LogRecord};

type Key = (String, String, String);

#[derive(Default)]
struct Inner {
    entities: BTreeMap<Key, Entity>,
    logs: Vec<LogRecord>,
}

/// In-process store. All state is lost on drop.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(account: &str, kind: &str, name: &str) -> Key {
    (account.to_string(), kind.to_string(), name.to_string())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch(&self, account: &str, kind: &str, name: &str) -> DbResult<Option<Entity>> {
        let inner = self.inner.read().await;
        Ok(inner.entities.get(&key(account, kind, name)).cloned())
    }

    async fn fetch_by_id(&self, account: &str, id: Uuid) -> DbResult<Option<Entity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entities
            .values()
            .find(|e| e.id == id && e.account == account)
            .cloned())
    }

    async fn list(
        &self,
        account: &str,
        kind: &str,
        name_contains: Option<&str>,
    ) -> DbResult<Vec<Entity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entities
            .values()
            .filter(|e| e.account == account && e.kind == kind)
            .filter(|e| name_contains.map_or(true, |f| e.name.contains(f)))
            .cloned()
            .collect())
    }

    async fn upsert(&self, mut entity: Entity, expected_revision: Option<i64>) -> DbResult<Entity> {
        let mut inner = self.inner.write().await;
        let k = key(&entity.account, &entity.kind, &entity.name);
        let current = inner.entities.get(&k).map(|e| e.revision);

        if current != expected_revision {
            warn!(
                kind = %entity.kind,
                name = %entity.name,
                expected = ?expected_revision,
                found = ?current,
                "revision check failed"
            );
            return Err(DbError::Conflict {
                kind: entity.kind,
                name: entity.name,
                expected: expected_revision,
                found: current,
            });
        }

        let now = Utc::now();
        match inner.entities.get(&k) {
            Some(stored) => {
                entity.id = stored.id;
                entity.created = stored.created;
                entity.revision = stored.revision + 1;
            }
            None => {
                entity.created = now;
                entity.revision = 1;
            }
        }
        entity.modified = now;
        inner.entities.insert(k, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, account: &str, kind: &str, name: &str) -> DbResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.entities.remove(&key(account, kind, name)).is_some())
    }

    async fn append_log(&self, record: LogRecord) -> DbResult<()> {
        self.inner.write().await.logs.push(record);
        Ok(())
    }

    async fn logs(
        &self,
        account: &str,
        stream: &str,
        name: &str,
        limit: usize,
    ) -> DbResult<Vec<LogRecord>> {
        let inner = self.inner.read().await;
        let matching: Vec<&LogRecord> = inner
            .logs
            .iter()
            .filter(|r| r.account == account && r.stream == stream && r.name == name)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }

    async fn log_names(&self, account: &str, stream: &str) -> DbResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner
            .logs
            .iter()
            .filter(|r| r.account == account && r.stream == stream)
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(name: &str) -> Entity {
        let mut e = Entity::new("acme", "User", name);
        e.description = "a user".into();
        e.version = "1.0.0".into();
        e.fields.insert("email".into(), json!("joe@mail.com"));
        e
    }

    #[tokio::test]
    async fn insert_then_update_bumps_revision() {
        let store = MemoryStore::new();
        let first = store.upsert(user("joe"), None).await.unwrap();
        assert_eq!(first.revision, 1);

        let mut next = first.clone();
        next.id = Uuid::new_v4();
        next.description = "changed".into();
        let second = store.upsert(next, Some(1)).await.unwrap();
        assert_eq!(second.revision, 2);
        assert_eq!(second.id, first.id, "id survives updates");
        assert_eq!(second.created, first.created);
        assert_eq!(second.description, "changed");
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict() {
        let store = MemoryStore::new();
        store.upsert(user("joe"), None).await.unwrap();
        store.upsert(user("joe"), Some(1)).await.unwrap();

        let err = store.upsert(user("joe"), Some(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Conflict { expected: Some(1), found: Some(2), .. }
        ));

        let err = store.upsert(user("joe"), None).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { expected: None, .. }));
    }

    #[tokio::test]
    async fn list_filters_by_substring_and_scope() {
        let store = MemoryStore::new();
        for n in ["alice", "bob", "alicia"] {
            store.upsert(user(n), None).await.unwrap();
        }
        let mut other = user("alice");
        other.account = "globex".into();
        store.upsert(other, None).await.unwrap();

        let all = store.list("acme", "User", None).await.unwrap();
        assert_eq!(all.len(), 3);
        let names: Vec<String> = store
            .list("acme", "User", Some("ali"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["alice", "alicia"]);
        assert!(store.list("acme", "Secret", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn logs_keep_the_most_recent() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append_log(LogRecord::new("acme", "ChatHistory", "c1", format!("m{i}"), json!({})))
                .await
                .unwrap();
        }
        let recent = store.logs("acme", "ChatHistory", "c1", 2).await.unwrap();
        let msgs: Vec<&str> = recent.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(msgs, ["m3", "m4"]);
        assert_eq!(
            store.log_names("acme", "ChatHistory").await.unwrap(),
            ["c1".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let stored = store.upsert(user("joe"), None).await.unwrap();
        assert!(store.fetch_by_id("acme", stored.id).await.unwrap().is_some());
        assert!(store.fetch_by_id("globex", stored.id).await.unwrap().is_none());
        assert!(store.delete("acme", "User", "joe").await.unwrap());
        assert!(!store.delete("acme", "User", "joe").await.unwrap());
        assert!(store.fetch("acme", "User", "joe").await.unwrap().is_none());
    }
}
