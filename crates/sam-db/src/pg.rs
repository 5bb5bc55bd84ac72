use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::{DbError, DbResult, Entity, EntityStore, LogRecord};

pub const ENV_DB_URL: &str = "SAM_DATABASE_URL";

/// Connect to Postgres using the URL in `var` (normally [`ENV_DB_URL`]).
pub async fn connect_from_env(var: &str) -> anyhow::Result<PgPool> {
    let url = std::env::var(var).with_context(|| format!("missing env var {var}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

const ENTITY_COLUMNS: &str = "id, account, kind, name, description, version, tags, annotations, \
                              fields, created_at, modified_at, revision";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_revision(&self, account: &str, kind: &str, name: &str) -> DbResult<Option<i64>> {
        let row = sqlx::query(
            "select revision from sam_entities where account = $1 and kind = $2 and name = $3",
        )
        .bind(account)
        .bind(kind)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(r) => Some(r.try_get("revision")?),
            None => None,
        })
    }
}

fn entity_from_row(row: &PgRow) -> DbResult<Entity> {
    let tags: Json<Vec<String>> = row.try_get("tags")?;
    let annotations: Json<Vec<String>> = row.try_get("annotations")?;
    let fields: Json<Value> = row.try_get("fields")?;
    let fields: Map<String, Value> = match fields.0 {
        Value::Object(map) => map,
        other => {
            return Err(DbError::Corrupt(format!(
                "sam_entities.fields must be an object, got {other}"
            )))
        }
    };

    Ok(Entity {
        id: row.try_get("id")?,
        account: row.try_get("account")?,
        kind: row.try_get("kind")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
        tags: tags.0,
        annotations: annotations.0,
        fields,
        created: row.try_get("created_at")?,
        modified: row.try_get("modified_at")?,
        revision: row.try_get("revision")?,
    })
}

fn log_from_row(row: &PgRow) -> DbResult<LogRecord> {
    let data: Json<Value> = row.try_get("data")?;
    Ok(LogRecord {
        id: row.try_get("id")?,
        account: row.try_get("account")?,
        stream: row.try_get("stream")?,
        name: row.try_get("name")?,
        created: row.try_get("created_at")?,
        message: row.try_get("message")?,
        data: data.0,
    })
}

#[async_trait]
impl EntityStore for PgStore {
    async fn fetch(&self, account: &str, kind: &str, name: &str) -> DbResult<Option<Entity>> {
        let sql = format!(
            "select {ENTITY_COLUMNS} from sam_entities where account = $1 and kind = $2 and name = $3"
        );
        let row = sqlx::query(&sql)
            .bind(account)
            .bind(kind)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(entity_from_row).transpose()
    }

    async fn fetch_by_id(&self, account: &str, id: Uuid) -> DbResult<Option<Entity>> {
        let sql = format!("select {ENTITY_COLUMNS} from sam_entities where account = $1 and id = $2");
        let row = sqlx::query(&sql)
            .bind(account)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(entity_from_row).transpose()
    }

    async fn list(
        &self,
        account: &str,
        kind: &str,
        name_contains: Option<&str>,
    ) -> DbResult<Vec<Entity>> {
        // strpos avoids LIKE metacharacter escaping.
        let sql = format!(
            r#"
            select {ENTITY_COLUMNS}
            from sam_entities
            where account = $1
              and kind = $2
              and ($3::text is null or strpos(name, $3) > 0)
            order by name
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(account)
            .bind(kind)
            .bind(name_contains)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(entity_from_row).collect()
    }

    async fn upsert(&self, entity: Entity, expected_revision: Option<i64>) -> DbResult<Entity> {
        let now = Utc::now();
        let row = match expected_revision {
            None => {
                let sql = format!(
                    r#"
                    insert into sam_entities (
                      id, account, kind, name, description, version, tags, annotations,
                      fields, created_at, modified_at, revision
                    ) values (
                      $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, 1
                    )
                    on conflict (account, kind, name) do nothing
                    returning {ENTITY_COLUMNS}
                    "#
                );
                sqlx::query(&sql)
                    .bind(entity.id)
                    .bind(&entity.account)
                    .bind(&entity.kind)
                    .bind(&entity.name)
                    .bind(&entity.description)
                    .bind(&entity.version)
                    .bind(Json(&entity.tags))
                    .bind(Json(&entity.annotations))
                    .bind(Json(&entity.fields))
                    .bind(now)
                    .fetch_optional(&self.pool)
                    .await?
            }
            Some(expected) => {
                let sql = format!(
                    r#"
                    update sam_entities
                    set description = $4,
                        version     = $5,
                        tags        = $6,
                        annotations = $7,
                        fields      = $8,
                        modified_at = $9,
                        revision    = revision + 1
                    where account = $1 and kind = $2 and name = $3 and revision = $10
                    returning {ENTITY_COLUMNS}
                    "#
                );
                sqlx::query(&sql)
                    .bind(&entity.account)
                    .bind(&entity.kind)
                    .bind(&entity.name)
                    .bind(&entity.description)
                    .bind(&entity.version)
                    .bind(Json(&entity.tags))
                    .bind(Json(&entity.annotations))
                    .bind(Json(&entity.fields))
                    .bind(now)
                    .bind(expected)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        match row {
            Some(r) => entity_from_row(&r),
            None => {
                let found = self
                    .current_revision(&entity.account, &entity.kind, &entity.name)
                    .await?;
                warn!(
                    kind = %entity.kind,
                    name = %entity.name,
                    expected = ?expected_revision,
                    found = ?found,
                    "revision check failed"
                );
                Err(DbError::Conflict {
                    kind: entity.kind,
                    name: entity.name,
                    expected: expected_revision,
                    found,
                })
            }
        }
    }

    async fn delete(&self, account: &str, kind: &str, name: &str) -> DbResult<bool> {
        let res = sqlx::query(
            "delete from sam_entities where account = $1 and kind = $2 and name = $3",
        )
        .bind(account)
        .bind(kind)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn append_log(&self, record: LogRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            insert into sam_entity_logs (id, account, stream, name, created_at, message, data)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.account)
        .bind(&record.stream)
        .bind(&record.name)
        .bind(record.created)
        .bind(&record.message)
        .bind(Json(&record.data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn logs(
        &self,
        account: &str,
        stream: &str,
        name: &str,
        limit: usize,
    ) -> DbResult<Vec<LogRecord>> {
        let rows = sqlx::query(
            r#"
            select id, account, stream, name, created_at, message, data
            from (
              select *
              from sam_entity_logs
              where account = $1 and stream = $2 and name = $3
              order by created_at desc
              limit $4
            ) recent
            order by created_at asc
            "#,
        )
        .bind(account)
        .bind(stream)
        .bind(name)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_from_row).collect()
    }

    async fn log_names(&self, account: &str, stream: &str) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            "select distinct name from sam_entity_logs where account = $1 and stream = $2 order by name",
        )
        .bind(account)
        .bind(stream)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(DbError::from))
            .collect()
    }
}
