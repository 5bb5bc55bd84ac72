use async_trait::async_trait;
use sam_db::{Entity, LogRecord};
use sam_schemas::{Kind, KindSpec, Manifest, Metadata, SchemaError};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::mapping::{FieldMap, FieldMapping, RefTarget};
use crate::{
    kinds, BrokerContext, Command, ProvisioningAction, ProvisioningTask, SamError, SamResult,
};

/// Upper bound on records returned by `logs`.
pub const LOG_LIMIT: usize = 100;

/// The command-verb protocol every kind answers.
///
/// One instance serves one request. Verbs a kind does not support answer
/// [`SamError::NotImplemented`] (or [`SamError::ReadOnly`] for writes on
/// read-only kinds).
#[async_trait]
pub trait Broker: Send + Sync {
    fn kind(&self) -> Kind;

    /// A valid, representative manifest. No side effects.
    fn example_manifest(&self) -> SamResult<Manifest>;

    async fn get(&mut self, name_filter: Option<&str>) -> SamResult<Vec<Manifest>>;

    async fn describe(&mut self, name: &str) -> SamResult<Manifest>;

    async fn apply(&mut self, manifest: &Manifest) -> SamResult<Manifest>;

    async fn delete(&mut self, name: &str) -> SamResult<()>;

    async fn deploy(&mut self, _name: &str) -> SamResult<Manifest> {
        Err(SamError::NotImplemented {
            kind: self.kind(),
            command: Command::Deploy,
        })
    }

    async fn undeploy(&mut self, _name: &str) -> SamResult<Manifest> {
        Err(SamError::NotImplemented {
            kind: self.kind(),
            command: Command::Undeploy,
        })
    }

    async fn chat(&mut self, _name: &str, _prompt: &str) -> SamResult<Value> {
        Err(SamError::NotImplemented {
            kind: self.kind(),
            command: Command::Chat,
        })
    }

    async fn logs(&mut self, _name: &str) -> SamResult<Vec<LogRecord>> {
        Err(SamError::NotImplemented {
            kind: self.kind(),
            command: Command::Logs,
        })
    }
}

/// Where a kind keeps its deployed/active flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub column: &'static str,
    /// Submit a provisioning task when the flag flips.
    pub provision: bool,
}

/// Per-kind behaviour plugged into [`ResourceBroker`].
///
/// The defaults describe a plain CRUD kind: no extra business rules, no
/// computed status beyond timestamps, no deploy, chat or logs.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    fn kind(&self) -> Kind;

    fn field_map(&self) -> &'static FieldMap;

    fn example(&self) -> SamResult<Manifest>;

    fn activation(&self) -> Option<Activation> {
        None
    }

    fn supports_chat(&self) -> bool {
        false
    }

    fn supports_logs(&self) -> bool {
        false
    }

    /// Rules that need the store or the caller. Runs before any write.
    async fn check_apply(
        &self,
        _ctx: &BrokerContext,
        _manifest: &Manifest,
        _existing: Option<&Entity>,
    ) -> SamResult<()> {
        Ok(())
    }

    async fn check_delete(&self, _ctx: &BrokerContext, _entity: &Entity) -> SamResult<()> {
        Ok(())
    }

    /// Kind-specific status fields, merged after `created`/`modified`.
    async fn status(&self, _ctx: &BrokerContext, _entity: &Entity) -> SamResult<Map<String, Value>> {
        Ok(Map::new())
    }

    /// Mask sensitive values in an outgoing spec.
    fn redact(&self, _spec: &mut Value) {}

    /// Hostnames carried on provisioning tasks.
    fn hosts(&self, _ctx: &BrokerContext, _entity: &Entity) -> Vec<String> {
        Vec::new()
    }

    async fn chat(&self, _ctx: &BrokerContext, _entity: &Entity, _prompt: &str) -> SamResult<Value> {
        Err(SamError::NotImplemented {
            kind: self.kind(),
            command: Command::Chat,
        })
    }

    async fn logs(&self, _ctx: &BrokerContext, _entity: &Entity) -> SamResult<Vec<LogRecord>> {
        Err(SamError::NotImplemented {
            kind: self.kind(),
            command: Command::Logs,
        })
    }
}

/// Generic broker for every kind that persists entities.
pub struct ResourceBroker<R: Resource> {
    ctx: BrokerContext,
    resource: R,
    cached: Option<Entity>,
}

impl<R: Resource> ResourceBroker<R> {
    pub fn new(ctx: BrokerContext, resource: R) -> Self {
        Self {
            ctx,
            resource,
            cached: None,
        }
    }

    pub fn boxed(ctx: BrokerContext, resource: R) -> Box<dyn Broker> {
        Box::new(Self::new(ctx, resource))
    }

    pub fn context(&self) -> &BrokerContext {
        &self.ctx
    }

    /// The last entity this broker read or wrote.
    pub fn cached_entity(&self) -> Option<&Entity> {
        self.cached.as_ref()
    }

    /// Build the entity a manifest describes, with references resolved to
    /// ids. Nothing is written.
    pub async fn manifest_to_entity(&self, manifest: &Manifest) -> SamResult<Entity> {
        let map = self.resource.field_map();
        let mut fields = map.flatten(&manifest.spec_value())?;
        self.names_to_ids(map, &mut fields).await?;

        let md = manifest.metadata();
        let mut entity = Entity::new(self.ctx.account(), self.kind().as_str(), md.name());
        entity.description = md.description().to_string();
        entity.version = md.version().to_string();
        entity.tags = md.tags().to_vec();
        entity.annotations = md.annotations().to_vec();
        entity.fields = fields;
        Ok(entity)
    }

    /// Rebuild the full manifest for a stored entity, status included.
    /// Sensitive values are not masked here.
    pub async fn entity_to_manifest(&self, entity: &Entity) -> SamResult<Manifest> {
        let kind = self.kind();
        let map = self.resource.field_map();

        let mut columns = entity.fields.clone();
        self.ids_to_names(map, &mut columns).await?;
        let spec = map.unflatten(&columns);

        let corrupt = |e: SchemaError| {
            SamError::internal_from(
                "SchemaError",
                format!("stored {kind} '{}' does not validate: {e}", entity.name),
            )
        };
        let metadata = Metadata::new(
            entity.name.clone(),
            entity.description.clone(),
            entity.version.clone(),
            entity.tags.clone(),
            entity.annotations.clone(),
        )
        .map_err(corrupt)?;
        let spec = KindSpec::parse(kind, spec).map_err(corrupt)?;
        let manifest = Manifest::new(kind, metadata, spec).map_err(corrupt)?;

        let mut status = Map::new();
        status.insert("created".into(), json!(entity.created.to_rfc3339()));
        status.insert("modified".into(), json!(entity.modified.to_rfc3339()));
        status.extend(self.resource.status(&self.ctx, entity).await?);
        Ok(manifest.with_status(Value::Object(status)))
    }

    /// Outgoing form: full manifest with sensitive values masked.
    async fn render(&self, entity: &Entity) -> SamResult<Manifest> {
        let manifest = self.entity_to_manifest(entity).await?;
        let mut spec = manifest.spec_value();
        let before = spec.clone();
        self.resource.redact(&mut spec);
        if spec == before {
            return Ok(manifest);
        }
        let status = manifest.status().cloned();
        let redacted = Manifest::from_parts(
            manifest.api_version(),
            self.kind().as_str(),
            serde_json::to_value(manifest.metadata())
                .map_err(|e| SamError::internal_from("serde_json::Error", e.to_string()))?,
            spec,
            None,
        )?;
        Ok(match status {
            Some(s) => redacted.with_status(s),
            None => redacted,
        })
    }

    async fn load(&mut self, name: &str) -> SamResult<Entity> {
        if let Some(e) = &self.cached {
            if e.name == name {
                return Ok(e.clone());
            }
        }
        let entity = self
            .ctx
            .store
            .fetch(self.ctx.account(), self.kind().as_str(), name)
            .await?
            .ok_or_else(|| SamError::not_found(self.kind(), name))?;
        self.cached = Some(entity.clone());
        Ok(entity)
    }

    async fn names_to_ids(&self, map: &FieldMap, fields: &mut Map<String, Value>) -> SamResult<()> {
        for (m, target) in map.references() {
            let Some(value) = fields.get(m.column).cloned() else {
                continue;
            };
            let resolved = match value {
                Value::String(name) => Value::String(self.resolve_name(m, target, &name).await?),
                Value::Array(names) => {
                    let mut ids = Vec::with_capacity(names.len());
                    for n in names {
                        let name = n.as_str().ok_or_else(|| {
                            SamError::validation(format!("{}: expected a list of names", spec_path(m)))
                        })?;
                        ids.push(Value::String(self.resolve_name(m, target, name).await?));
                    }
                    Value::Array(ids)
                }
                other => {
                    return Err(SamError::validation(format!(
                        "{}: expected a name, got {other}",
                        spec_path(m)
                    )))
                }
            };
            fields.insert(m.column.to_string(), resolved);
        }
        Ok(())
    }

    async fn resolve_name(&self, m: &FieldMapping, target: RefTarget, name: &str) -> SamResult<String> {
        for kind in target.candidates() {
            if let Some(e) = self
                .ctx
                .store
                .fetch(self.ctx.account(), kind.as_str(), name)
                .await?
            {
                return Ok(e.id.to_string());
            }
        }
        Err(SamError::validation(format!(
            "{}: {} '{name}' does not exist",
            spec_path(m),
            target.describe()
        )))
    }

    async fn ids_to_names(&self, map: &FieldMap, columns: &mut Map<String, Value>) -> SamResult<()> {
        for (m, _) in map.references() {
            let Some(value) = columns.get(m.column).cloned() else {
                continue;
            };
            let named = match value {
                Value::String(id) => Value::String(self.name_for_id(&id).await?),
                Value::Array(ids) => {
                    let mut names = Vec::with_capacity(ids.len());
                    for id in ids {
                        let id = id.as_str().unwrap_or_default();
                        names.push(Value::String(self.name_for_id(id).await?));
                    }
                    Value::Array(names)
                }
                other => other,
            };
            columns.insert(m.column.to_string(), named);
        }
        Ok(())
    }

    async fn name_for_id(&self, id: &str) -> SamResult<String> {
        let uuid = Uuid::parse_str(id).map_err(|e| {
            SamError::internal_from("uuid::Error", format!("stored reference '{id}' is not an id: {e}"))
        })?;
        self.ctx
            .store
            .fetch_by_id(self.ctx.account(), uuid)
            .await?
            .map(|e| e.name)
            .ok_or_else(|| SamError::internal(format!("dangling reference to entity {id}")))
    }

    /// `(kind, name)` of every entity whose reference columns point at `entity`.
    async fn referrers(&self, entity: &Entity) -> SamResult<Vec<(Kind, String)>> {
        let id = entity.id.to_string();
        let mut out = Vec::new();
        for kind in Kind::ALL {
            let Some(map) = kinds::field_map_for(kind) else {
                continue;
            };
            let columns: Vec<&str> = map
                .references()
                .filter(|(_, target)| target.matches(self.kind()))
                .map(|(m, _)| m.column)
                .collect();
            if columns.is_empty() {
                continue;
            }
            for other in self
                .ctx
                .store
                .list(self.ctx.account(), kind.as_str(), None)
                .await?
            {
                let refers = columns.iter().any(|c| match other.fields.get(*c) {
                    Some(Value::String(s)) => *s == id,
                    Some(Value::Array(items)) => items.iter().any(|v| v.as_str() == Some(&id)),
                    _ => false,
                });
                if refers {
                    out.push((kind, other.name));
                }
            }
        }
        Ok(out)
    }

    async fn set_active(&mut self, name: &str, active: bool) -> SamResult<Manifest> {
        let command = if active { Command::Deploy } else { Command::Undeploy };
        let act = self.resource.activation().ok_or(SamError::NotImplemented {
            kind: self.kind(),
            command,
        })?;
        let entity = self.load(name).await?;
        if entity.field_bool(act.column).unwrap_or(false) == active {
            tracing::debug!(kind = %self.kind(), name, active, "activation unchanged");
            return self.render(&entity).await;
        }
        if act.provision && self.ctx.tasks.is_closed() {
            return Err(SamError::NotReady(format!(
                "cannot {command} {} '{name}': provisioning queue is unavailable",
                self.kind()
            )));
        }

        let mut updated = entity.clone();
        updated.fields.insert(act.column.to_string(), Value::Bool(active));
        let stored = self.ctx.store.upsert(updated, Some(entity.revision)).await?;

        if act.provision {
            let action = if active {
                ProvisioningAction::Deploy
            } else {
                ProvisioningAction::Undeploy
            };
            self.ctx.tasks.submit(ProvisioningTask::new(
                action,
                self.ctx.account(),
                self.kind(),
                name,
                self.resource.hosts(&self.ctx, &stored),
            ))?;
        }
        let message = if active { "deployed" } else { "undeployed" };
        self.ctx
            .store
            .append_log(LogRecord::new(
                self.ctx.account(),
                self.kind().as_str(),
                name,
                message,
                json!({
                    (kinds::ENTITY_ID): stored.id.to_string(),
                    "user": self.ctx.request.username,
                    "revision": stored.revision,
                }),
            ))
            .await?;
        tracing::info!(kind = %self.kind(), name, account = self.ctx.account(), message);

        self.cached = Some(stored.clone());
        self.render(&stored).await
    }
}

/// `/connection/apiKey` -> `spec.connection.apiKey`
fn spec_path(m: &FieldMapping) -> String {
    format!("spec{}", m.pointer.replace('/', "."))
}

fn same_content(a: &Entity, b: &Entity) -> bool {
    a.description == b.description
        && a.version == b.version
        && a.tags == b.tags
        && a.annotations == b.annotations
        && a.fields == b.fields
}

#[async_trait]
impl<R: Resource> Broker for ResourceBroker<R> {
    fn kind(&self) -> Kind {
        self.resource.kind()
    }

    fn example_manifest(&self) -> SamResult<Manifest> {
        self.resource.example()
    }

    async fn get(&mut self, name_filter: Option<&str>) -> SamResult<Vec<Manifest>> {
        let entities = self
            .ctx
            .store
            .list(self.ctx.account(), self.kind().as_str(), name_filter)
            .await?;
        let mut out = Vec::with_capacity(entities.len());
        for e in &entities {
            out.push(self.render(e).await?);
        }
        Ok(out)
    }

    async fn describe(&mut self, name: &str) -> SamResult<Manifest> {
        let entity = self.load(name).await?;
        self.render(&entity).await
    }

    async fn apply(&mut self, manifest: &Manifest) -> SamResult<Manifest> {
        let kind = self.kind();
        if manifest.kind() != kind {
            return Err(SchemaError::KindMismatch {
                expected: kind,
                found: manifest.kind(),
            }
            .into());
        }
        if let Some(field) = manifest.non_null_status_fields().first() {
            return Err(SamError::validation(format!(
                "{field}: status is computed by the server and cannot be set"
            )));
        }

        let account = self.ctx.account().to_string();
        let existing = self
            .ctx
            .store
            .fetch(&account, kind.as_str(), manifest.name())
            .await?;
        self.resource
            .check_apply(&self.ctx, manifest, existing.as_ref())
            .await?;

        let mut entity = self.manifest_to_entity(manifest).await?;
        if let Some(prev) = &existing {
            let map = self.resource.field_map();
            for (column, value) in &prev.fields {
                if !map.is_mapped_column(column) {
                    entity.fields.insert(column.clone(), value.clone());
                }
            }
            if same_content(prev, &entity) {
                tracing::debug!(%kind, name = manifest.name(), "apply is a no-op");
                self.cached = Some(prev.clone());
                return self.render(prev).await;
            }
        }

        let stored = self
            .ctx
            .store
            .upsert(entity, existing.as_ref().map(|e| e.revision))
            .await?;
        tracing::info!(
            %kind,
            name = %stored.name,
            %account,
            revision = stored.revision,
            created = existing.is_none(),
            "applied"
        );
        self.cached = Some(stored.clone());
        self.render(&stored).await
    }

    async fn delete(&mut self, name: &str) -> SamResult<()> {
        let kind = self.kind();
        let entity = self.load(name).await?;
        self.resource.check_delete(&self.ctx, &entity).await?;

        if let Some((other_kind, other_name)) = self.referrers(&entity).await?.into_iter().next() {
            return Err(SamError::business_rule(format!(
                "{kind} '{name}' is still referenced by {other_kind} '{other_name}'"
            )));
        }

        let undeploy = match self.resource.activation() {
            Some(act) if act.provision && entity.field_bool(act.column).unwrap_or(false) => {
                if self.ctx.tasks.is_closed() {
                    return Err(SamError::NotReady(format!(
                        "cannot delete deployed {kind} '{name}': provisioning queue is unavailable"
                    )));
                }
                true
            }
            _ => false,
        };

        self.ctx
            .store
            .delete(self.ctx.account(), kind.as_str(), name)
            .await?;
        if undeploy {
            self.ctx.tasks.submit(ProvisioningTask::new(
                ProvisioningAction::Undeploy,
                self.ctx.account(),
                kind,
                name,
                self.resource.hosts(&self.ctx, &entity),
            ))?;
        }
        self.cached = None;
        tracing::info!(%kind, name, account = self.ctx.account(), "deleted");
        Ok(())
    }

    async fn deploy(&mut self, name: &str) -> SamResult<Manifest> {
        self.set_active(name, true).await
    }

    async fn undeploy(&mut self, name: &str) -> SamResult<Manifest> {
        self.set_active(name, false).await
    }

    async fn chat(&mut self, name: &str, prompt: &str) -> SamResult<Value> {
        if !self.resource.supports_chat() {
            return Err(SamError::NotImplemented {
                kind: self.kind(),
                command: Command::Chat,
            });
        }
        let entity = self.load(name).await?;
        self.resource.chat(&self.ctx, &entity, prompt).await
    }

    async fn logs(&mut self, name: &str) -> SamResult<Vec<LogRecord>> {
        if !self.resource.supports_logs() {
            return Err(SamError::NotImplemented {
                kind: self.kind(),
                command: Command::Logs,
            });
        }
        let entity = self.load(name).await?;
        self.resource.logs(&self.ctx, &entity).await
    }
}
