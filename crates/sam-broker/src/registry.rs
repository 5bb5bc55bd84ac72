//! Broker registry: the catalogue of kinds the dispatcher can serve.
//!
//! Each entry pairs a [`Kind`] with a factory that builds a fresh
//! [`Broker`] for one request, and a function producing the kind's example
//! manifest without instantiating anything. Entries keep insertion order so
//! listings are stable.
//!
//! The built-in catalogue is fixed at compile time and shared through
//! [`global`].

use std::sync::OnceLock;

use sam_schemas::{Kind, KindFamily, Manifest, SchemaError};
use thiserror::Error;

use crate::kinds::{
    self, AccountResource, ApiConnectionResource, AuthTokenResource, ChatResource,
    ChatbotResource, LogBroker, PluginResource, SecretResource, SqlConnectionResource,
    UserResource,
};
use crate::{Broker, BrokerContext, ResourceBroker, SamError, SamResult};

// ---------------------------------------------------------------------------
// Factory types
// ---------------------------------------------------------------------------

/// Builds a broker bound to one request's context.
pub type BrokerFactory = fn(BrokerContext) -> SamResult<Box<dyn Broker>>;

/// Produces the kind's example manifest.
pub type ExampleFn = fn() -> SamResult<Manifest>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("kind '{kind}' is already registered")]
    DuplicateKind { kind: Kind },
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct RegistryEntry {
    kind: Kind,
    factory: BrokerFactory,
    example: ExampleFn,
}

/// Kind -> broker factory table.
#[derive(Default)]
pub struct BrokerRegistry {
    entries: Vec<RegistryEntry>,
}

impl BrokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full set of kinds this crate implements.
    pub fn builtin() -> Self {
        let table: [(Kind, BrokerFactory, ExampleFn); 14] = [
            (
                Kind::Account,
                |ctx| Ok(ResourceBroker::boxed(ctx, AccountResource)),
                kinds::account::example_manifest,
            ),
            (
                Kind::User,
                |ctx| Ok(ResourceBroker::boxed(ctx, UserResource)),
                kinds::user::example_manifest,
            ),
            (
                Kind::Secret,
                |ctx| Ok(ResourceBroker::boxed(ctx, SecretResource)),
                kinds::secret::example_manifest,
            ),
            (
                Kind::AuthToken,
                |ctx| Ok(ResourceBroker::boxed(ctx, AuthTokenResource)),
                kinds::auth_token::example_manifest,
            ),
            (
                Kind::ApiConnection,
                |ctx| Ok(ResourceBroker::boxed(ctx, ApiConnectionResource)),
                kinds::api_connection::example_manifest,
            ),
            (
                Kind::SqlConnection,
                |ctx| Ok(ResourceBroker::boxed(ctx, SqlConnectionResource)),
                kinds::sql_connection::example_manifest,
            ),
            (
                Kind::StaticPlugin,
                |ctx| Ok(ResourceBroker::boxed(ctx, PluginResource::new(Kind::StaticPlugin)?)),
                || kinds::plugin::example_manifest(Kind::StaticPlugin),
            ),
            (
                Kind::SqlPlugin,
                |ctx| Ok(ResourceBroker::boxed(ctx, PluginResource::new(Kind::SqlPlugin)?)),
                || kinds::plugin::example_manifest(Kind::SqlPlugin),
            ),
            (
                Kind::ApiPlugin,
                |ctx| Ok(ResourceBroker::boxed(ctx, PluginResource::new(Kind::ApiPlugin)?)),
                || kinds::plugin::example_manifest(Kind::ApiPlugin),
            ),
            (
                Kind::Chatbot,
                |ctx| Ok(ResourceBroker::boxed(ctx, ChatbotResource)),
                kinds::chatbot::example_manifest,
            ),
            (
                Kind::Chat,
                |ctx| Ok(ResourceBroker::boxed(ctx, ChatResource)),
                kinds::chat::example_manifest,
            ),
            (
                Kind::ChatHistory,
                |ctx| log_broker(ctx, Kind::ChatHistory),
                || kinds::logs::example_manifest(Kind::ChatHistory),
            ),
            (
                Kind::ChatPluginUsage,
                |ctx| log_broker(ctx, Kind::ChatPluginUsage),
                || kinds::logs::example_manifest(Kind::ChatPluginUsage),
            ),
            (
                Kind::ChatToolCall,
                |ctx| log_broker(ctx, Kind::ChatToolCall),
                || kinds::logs::example_manifest(Kind::ChatToolCall),
            ),
        ];
        Self {
            entries: table
                .into_iter()
                .map(|(kind, factory, example)| RegistryEntry {
                    kind,
                    factory,
                    example,
                })
                .collect(),
        }
    }

    pub fn register(
        &mut self,
        kind: Kind,
        factory: BrokerFactory,
        example: ExampleFn,
    ) -> Result<(), RegistryError> {
        if self.contains(kind) {
            return Err(RegistryError::DuplicateKind { kind });
        }
        self.entries.push(RegistryEntry {
            kind,
            factory,
            example,
        });
        Ok(())
    }

    pub fn contains(&self, kind: Kind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered kinds in insertion order.
    pub fn known_kinds(&self) -> Vec<Kind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    pub fn plugin_kinds(&self) -> Vec<Kind> {
        self.family(KindFamily::Plugin)
    }

    pub fn connection_kinds(&self) -> Vec<Kind> {
        self.family(KindFamily::Connection)
    }

    fn family(&self, family: KindFamily) -> Vec<Kind> {
        self.entries
            .iter()
            .map(|e| e.kind)
            .filter(|k| k.family() == family)
            .collect()
    }

    /// Lower-case slugs of every registered kind, for URL routing help.
    pub fn slugs(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.kind.slug()).collect()
    }

    /// Case-sensitive lookup on the canonical kind name (`SqlConnection`).
    pub fn resolve(&self, name: &str) -> SamResult<Kind> {
        let kind = Kind::parse(name).map_err(|e| self.unsupported(e, name))?;
        self.lookup(kind)
    }

    /// Case-insensitive lookup on a URL slug (`sqlconnection`, `sqlconnections`).
    pub fn resolve_slug(&self, slug: &str) -> SamResult<Kind> {
        let kind = Kind::from_slug(slug).map_err(|e| self.unsupported(e, slug))?;
        self.lookup(kind)
    }

    /// `kind` if registered, else [`SamError::UnsupportedKind`].
    pub fn lookup(&self, kind: Kind) -> SamResult<Kind> {
        if self.contains(kind) {
            Ok(kind)
        } else {
            Err(self.unsupported_kind(kind.as_str()))
        }
    }

    /// A fresh broker for one request.
    pub fn instantiate(&self, kind: Kind, ctx: BrokerContext) -> SamResult<Box<dyn Broker>> {
        let entry = self.entry(kind)?;
        (entry.factory)(ctx)
    }

    pub fn example_manifest(&self, kind: Kind) -> SamResult<Manifest> {
        let entry = self.entry(kind)?;
        (entry.example)()
    }

    fn entry(&self, kind: Kind) -> SamResult<&RegistryEntry> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .ok_or_else(|| self.unsupported_kind(kind.as_str()))
    }

    fn unsupported(&self, err: SchemaError, name: &str) -> SamError {
        tracing::debug!(name, error = %err, "kind lookup failed");
        self.unsupported_kind(name)
    }

    fn unsupported_kind(&self, name: &str) -> SamError {
        SamError::UnsupportedKind {
            kind: name.to_string(),
            known: self
                .entries
                .iter()
                .map(|e| e.kind.as_str().to_string())
                .collect(),
        }
    }
}

fn log_broker(ctx: BrokerContext, kind: Kind) -> SamResult<Box<dyn Broker>> {
    Ok(Box::new(LogBroker::new(ctx, kind)?))
}

/// The built-in registry, built on first use.
pub fn global() -> &'static BrokerRegistry {
    static REGISTRY: OnceLock<BrokerRegistry> = OnceLock::new();
    REGISTRY.get_or_init(BrokerRegistry::builtin)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::testing::context;

    #[test]
    fn builtin_covers_every_kind_in_order() {
        assert_eq!(global().known_kinds(), Kind::ALL.to_vec());
    }

    #[test]
    fn resolve_is_case_sensitive() {
        let reg = global();
        assert_eq!(reg.resolve("SqlConnection").unwrap(), Kind::SqlConnection);
        let err = reg.resolve("sqlconnection").unwrap_err();
        assert_eq!(err.class(), "UnsupportedKind");
        assert!(err.to_string().contains("SqlConnection"), "{err}");
    }

    #[test]
    fn resolve_slug_accepts_singular_and_plural() {
        let reg = global();
        assert_eq!(reg.resolve_slug("chathistories").unwrap(), Kind::ChatHistory);
        assert_eq!(reg.resolve_slug("Chatbot").unwrap(), Kind::Chatbot);
        assert!(reg.resolve_slug("robots").is_err());
    }

    #[test]
    fn family_queries() {
        let reg = global();
        assert_eq!(
            reg.plugin_kinds(),
            vec![Kind::StaticPlugin, Kind::SqlPlugin, Kind::ApiPlugin]
        );
        assert_eq!(
            reg.connection_kinds(),
            vec![Kind::ApiConnection, Kind::SqlConnection]
        );
    }

    #[test]
    fn every_example_manifest_is_valid_for_its_kind() {
        for kind in Kind::ALL {
            let m = global().example_manifest(kind).unwrap();
            assert_eq!(m.kind(), kind);
            assert!(m.status().is_none(), "{kind}");
        }
    }

    #[test]
    fn instantiated_broker_reports_its_kind() {
        let (ctx, _rx) = context();
        for kind in Kind::ALL {
            let broker = global().instantiate(kind, ctx.clone()).unwrap();
            assert_eq!(broker.kind(), kind);
        }
    }

    #[test]
    fn partial_registry_rejects_unregistered_and_duplicate_kinds() {
        let mut reg = BrokerRegistry::new();
        assert!(reg.is_empty());
        reg.register(
            Kind::User,
            |ctx| Ok(ResourceBroker::boxed(ctx, UserResource)),
            kinds::user::example_manifest,
        )
        .unwrap();
        let dup = reg.register(
            Kind::User,
            |ctx| Ok(ResourceBroker::boxed(ctx, UserResource)),
            kinds::user::example_manifest,
        );
        assert_eq!(dup, Err(RegistryError::DuplicateKind { kind: Kind::User }));

        let err = reg.resolve("Secret").unwrap_err();
        match err {
            SamError::UnsupportedKind { known, .. } => assert_eq!(known, vec!["User"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
