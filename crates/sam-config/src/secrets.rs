//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`key_env: SAM_ADMIN_KEY`). Binaries
//! call [`resolve_secrets`] once at start-up and hand the result to
//! constructors. `Debug` output redacts every value, and errors name the
//! variable, never its content.

use std::fmt;

use anyhow::{bail, Result};

use crate::{ServiceConfig, StoreBackend};

const REDACTED: &str = "<REDACTED>";

/// An API key the daemon accepts, bound to the caller it authenticates.
#[derive(Clone)]
pub struct ResolvedToken {
    pub key: String,
    pub account: String,
    pub username: String,
    pub is_staff: bool,
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field("key", &REDACTED)
            .field("account", &self.account)
            .field("username", &self.username)
            .field("is_staff", &self.is_staff)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// `Some` only for the postgres backend.
    pub database_url: Option<String>,
    pub tokens: Vec<ResolvedToken>,
}

impl fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url", &self.database_url.as_ref().map(|_| REDACTED))
            .field("tokens", &self.tokens)
            .finish()
    }
}

/// Blank counts as unset.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read every secret the config names. All missing variables are reported
/// together.
pub fn resolve_secrets(config: &ServiceConfig) -> Result<ResolvedSecrets> {
    resolve_with(config, resolve_env)
}

fn resolve_with(
    config: &ServiceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedSecrets> {
    let mut missing: Vec<&str> = Vec::new();

    let database_url = match config.store.backend {
        StoreBackend::Postgres => {
            let name = config.store.database_url_env.as_str();
            let url = lookup(name);
            if url.is_none() {
                missing.push(name);
            }
            url
        }
        StoreBackend::Memory => None,
    };

    let mut tokens = Vec::with_capacity(config.auth.tokens.len());
    for t in &config.auth.tokens {
        match lookup(&t.key_env) {
            Some(key) => tokens.push(ResolvedToken {
                key,
                account: t.account.clone(),
                username: t.username.clone(),
                is_staff: t.is_staff,
            }),
            None => missing.push(&t.key_env),
        }
    }

    if !missing.is_empty() {
        bail!(
            "SECRETS_MISSING: required env var(s) not set: {}",
            missing.join(", ")
        );
    }

    Ok(ResolvedSecrets {
        database_url,
        tokens,
    })
}
