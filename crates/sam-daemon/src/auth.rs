//! Caller authentication.
//!
//! The dispatcher only needs an [`Authenticator`] that maps request headers
//! to a [`RequestContext`]. [`StaticTokenAuthenticator`] is the built-in
//! implementation: a fixed table of API keys resolved from config at
//! start-up.

use std::collections::HashMap;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sam_broker::RequestContext;
use sam_config::ResolvedToken;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication credentials were not provided")]
    MissingCredentials,
    #[error("authorization header must be 'Token <key>' or 'Bearer <key>'")]
    MalformedHeader,
    #[error("invalid API key")]
    InvalidKey,
}

impl AuthError {
    pub fn class(&self) -> &'static str {
        "AuthenticationFailed"
    }

    pub fn status_code(&self) -> u16 {
        401
    }
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Result<RequestContext, AuthError>;
}

/// Extract the key from `Authorization: Token <key>` or `Bearer <key>`.
/// The scheme is case-insensitive.
pub fn credential(headers: &HeaderMap) -> Result<&str, AuthError> {
    let raw = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    let (scheme, key) = raw
        .trim()
        .split_once(char::is_whitespace)
        .ok_or(AuthError::MalformedHeader)?;
    let key = key.trim();
    let known_scheme =
        scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    if !known_scheme || key.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(key)
}

#[derive(Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, RequestContext>,
}

impl StaticTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, key: impl Into<String>, caller: RequestContext) -> Self {
        self.tokens.insert(key.into(), caller);
        self
    }

    pub fn from_tokens(tokens: &[ResolvedToken]) -> Self {
        tokens.iter().fold(Self::new(), |auth, t| {
            let mut caller = RequestContext::new(t.account.clone(), t.username.clone());
            if t.is_staff {
                caller = caller.staff();
            }
            auth.with_token(t.key.clone(), caller)
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<RequestContext, AuthError> {
        let key = credential(headers)?;
        self.tokens.get(key).cloned().ok_or(AuthError::InvalidKey)
    }
}
