use std::sync::Arc;

use sam_db::EntityStore;

use crate::{ChatPipeline, TaskSubmitter};

/// Who is calling. Produced by the dispatcher's authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub account: String,
    pub username: String,
    pub is_staff: bool,
}

impl RequestContext {
    pub fn new(account: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            is_staff: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }
}

/// Everything a broker instance may touch during one request.
#[derive(Clone)]
pub struct BrokerContext {
    pub request: RequestContext,
    pub store: Arc<dyn EntityStore>,
    pub tasks: TaskSubmitter,
    pub chat: Option<Arc<dyn ChatPipeline>>,
    /// Parent domain for chatbot default hosts, e.g. `smarter.sh`.
    pub platform_domain: String,
}

impl BrokerContext {
    pub fn account(&self) -> &str {
        &self.request.account
    }

    pub fn with_request(&self, request: RequestContext) -> Self {
        Self {
            request,
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for BrokerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerContext")
            .field("request", &self.request)
            .field("chat", &self.chat.as_ref().map(|_| "<pipeline>"))
            .field("platform_domain", &self.platform_domain)
            .finish_non_exhaustive()
    }
}
