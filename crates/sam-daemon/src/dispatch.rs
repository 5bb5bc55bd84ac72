//! Command dispatcher: `{command, kind, name}` in, envelope out.
//!
//! The router extracts the path pieces and hands them here; everything
//! after that (authentication, command and kind resolution, broker
//! instantiation, verb invocation, error rendering) is table driven and
//! independent of axum extractors, so one code path serves every route.

use axum::http::HeaderMap;
use sam_broker::{Broker, Command, Kind, SamError, SamResult};
use sam_loader::ManifestLoader;
use sam_schemas::Manifest;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api_types::{ChatBody, Envelope, ErrorBody};
use crate::auth::AuthError;
use crate::state::AppState;

/// One CLI request as the router saw it. All strings are raw path input.
#[derive(Debug, Clone, Copy)]
pub struct CliRequest<'a> {
    pub command: &'a str,
    pub kind: &'a str,
    pub name: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub status: u16,
    pub envelope: Envelope,
}

enum Failure {
    Auth(AuthError),
    Sam(SamError),
}

impl From<SamError> for Failure {
    fn from(e: SamError) -> Self {
        Failure::Sam(e)
    }
}

struct Outcome {
    kind: Kind,
    command: Command,
    message: String,
    data: Value,
}

pub async fn dispatch(state: &AppState, headers: &HeaderMap, req: CliRequest<'_>) -> Dispatched {
    match run(state, headers, req).await {
        Ok(out) => {
            info!(
                command = %out.command,
                kind = %out.kind,
                name = req.name.unwrap_or(""),
                "{}",
                out.message
            );
            Dispatched {
                status: 200,
                envelope: Envelope::ok(out.kind.as_str(), out.command.as_str(), out.message, out.data),
            }
        }
        Err(failure) => render_failure(req, failure),
    }
}

async fn run(state: &AppState, headers: &HeaderMap, req: CliRequest<'_>) -> Result<Outcome, Failure> {
    let caller = state.auth.authenticate(headers).map_err(Failure::Auth)?;
    let command: Command = req.command.parse()?;
    let kind = state.registry.resolve_slug(req.kind)?;
    let name = req.name.map(str::trim).filter(|n| !n.is_empty());
    if command.requires_name() && name.is_none() {
        return Err(SamError::validation(format!("{command} requires a resource name")).into());
    }

    let mut broker = state
        .registry
        .instantiate(kind, state.broker_context(caller))?;
    let (message, data) = invoke(broker.as_mut(), command, name, req.body).await?;
    Ok(Outcome {
        kind,
        command,
        message,
        data,
    })
}

async fn invoke(
    broker: &mut dyn Broker,
    command: Command,
    name: Option<&str>,
    body: &[u8],
) -> SamResult<(String, Value)> {
    let kind = broker.kind();
    let target = || name.ok_or_else(|| SamError::validation(format!("{command} requires a resource name")));

    let out = match command {
        Command::ExampleManifest => {
            let m = broker.example_manifest()?;
            (format!("example {kind} manifest"), m.to_value())
        }
        Command::Get => {
            let items = broker.get(name).await?;
            let n = items.len();
            (
                format!("{n} {kind} resource(s) found"),
                json!({
                    "count": n,
                    "items": items.iter().map(Manifest::to_value).collect::<Vec<_>>(),
                }),
            )
        }
        Command::Describe => {
            let m = broker.describe(target()?).await?;
            (format!("{kind} {} described", m.name()), m.to_value())
        }
        Command::Apply => {
            let manifest = parse_manifest(kind, body)?;
            if let Some(requested) = name {
                if requested != manifest.name() {
                    return Err(SamError::validation(format!(
                        "manifest name '{}' does not match requested name '{requested}'",
                        manifest.name()
                    )));
                }
            }
            let m = broker.apply(&manifest).await?;
            (format!("{kind} {} applied successfully", m.name()), m.to_value())
        }
        Command::Delete => {
            let name = target()?;
            broker.delete(name).await?;
            (format!("{kind} {name} deleted successfully"), json!({ "name": name }))
        }
        Command::Deploy => {
            let m = broker.deploy(target()?).await?;
            (format!("{kind} {} deployed successfully", m.name()), m.to_value())
        }
        Command::Undeploy => {
            let m = broker.undeploy(target()?).await?;
            (format!("{kind} {} undeployed successfully", m.name()), m.to_value())
        }
        Command::Logs => {
            let name = target()?;
            let records = broker.logs(name).await?;
            let count = records.len();
            let records = serde_json::to_value(records).map_err(|e| {
                SamError::internal_from("serde_json::Error", format!("log records did not serialize: {e}"))
            })?;
            (
                format!("{count} log record(s) for {kind} {name}"),
                json!({ "name": name, "count": count, "records": records }),
            )
        }
        Command::Chat => {
            let name = target()?;
            let body: ChatBody = serde_json::from_slice(body).map_err(|e| {
                SamError::validation(format!("chat body must be JSON {{\"prompt\": \"...\"}}: {e}"))
            })?;
            let reply = broker.chat(name, &body.prompt).await?;
            (format!("{kind} {name} answered"), reply)
        }
    };
    Ok(out)
}

/// Raw YAML or JSON manifest text; the loader rejects a kind other than the
/// route's before any broker work.
fn parse_manifest(kind: Kind, body: &[u8]) -> SamResult<Manifest> {
    let text = std::str::from_utf8(body)
        .map_err(|_| SamError::validation("manifest body must be UTF-8 text"))?;
    if text.trim().is_empty() {
        return Err(SamError::validation("apply requires a manifest body"));
    }
    let loaded = ManifestLoader::new().expect_kind(kind).load_str(text)?;
    Ok(loaded.manifest)
}

/// Canonical kind and command names where they resolve, raw input otherwise.
fn labels(command: &str, kind: &str) -> (String, String) {
    let thing = Kind::from_slug(kind)
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|_| kind.to_string());
    let command = Command::parse(command)
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|| command.to_string());
    (thing, command)
}

/// Envelope for a verb that panicked. The panic payload only reaches the log.
pub fn render_panic(command: &str, kind: &str, detail: &str) -> Dispatched {
    let (thing, command) = labels(command, kind);
    error!(command = %command, kind = %thing, panic = detail, "verb panicked");
    let body = ErrorBody {
        error_class: "InternalError".to_string(),
        description: "internal error; see server logs".to_string(),
        status: 500,
        context: json!({ "kind": thing, "command": command, "errorType": "panic" }),
    };
    Dispatched {
        status: 500,
        envelope: Envelope::error(&thing, &command, body),
    }
}

fn render_failure(req: CliRequest<'_>, failure: Failure) -> Dispatched {
    let (thing, command) = labels(req.command, req.kind);

    let body = match failure {
        Failure::Auth(e) => {
            warn!(command = %command, kind = %thing, error = %e, "request not authenticated");
            ErrorBody {
                error_class: e.class().to_string(),
                description: e.to_string(),
                status: e.status_code(),
                context: json!({}),
            }
        }
        Failure::Sam(e) if e.is_internal() => {
            error!(
                command = %command,
                kind = %thing,
                name = req.name.unwrap_or(""),
                error = %e,
                "unclassified error"
            );
            ErrorBody {
                error_class: e.class().to_string(),
                description: "internal error; see server logs".to_string(),
                status: e.status_code(),
                context: json!({ "kind": thing, "command": command, "errorType": e.error_type() }),
            }
        }
        Failure::Sam(e) => {
            warn!(
                command = %command,
                kind = %thing,
                name = req.name.unwrap_or(""),
                class = e.class(),
                error = %e,
                "request rejected"
            );
            ErrorBody {
                error_class: e.class().to_string(),
                description: e.to_string(),
                status: e.status_code(),
                context: json!({ "kind": thing, "command": command, "name": req.name }),
            }
        }
    };

    Dispatched {
        status: body.status,
        envelope: Envelope::error(&thing, &command, body),
    }
}
