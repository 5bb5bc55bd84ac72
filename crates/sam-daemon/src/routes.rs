//! Axum router and HTTP handlers for sam-daemon.
//!
//! `build_router` is the single entry point. Panic capture is part of the
//! router so every failure, including a panicking handler, leaves as an
//! envelope; CORS and request tracing are attached by `main.rs`.

use std::{any::Any, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, warn};

use crate::{
    api_types::{Envelope, ErrorBody, HealthResponse, NameQuery},
    dispatch::{dispatch, render_panic, CliRequest, Dispatched},
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route(
            "/api/v1/cli/:command/:kind",
            get(cli_command).post(cli_command),
        )
        .route(
            "/api/v1/cli/:command/:kind/:name",
            get(cli_command_named).post(cli_command_named),
        )
        .fallback(fallback)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_envelope))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET|POST /api/v1/cli/{command}/{kind}[/{name}]
// ---------------------------------------------------------------------------

pub(crate) async fn cli_command(
    State(st): State<Arc<AppState>>,
    Path((command, kind)): Path<(String, String)>,
    Query(query): Query<NameQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_cli(st, headers, command, kind, query.name, body).await
}

pub(crate) async fn cli_command_named(
    State(st): State<Arc<AppState>>,
    Path((command, kind, name)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run_cli(st, headers, command, kind, Some(name), body).await
}

/// Dispatches on its own task so a panicking verb still answers with an
/// envelope naming its kind and command.
async fn run_cli(
    st: Arc<AppState>,
    headers: HeaderMap,
    command: String,
    kind: String,
    name: Option<String>,
    body: Bytes,
) -> Response {
    let task = {
        let (command, kind) = (command.clone(), kind.clone());
        tokio::spawn(async move {
            let req = CliRequest {
                command: &command,
                kind: &kind,
                name: name.as_deref(),
                body: &body,
            };
            dispatch(&st, &headers, req).await
        })
    };
    match task.await {
        Ok(d) => respond(d),
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            respond(render_panic(&command, &kind, panic_detail(payload.as_ref())))
        }
        Err(_) => respond(render_panic(&command, &kind, "dispatch task cancelled")),
    }
}

fn respond(d: Dispatched) -> Response {
    let status = StatusCode::from_u16(d.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(d.envelope)).into_response()
}

// ---------------------------------------------------------------------------
// Unmatched routes and panics
// ---------------------------------------------------------------------------

pub(crate) async fn fallback(uri: Uri) -> Response {
    warn!(path = %uri.path(), "no route");
    let body = ErrorBody {
        error_class: "NotFound".to_string(),
        description: format!(
            "no route for {}; expected /api/v1/cli/{{command}}/{{kind}}[/{{name}}]",
            uri.path()
        ),
        status: 404,
        context: json!({ "path": uri.path() }),
    };
    (StatusCode::NOT_FOUND, Json(Envelope::error("", "", body))).into_response()
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload")
}

/// Last resort for panics outside the CLI routes.
fn panic_envelope(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic_detail(err.as_ref());
    error!(panic = detail, "handler panicked");

    let body = ErrorBody {
        error_class: "InternalError".to_string(),
        description: "internal error; see server logs".to_string(),
        status: 500,
        context: json!({ "errorType": "panic" }),
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(Envelope::error("", "", body)),
    )
        .into_response()
}
