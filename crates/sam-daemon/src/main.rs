//! sam-daemon entry point.
//!
//! Thin on purpose: loads config and secrets, sets up tracing, builds the
//! store and shared state, wires middleware, and starts the HTTP server.
//! Route handlers live in `routes.rs`; dispatch logic in `dispatch.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use sam_broker::TaskSubmitter;
use sam_config::{
    report_unused_keys, resolve_secrets, ConfigConsumer, ResolvedSecrets, ServiceConfig,
    StoreBackend, UnusedKeyPolicy,
};
use sam_daemon::{auth::StaticTokenAuthenticator, routes, state};
use sam_db::{EntityStore, MemoryStore, PgStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let loaded = sam_config::load_from_env()?;
    let config = ServiceConfig::from_json(&loaded.config_json)?;
    init_tracing(&config.logging.filter);
    info!(config_hash = %loaded.config_hash, "config loaded");

    let unused = report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by sam-daemon");
    }

    let secrets = resolve_secrets(&config)?;
    let store = open_store(&config, &secrets).await?;

    let auth = StaticTokenAuthenticator::from_tokens(&secrets.tokens);
    if auth.is_empty() {
        warn!("no API tokens configured; every CLI request will be rejected");
    }

    let (tasks, rx) = TaskSubmitter::channel();
    state::spawn_provisioning_drain(rx);

    let shared = Arc::new(state::AppState::new(
        store,
        tasks,
        Arc::new(auth),
        config.server.platform_domain.clone(),
    ));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&config)?;
    info!("sam-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn open_store(
    config: &ServiceConfig,
    secrets: &ResolvedSecrets,
) -> anyhow::Result<Arc<dyn EntityStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store; nothing survives a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = secrets
                .database_url
                .as_deref()
                .context("postgres backend selected but no database URL was resolved")?;
            let pool = sam_db::connect(url).await?;
            sam_db::migrate(&pool).await?;
            info!("postgres store ready");
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// `SAM_DAEMON_ADDR` overrides `server.bind_addr`.
fn bind_addr(config: &ServiceConfig) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var("SAM_DAEMON_ADDR").unwrap_or_else(|_| config.server.bind_addr.clone());
    raw.parse()
        .with_context(|| format!("invalid bind address '{raw}'"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
