//! HTTP server
//!
//! Routes:
//! - `/api/points` - per-address snapshot (GET, POST, OPTIONS)
//! - `/api/track` - session heartbeats and device names (GET, POST, OPTIONS)
//! - `/healthz` - liveness
//!
//! Every response carries open CORS headers and `Cache-Control: no-store`.

pub mod body;
pub mod response;
pub mod snapshot;
pub mod tracking;

use crate::config::ServiceConfig;
use crate::error::PointsError;
use crate::service::PointsService;
use crate::store::{DocumentStore, FsDocumentStore, MemoryDocumentStore};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use response::{ApiError, JsonResponse};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: PointsService,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, max_body_bytes: usize) -> Self {
        Self {
            service: PointsService::new(store),
            max_body_bytes,
        }
    }
}

/// Build the document store described by `config`
pub fn build_store(config: &ServiceConfig) -> Arc<dyn DocumentStore> {
    if config.ephemeral {
        Arc::new(MemoryDocumentStore::new().with_public_base_url(config.public_base_url.clone()))
    } else {
        Arc::new(
            FsDocumentStore::new(&config.data_dir)
                .with_public_base_url(config.public_base_url.clone()),
        )
    }
}

/// Router with all endpoints and response header layers.
///
/// CORS headers are set on every response and preflights are answered by the
/// handlers with 204.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/points", any(snapshot::handle))
        .route("/api/track", any(tracking::handle))
        .route("/healthz", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(config: ServiceConfig) -> Result<(), PointsError> {
    config.validate()?;
    let store = build_store(&config);
    let app = router(AppState::new(store, config.max_body_bytes));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(
        service = crate::SERVICE_NAME,
        addr = %config.bind,
        data_dir = %config.data_dir.display(),
        ephemeral = config.ephemeral,
        max_body_bytes = config.max_body_bytes,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(tokio::signal::ctrl_c()))
        .await?;
    Ok(())
}

/// Resolve once `signal` fires. A signal that cannot be registered never
/// resolves, so the server keeps running.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// CORS preflight reply
pub(crate) fn preflight() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Serialize)]
struct HealthBody {
    ok: bool,
    version: &'static str,
}

async fn health() -> Response {
    JsonResponse(
        StatusCode::OK,
        HealthBody {
            ok: true,
            version: crate::VERSION,
        },
    )
    .into_response()
}
