//!
//! lostfound HTTP server
//! ---------------------
//! Axum router exposing the item workflow and account endpoints as JSON over HTTP.
//!
//! Responsibilities:
//! - Bearer-token identity on every request that needs one (`extract::Caller`).
//! - Multipart item submission with the image upload in the same request.
//! - Public, admin and per-user listings.
//! - Static serving of stored images under `/uploads`.
//!
//! Handlers are thin: they parse input, call into `ItemWorkflow` or the auth
//! provider, and map `AppError` to a status code on the way out.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::identity::{LocalAuthProvider, TokenSigner};
use crate::media::{DiskMediaStore, MediaStore, PUBLIC_PREFIX};
use crate::storage::{Stores, UserRepository};
use crate::workflow::ItemWorkflow;

pub mod auth;
pub mod extract;
pub mod items;

/// Room for the text fields that travel with the image in one form.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<ItemWorkflow>,
    pub auth: Arc<LocalAuthProvider>,
    pub signer: Arc<TokenSigner>,
    pub users: Arc<dyn UserRepository>,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(stores: &Stores, media: Arc<dyn MediaStore>, config: &Config) -> Self {
        let signer = Arc::new(TokenSigner::new(&config.jwt_secret, config.token_ttl));
        Self {
            workflow: Arc::new(ItemWorkflow::new(stores.items.clone(), stores.users.clone(), media)),
            auth: Arc::new(LocalAuthProvider::new(stores.users.clone(), signer.clone())),
            signer,
            users: stores.users.clone(),
            uploads_dir: config.uploads_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Run store and hashing work on the blocking pool. Repository calls take
/// locks and rewrite snapshot files, and password hashing is CPU-bound.
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal("task_join".to_string(), e.to_string()))?
}

/// Build the full router. Exposed separately from `run` so tests can drive it
/// without binding a socket.
pub fn app(state: AppState) -> Router {
    let form_limit = state.max_upload_bytes + FORM_OVERHEAD_BYTES;
    let uploads = ServeDir::new(&state.uploads_dir);
    Router::new()
        .route("/", get(|| async { "lostfound ok" }))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/items", get(items::list_public))
        .route("/api/items/all", get(items::list_all))
        .route("/api/items/pending", get(items::list_pending))
        .route("/api/items/mine", get(items::list_mine))
        .route("/api/items/add", post(items::add).layer(DefaultBodyLimit::max(form_limit)))
        .route("/api/items/approve/{id}", put(items::approve))
        .route("/api/items/reject/{id}", put(items::reject))
        .route("/api/items/claim/{id}", put(items::claim))
        .route("/api/items/delete/{id}", delete(items::remove))
        .route("/api/items/{id}", get(items::get_one))
        .nest_service(PUBLIC_PREFIX, uploads)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Open the stores under the configured data directory and serve until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::debug!(target: "startup", "resolved config: {:?}", config);
    let stores = Stores::open(&config.data_dir)
        .with_context(|| format!("While opening stores under {}", config.data_dir.display()))?;
    let media = DiskMediaStore::new(&config.uploads_dir, config.max_upload_bytes)
        .with_context(|| format!("While preparing uploads dir {}", config.uploads_dir.display()))?;
    match (stores.items.count(), stores.users.count()) {
        (Ok(items), Ok(users)) => info!(target: "startup", "loaded {} items and {} users", items, users),
        (items, users) => tracing::warn!(target: "startup", "could not count stored records: items={:?} users={:?}", items.err(), users.err()),
    }

    let state = AppState::new(&stores, Arc::new(media), &config);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(target: "startup", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(target: "startup", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "startup", "failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
