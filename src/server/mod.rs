//! HTTP surface of the service.

pub mod handlers;

use crate::config::Config;
use crate::inspector::Inspector;
use crate::reputation::ReputationClient;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Headroom on top of the configured upload ceiling for multipart framing.
pub(crate) const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub inspector: Arc<dyn Inspector>,
    pub reputation: ReputationClient,
}

impl AppState {
    pub fn new(config: Config, inspector: Arc<dyn Inspector>) -> Self {
        let reputation = ReputationClient::new(config.reputation.clone());
        Self {
            config: Arc::new(config),
            inspector,
            reputation,
        }
    }
}

/// Builds the service router.
pub fn routes(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.server.max_upload_size)
        .unwrap_or(usize::MAX - MULTIPART_OVERHEAD)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload))
        .route("/reputation/:hash", get(handlers::reputation_lookup))
        .nest_service("/static", ServeDir::new("static"))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
