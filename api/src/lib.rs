pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::{Config, TokenStoreKind};
use constants::MAX_REEL_BODY_SIZE;
use domain::reels::ReelStore;
use services::dropbox::DropboxClient;
use services::probe::ConnectionProber;
use services::token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
use services::tokens::TokenManager;
use services::videos::VideoLibrary;

pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenManager>,
    pub prober: ConnectionProber,
    pub videos: VideoLibrary,
    pub reels: ReelStore,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let dropbox = DropboxClient::new(
            &config.dropbox_app_key,
            &config.dropbox_app_secret,
            &config.dropbox_redirect_uri,
            config.dropbox_endpoints.clone(),
            config.remote_timeout,
        )?;

        let store: Arc<dyn TokenStore> = match config.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::new(&config.credentials_path)),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        };
        info!(backend = ?config.token_store, "Token store ready");

        let tokens = Arc::new(TokenManager::new(store, dropbox.clone()));
        let prober = ConnectionProber::new(tokens.clone(), &config.dropbox_folder_path);
        let videos = VideoLibrary::new(dropbox, &config.dropbox_folder_path);
        let reels = ReelStore::open(&config.reels_path).await?;

        Ok(Self {
            config,
            tokens,
            prober,
            videos,
            reels,
        })
    }
}

/// Full application router with middleware attached
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::build_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::hydrate_credential,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_REEL_BODY_SIZE))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
