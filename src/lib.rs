pub mod appresult;
pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod directory;

use std::sync::Arc;

use axum::{extract::FromRef, http::HeaderValue, Router};
use sqlx::SqlitePool;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

pub use appresult::{AppError, AppResult};

use auth::TokenKeys;
use chat::{ChatService, Hub};
use directory::{IdentityDirectory, SqliteDirectory};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub keys: TokenKeys,
    pub directory: Arc<dyn IdentityDirectory>,
    pub chat: ChatService,
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, keys: TokenKeys) -> Self {
        let directory: Arc<dyn IdentityDirectory> = Arc::new(SqliteDirectory::new(db_pool.clone()));
        AppState {
            chat: ChatService::new(db_pool, directory.clone()),
            keys,
            directory,
            hub: Arc::new(Hub::new()),
        }
    }
}

pub fn cors(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    Ok(match origin {
        Some(origin) => layer.allow_origin(origin.parse::<HeaderValue>()?),
        None => layer.allow_origin(Any),
    })
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/chat", chat::router(state.clone()))
        .nest("/tutor/chat", chat::tutor_router(state.clone()))
        .merge(chat::ws_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
