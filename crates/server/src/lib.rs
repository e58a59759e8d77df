pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod telemetry;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use kasboek_import::{KbcCsv, StatementFormat};
use kasboek_storage::DbPool;
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub format: Arc<dyn StatementFormat>,
}

impl AppState {
    pub fn new(pool: DbPool) -> Self {
        AppState {
            pool,
            format: Arc::new(KbcCsv),
        }
    }

    pub(crate) async fn conn(&self) -> Result<PoolConnection<Sqlite>, ApiError> {
        Ok(self.pool.acquire().await?)
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .merge(routes::accounts::router())
        .merge(routes::categories::router())
        .merge(routes::counterparts::router())
        .merge(routes::transactions::router())
        .merge(routes::overview::router())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
