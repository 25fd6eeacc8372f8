// =====================================================
// HTTP API
// JSON routes over the broker, upload store and metadata store
// =====================================================

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::data_import::uploads::UploadStore;
use crate::db::connections::ConnectionBroker;
use crate::db::engine::Connector;
use crate::storage::MetadataStore;

mod connections;
mod error;
mod explorer;
mod import;

pub use error::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MetadataStore>,
    pub broker: ConnectionBroker,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(store: Arc<MetadataStore>, uploads: UploadStore, connector: Arc<dyn Connector>) -> Self {
        let broker = ConnectionBroker::new(store.clone(), connector);
        Self {
            store,
            broker,
            uploads,
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/connections",
            get(connections::list_connections).post(connections::save_connection),
        )
        .route("/api/connections/test", post(connections::test_connection))
        .route("/api/connections/:id", delete(connections::delete_connection))
        .route("/api/explorer/:connection_id/tables", get(explorer::list_tables))
        .route(
            "/api/explorer/:connection_id/columns/:table_name",
            get(explorer::list_columns),
        )
        .route("/api/explorer/:connection_id/query", post(explorer::run_query))
        .route("/api/query/:connection_id/execute", post(explorer::run_query))
        .route("/api/import/:connection_id/upload", post(import::upload_file))
        .route("/api/import/:connection_id/sheet-preview", post(import::sheet_preview))
        .route("/api/import/:connection_id/auto-map", post(import::auto_map))
        .route("/api/import/:connection_id/execute-import", post(import::execute_import))
        .route("/api/import/:connection_id/history", get(import::history))
        .route(
            "/api/import/:connection_id/history/:table_name",
            get(import::table_history),
        )
        .route("/api/import/:connection_id/mappings", post(import::save_mapping))
        .route(
            "/api/import/:connection_id/mappings/:table_name",
            get(import::list_mappings),
        )
        .route(
            "/api/mapping-templates/:id",
            get(import::get_template).delete(import::delete_template),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
