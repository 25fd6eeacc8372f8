// =====================================================
// DATADOCK
// Multi-engine database access and bulk import server
// =====================================================

pub mod api;
pub mod config;
pub mod data_import;
pub mod db;
pub mod db_types;
pub mod error;
pub mod storage;

mod mssql;
mod mysql;
mod postgres;

use std::sync::Arc;

use crate::api::AppState;
use crate::config::{ServerConfig, UPLOAD_SWEEP_INTERVAL};
use crate::data_import::uploads::UploadStore;
use crate::db::engine::EngineConnector;
use crate::storage::MetadataStore;

pub use crate::error::{CoreError, CoreResult};

/// Opens the metadata and upload stores, starts the upload sweeper and serves
/// the API until the listener fails.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let data_dir = config.data_dir();
    let store = Arc::new(MetadataStore::open(&data_dir).await?);
    let uploads = UploadStore::open(config.upload_dir()).await?;
    log::info!(
        "Metadata in {}, uploads in {}",
        data_dir.display(),
        uploads.dir().display()
    );

    spawn_upload_sweeper(uploads.clone(), config.upload_ttl());

    let state = AppState::new(store, uploads, Arc::new(EngineConnector));
    let app = api::build_router(state, config.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    log::info!("DataDock listening on {}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_upload_sweeper(uploads: UploadStore, ttl: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPLOAD_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match uploads.expire_older_than(ttl).await {
                Ok(0) => {}
                Ok(removed) => log::info!("Expired {} stale uploads", removed),
                Err(e) => log::warn!("Upload sweep failed: {}", e),
            }
        }
    });
}
