// =====================================================
// CONNECTION BROKER
// Resolves a saved profile, opens a handle, runs one unit of work, closes
// =====================================================

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::db::engine::{ConnectionHandle, Connector};
use crate::db_types::ConnectionProfile;
use crate::error::CoreResult;

/// Source of saved connection profiles (passwords already decrypted).
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    async fn get_profile(&self, connection_id: &str) -> CoreResult<ConnectionProfile>;
}

#[derive(Clone)]
pub struct ConnectionBroker {
    registry: Arc<dyn ConnectionRegistry>,
    connector: Arc<dyn Connector>,
}

impl ConnectionBroker {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, connector: Arc<dyn Connector>) -> Self {
        Self {
            registry,
            connector,
        }
    }

    pub async fn open(&self, connection_id: &str) -> CoreResult<ConnectionHandle> {
        let profile = self.registry.get_profile(connection_id).await?;
        self.connector.connect(&profile).await
    }

    /// Opens a fresh handle for `connection_id`, runs `work` on it and closes
    /// it exactly once whether `work` succeeded or not. Close failures are
    /// logged and never replace the work's own result.
    pub async fn with_connection<T, F>(&self, connection_id: &str, work: F) -> CoreResult<T>
    where
        T: Send,
        F: for<'h> FnOnce(&'h mut ConnectionHandle) -> BoxFuture<'h, CoreResult<T>> + Send,
    {
        let mut handle = self.open(connection_id).await?;
        let result = work(&mut handle).await;

        if let Err(e) = handle.close().await {
            log::warn!("Failed to close connection {}: {}", connection_id, e);
        }
        result
    }

    /// Connects with an unsaved profile, verifies the session with `SELECT 1`
    /// and closes.
    pub async fn test_connection(&self, profile: &ConnectionProfile) -> CoreResult<String> {
        let mut handle = self.connector.connect(profile).await?;
        let kind = handle.kind();
        let check = handle.execute_query("SELECT 1", &[]).await;
        if let Err(e) = handle.close().await {
            log::warn!("Failed to close test connection: {}", e);
        }
        check?;
        Ok(format!(
            "Successfully connected to {} at {}:{}",
            kind, profile.host, profile.port
        ))
    }
}
