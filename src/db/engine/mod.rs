// =====================================================
// ENGINE ADAPTER
// One capability interface over the PostgreSQL, MySQL and SQL Server drivers
// =====================================================

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::db_types::{ConnectionProfile, EngineKind, SqlParam, TabularResult};
use crate::error::{CoreError, CoreResult};
use crate::{mssql, mysql, postgres};

pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Driver-level session for one engine. Implementations own a single live
/// socket; they are never pooled or shared.
#[async_trait]
pub trait EngineClient: Send {
    fn kind(&self) -> EngineKind;

    async fn list_tables(&mut self) -> CoreResult<Vec<String>>;

    async fn list_columns(&mut self, table: &str) -> CoreResult<Vec<String>>;

    /// Declared column types, for engines that need explicit placeholder casts.
    async fn column_types(&mut self, _table: &str) -> CoreResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CoreResult<TabularResult>;

    async fn begin(&mut self) -> CoreResult<()>;

    async fn commit(&mut self) -> CoreResult<()>;

    async fn rollback(&mut self) -> CoreResult<()>;

    async fn close(self: Box<Self>) -> CoreResult<()>;
}

/// Marker for an open transaction on a handle.
#[derive(Debug, Clone, Copy)]
pub struct ActiveTransaction {
    pub started_at: Instant,
}

/// Live, single-owner connection. Closing consumes it; dropping it without a
/// close (cancelled request) lets the driver release the socket on drop.
pub struct ConnectionHandle {
    kind: EngineKind,
    client: Option<Box<dyn EngineClient>>,
    transaction: Option<ActiveTransaction>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("kind", &self.kind)
            .field("open", &self.client.is_some())
            .field("in_transaction", &self.transaction.is_some())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new(client: Box<dyn EngineClient>) -> Self {
        Self {
            kind: client.kind(),
            client: Some(client),
            transaction: None,
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn active_transaction(&self) -> Option<&ActiveTransaction> {
        self.transaction.as_ref()
    }

    fn client(&mut self) -> CoreResult<&mut Box<dyn EngineClient>> {
        self.client
            .as_mut()
            .ok_or_else(|| CoreError::query("Connection handle is already closed"))
    }

    pub async fn list_tables(&mut self) -> CoreResult<Vec<String>> {
        self.client()?.list_tables().await
    }

    pub async fn list_columns(&mut self, table: &str) -> CoreResult<Vec<String>> {
        self.client()?.list_columns(table).await
    }

    pub async fn column_types(&mut self, table: &str) -> CoreResult<HashMap<String, String>> {
        self.client()?.column_types(table).await
    }

    pub async fn execute_query(&mut self, sql: &str, params: &[SqlParam]) -> CoreResult<TabularResult> {
        log::debug!("[{}] executing statement ({} params)", self.kind, params.len());
        self.client()?.execute(sql, params).await
    }

    pub async fn begin_transaction(&mut self) -> CoreResult<()> {
        if self.transaction.is_some() {
            return Err(CoreError::query("A transaction is already active on this connection"));
        }
        self.client()?.begin().await?;
        self.transaction = Some(ActiveTransaction {
            started_at: Instant::now(),
        });
        Ok(())
    }

    pub async fn commit(&mut self) -> CoreResult<()> {
        let Some(tx) = self.transaction.take() else {
            log::debug!("[{}] commit without an active transaction ignored", self.kind);
            return Ok(());
        };
        self.client()?.commit().await?;
        log::debug!("[{}] committed after {:?}", self.kind, tx.started_at.elapsed());
        Ok(())
    }

    pub async fn rollback(&mut self) -> CoreResult<()> {
        let Some(_tx) = self.transaction.take() else {
            log::debug!("[{}] rollback without an active transaction ignored", self.kind);
            return Ok(());
        };
        self.client()?.rollback().await
    }

    pub async fn close(mut self) -> CoreResult<()> {
        match self.client.take() {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.client.is_some() {
            log::warn!(
                "[{}] connection handle dropped without close; releasing socket",
                self.kind
            );
        }
    }
}

// --- Connect ---

/// Opens handles from profiles. The broker depends on this seam so tests can
/// substitute scripted engines.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, profile: &ConnectionProfile) -> CoreResult<ConnectionHandle>;
}

/// Dispatches to the real drivers; the engine is chosen once here.
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineConnector;

#[async_trait]
impl Connector for EngineConnector {
    async fn connect(&self, profile: &ConnectionProfile) -> CoreResult<ConnectionHandle> {
        connect(profile).await
    }
}

pub async fn connect(profile: &ConnectionProfile) -> CoreResult<ConnectionHandle> {
    let kind = profile.engine_kind().ok_or_else(|| {
        CoreError::connection(
            profile.engine.clone(),
            format!("unsupported database type '{}'", profile.engine),
        )
    })?;

    let attempt = async {
        let client: Box<dyn EngineClient> = match kind {
            EngineKind::PostgreSQL => Box::new(postgres::PostgresClient::connect(profile).await?),
            EngineKind::MySQL => Box::new(mysql::MySqlClient::connect(profile).await?),
            EngineKind::SqlServer => Box::new(mssql::SqlServerClient::connect(profile).await?),
        };
        Ok::<_, CoreError>(client)
    };

    let client = tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), attempt)
        .await
        .map_err(|_| {
            CoreError::connection(
                kind.as_str(),
                format!(
                    "Connection Timed Out: the server at {}:{} did not respond within {} seconds",
                    profile.host, profile.port, CONNECT_TIMEOUT_SECS
                ),
            )
        })??;

    log::info!(
        "[{}] connected to {}:{} ({})",
        kind,
        profile.host,
        profile.port,
        profile.name
    );
    Ok(ConnectionHandle::new(client))
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;
