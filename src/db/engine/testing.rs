//! Scripted engine used by unit and route tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{ConnectionHandle, Connector, EngineClient};
use crate::db_types::{ConnectionProfile, EngineKind, SqlParam, TabularResult};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Default)]
pub struct Recorder {
    pub statements: Vec<(String, Vec<SqlParam>)>,
    pub connects: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub closes: usize,
}

#[derive(Clone)]
pub struct Script {
    pub kind: EngineKind,
    pub tables: Vec<String>,
    pub columns: HashMap<String, Vec<String>>,
    pub column_types: HashMap<String, String>,
    /// 1-based index of the `execute` call that fails.
    pub fail_on_execute: Option<usize>,
    pub fail_connect: bool,
    pub result: TabularResult,
}

impl Script {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            tables: Vec::new(),
            columns: HashMap::new(),
            column_types: HashMap::new(),
            fail_on_execute: None,
            fail_connect: false,
            result: TabularResult::empty(),
        }
    }

    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.push(table.to_string());
        self.columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }
}

pub struct ScriptedClient {
    script: Script,
    recorder: Arc<Mutex<Recorder>>,
}

#[async_trait]
impl EngineClient for ScriptedClient {
    fn kind(&self) -> EngineKind {
        self.script.kind
    }

    async fn list_tables(&mut self) -> CoreResult<Vec<String>> {
        Ok(self.script.tables.clone())
    }

    async fn list_columns(&mut self, table: &str) -> CoreResult<Vec<String>> {
        self.script
            .columns
            .get(table)
            .cloned()
            .ok_or_else(|| CoreError::query(format!("relation \"{}\" does not exist", table)))
    }

    async fn column_types(&mut self, _table: &str) -> CoreResult<HashMap<String, String>> {
        Ok(self.script.column_types.clone())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CoreResult<TabularResult> {
        let call = {
            let mut recorder = self.recorder.lock().unwrap();
            recorder.statements.push((sql.to_string(), params.to_vec()));
            recorder.statements.len()
        };
        if self.script.fail_on_execute == Some(call) {
            return Err(CoreError::query("duplicate key value violates unique constraint"));
        }
        Ok(self.script.result.clone())
    }

    async fn begin(&mut self) -> CoreResult<()> {
        self.recorder.lock().unwrap().begins += 1;
        Ok(())
    }

    async fn commit(&mut self) -> CoreResult<()> {
        self.recorder.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> CoreResult<()> {
        self.recorder.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) -> CoreResult<()> {
        self.recorder.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub struct ScriptedConnector {
    pub script: Script,
    pub recorder: Arc<Mutex<Recorder>>,
}

impl ScriptedConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(Box::new(ScriptedClient {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, profile: &ConnectionProfile) -> CoreResult<ConnectionHandle> {
        if self.script.fail_connect {
            return Err(CoreError::connection(profile.engine.clone(), "password authentication failed"));
        }
        self.recorder.lock().unwrap().connects += 1;
        Ok(self.handle())
    }
}

pub fn profile(id: &str, engine: &str) -> ConnectionProfile {
    ConnectionProfile {
        id: id.to_string(),
        name: format!("{} test", engine),
        engine: engine.to_string(),
        host: "127.0.0.1".to_string(),
        port: 5432,
        username: "tester".to_string(),
        password: Some("secret".to_string()),
        database: Some("app".to_string()),
    }
}

/// Registry over a fixed set of profiles.
#[derive(Default)]
pub struct MemoryRegistry {
    pub profiles: HashMap<String, ConnectionProfile>,
}

impl MemoryRegistry {
    pub fn with(profiles: Vec<ConnectionProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

#[async_trait]
impl crate::db::connections::ConnectionRegistry for MemoryRegistry {
    async fn get_profile(&self, connection_id: &str) -> CoreResult<ConnectionProfile> {
        self.profiles
            .get(connection_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound("Connection not found".to_string()))
    }
}

// --- Live Database Helpers ---

pub fn integration_enabled() -> bool {
    std::env::var("DATADOCK_RUN_INTEGRATION_DB_TESTS")
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
}

pub fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_port_or_default(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .unwrap_or(default)
}

/// Profile for a live engine; `prefix` selects `DATADOCK_IT_<PREFIX>_*` overrides.
pub fn live_profile(engine: &str, prefix: &str, default_port: u16, default_user: &str) -> ConnectionProfile {
    let var = |name: &str| format!("DATADOCK_IT_{}_{}", prefix, name);
    ConnectionProfile {
        id: format!("it_{}", engine),
        name: format!("it_{}", engine),
        engine: engine.to_string(),
        host: env_or_default(&var("HOST"), "127.0.0.1"),
        port: env_port_or_default(&var("PORT"), default_port),
        username: env_or_default(&var("USER"), default_user),
        password: Some(env_or_default(&var("PASSWORD"), "datadock")),
        database: Some(env_or_default(&var("DATABASE"), "datadock_it")),
    }
}
