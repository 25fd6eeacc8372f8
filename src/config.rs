// =====================================================
// SERVER CONFIGURATION
// =====================================================

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Interval between upload TTL sweeps.
pub const UPLOAD_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Parser, Debug, Clone)]
#[command(name = "datadock", about = "Multi-engine database admin and bulk import server")]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    #[arg(long, default_value = "0.0.0.0:3001", env = "DATADOCK_BIND")]
    pub bind: String,

    /// Directory holding the metadata database and encryption key
    #[arg(long, env = "DATADOCK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for uploaded files (defaults to <data_dir>/uploads)
    #[arg(long, env = "DATADOCK_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value = "50", env = "DATADOCK_MAX_UPLOAD_MB")]
    pub max_upload_mb: usize,

    /// Seconds an unused upload is kept before it is swept
    #[arg(long, default_value = "86400", env = "DATADOCK_UPLOAD_TTL_SECS")]
    pub upload_ttl_secs: u64,
}

impl ServerConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("datadock")
        })
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("uploads"))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_ttl_secs)
    }
}
