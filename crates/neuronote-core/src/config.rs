//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths to all NeuroNote data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/db/`).
    pub db: PathBuf,
    /// Uploaded document blobs (`data/uploads/`).
    pub uploads: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            db: root.join("db"),
            uploads: root.join("uploads"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.db)?;
        std::fs::create_dir_all(&self.uploads)?;
        Ok(())
    }
}

/// Top-level NeuroNote configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuroNoteConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Lifetime of a login session.
    pub token_ttl_hours: i64,
    /// Lifetime of a password reset token.
    pub reset_token_ttl_minutes: i64,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl NeuroNoteConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = env_parse("PORT").unwrap_or(8000);
        let token_ttl_hours = env_parse("NEURONOTE_TOKEN_TTL_HOURS").unwrap_or(24 * 7);
        let reset_token_ttl_minutes = env_parse("NEURONOTE_RESET_TTL_MINUTES").unwrap_or(60);
        let max_upload_mb: usize = env_parse("NEURONOTE_MAX_UPLOAD_MB").unwrap_or(25);

        let data_paths = DataPaths::new(data_dir)?;
        tracing::debug!("Data paths ready under {}", data_paths.root.display());

        Ok(Self {
            port,
            data_paths,
            token_ttl_hours,
            reset_token_ttl_minutes,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
