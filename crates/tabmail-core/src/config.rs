//! Engine configuration.
//!
//! Stored as pretty-printed JSON at `<config_dir>/tabmail/config.json`, or
//! wherever `TABMAIL_CONFIG` points. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "TABMAIL_CONFIG";

/// Tunables for the sync engine, protocol sessions and asset store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Header snapshot lifetime in seconds. Content validity follows it.
    pub cache_ttl_secs: u64,
    /// Listing size used when the caller does not pick one.
    pub default_max_count: usize,
    /// TCP connect plus TLS handshake limit in seconds.
    pub connect_timeout_secs: u64,
    /// Per-response limit in seconds.
    pub io_timeout_secs: u64,
    /// Overall limit for one protocol session in seconds.
    pub operation_timeout_secs: u64,
    /// Serve an empty listing from cache while it is fresh.
    ///
    /// Off by default: an empty mailbox is re-listed on every call.
    pub cache_empty_listing: bool,
    /// Directory receiving materialized inline images.
    pub asset_dir: PathBuf,
    /// Scheme of rewritten asset URLs.
    pub asset_scheme: String,
    /// Host part of rewritten asset URLs.
    pub asset_root: String,
    /// Path segment of rewritten asset URLs.
    pub asset_folder: String,
    /// SMTP submission port for replies.
    pub submission_port: u16,
    /// Domain announced in EHLO.
    pub client_hostname: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 600,
            default_max_count: 50,
            connect_timeout_secs: 30,
            io_timeout_secs: 60,
            operation_timeout_secs: 180,
            cache_empty_listing: false,
            asset_dir: data_dir().join("InlineCache"),
            asset_scheme: "https".to_string(),
            asset_root: "assets".to_string(),
            asset_folder: "InlineCache".to_string(),
            submission_port: 587,
            client_hostname: "localhost".to_string(),
        }
    }
}

impl EngineConfig {
    /// Header cache TTL.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-response timeout.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    /// Whole-session deadline.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Config file location: `TABMAIL_CONFIG` if set, else
    /// `<config_dir>/tabmail/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV).map_or_else(
            || {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("tabmail")
                    .join("config.json")
            },
            PathBuf::from,
        )
    }

    /// Loads from [`EngineConfig::default_path`].
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::load_from`].
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()).await
    }

    /// Loads from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails [`EngineConfig::validate`].
    pub async fn load_from(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                debug!(path = %path.display(), "loaded engine config");
                let config: Self = serde_json::from_str(&contents)?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rejects settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0
            || self.io_timeout_secs == 0
            || self.operation_timeout_secs == 0
        {
            return Err(Error::Config("timeouts must be at least one second".to_string()));
        }
        if self.asset_scheme.trim().is_empty() || self.asset_root.trim().is_empty() {
            return Err(Error::Config("asset_scheme and asset_root must be set".to_string()));
        }
        if self.submission_port == 0 {
            return Err(Error::Config("submission_port must be 1-65535".to_string()));
        }
        Ok(())
    }

    /// Writes the config to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

/// Per-user data directory: `<data_dir>/tabmail`.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabmail")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.default_max_count, 50);
        assert_eq!(config.submission_port, 587);
        assert!(!config.cache_empty_listing);
        assert!(config.asset_dir.ends_with("InlineCache"));
    }

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("nope.json"))
            .await
            .unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = EngineConfig {
            cache_ttl_secs: 30,
            cache_empty_listing: true,
            ..EngineConfig::default()
        };
        config.save_to(&path).await.unwrap();

        let loaded = EngineConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "io_timeout_secs": 5 }"#)
            .await
            .unwrap();

        let config = EngineConfig::load_from(&path).await.unwrap();
        assert_eq!(config.io_timeout(), Duration::from_secs(5));
        assert_eq!(config.operation_timeout(), Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path).await,
            Err(crate::Error::Serde(_))
        ));
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "operation_timeout_secs": 0 }"#)
            .await
            .unwrap();
        assert!(matches!(
            EngineConfig::load_from(&path).await,
            Err(crate::Error::Config(_))
        ));
    }
}
