//! Session configuration.
//!
//! Values are layered with figment, later layers winning:
//! built-in defaults, then a TOML file, then `EXTDATA_*` environment
//! variables. Command line flags are applied on top by the binary.
//!
//! ```toml
//! data_root = "/var/lib/extdata"
//! artifacts_url = "gs://builds/1234/"
//! servers = ["http://cache-1:8082", "http://cache-2:8082"]
//! parallelism = 8
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use extdata_fetch::{DEFAULT_STORAGE_ENDPOINT, PoolOptions};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::download::{DEFAULT_KEEPALIVE, DEFAULT_PARALLELISM, DownloadOptions};
use crate::error::ConfigError;

/// File read when no explicit config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "extdata.toml";
pub const ENV_PREFIX: &str = "EXTDATA_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root under which entity data directories live.
    pub data_root:                  PathBuf,
    /// Prefix for build artifact links. Empty when unknown.
    pub artifacts_url:              String,
    /// Backend pool servers. Empty means direct object storage downloads.
    pub servers:                    Vec<String>,
    pub storage_endpoint:           String,
    pub parallelism:                usize,
    pub keepalive_secs:             u64,
    pub health_timeout_secs:        u64,
    pub staged_lookup_timeout_secs: u64,
    pub stage_attempts:             u32,
    pub stage_retry_delay_ms:       u64,
}

impl Default for Config {
    fn default() -> Self {
        let pool = PoolOptions::default();
        Self {
            data_root:                  PathBuf::from("."),
            artifacts_url:              String::new(),
            servers:                    Vec::new(),
            storage_endpoint:           DEFAULT_STORAGE_ENDPOINT.to_string(),
            parallelism:                DEFAULT_PARALLELISM,
            keepalive_secs:             DEFAULT_KEEPALIVE.as_secs(),
            health_timeout_secs:        pool.health_timeout.as_secs(),
            staged_lookup_timeout_secs: pool.staged_lookup_timeout.as_secs(),
            stage_attempts:             pool.stage_attempts,
            stage_retry_delay_ms:       pool.stage_retry_delay.as_millis() as u64,
        }
    }
}

impl Config {
    /// Defaults merged with the TOML file at `path` (if it exists).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(path))
    }

    /// Loads the full layered configuration.
    ///
    /// `path` defaults to [`DEFAULT_CONFIG_FILE`] in the working directory.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let figment = Self::figment(path).merge(Env::prefixed(ENV_PREFIX));
        Ok(figment.extract()?)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions::new()
            .health_timeout(Duration::from_secs(self.health_timeout_secs))
            .staged_lookup_timeout(Duration::from_secs(self.staged_lookup_timeout_secs))
            .stage_attempts(self.stage_attempts)
            .stage_retry_delay(Duration::from_millis(self.stage_retry_delay_ms))
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions::new()
            .parallelism(self.parallelism)
            .keepalive(Duration::from_secs(self.keepalive_secs))
    }
}
