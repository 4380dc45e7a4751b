//! Resolver configuration and the loaders that produce it.
//!
//! Two implementations ship: [`StaticConfigLoader`] wraps a pre-built
//! [`Config`] (for tests and embedders who already have one), and
//! [`FileConfigLoader`] reads a settings file via the `config` crate,
//! mirroring the reference implementation's `Settings::new`.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config as ConfigSource, File};
use serde::Deserialize;

use crate::error::ConfigLoadError;

/// Resolver configuration, produced by a [`ConfigLoader`] and consumed
/// read-only thereafter.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Config {
    /// Non-empty ordered list of `host:port` nameserver addresses.
    pub nameservers: Vec<String>,
    /// Total tries across the nameserver rotation.
    pub attempts: u32,
    /// Local hosts table, by address family.
    #[serde(default)]
    pub known_hosts: KnownHosts,
    /// Per-query timeout, in milliseconds on the wire/in config files.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Carried for interface compatibility with a fuller `ConfigLoader`
    /// but not consulted anywhere in this crate.
    #[serde(default)]
    pub search: Vec<String>,
    /// See `search`.
    #[serde(default)]
    pub ndots: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nameservers: vec!["8.8.8.8:53".to_string()],
            attempts: 3,
            known_hosts: KnownHosts::default(),
            timeout: Duration::from_secs(5),
            search: Vec::new(),
            ndots: 1,
        }
    }
}

/// The local hosts table: a `name -> address` mapping per address
/// family, corresponding to the data model's "`RecordType -> (name ->
/// address)` for types A and AAAA".
#[derive(Debug, Clone, Eq, PartialEq, Default, Deserialize)]
pub struct KnownHosts {
    #[serde(default)]
    pub a: HashMap<String, String>,
    #[serde(default)]
    pub aaaa: HashMap<String, String>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Produces a [`Config`], asynchronously (a file-backed loader may
/// need to hit the filesystem; an in-memory one resolves immediately).
pub trait ConfigLoader: Send + Sync {
    /// # Errors
    ///
    /// If the underlying source cannot be read or does not deserialize
    /// into a [`Config`].
    fn load(&self) -> impl std::future::Future<Output = Result<Config, ConfigLoadError>> + Send;
}

/// Wraps a pre-built `Config`. Used by tests and by embedders who
/// already have a `Config` value and don't need file-backed loading.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    async fn load(&self) -> Result<Config, ConfigLoadError> {
        Ok(self.config.clone())
    }
}

/// Reads a settings file (YAML, TOML, ...; anything the `config` crate
/// understands) via its path, mirroring the reference implementation's
/// `Settings::new(filename)`.
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    filename: String,
}

impl FileConfigLoader {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

impl ConfigLoader for FileConfigLoader {
    async fn load(&self) -> Result<Config, ConfigLoadError> {
        let filename = self.filename.clone();
        tokio::task::spawn_blocking(move || {
            ConfigSource::builder()
                .add_source(File::with_name(&filename))
                .build()
                .map_err(|error| ConfigLoadError::Source {
                    message: error.to_string(),
                })?
                .try_deserialize()
                .map_err(|error| ConfigLoadError::Deserialize {
                    message: error.to_string(),
                })
        })
        .await
        .map_err(|error| ConfigLoadError::Source {
            message: error.to_string(),
        })?
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_loader_returns_the_wrapped_config() {
        let config = test_util::test_config(vec!["127.0.0.1:53".to_string()]);
        let loader = StaticConfigLoader::new(config.clone());
        assert_eq!(config, loader.load().await.unwrap());
    }
}
