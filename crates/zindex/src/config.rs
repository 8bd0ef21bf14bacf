use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error as ThisError;
use zindex_core::db::query::QueryOptions;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

///
/// Config
///
/// Connection and query settings, typically read from `zindex.toml`.
/// Every field has a default, so an empty document is valid.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub query: QueryConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse, and validate the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.address.trim().is_empty() {
            return Err(ConfigError::Invalid("store.address must not be empty".to_string()));
        }
        if self.query.scratch_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "query.scratch_prefix must not be empty".to_string(),
            ));
        }
        if self.query.scratch_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "query.scratch_ttl_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Connection URL understood by the Redis client.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let StoreConfig {
            network,
            address,
            database,
            password,
        } = &self.store;

        match network {
            Network::Tcp => match password {
                Some(password) => format!("redis://:{password}@{address}/{database}"),
                None => format!("redis://{address}/{database}"),
            },
            Network::Unix => match password {
                Some(password) => format!("redis+unix://{address}?db={database}&pass={password}"),
                None => format!("redis+unix://{address}?db={database}"),
            },
        }
    }

    #[must_use]
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            scratch_prefix: self.query.scratch_prefix.clone(),
            scratch_ttl: Duration::from_secs(self.query.scratch_ttl_secs),
        }
    }
}

///
/// Network
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    Unix,
}

///
/// StoreConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub network: Network,
    /// `host:port` for TCP, a socket path for Unix.
    pub address: String,
    pub database: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            address: "127.0.0.1:6379".to_string(),
            database: 0,
            password: None,
        }
    }
}

///
/// QueryConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    pub scratch_prefix: String,
    pub scratch_ttl_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let options = QueryOptions::default();

        Self {
            scratch_prefix: options.scratch_prefix,
            scratch_ttl_secs: options.scratch_ttl.as_secs(),
        }
    }
}

///
/// TESTS
///
