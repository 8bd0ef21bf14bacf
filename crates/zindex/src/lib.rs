//! ## Crate layout
//! - `core`: model descriptors, values, index maintenance, range lowering,
//!   the query executor, the store port, and observability.
//! - `config`: TOML connection and query settings.
//! - `redis_store`: the store port over a Redis server.
//!
//! The `prelude` module carries the vocabulary used by application code.

pub use zindex_core as core;

pub mod config;
pub mod redis_store;

use thiserror::Error as ThisError;
use tracing::debug;
use zindex_core::db::{Db, store::StoreError};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{Config, ConfigError};
pub use redis_store::{ConnectionProvider, RedisStore};

///
/// Error
///
/// Facade error: core failures plus configuration and connection setup.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] zindex_core::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A `Db` backed by a Redis client.
pub type RedisDb = Db<RedisStore<redis::Client>>;

/// Build a Redis-backed `Db` from `config`. No connection is opened until
/// the first store operation.
pub fn open(config: &Config) -> Result<RedisDb, Error> {
    config.validate()?;

    let url = config.connection_url();
    let client =
        redis::Client::open(url.as_str()).map_err(|err| StoreError::Connection(err.to_string()))?;
    debug!(
        network = ?config.store.network,
        address = %config.store.address,
        database = config.store.database,
        "zindex: opened store client"
    );

    Ok(Db::new(RedisStore::new(client)).with_options(config.query_options()))
}

///
/// Prelude
/// domain vocabulary plus the Redis entry points
///

pub mod prelude {
    pub use crate::{Config, RedisDb, open};
    pub use zindex_core::{
        db::{
            Db,
            index::IndexDelta,
            query::{LoadedRecord, RecordLoader},
        },
        prelude::*,
    };
}

///
/// TESTS
///
