//! Module: redis_store
//! Responsibility: the sorted-set store port over a Redis server.
//! Does not own: pooling or retries; one connection is acquired per call.

use redis::{Cmd, ConnectionLike, FromRedisValue, RedisError, Script};
use std::time::Duration;
use zindex_core::db::{
    direction::Direction,
    index::{COPY_SCORE_RANGE_LUA, EXTRACT_IDS_LUA},
    store::{
        LexRange, ScoreRange, SortedSetStore, StoreAggregate, StoreError, WeightedKey, Window,
    },
};

///
/// ConnectionProvider
///
/// Hands out one connection per store operation. The connection is dropped
/// when the operation returns.
///

pub trait ConnectionProvider {
    type Connection: ConnectionLike;

    fn connection(&self) -> Result<Self::Connection, StoreError>;
}

impl ConnectionProvider for redis::Client {
    type Connection = redis::Connection;

    fn connection(&self) -> Result<Self::Connection, StoreError> {
        self.get_connection().map_err(store_error)
    }
}

fn store_error(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

///
/// RedisStore
///
/// Scripts are sent by hash and reloaded on a cache miss.
///

pub struct RedisStore<P> {
    provider: P,
    extract_ids: Script,
    copy_score_range: Script,
}

impl<P: ConnectionProvider> RedisStore<P> {
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            extract_ids: Script::new(EXTRACT_IDS_LUA),
            copy_score_range: Script::new(COPY_SCORE_RANGE_LUA),
        }
    }

    fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, StoreError> {
        let mut conn = self.provider.connection()?;

        cmd.query(&mut conn).map_err(store_error)
    }
}

impl<P> std::fmt::Debug for RedisStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("extract_ids", &self.extract_ids.get_hash())
            .field("copy_score_range", &self.copy_score_range.get_hash())
            .finish_non_exhaustive()
    }
}

// ZRANGEBYSCORE takes an offset and a count; -1 reads to the end.
fn limit_args(cmd: &mut Cmd, window: Window) {
    if window.offset == 0 && window.limit.is_none() {
        return;
    }

    let count = window
        .limit
        .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
    cmd.arg("LIMIT").arg(window.offset).arg(count);
}

impl<P: ConnectionProvider> SortedSetStore for RedisStore<P> {
    fn add(&self, key: &str, score: f64, member: &[u8]) -> Result<(), StoreError> {
        self.query(redis::cmd("ZADD").arg(key).arg(score).arg(member))
    }

    fn remove(&self, key: &str, member: &[u8]) -> Result<bool, StoreError> {
        let removed: i64 = self.query(redis::cmd("ZREM").arg(key).arg(member))?;

        Ok(removed > 0)
    }

    fn range_by_score(
        &self,
        key: &str,
        range: &ScoreRange,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let (min, max) = (range.min.to_arg(), range.max.to_arg());
        let mut cmd = match direction {
            Direction::Asc => {
                let mut cmd = redis::cmd("ZRANGEBYSCORE");
                cmd.arg(key).arg(min).arg(max);
                cmd
            }
            Direction::Desc => {
                let mut cmd = redis::cmd("ZREVRANGEBYSCORE");
                cmd.arg(key).arg(max).arg(min);
                cmd
            }
        };
        limit_args(&mut cmd, window);

        self.query(&cmd)
    }

    fn card(&self, key: &str) -> Result<u64, StoreError> {
        self.query(redis::cmd("ZCARD").arg(key))
    }

    fn range_by_rank(
        &self,
        key: &str,
        direction: Direction,
        window: Window,
    ) -> Result<Vec<Vec<u8>>, StoreError> {
        let (start, stop) = window.rank_bounds();
        let name = if direction.is_desc() { "ZREVRANGE" } else { "ZRANGE" };

        self.query(redis::cmd(name).arg(key).arg(start).arg(stop))
    }

    fn extract_ids(
        &self,
        source: &str,
        destination: &str,
        range: &LexRange,
    ) -> Result<(), StoreError> {
        let mut conn = self.provider.connection()?;
        let _: i64 = self
            .extract_ids
            .key(source)
            .key(destination)
            .arg(range.min.to_arg())
            .arg(range.max.to_arg())
            .invoke(&mut conn)
            .map_err(store_error)?;

        Ok(())
    }

    fn copy_score_range(
        &self,
        source: &str,
        destination: &str,
        range: &ScoreRange,
    ) -> Result<(), StoreError> {
        let mut conn = self.provider.connection()?;
        let _: i64 = self
            .copy_score_range
            .key(source)
            .key(destination)
            .arg(range.min.to_arg())
            .arg(range.max.to_arg())
            .invoke(&mut conn)
            .map_err(store_error)?;

        Ok(())
    }

    fn intersect(
        &self,
        destination: &str,
        sources: &[WeightedKey],
        aggregate: StoreAggregate,
    ) -> Result<u64, StoreError> {
        let mut cmd = redis::cmd("ZINTERSTORE");
        cmd.arg(destination).arg(sources.len());
        for source in sources {
            cmd.arg(&source.key);
        }
        cmd.arg("WEIGHTS");
        for source in sources {
            cmd.arg(source.weight);
        }
        cmd.arg("AGGREGATE").arg(aggregate.as_arg());

        self.query(&cmd)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let _: i64 = self.query(redis::cmd("PEXPIRE").arg(key).arg(millis))?;

        Ok(())
    }

    fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let _: i64 = self.query(redis::cmd("DEL").arg(keys))?;

        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(cmd: &Cmd) -> String {
        String::from_utf8_lossy(&cmd.get_packed_command()).into_owned()
    }

    #[test]
    fn window_becomes_limit_clause() {
        let mut cmd = redis::cmd("ZRANGEBYSCORE");
        limit_args(&mut cmd, Window::new(2, Some(5)));
        assert!(packed(&cmd).ends_with("$5\r\nLIMIT\r\n$1\r\n2\r\n$1\r\n5\r\n"));

        let mut cmd = redis::cmd("ZRANGEBYSCORE");
        limit_args(&mut cmd, Window::new(3, None));
        assert!(packed(&cmd).ends_with("$1\r\n3\r\n$2\r\n-1\r\n"));

        let mut cmd = redis::cmd("ZRANGEBYSCORE");
        limit_args(&mut cmd, Window::all());
        assert!(!packed(&cmd).contains("LIMIT"));
    }

    #[test]
    fn client_errors_classify_as_connection_faults() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let store = RedisStore::new(client);

        assert!(matches!(
            store.add("k", 1.0, b"m"),
            Err(StoreError::Connection(_))
        ));
    }
}
