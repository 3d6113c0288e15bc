//! # Admission Redis
//!
//! Production [`OrderedStore`] over Redis.
//!
//! The waiting list is a sorted set (`ZADD`/`ZREVRANK`/`ZREVRANGE`) and the
//! active set a plain set (`SADD`/`SISMEMBER`/`SCARD`). Every primitive is a
//! single Redis command except the bounded add, which runs as a Lua script
//! so its check-then-insert is atomic on the server.
//!
//! The connection is opened on first use, not at construction. A store built
//! while Redis is still starting reports [`StoreError::Unavailable`] from
//! each call until a connection succeeds, which lets the scheduler's startup
//! retries and the readiness probe absorb the outage.
//!
//! # Example
//!
//! ```no_run
//! use admission_core::OrderedStore;
//! use admission_redis::RedisOrderedStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisOrderedStore::new("redis://127.0.0.1:6379")?;
//! store.ping().await?;
//! # Ok(())
//! # }
//! ```

use admission_core::store::{BoundedAdd, OrderedStore, StoreResult};
use admission_core::StoreError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Bound on a single connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Reconnect attempts inside one connection call; callers retry beyond that.
const CONNECT_RETRIES: usize = 1;

/// `ZSCORE` + `SISMEMBER` + `SCARD` + `SADD` in one server-side step.
///
/// `KEYS[1]` is the active set and `KEYS[2]` the waiting list. Returns 0 when
/// added, 1 when already a member, 2 when the set is full, 3 when the member
/// is no longer waiting.
const BOUNDED_ADD_LUA: &str = r"
if redis.call('ZSCORE', KEYS[2], ARGV[1]) == false then
    return 3
end
if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 1 then
    return 1
end
if redis.call('SCARD', KEYS[1]) >= tonumber(ARGV[2]) then
    return 2
end
redis.call('SADD', KEYS[1], ARGV[1])
return 0
";

/// Redis-backed ordered store.
///
/// Cheap to clone: clones share one reconnecting `ConnectionManager`, created
/// lazily by whichever call needs it first.
#[derive(Clone)]
pub struct RedisOrderedStore {
    client: Client,
    conn_manager: Arc<OnceCell<ConnectionManager>>,
    bounded_add: Script,
}

impl RedisOrderedStore {
    /// Create a store for `redis_url` without connecting yet.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Command`] for a malformed URL.
    pub fn new(redis_url: &str) -> StoreResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Command(format!("Invalid Redis URL: {e}")))?;

        Ok(Self {
            client,
            conn_manager: Arc::new(OnceCell::new()),
            bounded_add: Script::new(BOUNDED_ADD_LUA),
        })
    }

    /// Shared connection, opened on first use.
    ///
    /// A failed attempt leaves nothing cached, so the next call tries again.
    async fn conn(&self) -> StoreResult<ConnectionManager> {
        self.conn_manager
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_connection_timeout(CONNECT_TIMEOUT)
                    .set_number_of_retries(CONNECT_RETRIES);
                let manager = ConnectionManager::new_with_config(self.client.clone(), config)
                    .await
                    .map_err(|e| {
                        StoreError::Unavailable(format!(
                            "Failed to create Redis connection manager: {e}"
                        ))
                    })?;
                tracing::info!("Connected to Redis");
                Ok::<_, StoreError>(manager)
            })
            .await
            .cloned()
    }
}

/// Connection-level failures are worth retrying; anything else is a bad
/// command or an unexpected reply.
fn store_error(context: &str, e: &RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        StoreError::Unavailable(format!("{context}: {e}"))
    } else {
        StoreError::Command(format!("{context}: {e}"))
    }
}

fn redis_index(index: u64) -> isize {
    isize::try_from(index).unwrap_or(isize::MAX)
}

#[async_trait]
impl OrderedStore for RedisOrderedStore {
    async fn score_upsert(&self, set_key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .zadd(set_key, member, score)
            .await
            .map_err(|e| store_error("ZADD failed", &e))?;
        Ok(())
    }

    async fn score_remove(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn
            .zrem(set_key, member)
            .await
            .map_err(|e| store_error("ZREM failed", &e))?;
        Ok(removed > 0)
    }

    async fn rank_desc(&self, set_key: &str, member: &str) -> StoreResult<Option<u64>> {
        let mut conn = self.conn().await?;
        conn.zrevrank(set_key, member)
            .await
            .map_err(|e| store_error("ZREVRANK failed", &e))
    }

    async fn range_desc(&self, set_key: &str, start: u64, stop: u64) -> StoreResult<Vec<String>> {
        if stop < start {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        conn.zrevrange(set_key, redis_index(start), redis_index(stop))
            .await
            .map_err(|e| store_error("ZREVRANGE failed", &e))
    }

    async fn cardinality(&self, set_key: &str) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        conn.zcard(set_key)
            .await
            .map_err(|e| store_error("ZCARD failed", &e))
    }

    async fn set_add(&self, set_key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: () = conn
            .sadd(set_key, member)
            .await
            .map_err(|e| store_error("SADD failed", &e))?;
        Ok(())
    }

    async fn set_add_bounded(
        &self,
        set_key: &str,
        source_key: &str,
        member: &str,
        capacity: u64,
    ) -> StoreResult<BoundedAdd> {
        let mut conn = self.conn().await?;
        let code: i64 = self
            .bounded_add
            .key(set_key)
            .key(source_key)
            .arg(member)
            .arg(capacity)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("Bounded SADD script failed", &e))?;

        match code {
            0 => Ok(BoundedAdd::Added),
            1 => Ok(BoundedAdd::AlreadyMember),
            2 => Ok(BoundedAdd::Full),
            3 => Ok(BoundedAdd::NotWaiting),
            other => Err(StoreError::Command(format!(
                "Bounded SADD script returned unexpected code {other}"
            ))),
        }
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let removed: u64 = conn
            .srem(set_key, member)
            .await
            .map_err(|e| store_error("SREM failed", &e))?;
        Ok(removed > 0)
    }

    async fn set_is_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.sismember(set_key, member)
            .await
            .map_err(|e| store_error("SISMEMBER failed", &e))
    }

    async fn set_cardinality(&self, set_key: &str) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        conn.scard(set_key)
            .await
            .map_err(|e| store_error("SCARD failed", &e))
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("PING failed", &e))?;
        Ok(())
    }
}
