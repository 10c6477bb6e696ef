use super::{WindowRange, WindowStore};
use crate::error::{ThrottleError, ThrottleResult};
use ::redis::aio::MultiplexedConnection;
use ::redis::{Client, RedisResult};
use async_trait::async_trait;
use std::time::Duration;

/// Sliding windows kept in Redis sorted sets.
///
/// Scores are Unix seconds and members are event ids, so re-recording the same
/// submission only moves its score. Each call is one `MULTI`/`EXEC` block.
#[derive(Clone)]
pub struct RedisWindowStore {
    connection: MultiplexedConnection,
}

impl RedisWindowStore {
    /// Open a multiplexed connection to `redis_url`
    pub async fn connect(redis_url: &str) -> ThrottleResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| ThrottleError::Store(format!("Failed to create Redis client: {}", e)))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ThrottleError::Store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection })
    }

    pub async fn ping(&self) -> ThrottleResult<String> {
        let mut conn = self.connection.clone();
        let result: RedisResult<String> = ::redis::cmd("PING").query_async(&mut conn).await;
        result.map_err(|e| ThrottleError::Store(format!("Ping failed: {}", e)))
    }

    /// Remove a window entirely
    pub async fn delete(&self, key: &str) -> ThrottleResult<bool> {
        let mut conn = self.connection.clone();
        let result: RedisResult<i32> = ::redis::cmd("DEL").arg(key).query_async(&mut conn).await;
        result
            .map(|deleted_count| deleted_count > 0)
            .map_err(|e| ThrottleError::Store(format!("DEL failed: {}", e)))
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn record_and_count(
        &self,
        key: &str,
        event_id: &str,
        now: u64,
        max_window: Duration,
        ranges: &[WindowRange],
    ) -> ThrottleResult<Vec<u64>> {
        let max_secs = max_window.as_secs();
        let cutoff = now.saturating_sub(max_secs);

        let mut pipe = ::redis::pipe();
        pipe.atomic()
            .cmd("ZREMRANGEBYSCORE").arg(key).arg("-inf").arg(cutoff).ignore()
            .cmd("ZADD").arg(key).arg(now).arg(event_id).ignore()
            .cmd("EXPIRE").arg(key).arg(max_secs).ignore();

        for range in ranges {
            pipe.cmd("ZCOUNT").arg(key).arg(range.start).arg(range.end);
        }

        let mut conn = self.connection.clone();
        let counts: Vec<u64> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| ThrottleError::Store(format!("Window update failed for {}: {}", key, e)))?;

        Ok(counts)
    }
}
