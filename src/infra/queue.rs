//! Message queue port and its Redis implementation.
//!
//! Delivery is at-least-once. A received message is leased to the receiver
//! for the visibility timeout; unless it is deleted with the receipt handle
//! of that lease before the lease runs out, it becomes receivable again.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, RedisError};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{Config, MAX_RECEIVE_BATCH_SIZE, QUEUE_KEY_PREFIX};
use crate::domain::Message;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Queue port.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a message. Any receipt handle on it is ignored.
    async fn send(&self, message: &Message) -> AppResult<()>;

    /// Lease up to `max_messages` messages (capped at 10) for `visibility_timeout`.
    ///
    /// Every returned message carries a receipt handle.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> AppResult<Vec<Message>>;

    /// Acknowledge a received message.
    ///
    /// Fails when the handle is missing or belongs to an expired lease.
    async fn delete(&self, message: &Message) -> AppResult<()>;
}

/// Clamp a requested batch to what one receive may return.
pub fn receive_batch_size(requested: usize) -> usize {
    requested.min(MAX_RECEIVE_BATCH_SIZE)
}

/// Receipt handle format: `<message id>:<lease token>`.
pub(crate) fn receipt_handle(id: Uuid, token: &str) -> String {
    format!("{}:{}", id, token)
}

pub(crate) fn parse_receipt_handle(message: &Message) -> AppResult<(Uuid, &str)> {
    let handle = message.receipt_handle.as_deref().ok_or_else(|| {
        AppError::queue("delete message", format!("message {} has no receipt handle", message.id))
    })?;

    let (id, token) = handle
        .split_once(':')
        .ok_or_else(|| AppError::queue("delete message", "malformed receipt handle"))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::queue("delete message", "malformed receipt handle"))?;

    Ok((id, token))
}

// Requeues expired leases, then leases up to ARGV[2] ready messages.
// KEYS: messages hash, ready list, in-flight zset, leases hash.
// ARGV: visibility in ms, max messages, then one lease token per slot.
const RECEIVE_SCRIPT: &str = r#"
    local t = redis.call("TIME")
    local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)

    local expired = redis.call("ZRANGEBYSCORE", KEYS[3], "-inf", now)
    for _, id in ipairs(expired) do
        redis.call("ZREM", KEYS[3], id)
        redis.call("HDEL", KEYS[4], id)
        redis.call("LPUSH", KEYS[2], id)
    end

    local until_ms = now + tonumber(ARGV[1])
    local max = tonumber(ARGV[2])
    local out = {}
    local n = 0
    while n < max do
        local id = redis.call("LPOP", KEYS[2])
        if not id then
            break
        end
        local body = redis.call("HGET", KEYS[1], id)
        if body then
            n = n + 1
            local token = ARGV[2 + n]
            redis.call("ZADD", KEYS[3], until_ms, id)
            redis.call("HSET", KEYS[4], id, token)
            table.insert(out, id)
            table.insert(out, body)
            table.insert(out, token)
        end
    end
    return out
"#;

// Deletes a message only for the holder of its live lease.
// KEYS: as above. ARGV: message id, lease token.
const DELETE_SCRIPT: &str = r#"
    if redis.call("HGET", KEYS[4], ARGV[1]) ~= ARGV[2] then
        return 0
    end

    local t = redis.call("TIME")
    local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)
    local lease = redis.call("ZSCORE", KEYS[3], ARGV[1])
    if not lease or tonumber(lease) <= now then
        return 0
    end

    redis.call("HDEL", KEYS[4], ARGV[1])
    redis.call("ZREM", KEYS[3], ARGV[1])
    redis.call("HDEL", KEYS[1], ARGV[1])
    return 1
"#;

/// Redis-backed queue.
///
/// Layout under `queue:<name>`: `:messages` hash of id to JSON, `:ready`
/// list of ids, `:inflight` sorted set scored by lease expiry in ms, and
/// `:leases` hash of id to the current lease token.
#[derive(Clone)]
pub struct RedisQueue {
    connection: ConnectionManager,
    messages_key: String,
    ready_key: String,
    inflight_key: String,
    leases_key: String,
}

impl RedisQueue {
    /// Connect to the queue named in `config`.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| queue_error("connect", e))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| queue_error("connect", e))?;

        tracing::info!(queue = %config.deletion_queue_name, "Redis queue connected");

        Ok(Self::with_connection(connection, &config.deletion_queue_name))
    }

    /// Build a queue over an existing connection.
    pub fn with_connection(connection: ConnectionManager, name: &str) -> Self {
        let base = format!("{}{}", QUEUE_KEY_PREFIX, name);
        Self {
            connection,
            messages_key: format!("{}:messages", base),
            ready_key: format!("{}:ready", base),
            inflight_key: format!("{}:inflight", base),
            leases_key: format!("{}:leases", base),
        }
    }

    fn script(&self, source: &str) -> redis::Cmd {
        let mut cmd = redis::cmd("EVAL");
        cmd.arg(source)
            .arg(4)
            .arg(&self.messages_key)
            .arg(&self.ready_key)
            .arg(&self.inflight_key)
            .arg(&self.leases_key);
        cmd
    }
}

#[async_trait]
impl MessageQueue for RedisQueue {
    async fn send(&self, message: &Message) -> AppResult<()> {
        let mut stored = message.clone();
        stored.receipt_handle = None;
        let json = serde_json::to_string(&stored)
            .map_err(|e| AppError::internal(format!("Queue serialization error: {}", e)))?;
        let id = stored.id.to_string();

        let mut conn = self.connection.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset(&self.messages_key, &id, json)
            .ignore()
            .rpush(&self.ready_key, &id)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| queue_error("send message", e))?;

        tracing::debug!(message_id = %id, "Message sent");
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> AppResult<Vec<Message>> {
        let max = receive_batch_size(max_messages);
        if max == 0 {
            return Ok(Vec::new());
        }

        let visibility_ms = (visibility_timeout.as_millis() as u64).max(1);
        let mut cmd = self.script(RECEIVE_SCRIPT);
        cmd.arg(visibility_ms).arg(max);
        for _ in 0..max {
            cmd.arg(Uuid::new_v4().simple().to_string());
        }

        let mut conn = self.connection.clone();
        let raw: Vec<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| queue_error("receive messages", e))?;

        raw.chunks_exact(3)
            .map(|entry| {
                let mut message: Message = serde_json::from_str(&entry[1]).map_err(|e| {
                    AppError::queue("receive messages", format!("undecodable message {}: {}", entry[0], e))
                })?;
                message.receipt_handle = Some(receipt_handle(message.id, &entry[2]));
                Ok(message)
            })
            .collect()
    }

    async fn delete(&self, message: &Message) -> AppResult<()> {
        let (id, token) = parse_receipt_handle(message)?;

        let mut cmd = self.script(DELETE_SCRIPT);
        cmd.arg(id.to_string()).arg(token);

        let mut conn = self.connection.clone();
        let deleted: i64 = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| queue_error("delete message", e))?;

        if deleted == 1 {
            Ok(())
        } else {
            Err(AppError::queue(
                "delete message",
                format!("receipt handle for message {} is stale", id),
            ))
        }
    }
}

fn queue_error(op: &'static str, e: RedisError) -> AppError {
    AppError::queue(op, e)
}
